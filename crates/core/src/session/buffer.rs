use std::collections::BTreeMap;

use thiserror::Error;

use crate::model::{Answer, QuestionId};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("answer buffer is closed to further changes")]
pub struct BufferClosed;

/// In-memory answers keyed by question id.
///
/// Every mutation bumps `revision`, which autosave uses to tell whether the
/// server copy is current.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnswerBuffer {
    answers: BTreeMap<QuestionId, Answer>,
    revision: u64,
    closed: bool,
}

impl AnswerBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the buffer with previously saved answers. Revision starts at zero.
    #[must_use]
    pub fn restore(answers: BTreeMap<QuestionId, Answer>) -> Self {
        Self {
            answers,
            revision: 0,
            closed: false,
        }
    }

    /// Merge `patch` into the answer stored for `question_id`.
    ///
    /// # Errors
    ///
    /// Returns `BufferClosed` once the buffer has been closed.
    pub fn record(
        &mut self,
        question_id: QuestionId,
        patch: Answer,
    ) -> Result<&Answer, BufferClosed> {
        if self.closed {
            return Err(BufferClosed);
        }
        self.revision += 1;
        let entry = self.answers.entry(question_id).or_default();
        entry.merge(patch);
        Ok(entry)
    }

    #[must_use]
    pub fn get(&self, question_id: QuestionId) -> Option<&Answer> {
        self.answers.get(&question_id)
    }

    #[must_use]
    pub fn contains(&self, question_id: QuestionId) -> bool {
        self.answers.contains_key(&question_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.answers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QuestionId, &Answer)> {
        self.answers.iter()
    }

    /// Full copy of the buffer for a save or submit request.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<QuestionId, Answer> {
        self.answers.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn later_selection_replaces_earlier() {
        let mut buffer = AnswerBuffer::new();
        let q1 = QuestionId::new(1);
        buffer.record(q1, Answer::selections(["A"])).unwrap();
        buffer.record(q1, Answer::selections(["B"])).unwrap();

        assert_eq!(buffer.get(q1), Some(&Answer::selections(["B"])));
        assert_eq!(buffer.revision(), 2);
    }

    #[test]
    fn closed_buffer_rejects_records() {
        let mut buffer = AnswerBuffer::new();
        buffer.close();
        assert_eq!(
            buffer.record(QuestionId::new(1), Answer::text("late")),
            Err(BufferClosed)
        );
        assert!(buffer.is_empty());
    }

    fn patch_strategy() -> impl Strategy<Value = Answer> {
        (
            proptest::option::of(proptest::collection::vec("[a-d]", 0..3)),
            proptest::option::of("[a-z]{0,6}"),
            proptest::option::of("[a-z]{0,6}"),
            proptest::option::of(proptest::collection::vec("[0-9]", 0..4)),
        )
            .prop_map(|(selected_options, text, code, order)| Answer {
                selected_options,
                text,
                code,
                order,
                ..Answer::default()
            })
    }

    proptest! {
        #[test]
        fn record_equals_in_order_shallow_merge(
            patches in proptest::collection::vec(patch_strategy(), 1..8),
        ) {
            let mut buffer = AnswerBuffer::new();
            let id = QuestionId::new(7);
            for patch in &patches {
                buffer.record(id, patch.clone()).unwrap();
            }

            let mut expected = Answer::default();
            for patch in patches {
                if patch.selected_options.is_some() {
                    expected.selected_options = patch.selected_options;
                }
                if patch.text.is_some() {
                    expected.text = patch.text;
                }
                if patch.code.is_some() {
                    expected.code = patch.code;
                }
                if patch.order.is_some() {
                    expected.order = patch.order;
                }
            }
            prop_assert_eq!(buffer.get(id), Some(&expected));
        }
    }
}
