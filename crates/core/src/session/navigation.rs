use thiserror::Error;

use crate::model::{Question, QuestionId};
use crate::session::buffer::AnswerBuffer;
use crate::session::flags::FlagSet;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum NavigationError {
    #[error("question index {index} is out of range (0..{len})")]
    OutOfRange { index: usize, len: usize },
}

/// Display state of a question in the palette. `Flagged` wins over `Answered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionState {
    Unanswered,
    Answered,
    Flagged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionMark {
    pub index: usize,
    pub question_id: QuestionId,
    pub answered: bool,
    pub flagged: bool,
    pub current: bool,
}

impl QuestionMark {
    #[must_use]
    pub fn state(&self) -> QuestionState {
        if self.flagged {
            QuestionState::Flagged
        } else if self.answered {
            QuestionState::Answered
        } else {
            QuestionState::Unanswered
        }
    }
}

/// Aggregated view of attempt progress, useful for UI.
///
/// A flagged answered question counts in both `answered` and `flagged`.
/// `unanswered` counts questions that are neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSummary {
    pub total: usize,
    pub answered: usize,
    pub flagged: usize,
    pub unanswered: usize,
    pub current: usize,
}

/// Current position within a fixed question list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationTracker {
    len: usize,
    current: usize,
}

impl NavigationTracker {
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self { len, current: 0 }
    }

    #[must_use]
    pub fn current(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn is_first(&self) -> bool {
        self.current == 0
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.current + 1 >= self.len
    }

    /// Move forward, clamped to the last question.
    pub fn next(&mut self) -> usize {
        if self.current + 1 < self.len {
            self.current += 1;
        }
        self.current
    }

    /// Move back, clamped to the first question.
    pub fn previous(&mut self) -> usize {
        self.current = self.current.saturating_sub(1);
        self.current
    }

    /// # Errors
    ///
    /// Returns `NavigationError::OutOfRange` for an index past the end.
    pub fn select(&mut self, index: usize) -> Result<usize, NavigationError> {
        if index >= self.len {
            return Err(NavigationError::OutOfRange {
                index,
                len: self.len,
            });
        }
        self.current = index;
        Ok(index)
    }

    /// Classify every question against the buffer and flag set.
    #[must_use]
    pub fn marks(
        &self,
        questions: &[Question],
        buffer: &AnswerBuffer,
        flags: &FlagSet,
    ) -> Vec<QuestionMark> {
        questions
            .iter()
            .enumerate()
            .map(|(index, question)| QuestionMark {
                index,
                question_id: question.id(),
                answered: buffer.contains(question.id()),
                flagged: flags.contains(question.id()),
                current: index == self.current,
            })
            .collect()
    }

    #[must_use]
    pub fn progress(marks: &[QuestionMark], current: usize) -> ProgressSummary {
        let answered = marks.iter().filter(|m| m.answered).count();
        let flagged = marks.iter().filter(|m| m.flagged).count();
        let unanswered = marks.iter().filter(|m| !m.answered && !m.flagged).count();
        ProgressSummary {
            total: marks.len(),
            answered,
            flagged,
            unanswered,
            current,
        }
    }
}
