use std::collections::BTreeSet;

use crate::model::QuestionId;

/// Questions the learner marked for review. Advisory only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagSet {
    flagged: BTreeSet<QuestionId>,
}

impl FlagSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the flag; returns whether the question is flagged afterwards.
    pub fn toggle(&mut self, question_id: QuestionId) -> bool {
        if self.flagged.remove(&question_id) {
            false
        } else {
            self.flagged.insert(question_id);
            true
        }
    }

    #[must_use]
    pub fn contains(&self, question_id: QuestionId) -> bool {
        self.flagged.contains(&question_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.flagged.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flagged.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = QuestionId> + '_ {
        self.flagged.iter().copied()
    }
}

impl FromIterator<QuestionId> for FlagSet {
    fn from_iter<T: IntoIterator<Item = QuestionId>>(iter: T) -> Self {
        Self {
            flagged: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn toggle_reports_new_state() {
        let mut flags = FlagSet::new();
        assert!(flags.toggle(QuestionId::new(4)));
        assert!(flags.contains(QuestionId::new(4)));
        assert!(!flags.toggle(QuestionId::new(4)));
        assert!(flags.is_empty());
    }

    proptest! {
        #[test]
        fn double_toggle_is_identity(
            initial in proptest::collection::btree_set(0u64..20, 0..10),
            id in 0u64..20,
        ) {
            let mut flags: FlagSet = initial.iter().copied().map(QuestionId::new).collect();
            let before = flags.clone();
            flags.toggle(QuestionId::new(id));
            flags.toggle(QuestionId::new(id));
            prop_assert_eq!(flags, before);
        }
    }
}
