use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::QuizId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AssessmentError {
    #[error("assessment title cannot be empty")]
    EmptyTitle,

    #[error("time limit must be greater than zero")]
    ZeroTimeLimit,

    #[error("passing score must be between 0 and 100, got {0}")]
    InvalidPassingScore(u32),
}

/// Server-side status of an attempt record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    #[default]
    InProgress,
    Submitted,
    Graded,
    Expired,
}

impl AttemptStatus {
    /// Whether the learner may still change answers on this attempt.
    #[must_use]
    pub fn is_open(self) -> bool {
        matches!(self, Self::InProgress)
    }
}

/// Quiz settings that shape a timed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assessment {
    id: QuizId,
    title: String,
    description: Option<String>,
    time_limit_secs: Option<u32>,
    proctored: bool,
    passing_score: Option<u32>,
    shuffle_questions: bool,
    shuffle_options: bool,
}

impl Assessment {
    /// # Errors
    ///
    /// Returns `AssessmentError::EmptyTitle` for a blank title.
    pub fn new(id: QuizId, title: impl Into<String>) -> Result<Self, AssessmentError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(AssessmentError::EmptyTitle);
        }
        Ok(Self {
            id,
            title,
            description: None,
            time_limit_secs: None,
            proctored: false,
            passing_score: None,
            shuffle_questions: false,
            shuffle_options: false,
        })
    }

    /// # Errors
    ///
    /// Returns `AssessmentError::ZeroTimeLimit` when `secs` is zero.
    pub fn with_time_limit(mut self, secs: Option<u32>) -> Result<Self, AssessmentError> {
        if secs == Some(0) {
            return Err(AssessmentError::ZeroTimeLimit);
        }
        self.time_limit_secs = secs;
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns `AssessmentError::InvalidPassingScore` above 100.
    pub fn with_passing_score(mut self, score: Option<u32>) -> Result<Self, AssessmentError> {
        if let Some(value) = score
            && value > 100
        {
            return Err(AssessmentError::InvalidPassingScore(value));
        }
        self.passing_score = score;
        Ok(self)
    }

    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_proctoring(mut self, proctored: bool) -> Self {
        self.proctored = proctored;
        self
    }

    /// Shuffling is applied by the server; the flags are carried for display only.
    #[must_use]
    pub fn with_shuffle(mut self, questions: bool, options: bool) -> Self {
        self.shuffle_questions = questions;
        self.shuffle_options = options;
        self
    }

    #[must_use]
    pub fn id(&self) -> QuizId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn time_limit_secs(&self) -> Option<u32> {
        self.time_limit_secs
    }

    #[must_use]
    pub fn proctored(&self) -> bool {
        self.proctored
    }

    #[must_use]
    pub fn passing_score(&self) -> Option<u32> {
        self.passing_score
    }

    #[must_use]
    pub fn shuffle_questions(&self) -> bool {
        self.shuffle_questions
    }

    #[must_use]
    pub fn shuffle_options(&self) -> bool {
        self.shuffle_options
    }
}
