use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SubmissionError {
    #[error("a submission is already in flight")]
    AlreadySubmitting,

    #[error("attempt has already been submitted")]
    AlreadySubmitted,

    #[error("submission result does not match the pending request")]
    StaleTicket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    InProgress,
    Submitting,
    Submitted,
    Failed,
}

/// Why a submission was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionTrigger {
    Manual,
    TimeExpired,
}

/// Handle for the single in-flight submission.
#[derive(Debug, PartialEq, Eq)]
pub struct SubmissionTicket {
    attempt: u32,
    trigger: SubmissionTrigger,
}

impl SubmissionTicket {
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    #[must_use]
    pub fn trigger(&self) -> SubmissionTrigger {
        self.trigger
    }
}

/// `InProgress -> Submitting -> Submitted`, or `Submitting -> Failed -> InProgress`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionMachine {
    state: SubmissionState,
    attempts: u32,
    last_error: Option<String>,
}

impl Default for SubmissionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SubmissionMachine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SubmissionState::InProgress,
            attempts: 0,
            last_error: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> SubmissionState {
        self.state
    }

    /// Number of submission requests started so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    #[must_use]
    pub fn is_submitted(&self) -> bool {
        self.state == SubmissionState::Submitted
    }

    /// # Errors
    ///
    /// Returns `SubmissionError` if a submission is pending or already accepted.
    pub fn begin(
        &mut self,
        trigger: SubmissionTrigger,
    ) -> Result<SubmissionTicket, SubmissionError> {
        match self.state {
            SubmissionState::Submitting => Err(SubmissionError::AlreadySubmitting),
            SubmissionState::Submitted => Err(SubmissionError::AlreadySubmitted),
            SubmissionState::InProgress | SubmissionState::Failed => {
                self.attempts += 1;
                self.state = SubmissionState::Submitting;
                Ok(SubmissionTicket {
                    attempt: self.attempts,
                    trigger,
                })
            }
        }
    }

    /// # Errors
    ///
    /// Returns `SubmissionError::StaleTicket` if the ticket is not the pending one.
    pub fn succeed(&mut self, ticket: SubmissionTicket) -> Result<(), SubmissionError> {
        self.check(&ticket)?;
        self.state = SubmissionState::Submitted;
        self.last_error = None;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SubmissionError::StaleTicket` if the ticket is not the pending one.
    pub fn fail(
        &mut self,
        ticket: SubmissionTicket,
        message: impl Into<String>,
    ) -> Result<(), SubmissionError> {
        self.check(&ticket)?;
        self.state = SubmissionState::Failed;
        self.last_error = Some(message.into());
        Ok(())
    }

    /// Return a failed submission to `InProgress` so the learner can retry.
    pub fn reopen(&mut self) -> bool {
        if self.state == SubmissionState::Failed {
            self.state = SubmissionState::InProgress;
            return true;
        }
        false
    }

    fn check(&self, ticket: &SubmissionTicket) -> Result<(), SubmissionError> {
        if self.state != SubmissionState::Submitting || ticket.attempt != self.attempts {
            return Err(SubmissionError::StaleTicket);
        }
        Ok(())
    }
}
