use std::collections::BTreeMap;

use thiserror::Error;
use uuid::Uuid;

use crate::model::{ChallengeId, CodingChallenge, ExecutionReport, Hint};
use crate::session::clock::{SessionClock, TickOutcome};
use crate::session::submission::{
    SubmissionError, SubmissionMachine, SubmissionState, SubmissionTicket, SubmissionTrigger,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChallengeError {
    #[error("language `{0}` is not offered by this challenge")]
    UnsupportedLanguage(String),

    #[error("a code run is already in flight")]
    RunInFlight,

    #[error("all {max} hints have been used")]
    HintsExhausted { max: u32 },

    #[error("a hint request is already in flight")]
    HintPending,

    #[error("challenge is closed")]
    Closed,

    #[error(transparent)]
    Submission(#[from] SubmissionError),
}

/// Hint usage and accumulated penalty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HintLedger {
    used: u32,
    penalty: u32,
    max: u32,
    revealed: Vec<Hint>,
}

impl HintLedger {
    #[must_use]
    pub fn new(max: u32) -> Self {
        Self {
            max,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn used(&self) -> u32 {
        self.used
    }

    #[must_use]
    pub fn penalty(&self) -> u32 {
        self.penalty
    }

    #[must_use]
    pub fn max(&self) -> u32 {
        self.max
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.max.saturating_sub(self.used)
    }

    #[must_use]
    pub fn revealed(&self) -> &[Hint] {
        &self.revealed
    }

    fn record(&mut self, hint: Hint) {
        self.used += 1;
        self.penalty = self.penalty.saturating_add(hint.penalty_points);
        self.revealed.push(hint);
    }
}

/// Code to run against the challenge tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub code: String,
    pub language: String,
    pub session_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HintRequest {
    pub session_id: Uuid,
    pub hints_used: u32,
}

#[derive(Debug)]
pub struct ChallengeSubmitRequest {
    pub ticket: SubmissionTicket,
    pub code: String,
    pub language: String,
    pub session_id: Uuid,
    pub time_spent: u32,
    pub hints_used: u32,
}

/// Final grading returned for a challenge submission.
#[derive(Debug, Clone, PartialEq)]
pub struct ChallengeOutcome {
    pub score: f64,
    pub passed: bool,
    pub report: Option<ExecutionReport>,
}

/// One learner's work on a coding challenge.
#[derive(Debug, Clone)]
pub struct ChallengeSession {
    challenge: CodingChallenge,
    session_id: Uuid,
    clock: SessionClock,
    language: String,
    code: BTreeMap<String, String>,
    hints: HintLedger,
    hint_pending: bool,
    run_in_flight: bool,
    last_report: Option<ExecutionReport>,
    submission: SubmissionMachine,
    outcome: Option<ChallengeOutcome>,
}

impl ChallengeSession {
    /// Start on the first offered language with its starter code.
    #[must_use]
    pub fn start(challenge: CodingChallenge) -> Self {
        Self::with_session_id(challenge, Uuid::new_v4())
    }

    #[must_use]
    pub fn with_session_id(challenge: CodingChallenge, session_id: Uuid) -> Self {
        let code = challenge
            .languages()
            .iter()
            .map(|lang| (lang.clone(), challenge.starter_code(lang).to_owned()))
            .collect();
        let language = challenge.languages().first().cloned().unwrap_or_default();
        Self {
            clock: SessionClock::new(challenge.time_limit_secs()),
            hints: HintLedger::new(challenge.max_hints()),
            session_id,
            language,
            code,
            hint_pending: false,
            run_in_flight: false,
            last_report: None,
            submission: SubmissionMachine::new(),
            outcome: None,
            challenge,
        }
    }

    #[must_use]
    pub fn challenge_id(&self) -> ChallengeId {
        self.challenge.id()
    }

    #[must_use]
    pub fn challenge(&self) -> &CodingChallenge {
        &self.challenge
    }

    #[must_use]
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    #[must_use]
    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    #[must_use]
    pub fn code(&self) -> &str {
        self.code.get(&self.language).map_or("", String::as_str)
    }

    #[must_use]
    pub fn hints(&self) -> &HintLedger {
        &self.hints
    }

    #[must_use]
    pub fn last_report(&self) -> Option<&ExecutionReport> {
        self.last_report.as_ref()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.run_in_flight
    }

    #[must_use]
    pub fn submission_state(&self) -> SubmissionState {
        self.submission.state()
    }

    #[must_use]
    pub fn outcome(&self) -> Option<&ChallengeOutcome> {
        self.outcome.as_ref()
    }

    /// Switch language. Code typed for other languages is kept.
    ///
    /// # Errors
    ///
    /// Returns `ChallengeError::UnsupportedLanguage` or `ChallengeError::Closed`.
    pub fn select_language(&mut self, language: &str) -> Result<(), ChallengeError> {
        self.ensure_open()?;
        let language = language.trim().to_ascii_lowercase();
        if !self.challenge.supports(&language) {
            return Err(ChallengeError::UnsupportedLanguage(language));
        }
        self.language = language;
        Ok(())
    }

    /// Replace the code for the selected language.
    ///
    /// # Errors
    ///
    /// Returns `ChallengeError::Closed` once submitted or expired.
    pub fn edit_code(&mut self, code: impl Into<String>) -> Result<(), ChallengeError> {
        self.ensure_open()?;
        self.code.insert(self.language.clone(), code.into());
        Ok(())
    }

    /// Restore the starter code for the selected language.
    ///
    /// # Errors
    ///
    /// Returns `ChallengeError::Closed` once submitted or expired.
    pub fn reset_code(&mut self) -> Result<(), ChallengeError> {
        let starter = self.challenge.starter_code(&self.language).to_owned();
        self.edit_code(starter)
    }

    /// Advance the clock. On expiry returns the forced submission.
    pub fn tick(&mut self) -> (TickOutcome, Option<ChallengeSubmitRequest>) {
        let outcome = self.clock.tick();
        let submit = match outcome {
            TickOutcome::Expired { .. } => self.begin_submit(SubmissionTrigger::TimeExpired).ok(),
            _ => None,
        };
        (outcome, submit)
    }

    /// # Errors
    ///
    /// Returns `ChallengeError::RunInFlight` while a previous run is pending.
    pub fn begin_run(&mut self) -> Result<RunRequest, ChallengeError> {
        self.ensure_open()?;
        if self.run_in_flight {
            return Err(ChallengeError::RunInFlight);
        }
        self.run_in_flight = true;
        Ok(RunRequest {
            code: self.code().to_owned(),
            language: self.language.clone(),
            session_id: self.session_id,
        })
    }

    /// Clear the run guard; keeps the report when the run produced one.
    pub fn finish_run(&mut self, report: Option<ExecutionReport>) {
        self.run_in_flight = false;
        if report.is_some() {
            self.last_report = report;
        }
    }

    /// # Errors
    ///
    /// Returns `ChallengeError::HintsExhausted` when no hints are left and
    /// `ChallengeError::HintPending` while one is being fetched.
    pub fn begin_hint(&mut self) -> Result<HintRequest, ChallengeError> {
        self.ensure_open()?;
        if self.hint_pending {
            return Err(ChallengeError::HintPending);
        }
        if self.hints.remaining() == 0 {
            return Err(ChallengeError::HintsExhausted {
                max: self.hints.max(),
            });
        }
        self.hint_pending = true;
        Ok(HintRequest {
            session_id: self.session_id,
            hints_used: self.hints.used(),
        })
    }

    pub fn finish_hint(&mut self, hint: Option<Hint>) {
        self.hint_pending = false;
        if let Some(hint) = hint {
            self.hints.record(hint);
        }
    }

    /// # Errors
    ///
    /// Returns `ChallengeError::Submission` if a submission is pending or accepted.
    pub fn begin_submit(
        &mut self,
        trigger: SubmissionTrigger,
    ) -> Result<ChallengeSubmitRequest, ChallengeError> {
        let ticket = self.submission.begin(trigger)?;
        Ok(ChallengeSubmitRequest {
            ticket,
            code: self.code().to_owned(),
            language: self.language.clone(),
            session_id: self.session_id,
            time_spent: self.clock.elapsed(),
            hints_used: self.hints.used(),
        })
    }

    /// # Errors
    ///
    /// Returns `ChallengeError::Submission` for a stale ticket.
    pub fn finish_submit(
        &mut self,
        ticket: SubmissionTicket,
        result: Result<ChallengeOutcome, String>,
    ) -> Result<SubmissionState, ChallengeError> {
        match result {
            Ok(outcome) => {
                self.submission.succeed(ticket)?;
                if self.clock.is_running() {
                    self.clock.stop();
                }
                if let Some(report) = &outcome.report {
                    self.last_report = Some(report.clone());
                }
                self.outcome = Some(outcome);
                Ok(SubmissionState::Submitted)
            }
            Err(message) => {
                self.submission.fail(ticket, message)?;
                self.submission.reopen();
                Ok(SubmissionState::Failed)
            }
        }
    }

    fn ensure_open(&self) -> Result<(), ChallengeError> {
        if self.submission.is_submitted() || self.clock.is_expired() {
            return Err(ChallengeError::Closed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge(max_hints: u32, limit: Option<u32>) -> CodingChallenge {
        let starter = BTreeMap::from([
            ("rust".to_owned(), "fn main() {}".to_owned()),
            ("python".to_owned(), "def main(): pass".to_owned()),
        ]);
        CodingChallenge::new(
            ChallengeId::new(5),
            "FizzBuzz",
            "Print numbers",
            vec!["rust".into(), "python".into()],
        )
        .unwrap()
        .with_starter_code(starter)
        .with_time_limit(limit)
        .with_max_hints(max_hints)
    }

    fn hint(id: u64, penalty: u32) -> Hint {
        Hint {
            id,
            content: format!("hint {id}"),
            penalty_points: penalty,
        }
    }

    #[test]
    fn seeds_starter_code_and_keeps_edits_per_language() {
        let mut session = ChallengeSession::start(challenge(2, None));
        assert_eq!(session.language(), "rust");
        assert_eq!(session.code(), "fn main() {}");

        session.edit_code("fn main() { println!(\"1\"); }").unwrap();
        session.select_language("Python").unwrap();
        assert_eq!(session.code(), "def main(): pass");
        session.select_language("rust").unwrap();
        assert!(session.code().contains("println"));

        assert_eq!(
            session.select_language("cobol"),
            Err(ChallengeError::UnsupportedLanguage("cobol".into()))
        );
    }

    #[test]
    fn only_one_run_in_flight() {
        let mut session = ChallengeSession::start(challenge(0, None));
        let run = session.begin_run().unwrap();
        assert_eq!(run.session_id, session.session_id());
        assert_eq!(session.begin_run(), Err(ChallengeError::RunInFlight));

        session.finish_run(Some(ExecutionReport {
            passed_count: 1,
            total_count: 1,
            ..ExecutionReport::default()
        }));
        assert!(session.last_report().unwrap().all_passed());
        assert!(session.begin_run().is_ok());
    }

    #[test]
    fn hints_accumulate_penalty_until_exhausted() {
        let mut session = ChallengeSession::start(challenge(2, None));
        for (id, penalty) in [(1, 5), (2, 10)] {
            let request = session.begin_hint().unwrap();
            assert_eq!(request.hints_used, session.hints().used());
            assert_eq!(session.begin_hint(), Err(ChallengeError::HintPending));
            session.finish_hint(Some(hint(id, penalty)));
        }
        assert_eq!(session.hints().penalty(), 15);
        assert_eq!(
            session.begin_hint(),
            Err(ChallengeError::HintsExhausted { max: 2 })
        );
    }

    #[test]
    fn expiry_submits_once_and_closes_editing() {
        let mut session = ChallengeSession::start(challenge(1, Some(2)));
        assert!(session.tick().1.is_none());
        let (outcome, submit) = session.tick();
        assert_eq!(outcome, TickOutcome::Expired { elapsed: 2 });
        let submit = submit.unwrap();
        assert_eq!(submit.time_spent, 2);
        assert!(session.tick().1.is_none());
        assert_eq!(session.edit_code("late"), Err(ChallengeError::Closed));

        let state = session
            .finish_submit(
                submit.ticket,
                Ok(ChallengeOutcome {
                    score: 50.0,
                    passed: false,
                    report: None,
                }),
            )
            .unwrap();
        assert_eq!(state, SubmissionState::Submitted);
        assert!(matches!(
            session.begin_submit(SubmissionTrigger::Manual),
            Err(ChallengeError::Submission(SubmissionError::AlreadySubmitted))
        ));
    }
}
