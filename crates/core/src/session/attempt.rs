use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::model::{Answer, Assessment, AttemptId, Question, QuestionId};
use crate::session::autosave::{AutosaveGuard, AutosaveTicket, DEFAULT_AUTOSAVE_PERIOD};
use crate::session::buffer::AnswerBuffer;
use crate::session::clock::{SessionClock, TickOutcome};
use crate::session::flags::FlagSet;
use crate::session::integrity::{
    IntegrityLog, IntegrityMonitor, IntegrityWarning, Visibility, WarningId,
};
use crate::session::navigation::{
    NavigationError, NavigationTracker, ProgressSummary, QuestionMark,
};
use crate::session::submission::{
    SubmissionError, SubmissionMachine, SubmissionState, SubmissionTicket, SubmissionTrigger,
};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("attempt has no questions")]
    NoQuestions,

    #[error("question {0} is not part of this attempt")]
    UnknownQuestion(QuestionId),

    #[error("attempt no longer accepts answers")]
    Closed,

    #[error("answers are locked while a submission is in flight")]
    SubmissionPending,

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Navigation(#[from] NavigationError),
}

//
// ─── REQUESTS & EFFECTS ────────────────────────────────────────────────────────
//

/// Everything needed to rebuild an attempt after (re)loading the page.
#[derive(Debug, Clone)]
pub struct AttemptSetup {
    pub attempt_id: AttemptId,
    pub assessment: Assessment,
    pub questions: Vec<Question>,
    pub time_spent_secs: u32,
    pub answers: BTreeMap<QuestionId, Answer>,
    pub flags: Vec<QuestionId>,
    pub tab_switches: u32,
}

/// Payload for `save`: the whole buffer plus elapsed time.
#[derive(Debug)]
pub struct AutosaveRequest {
    pub ticket: AutosaveTicket,
    pub answers: BTreeMap<QuestionId, Answer>,
    pub time_spent: u32,
}

/// Payload for `submit`: the whole current buffer, never a delta.
#[derive(Debug)]
pub struct SubmitRequest {
    pub ticket: SubmissionTicket,
    pub answers: BTreeMap<QuestionId, Answer>,
    pub time_spent: u32,
    pub tab_switches: u32,
}

/// Grading result returned by the backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubmitOutcome {
    pub percentage: f64,
    pub passed: Option<bool>,
}

/// Work the caller must perform after a tick.
#[derive(Debug)]
pub struct TickEffects {
    pub outcome: TickOutcome,
    pub autosave: Option<AutosaveRequest>,
    pub submit: Option<SubmitRequest>,
}

/// Read-only snapshot for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptView {
    pub attempt_id: AttemptId,
    pub title: String,
    pub elapsed: u32,
    pub remaining: Option<u32>,
    pub expired: bool,
    pub current_question: QuestionId,
    pub marks: Vec<QuestionMark>,
    pub progress: ProgressSummary,
    pub warnings: Vec<IntegrityWarning>,
    pub tab_switches: u32,
    pub submission: SubmissionState,
    pub autosaving: bool,
    pub outcome: Option<SubmitOutcome>,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One learner's timed attempt, held entirely in memory.
///
/// Owns the clock, answer buffer, flags, integrity monitor, navigation and
/// submission state. Callers drive it through explicit transitions and perform
/// the returned requests themselves.
pub struct AttemptSession {
    attempt_id: AttemptId,
    assessment: Assessment,
    questions: Vec<Question>,
    clock: SessionClock,
    buffer: AnswerBuffer,
    autosave: AutosaveGuard,
    flags: FlagSet,
    integrity: IntegrityMonitor,
    navigation: NavigationTracker,
    submission: SubmissionMachine,
    outcome: Option<SubmitOutcome>,
}

impl AttemptSession {
    /// Rebuild a session from loaded data.
    ///
    /// Saved answers and flags for questions that are no longer part of the
    /// quiz are dropped.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoQuestions` for an empty question list.
    pub fn resume(setup: AttemptSetup) -> Result<Self, SessionError> {
        let AttemptSetup {
            attempt_id,
            assessment,
            questions,
            time_spent_secs,
            mut answers,
            flags,
            tab_switches,
        } = setup;

        if questions.is_empty() {
            return Err(SessionError::NoQuestions);
        }

        answers.retain(|id, _| questions.iter().any(|q| q.id() == *id));
        let flags: FlagSet = flags
            .into_iter()
            .filter(|id| questions.iter().any(|q| q.id() == *id))
            .collect();

        Ok(Self {
            attempt_id,
            clock: SessionClock::resume(assessment.time_limit_secs(), time_spent_secs),
            integrity: IntegrityMonitor::new(
                assessment.proctored(),
                IntegrityLog::resume(tab_switches),
            ),
            navigation: NavigationTracker::new(questions.len()),
            buffer: AnswerBuffer::restore(answers),
            autosave: AutosaveGuard::new(DEFAULT_AUTOSAVE_PERIOD),
            flags,
            submission: SubmissionMachine::new(),
            outcome: None,
            assessment,
            questions,
        })
    }

    #[must_use]
    pub fn with_autosave_period(mut self, period: u32) -> Self {
        self.autosave = AutosaveGuard::new(period);
        self
    }

    /// Call once before the first tick. Returns the forced submission when the
    /// attempt was resumed with no time left.
    pub fn start(&mut self) -> Option<SubmitRequest> {
        if self.clock.expire_if_due() {
            return self.force_submit();
        }
        None
    }

    //
    // ─── ACCESSORS ─────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn attempt_id(&self) -> AttemptId {
        self.attempt_id
    }

    #[must_use]
    pub fn assessment(&self) -> &Assessment {
        &self.assessment
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerBuffer {
        &self.buffer
    }

    #[must_use]
    pub fn flags(&self) -> &FlagSet {
        &self.flags
    }

    #[must_use]
    pub fn tab_switches(&self) -> u32 {
        self.integrity.log().count()
    }

    #[must_use]
    pub fn submission_state(&self) -> SubmissionState {
        self.submission.state()
    }

    #[must_use]
    pub fn submission_attempts(&self) -> u32 {
        self.submission.attempts()
    }

    #[must_use]
    pub fn outcome(&self) -> Option<SubmitOutcome> {
        self.outcome
    }

    /// True once the backend accepted the submission.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.submission.is_submitted()
    }

    #[must_use]
    pub fn current_question(&self) -> &Question {
        &self.questions[self.navigation.current()]
    }

    //
    // ─── LEARNER INPUT ─────────────────────────────────────────────────────────
    //

    /// Merge a partial answer into the buffer.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownQuestion` for ids outside the attempt,
    /// `SessionError::SubmissionPending` while submitting and
    /// `SessionError::Closed` after expiry or submission.
    pub fn record_answer(
        &mut self,
        question_id: QuestionId,
        patch: Answer,
    ) -> Result<&Answer, SessionError> {
        self.ensure_question(question_id)?;
        match self.submission.state() {
            SubmissionState::Submitting => return Err(SessionError::SubmissionPending),
            SubmissionState::Submitted => return Err(SessionError::Closed),
            SubmissionState::InProgress | SubmissionState::Failed => {}
        }
        self.buffer
            .record(question_id, patch)
            .map_err(|_| SessionError::Closed)
    }

    /// # Errors
    ///
    /// Returns `SessionError::UnknownQuestion` or `SessionError::Closed` after submission.
    pub fn toggle_flag(&mut self, question_id: QuestionId) -> Result<bool, SessionError> {
        self.ensure_question(question_id)?;
        if self.submission.is_submitted() {
            return Err(SessionError::Closed);
        }
        Ok(self.flags.toggle(question_id))
    }

    pub fn next(&mut self) -> usize {
        self.navigation.next()
    }

    pub fn previous(&mut self) -> usize {
        self.navigation.previous()
    }

    /// # Errors
    ///
    /// Returns `SessionError::Navigation` for an out-of-range index.
    pub fn select(&mut self, index: usize) -> Result<usize, SessionError> {
        Ok(self.navigation.select(index)?)
    }

    /// Feed a host visibility change. Ignored once the attempt is finished.
    pub fn visibility_changed(&mut self, visibility: Visibility) -> Option<IntegrityWarning> {
        if self.is_finished() {
            return None;
        }
        self.integrity.observe(visibility)
    }

    pub fn dismiss_warning(&mut self, id: WarningId) -> bool {
        self.integrity.dismiss(id)
    }

    //
    // ─── CLOCK ─────────────────────────────────────────────────────────────────
    //

    /// Advance the clock by one unit.
    ///
    /// On expiry the buffer closes and the forced submission is returned
    /// (unless one is already in flight). Otherwise an autosave is returned on
    /// each autosave period with a non-empty buffer.
    pub fn tick(&mut self) -> TickEffects {
        let outcome = self.clock.tick();
        match outcome {
            TickOutcome::Expired { .. } => TickEffects {
                outcome,
                autosave: None,
                submit: self.force_submit(),
            },
            TickOutcome::Advanced { elapsed, .. } => {
                let autosave = if self.submission.state() == SubmissionState::InProgress
                    && self.autosave.is_due(elapsed, self.buffer.len())
                {
                    self.begin_autosave()
                } else {
                    None
                };
                TickEffects {
                    outcome,
                    autosave,
                    submit: None,
                }
            }
            TickOutcome::Idle => TickEffects {
                outcome,
                autosave: None,
                submit: None,
            },
        }
    }

    fn force_submit(&mut self) -> Option<SubmitRequest> {
        self.buffer.close();
        self.begin_submit(SubmissionTrigger::TimeExpired).ok()
    }

    //
    // ─── AUTOSAVE ──────────────────────────────────────────────────────────────
    //

    /// Start a save of the whole buffer. `None` if one is pending or nothing to save.
    pub fn begin_autosave(&mut self) -> Option<AutosaveRequest> {
        if self.buffer.is_empty() || self.submission.is_submitted() {
            return None;
        }
        let ticket = self.autosave.try_begin(self.buffer.revision())?;
        Some(AutosaveRequest {
            ticket,
            answers: self.buffer.snapshot(),
            time_spent: self.clock.elapsed(),
        })
    }

    pub fn finish_autosave(&mut self, ticket: AutosaveTicket, ok: bool) {
        self.autosave.finish(ticket, ok);
    }

    #[must_use]
    pub fn is_autosaving(&self) -> bool {
        self.autosave.in_flight()
    }

    #[must_use]
    pub fn autosave_failures(&self) -> u32 {
        self.autosave.failures()
    }

    /// True when the server has every local change.
    #[must_use]
    pub fn is_saved(&self) -> bool {
        self.autosave.saved_revision() == Some(self.buffer.revision())
    }

    //
    // ─── SUBMISSION ────────────────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// Returns `SessionError::Submission` if a submission is pending or accepted.
    pub fn begin_submit(
        &mut self,
        trigger: SubmissionTrigger,
    ) -> Result<SubmitRequest, SessionError> {
        let ticket = self.submission.begin(trigger)?;
        Ok(SubmitRequest {
            ticket,
            answers: self.buffer.snapshot(),
            time_spent: self.clock.elapsed(),
            tab_switches: self.integrity.log().count(),
        })
    }

    /// Resolve the pending submission. Returns the state it reached:
    /// `Submitted`, or `Failed` (after which the session is back in progress).
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Submission` for a stale ticket.
    pub fn finish_submit(
        &mut self,
        ticket: SubmissionTicket,
        result: Result<SubmitOutcome, String>,
    ) -> Result<SubmissionState, SessionError> {
        match result {
            Ok(outcome) => {
                self.submission.succeed(ticket)?;
                self.outcome = Some(outcome);
                if self.clock.is_running() {
                    self.clock.stop();
                }
                self.buffer.close();
                self.integrity.clear_warnings();
                Ok(SubmissionState::Submitted)
            }
            Err(message) => {
                self.submission.fail(ticket, message)?;
                self.submission.reopen();
                Ok(SubmissionState::Failed)
            }
        }
    }

    #[must_use]
    pub fn last_submission_error(&self) -> Option<&str> {
        self.submission.last_error()
    }

    //
    // ─── VIEW ──────────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn view(&self) -> AttemptView {
        let marks = self
            .navigation
            .marks(&self.questions, &self.buffer, &self.flags);
        let progress = NavigationTracker::progress(&marks, self.navigation.current());
        AttemptView {
            attempt_id: self.attempt_id,
            title: self.assessment.title().to_owned(),
            elapsed: self.clock.elapsed(),
            remaining: self.clock.remaining(),
            expired: self.clock.is_expired(),
            current_question: self.current_question().id(),
            marks,
            progress,
            warnings: self.integrity.active_warnings().to_vec(),
            tab_switches: self.tab_switches(),
            submission: self.submission.state(),
            autosaving: self.autosave.in_flight(),
            outcome: self.outcome,
        }
    }

    fn ensure_question(&self, question_id: QuestionId) -> Result<(), SessionError> {
        if self.questions.iter().any(|q| q.id() == question_id) {
            Ok(())
        } else {
            Err(SessionError::UnknownQuestion(question_id))
        }
    }
}

impl fmt::Debug for AttemptSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttemptSession")
            .field("attempt_id", &self.attempt_id)
            .field("questions_len", &self.questions.len())
            .field("elapsed", &self.clock.elapsed())
            .field("answers_len", &self.buffer.len())
            .field("submission", &self.submission.state())
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
