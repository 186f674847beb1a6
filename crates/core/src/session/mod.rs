//! In-memory state machines for a single learner session.

mod attempt;
mod autosave;
mod buffer;
mod challenge;
mod clock;
mod flags;
mod integrity;
mod navigation;
mod submission;

pub use attempt::{
    AttemptSession, AttemptSetup, AttemptView, AutosaveRequest, SessionError, SubmitOutcome,
    SubmitRequest, TickEffects,
};
pub use autosave::{AutosaveGuard, AutosaveTicket, DEFAULT_AUTOSAVE_PERIOD};
pub use buffer::{AnswerBuffer, BufferClosed};
pub use challenge::{
    ChallengeError, ChallengeOutcome, ChallengeSession, ChallengeSubmitRequest, HintLedger,
    HintRequest, RunRequest,
};
pub use clock::{ClockState, SessionClock, TickOutcome};
pub use flags::FlagSet;
pub use integrity::{IntegrityLog, IntegrityMonitor, IntegrityWarning, Visibility, WarningId};
pub use navigation::{
    NavigationError, NavigationTracker, ProgressSummary, QuestionMark, QuestionState,
};
pub use submission::{
    SubmissionError, SubmissionMachine, SubmissionState, SubmissionTicket, SubmissionTrigger,
};
