mod runtime;
mod service;

pub use runtime::{
    ChallengeCommand, ChallengeCommands, ChallengeEvent, ChallengeHandle, ChallengeReport,
};
pub use service::ChallengeService;
