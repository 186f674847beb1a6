#![forbid(unsafe_code)]

pub mod api;
pub mod app_services;
pub mod attempt;
pub mod challenge;
pub mod companion_service;
pub mod config;
pub mod error;

pub use educare_core::Clock;

pub use api::{AssessmentApi, ChallengeApi, CompanionApi, HttpApi};
pub use app_services::AppServices;
pub use attempt::{
    AttemptCommand, AttemptCommands, AttemptEvent, AttemptHandle, AttemptLoader, AttemptReport,
    AttemptRuntime, LoadedAttempt, RuntimeConfig,
};
pub use challenge::{
    ChallengeCommand, ChallengeCommands, ChallengeEvent, ChallengeHandle, ChallengeReport,
    ChallengeService,
};
pub use companion_service::CodeCompanionService;
pub use config::ServiceConfig;
pub use error::{
    ApiError, AppServicesError, AttemptLoadError, ChallengeServiceError, CompanionError,
    ConfigError, RuntimeError,
};
