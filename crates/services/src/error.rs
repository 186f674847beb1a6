//! Shared error types for the services crate.

use thiserror::Error;

use educare_core::model::{
    AssessmentError, AttemptStatus, ChallengeDefinitionError, QuestionError, QuizId,
};
use educare_core::session::SessionError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by the HTTP API client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("resource not found")]
    NotFound,
    #[error("request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Url(#[from] url::ParseError),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl From<QuestionError> for ApiError {
    fn from(err: QuestionError) -> Self {
        Self::InvalidPayload(err.to_string())
    }
}

impl From<AssessmentError> for ApiError {
    fn from(err: AssessmentError) -> Self {
        Self::InvalidPayload(err.to_string())
    }
}

impl From<ChallengeDefinitionError> for ApiError {
    fn from(err: ChallengeDefinitionError) -> Self {
        Self::InvalidPayload(err.to_string())
    }
}

/// Errors emitted while reading `ServiceConfig` from the environment.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{key} is not a valid URL: {source}")]
    InvalidUrl {
        key: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("{key} must be a positive integer, got `{value}`")]
    InvalidNumber { key: &'static str, value: String },
}

/// Errors emitted by `AttemptLoader`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AttemptLoadError {
    #[error("quiz {0} was not found or has no questions")]
    NotFound(QuizId),
    #[error("attempt is already {0:?}")]
    Closed(AttemptStatus),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Errors emitted by the attempt and challenge runtime handles.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RuntimeError {
    #[error("session runtime has stopped")]
    Closed,
    #[error("session runtime task failed: {0}")]
    Join(String),
}

/// Errors emitted by `ChallengeService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChallengeServiceError {
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors emitted by `CodeCompanionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompanionError {
    #[error("code companion is not configured")]
    Disabled,
    #[error("code companion returned an empty tip")]
    EmptyResponse,
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
