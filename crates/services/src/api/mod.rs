//! Backend contracts and the reqwest-based client.

use std::collections::BTreeMap;

use async_trait::async_trait;

use educare_core::model::{
    Answer, Assessment, AttemptId, ChallengeId, CodingChallenge, ExecutionReport, Hint, Question,
    QuestionId, QuizId,
};
use educare_core::session::{ChallengeOutcome, SubmitOutcome};
use uuid::Uuid;

use crate::error::ApiError;

mod http;
pub mod types;

pub use http::HttpApi;
pub use types::AttemptSnapshot;

/// Advanced quiz endpoints.
#[async_trait]
pub trait AssessmentApi: Send + Sync {
    async fn fetch_assessment(&self, quiz_id: QuizId) -> Result<Assessment, ApiError>;

    async fn fetch_questions(&self, quiz_id: QuizId) -> Result<Vec<Question>, ApiError>;

    /// The learner's current attempt, created by the server on first access.
    async fn fetch_attempt(&self, quiz_id: QuizId) -> Result<AttemptSnapshot, ApiError>;

    async fn save_progress(
        &self,
        attempt_id: AttemptId,
        answers: &BTreeMap<QuestionId, Answer>,
        time_spent: u32,
    ) -> Result<(), ApiError>;

    async fn submit_attempt(
        &self,
        attempt_id: AttemptId,
        answers: &BTreeMap<QuestionId, Answer>,
        time_spent: u32,
        tab_switches: u32,
    ) -> Result<SubmitOutcome, ApiError>;
}

/// What a learner submits for grading.
#[derive(Debug, Clone, Copy)]
pub struct ChallengeSubmission<'a> {
    pub code: &'a str,
    pub language: &'a str,
    pub session_id: Uuid,
    pub time_spent: u32,
    pub hints_used: u32,
}

/// Coding challenge endpoints.
#[async_trait]
pub trait ChallengeApi: Send + Sync {
    async fn fetch_challenge(&self, id: ChallengeId) -> Result<CodingChallenge, ApiError>;

    async fn execute(
        &self,
        id: ChallengeId,
        code: &str,
        language: &str,
        session_id: Uuid,
    ) -> Result<ExecutionReport, ApiError>;

    async fn request_hint(
        &self,
        id: ChallengeId,
        session_id: Uuid,
        hints_used: u32,
    ) -> Result<Hint, ApiError>;

    async fn submit_challenge(
        &self,
        id: ChallengeId,
        submission: ChallengeSubmission<'_>,
    ) -> Result<ChallengeOutcome, ApiError>;
}

/// AI code companion endpoint. `Ok(None)` means the backend had no tip.
#[async_trait]
pub trait CompanionApi: Send + Sync {
    async fn tip(
        &self,
        code: &str,
        language: &str,
        context: Option<&str>,
    ) -> Result<Option<String>, ApiError>;
}
