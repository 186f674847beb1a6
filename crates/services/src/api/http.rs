use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use educare_core::model::{
    Answer, Assessment, AttemptId, ChallengeId, CodingChallenge, ExecutionReport, Hint, Question,
    QuestionId, QuizId,
};
use educare_core::session::{ChallengeOutcome, SubmitOutcome};

use super::types::{
    AssessmentDto, AttemptSnapshot, ChallengeDto, ChallengeSubmitBody, ChallengeSubmitResponse,
    ExecuteBody, HintBody, QuestionsEnvelope, SaveProgressBody, SubmitAttemptBody,
    SubmitAttemptResponse, TipBody, TipResponse,
};
use super::{AssessmentApi, ChallengeApi, ChallengeSubmission, CompanionApi};
use crate::config::ServiceConfig;
use crate::error::ApiError;

/// JSON-over-HTTP client for the backend.
#[derive(Clone, Debug)]
pub struct HttpApi {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpApi {
    /// # Errors
    ///
    /// Returns `reqwest::Error` if the HTTP client cannot be built.
    pub fn new(
        mut base_url: Url,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        // Relative joins drop the last path segment unless it ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// # Errors
    ///
    /// Returns `reqwest::Error` if the HTTP client cannot be built.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, reqwest::Error> {
        Self::new(
            config.api_url.clone(),
            config.api_token.clone(),
            config.http_timeout,
        )
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path)?;
        debug!(%url, "GET");
        let response = self.authorized(self.client.get(url)).send().await?;
        Ok(check(response)?.json().await?)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: serde::Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.post(path, body).await?;
        Ok(response.json().await?)
    }

    async fn post<B>(&self, path: &str, body: &B) -> Result<Response, ApiError>
    where
        B: serde::Serialize + Sync + ?Sized,
    {
        let url = self.url(path)?;
        debug!(%url, "POST");
        let response = self
            .authorized(self.client.post(url))
            .json(body)
            .send()
            .await?;
        check(response)
    }
}

fn check(response: Response) -> Result<Response, ApiError> {
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::NOT_FOUND => Err(ApiError::NotFound),
        status => Err(ApiError::HttpStatus(status)),
    }
}

#[async_trait]
impl AssessmentApi for HttpApi {
    async fn fetch_assessment(&self, quiz_id: QuizId) -> Result<Assessment, ApiError> {
        let dto: AssessmentDto = self
            .get_json(&format!("api/advanced-quizzes/{quiz_id}"))
            .await?;
        Ok(dto.into_domain()?)
    }

    async fn fetch_questions(&self, quiz_id: QuizId) -> Result<Vec<Question>, ApiError> {
        let envelope: QuestionsEnvelope = self
            .get_json(&format!("api/advanced-quizzes/{quiz_id}/questions"))
            .await?;
        envelope
            .into_inner()
            .into_iter()
            .map(|dto| dto.into_domain().map_err(ApiError::from))
            .collect()
    }

    async fn fetch_attempt(&self, quiz_id: QuizId) -> Result<AttemptSnapshot, ApiError> {
        self.get_json(&format!("api/advanced-quizzes/{quiz_id}/attempt"))
            .await
    }

    async fn save_progress(
        &self,
        attempt_id: AttemptId,
        answers: &BTreeMap<QuestionId, Answer>,
        time_spent: u32,
    ) -> Result<(), ApiError> {
        let body = SaveProgressBody {
            answers,
            time_spent,
        };
        self.post(&format!("api/advanced-quiz-attempts/{attempt_id}/save"), &body)
            .await?;
        Ok(())
    }

    async fn submit_attempt(
        &self,
        attempt_id: AttemptId,
        answers: &BTreeMap<QuestionId, Answer>,
        time_spent: u32,
        tab_switches: u32,
    ) -> Result<SubmitOutcome, ApiError> {
        let body = SubmitAttemptBody {
            answers,
            time_spent,
            tab_switches,
        };
        let res: SubmitAttemptResponse = self
            .post_json(
                &format!("api/advanced-quiz-attempts/{attempt_id}/submit"),
                &body,
            )
            .await?;
        Ok(res.into())
    }
}

#[async_trait]
impl ChallengeApi for HttpApi {
    async fn fetch_challenge(&self, id: ChallengeId) -> Result<CodingChallenge, ApiError> {
        let dto: ChallengeDto = self.get_json(&format!("api/coding-challenges/{id}")).await?;
        Ok(dto.into_domain()?)
    }

    async fn execute(
        &self,
        id: ChallengeId,
        code: &str,
        language: &str,
        session_id: Uuid,
    ) -> Result<ExecutionReport, ApiError> {
        let body = ExecuteBody {
            code,
            language,
            session_id,
        };
        self.post_json(&format!("api/coding-challenges/{id}/execute"), &body)
            .await
    }

    async fn request_hint(
        &self,
        id: ChallengeId,
        session_id: Uuid,
        hints_used: u32,
    ) -> Result<Hint, ApiError> {
        let body = HintBody {
            session_id,
            hints_used,
        };
        self.post_json(&format!("api/coding-challenges/{id}/hint"), &body)
            .await
    }

    async fn submit_challenge(
        &self,
        id: ChallengeId,
        submission: ChallengeSubmission<'_>,
    ) -> Result<ChallengeOutcome, ApiError> {
        let body = ChallengeSubmitBody {
            code: submission.code,
            language: submission.language,
            session_id: submission.session_id,
            time_spent: submission.time_spent,
            hints_used: submission.hints_used,
        };
        let res: ChallengeSubmitResponse = self
            .post_json(&format!("api/coding-challenges/{id}/submit"), &body)
            .await?;
        Ok(res.into())
    }
}

#[async_trait]
impl CompanionApi for HttpApi {
    async fn tip(
        &self,
        code: &str,
        language: &str,
        context: Option<&str>,
    ) -> Result<Option<String>, ApiError> {
        let body = TipBody {
            code,
            language,
            context,
        };
        let res: TipResponse = self.post_json("api/code-companion/tip", &body).await?;
        Ok(res.tip)
    }
}
