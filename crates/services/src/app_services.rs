use std::sync::Arc;

use storage::repository::{DraftRepository, Storage};

use crate::api::{AssessmentApi, ChallengeApi, CompanionApi, HttpApi};
use crate::attempt::{AttemptLoader, AttemptRuntime, RuntimeConfig};
use crate::challenge::ChallengeService;
use crate::companion_service::CodeCompanionService;
use crate::config::ServiceConfig;
use crate::error::AppServicesError;
use crate::Clock;

/// Assembles app-facing services over one HTTP client and one draft store.
#[derive(Clone)]
pub struct AppServices {
    config: ServiceConfig,
    drafts: Arc<dyn DraftRepository>,
    attempt_loader: Arc<AttemptLoader>,
    attempt_runtime: Arc<AttemptRuntime>,
    challenge_service: Arc<ChallengeService>,
    companion: Arc<CodeCompanionService>,
}

impl AppServices {
    /// Build services backed by `SQLite` drafts and the HTTP backend.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails or the HTTP
    /// client cannot be built.
    pub async fn new(config: ServiceConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(&config.db_url).await?;
        let api = Arc::new(HttpApi::from_config(&config)?);
        Ok(Self::with_parts(config, clock, storage, api))
    }

    /// Wire services over an existing store and backend client.
    #[must_use]
    pub fn with_parts<A>(
        config: ServiceConfig,
        clock: Clock,
        storage: Storage,
        api: Arc<A>,
    ) -> Self
    where
        A: AssessmentApi + ChallengeApi + CompanionApi + 'static,
    {
        let assessments: Arc<dyn AssessmentApi> = api.clone();
        let challenges: Arc<dyn ChallengeApi> = api.clone();
        let companion: Arc<dyn CompanionApi> = api;

        let attempt_loader = Arc::new(
            AttemptLoader::new(Arc::clone(&assessments), Arc::clone(&storage.drafts))
                .with_autosave_period(config.autosave_secs),
        );
        let attempt_runtime = Arc::new(
            AttemptRuntime::new(assessments, Arc::clone(&storage.drafts))
                .with_clock(clock)
                .with_config(RuntimeConfig::from(&config)),
        );
        let challenge_service =
            Arc::new(ChallengeService::new(challenges).with_tick(config.tick));
        let companion = Arc::new(CodeCompanionService::new(Some(companion)));

        Self {
            config,
            drafts: storage.drafts,
            attempt_loader,
            attempt_runtime,
            challenge_service,
            companion,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    #[must_use]
    pub fn drafts(&self) -> Arc<dyn DraftRepository> {
        Arc::clone(&self.drafts)
    }

    #[must_use]
    pub fn attempt_loader(&self) -> Arc<AttemptLoader> {
        Arc::clone(&self.attempt_loader)
    }

    #[must_use]
    pub fn attempt_runtime(&self) -> Arc<AttemptRuntime> {
        Arc::clone(&self.attempt_runtime)
    }

    #[must_use]
    pub fn challenge_service(&self) -> Arc<ChallengeService> {
        Arc::clone(&self.challenge_service)
    }

    #[must_use]
    pub fn companion(&self) -> Arc<CodeCompanionService> {
        Arc::clone(&self.companion)
    }
}
