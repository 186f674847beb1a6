use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use educare_core::model::ChallengeId;
use educare_core::session::ChallengeSession;

use super::runtime::{ChallengeHandle, spawn_driver};
use crate::api::ChallengeApi;
use crate::error::ChallengeServiceError;

/// Starts coding challenge sessions and drives them on their own task.
#[derive(Clone)]
pub struct ChallengeService {
    api: Arc<dyn ChallengeApi>,
    tick: Duration,
}

impl ChallengeService {
    #[must_use]
    pub fn new(api: Arc<dyn ChallengeApi>) -> Self {
        Self {
            api,
            tick: Duration::from_secs(1),
        }
    }

    /// Wall time per clock unit.
    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Fetch a challenge and start a fresh session on it.
    ///
    /// # Errors
    ///
    /// Returns `ChallengeServiceError::Api` if the challenge cannot be fetched.
    pub async fn start(&self, id: ChallengeId) -> Result<ChallengeSession, ChallengeServiceError> {
        let challenge = self.api.fetch_challenge(id).await?;
        let session = ChallengeSession::start(challenge);
        info!(challenge = %id, session = %session.session_id(), "challenge started");
        Ok(session)
    }

    /// Start driving `session` on a new task. Must be called inside a Tokio runtime.
    #[must_use]
    pub fn spawn(&self, session: ChallengeSession) -> ChallengeHandle {
        spawn_driver(session, Arc::clone(&self.api), self.tick)
    }
}
