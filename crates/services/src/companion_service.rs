use std::sync::Arc;

use tracing::debug;

use crate::api::CompanionApi;
use crate::error::CompanionError;

/// AI code companion: short tips about the code being edited.
#[derive(Clone)]
pub struct CodeCompanionService {
    api: Option<Arc<dyn CompanionApi>>,
}

impl CodeCompanionService {
    #[must_use]
    pub fn new(api: Option<Arc<dyn CompanionApi>>) -> Self {
        Self { api }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self { api: None }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.api.is_some()
    }

    /// Ask for a tip on `code`.
    ///
    /// # Errors
    ///
    /// Returns `CompanionError::Disabled` without an API, `CompanionError::EmptyResponse`
    /// for a blank tip, and `CompanionError::Api` on request failure.
    pub async fn tip(
        &self,
        code: &str,
        language: &str,
        context: Option<&str>,
    ) -> Result<String, CompanionError> {
        let api = self.api.as_ref().ok_or(CompanionError::Disabled)?;
        debug!(language, bytes = code.len(), "requesting code tip");
        let tip = api
            .tip(code, language, context)
            .await?
            .map(|tip| tip.trim().to_owned())
            .filter(|tip| !tip.is_empty())
            .ok_or(CompanionError::EmptyResponse)?;
        Ok(tip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::error::ApiError;

    struct FixedTip(Option<&'static str>);

    #[async_trait]
    impl CompanionApi for FixedTip {
        async fn tip(
            &self,
            _code: &str,
            _language: &str,
            _context: Option<&str>,
        ) -> Result<Option<String>, ApiError> {
            Ok(self.0.map(str::to_owned))
        }
    }

    #[tokio::test]
    async fn trims_tip_and_rejects_blank() {
        let api = Arc::new(FixedTip(Some("  Use iterators.\n")));
        let service = CodeCompanionService::new(Some(api));
        assert_eq!(
            service.tip("for i in 0..v.len() {}", "rust", None).await.unwrap(),
            "Use iterators."
        );

        let blank = CodeCompanionService::new(Some(Arc::new(FixedTip(Some("   ")))));
        assert!(matches!(
            blank.tip("x", "rust", None).await,
            Err(CompanionError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn disabled_without_api() {
        let service = CodeCompanionService::disabled();
        assert!(!service.enabled());
        assert!(matches!(
            service.tip("x", "rust", None).await,
            Err(CompanionError::Disabled)
        ));
    }
}
