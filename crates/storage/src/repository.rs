use async_trait::async_trait;
use chrono::{DateTime, Utc};
use educare_core::model::{Answer, AttemptId, QuestionId, QuizId};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Local snapshot of an in-progress attempt, used to resume after a reload
/// when the server copy is older.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptDraft {
    pub attempt_id: AttemptId,
    pub quiz_id: QuizId,
    pub answers: BTreeMap<QuestionId, Answer>,
    pub flags: Vec<QuestionId>,
    pub time_spent: u32,
    pub tab_switches: u32,
    pub saved_at: DateTime<Utc>,
}

impl AttemptDraft {
    #[must_use]
    pub fn new(attempt_id: AttemptId, quiz_id: QuizId, saved_at: DateTime<Utc>) -> Self {
        Self {
            attempt_id,
            quiz_id,
            answers: BTreeMap::new(),
            flags: Vec::new(),
            time_spent: 0,
            tab_switches: 0,
            saved_at,
        }
    }

    /// True when this draft has seen at least as much time as the server copy.
    #[must_use]
    pub fn is_at_least(&self, server_time_spent: u32) -> bool {
        self.time_spent >= server_time_spent
    }
}

/// Repository contract for local attempt drafts.
#[async_trait]
pub trait DraftRepository: Send + Sync {
    /// Insert or replace the draft for its attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the draft cannot be stored.
    async fn save_draft(&self, draft: &AttemptDraft) -> Result<(), StorageError>;

    /// Fetch the draft for an attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn load_draft(&self, attempt_id: AttemptId) -> Result<AttemptDraft, StorageError>;

    /// Remove a draft. Removing a missing draft is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    async fn delete_draft(&self, attempt_id: AttemptId) -> Result<(), StorageError>;

    /// All drafts, most recently saved first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if drafts cannot be read.
    async fn list_drafts(&self) -> Result<Vec<AttemptDraft>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    drafts: Arc<Mutex<HashMap<AttemptId, AttemptDraft>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DraftRepository for InMemoryRepository {
    async fn save_draft(&self, draft: &AttemptDraft) -> Result<(), StorageError> {
        let mut guard = self
            .drafts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(draft.attempt_id, draft.clone());
        Ok(())
    }

    async fn load_draft(&self, attempt_id: AttemptId) -> Result<AttemptDraft, StorageError> {
        let guard = self
            .drafts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.get(&attempt_id).cloned().ok_or(StorageError::NotFound)
    }

    async fn delete_draft(&self, attempt_id: AttemptId) -> Result<(), StorageError> {
        let mut guard = self
            .drafts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(&attempt_id);
        Ok(())
    }

    async fn list_drafts(&self) -> Result<Vec<AttemptDraft>, StorageError> {
        let guard = self
            .drafts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut drafts: Vec<_> = guard.values().cloned().collect();
        drafts.sort_by(|a, b| {
            b.saved_at
                .cmp(&a.saved_at)
                .then_with(|| b.attempt_id.cmp(&a.attempt_id))
        });
        Ok(drafts)
    }
}

/// Draft persistence behind a trait object for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub drafts: Arc<dyn DraftRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let drafts: Arc<dyn DraftRepository> = Arc::new(InMemoryRepository::new());
        Self { drafts }
    }
}
