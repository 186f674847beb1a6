use async_trait::async_trait;
use educare_core::model::AttemptId;

use super::SqliteRepository;
use super::mapping::{encode_answers, encode_flags, id_i64, map_draft_row};
use crate::repository::{AttemptDraft, DraftRepository, StorageError};

#[async_trait]
impl DraftRepository for SqliteRepository {
    async fn save_draft(&self, draft: &AttemptDraft) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO attempt_drafts (
                    attempt_id, quiz_id, answers, flags,
                    time_spent, tab_switches, saved_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(attempt_id) DO UPDATE SET
                    quiz_id = excluded.quiz_id,
                    answers = excluded.answers,
                    flags = excluded.flags,
                    time_spent = excluded.time_spent,
                    tab_switches = excluded.tab_switches,
                    saved_at = excluded.saved_at
            ",
        )
        .bind(id_i64("attempt_id", draft.attempt_id.value())?)
        .bind(id_i64("quiz_id", draft.quiz_id.value())?)
        .bind(encode_answers(&draft.answers)?)
        .bind(encode_flags(&draft.flags)?)
        .bind(i64::from(draft.time_spent))
        .bind(i64::from(draft.tab_switches))
        .bind(draft.saved_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn load_draft(&self, attempt_id: AttemptId) -> Result<AttemptDraft, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    attempt_id, quiz_id, answers, flags,
                    time_spent, tab_switches, saved_at
                FROM attempt_drafts
                WHERE attempt_id = ?1
            ",
        )
        .bind(id_i64("attempt_id", attempt_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .ok_or(StorageError::NotFound)?;

        map_draft_row(&row)
    }

    async fn delete_draft(&self, attempt_id: AttemptId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM attempt_drafts WHERE attempt_id = ?1")
            .bind(id_i64("attempt_id", attempt_id.value())?)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn list_drafts(&self) -> Result<Vec<AttemptDraft>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    attempt_id, quiz_id, answers, flags,
                    time_spent, tab_switches, saved_at
                FROM attempt_drafts
                ORDER BY saved_at DESC, attempt_id DESC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_draft_row).collect()
    }
}
