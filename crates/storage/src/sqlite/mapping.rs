use std::collections::BTreeMap;

use educare_core::model::{Answer, AttemptId, QuestionId, QuizId};
use sqlx::Row;

use crate::repository::{AttemptDraft, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn encode_answers(
    answers: &BTreeMap<QuestionId, Answer>,
) -> Result<String, StorageError> {
    serde_json::to_string(answers).map_err(ser)
}

pub(crate) fn encode_flags(flags: &[QuestionId]) -> Result<String, StorageError> {
    serde_json::to_string(flags).map_err(ser)
}

pub(crate) fn map_draft_row(row: &sqlx::sqlite::SqliteRow) -> Result<AttemptDraft, StorageError> {
    let attempt_id = AttemptId::new(i64_to_u64(
        "attempt_id",
        row.try_get::<i64, _>("attempt_id").map_err(ser)?,
    )?);
    let quiz_id = QuizId::new(i64_to_u64(
        "quiz_id",
        row.try_get::<i64, _>("quiz_id").map_err(ser)?,
    )?);
    let answers: BTreeMap<QuestionId, Answer> =
        serde_json::from_str(&row.try_get::<String, _>("answers").map_err(ser)?).map_err(ser)?;
    let flags: Vec<QuestionId> =
        serde_json::from_str(&row.try_get::<String, _>("flags").map_err(ser)?).map_err(ser)?;
    let time_spent = u32_from_i64(
        "time_spent",
        row.try_get::<i64, _>("time_spent").map_err(ser)?,
    )?;
    let tab_switches = u32_from_i64(
        "tab_switches",
        row.try_get::<i64, _>("tab_switches").map_err(ser)?,
    )?;
    let saved_at = row.try_get("saved_at").map_err(ser)?;

    Ok(AttemptDraft {
        attempt_id,
        quiz_id,
        answers,
        flags,
        time_spent,
        tab_switches,
        saved_at,
    })
}
