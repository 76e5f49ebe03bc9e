use gate_core::model::{SessionId, TabId};
use sqlx::Row;

use crate::repository::{StorageError, SummaryRecord};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn tab_id_to_i64(tab: TabId) -> Result<i64, StorageError> {
    i64::try_from(tab.value())
        .map_err(|_| StorageError::Serialization(format!("tab id overflow: {tab}")))
}

pub(crate) fn session_id_from_text(raw: &str) -> Result<SessionId, StorageError> {
    raw.parse::<SessionId>().map_err(ser)
}

pub(crate) fn map_summary_row(row: &sqlx::sqlite::SqliteRow) -> Result<SummaryRecord, StorageError> {
    let session_id_text: String = row.try_get("session_id").map_err(ser)?;
    Ok(SummaryRecord {
        id: Some(row.try_get("id").map_err(ser)?),
        session_id: session_id_from_text(&session_id_text)?,
        subject: row.try_get("subject").map_err(ser)?,
        started_at: row.try_get("started_at").map_err(ser)?,
        ended_at: row.try_get("ended_at").map_err(ser)?,
        quiz_count: u32_from_i64("quiz_count", row.try_get("quiz_count").map_err(ser)?)?,
        correct_answers: u32_from_i64(
            "correct_answers",
            row.try_get("correct_answers").map_err(ser)?,
        )?,
        total_answers: u32_from_i64("total_answers", row.try_get("total_answers").map_err(ser)?)?,
        videos_watched: u32_from_i64(
            "videos_watched",
            row.try_get("videos_watched").map_err(ser)?,
        )?,
    })
}
