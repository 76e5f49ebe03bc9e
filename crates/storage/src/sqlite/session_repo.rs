use async_trait::async_trait;

use crate::repository::{SessionStore, StorageError, SummaryRecord};
use gate_core::model::SessionSummary;

use super::SqliteRepository;
use super::mapping::map_summary_row;

#[async_trait]
impl SessionStore for SqliteRepository {
    async fn append_summary(&self, summary: &SessionSummary) -> Result<i64, StorageError> {
        let record = SummaryRecord::from_summary(summary);
        let result = sqlx::query(
            r"
            INSERT INTO session_summaries (
                session_id,
                subject,
                started_at,
                ended_at,
                quiz_count,
                correct_answers,
                total_answers,
                videos_watched
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(record.session_id.to_string())
        .bind(&record.subject)
        .bind(record.started_at)
        .bind(record.ended_at)
        .bind(i64::from(record.quiz_count))
        .bind(i64::from(record.correct_answers))
        .bind(i64::from(record.total_answers))
        .bind(i64::from(record.videos_watched))
        .execute(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => StorageError::Conflict,
            other => StorageError::Connection(other.to_string()),
        })?;

        Ok(result.last_insert_rowid())
    }

    async fn get_summary(&self, id: i64) -> Result<SessionSummary, StorageError> {
        let row = sqlx::query(
            r"
            SELECT
                id,
                session_id,
                subject,
                started_at,
                ended_at,
                quiz_count,
                correct_answers,
                total_answers,
                videos_watched
            FROM session_summaries
            WHERE id = ?1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        let Some(row) = row else {
            return Err(StorageError::NotFound);
        };
        map_summary_row(&row)?.into_summary()
    }

    async fn recent_summaries(&self, limit: u32) -> Result<Vec<SessionSummary>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT
                id,
                session_id,
                subject,
                started_at,
                ended_at,
                quiz_count,
                correct_answers,
                total_answers,
                videos_watched
            FROM session_summaries
            ORDER BY ended_at DESC, id DESC
            LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        rows.iter()
            .map(|row| map_summary_row(row).and_then(SummaryRecord::into_summary))
            .collect()
    }
}
