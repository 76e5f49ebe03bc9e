use async_trait::async_trait;
use sqlx::Row;

use crate::repository::{StorageError, ViewCounterRepository};
use gate_core::model::TabId;

use super::SqliteRepository;
use super::mapping::{tab_id_to_i64, u32_from_i64};

#[async_trait]
impl ViewCounterRepository for SqliteRepository {
    async fn record_view(&self, tab: TabId) -> Result<u32, StorageError> {
        let tab_id = tab_id_to_i64(tab)?;
        sqlx::query(
            r"
            INSERT INTO view_counters (tab_id, views)
            VALUES (?1, 1)
            ON CONFLICT(tab_id) DO UPDATE SET
                views = views + 1
            ",
        )
        .bind(tab_id)
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        self.view_count(tab).await
    }

    async fn view_count(&self, tab: TabId) -> Result<u32, StorageError> {
        let tab_id = tab_id_to_i64(tab)?;
        let row = sqlx::query(
            r"
            SELECT views
            FROM view_counters
            WHERE tab_id = ?1
            ",
        )
        .bind(tab_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        let Some(row) = row else {
            return Ok(0);
        };
        let views: i64 = row
            .try_get("views")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        u32_from_i64("views", views)
    }

    async fn reset_views(&self, tab: TabId) -> Result<(), StorageError> {
        let tab_id = tab_id_to_i64(tab)?;
        sqlx::query(
            r"
            DELETE FROM view_counters
            WHERE tab_id = ?1
            ",
        )
        .bind(tab_id)
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }
}
