use async_trait::async_trait;
use sqlx::Row;

use crate::repository::{SettingsRepository, StorageError};
use gate_core::model::GateSettings;

use super::SqliteRepository;
use super::mapping::u32_from_i64;

#[async_trait]
impl SettingsRepository for SqliteRepository {
    async fn get_settings(&self) -> Result<Option<GateSettings>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT
                enabled,
                quiz_frequency
            FROM gate_settings
            WHERE id = 1
            ",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let enabled: i64 = row
            .try_get("enabled")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        let quiz_frequency: i64 = row
            .try_get("quiz_frequency")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;

        GateSettings::from_persisted(enabled != 0, u32_from_i64("quiz_frequency", quiz_frequency)?)
            .map(Some)
            .map_err(|err| StorageError::Serialization(err.to_string()))
    }

    async fn save_settings(&self, settings: &GateSettings) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO gate_settings (
                id,
                enabled,
                quiz_frequency
            )
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                enabled = excluded.enabled,
                quiz_frequency = excluded.quiz_frequency
            ",
        )
        .bind(1_i64)
        .bind(i64::from(settings.enabled()))
        .bind(i64::from(settings.quiz_frequency()))
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }
}
