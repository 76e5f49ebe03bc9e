use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gate_core::model::{GateSettings, SessionId, SessionStats, SessionSummary, TabId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted shape for a finished session.
///
/// Mirrors the domain `SessionSummary` so repositories can flatten and
/// rebuild it without leaking storage concerns into the domain layer.
#[derive(Debug, Clone)]
pub struct SummaryRecord {
    pub id: Option<i64>,
    pub session_id: SessionId,
    pub subject: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub quiz_count: u32,
    pub correct_answers: u32,
    pub total_answers: u32,
    pub videos_watched: u32,
}

impl SummaryRecord {
    #[must_use]
    pub fn from_summary(summary: &SessionSummary) -> Self {
        let stats = summary.stats();
        Self {
            id: None,
            session_id: summary.session_id(),
            subject: summary.subject().to_owned(),
            started_at: summary.started_at(),
            ended_at: summary.ended_at(),
            quiz_count: stats.quiz_count(),
            correct_answers: stats.correct_answers(),
            total_answers: stats.total_answers(),
            videos_watched: stats.videos_watched(),
        }
    }

    /// Convert the record back into a domain `SessionSummary`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored counters or
    /// time range fail domain validation.
    pub fn into_summary(self) -> Result<SessionSummary, StorageError> {
        let stats = SessionStats::from_persisted(
            self.quiz_count,
            self.correct_answers,
            self.total_answers,
            self.videos_watched,
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
        SessionSummary::from_persisted(
            self.session_id,
            self.subject,
            self.started_at,
            self.ended_at,
            stats,
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

/// Repository contract for the gate settings singleton.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Fetch the saved settings, or `None` when nothing was saved yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the settings cannot be read.
    async fn get_settings(&self) -> Result<Option<GateSettings>, StorageError>;

    /// Persist or update the settings.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the settings cannot be stored.
    async fn save_settings(&self, settings: &GateSettings) -> Result<(), StorageError>;
}

/// Repository contract for per-tab shorts-watched counters.
#[async_trait]
pub trait ViewCounterRepository: Send + Sync {
    /// Add one watched short for `tab` and return the new count.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the counter cannot be updated.
    async fn record_view(&self, tab: TabId) -> Result<u32, StorageError>;

    /// Current count for `tab`, zero when absent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the counter cannot be read.
    async fn view_count(&self, tab: TabId) -> Result<u32, StorageError>;

    /// Drop the counter for `tab` back to zero.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the counter cannot be cleared.
    async fn reset_views(&self, tab: TabId) -> Result<(), StorageError>;
}

/// Repository contract for finished-session summaries.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Append a summary and return its storage id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the summary cannot be stored.
    async fn append_summary(&self, summary: &SessionSummary) -> Result<i64, StorageError>;

    /// Fetch one summary by storage id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage
    /// errors.
    async fn get_summary(&self, id: i64) -> Result<SessionSummary, StorageError>;

    /// Most recently ended summaries, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the summaries cannot be read.
    async fn recent_summaries(&self, limit: u32) -> Result<Vec<SessionSummary>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    settings: Arc<Mutex<Option<GateSettings>>>,
    views: Arc<Mutex<HashMap<TabId, u32>>>,
    summaries: Arc<Mutex<Vec<SessionSummary>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            settings: Arc::new(Mutex::new(None)),
            views: Arc::new(Mutex::new(HashMap::new())),
            summaries: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl SettingsRepository for InMemoryRepository {
    async fn get_settings(&self) -> Result<Option<GateSettings>, StorageError> {
        let guard = self
            .settings
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(*guard)
    }

    async fn save_settings(&self, settings: &GateSettings) -> Result<(), StorageError> {
        let mut guard = self
            .settings
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = Some(*settings);
        Ok(())
    }
}

#[async_trait]
impl ViewCounterRepository for InMemoryRepository {
    async fn record_view(&self, tab: TabId) -> Result<u32, StorageError> {
        let mut guard = self
            .views
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let count = guard.entry(tab).or_insert(0);
        *count = count.saturating_add(1);
        Ok(*count)
    }

    async fn view_count(&self, tab: TabId) -> Result<u32, StorageError> {
        let guard = self
            .views
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&tab).copied().unwrap_or(0))
    }

    async fn reset_views(&self, tab: TabId) -> Result<(), StorageError> {
        let mut guard = self
            .views
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(&tab);
        Ok(())
    }
}

#[async_trait]
impl SessionStore for InMemoryRepository {
    async fn append_summary(&self, summary: &SessionSummary) -> Result<i64, StorageError> {
        let mut guard = self
            .summaries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.push(summary.clone());
        i64::try_from(guard.len())
            .map_err(|_| StorageError::Serialization("summary id overflow".into()))
    }

    async fn get_summary(&self, id: i64) -> Result<SessionSummary, StorageError> {
        let guard = self
            .summaries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let index = usize::try_from(id.checked_sub(1).ok_or(StorageError::NotFound)?)
            .map_err(|_| StorageError::NotFound)?;
        guard.get(index).cloned().ok_or(StorageError::NotFound)
    }

    async fn recent_summaries(&self, limit: u32) -> Result<Vec<SessionSummary>, StorageError> {
        let guard = self
            .summaries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

/// Aggregates the three repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub settings: Arc<dyn SettingsRepository>,
    pub views: Arc<dyn ViewCounterRepository>,
    pub sessions: Arc<dyn SessionStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let settings: Arc<dyn SettingsRepository> = Arc::new(repo.clone());
        let views: Arc<dyn ViewCounterRepository> = Arc::new(repo.clone());
        let sessions: Arc<dyn SessionStore> = Arc::new(repo);
        Self {
            settings,
            views,
            sessions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use gate_core::model::StudySession;
    use gate_core::time::fixed_now;

    fn build_summary(subject: &str, offset_hours: i64) -> SessionSummary {
        let start = fixed_now() + Duration::hours(offset_hours);
        let mut session = StudySession::start(subject, start).unwrap();
        session.record_quiz_shown(start);
        session.record_answer(true, start);
        session.into_summary(start + Duration::minutes(30)).unwrap()
    }

    #[tokio::test]
    async fn settings_round_trip() {
        let repo = InMemoryRepository::new();
        assert!(repo.get_settings().await.unwrap().is_none());

        let settings = GateSettings::from_persisted(true, 3).unwrap();
        repo.save_settings(&settings).await.unwrap();
        assert_eq!(repo.get_settings().await.unwrap(), Some(settings));

        let off = settings.with_enabled(false);
        repo.save_settings(&off).await.unwrap();
        assert_eq!(repo.get_settings().await.unwrap(), Some(off));
    }

    #[tokio::test]
    async fn view_counters_are_per_tab() {
        let repo = InMemoryRepository::new();
        let tab_a = TabId::new(1);
        let tab_b = TabId::new(2);

        assert_eq!(repo.record_view(tab_a).await.unwrap(), 1);
        assert_eq!(repo.record_view(tab_a).await.unwrap(), 2);
        assert_eq!(repo.record_view(tab_b).await.unwrap(), 1);

        repo.reset_views(tab_a).await.unwrap();
        assert_eq!(repo.view_count(tab_a).await.unwrap(), 0);
        assert_eq!(repo.view_count(tab_b).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn summaries_come_back_newest_first() {
        let repo = InMemoryRepository::new();
        let first = repo.append_summary(&build_summary("Biology", 0)).await.unwrap();
        let second = repo
            .append_summary(&build_summary("History", 1))
            .await
            .unwrap();
        assert_ne!(first, second);

        let fetched = repo.get_summary(first).await.unwrap();
        assert_eq!(fetched.subject(), "Biology");

        let recent = repo.recent_summaries(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].subject(), "History");

        assert!(matches!(
            repo.get_summary(99).await,
            Err(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn summary_record_round_trips() {
        let summary = build_summary("Chemistry", 0);
        let rebuilt = SummaryRecord::from_summary(&summary).into_summary().unwrap();
        assert_eq!(rebuilt, summary);
    }
}
