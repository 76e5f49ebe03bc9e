//! Persistence for the study gate: settings, per-tab view counters,
//! and finished-session summaries, behind swappable repositories.

#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    InMemoryRepository, SessionStore, SettingsRepository, Storage, StorageError, SummaryRecord,
    ViewCounterRepository,
};
pub use sqlite::{SqliteInitError, SqliteRepository};
