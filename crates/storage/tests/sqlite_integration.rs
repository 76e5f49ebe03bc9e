use chrono::Duration;
use gate_core::model::{GateSettings, StudySession, TabId};
use gate_core::time::fixed_now;
use storage::repository::{SessionStore, SettingsRepository, StorageError, ViewCounterRepository};
use storage::sqlite::SqliteRepository;

async fn open(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn sqlite_settings_round_trip() {
    let repo = open("memdb_settings").await;

    assert!(repo.get_settings().await.unwrap().is_none());

    let settings = GateSettings::from_persisted(true, 7).unwrap();
    repo.save_settings(&settings).await.unwrap();
    assert_eq!(repo.get_settings().await.unwrap(), Some(settings));

    let off = settings.with_enabled(false);
    repo.save_settings(&off).await.unwrap();
    assert_eq!(repo.get_settings().await.unwrap(), Some(off));
}

#[tokio::test]
async fn sqlite_view_counters_increment_and_reset() {
    let repo = open("memdb_views").await;
    let tab_a = TabId::new(1);
    let tab_b = TabId::new(2);

    assert_eq!(repo.view_count(tab_a).await.unwrap(), 0);
    assert_eq!(repo.record_view(tab_a).await.unwrap(), 1);
    assert_eq!(repo.record_view(tab_a).await.unwrap(), 2);
    assert_eq!(repo.record_view(tab_b).await.unwrap(), 1);

    repo.reset_views(tab_a).await.unwrap();
    assert_eq!(repo.view_count(tab_a).await.unwrap(), 0);
    assert_eq!(repo.view_count(tab_b).await.unwrap(), 1);
}

#[tokio::test]
async fn sqlite_round_trips_session_summaries() {
    let repo = open("memdb_summaries").await;

    let start = fixed_now();
    let mut session = StudySession::start("Biology", start).unwrap();
    session.record_quiz_shown(start);
    session.record_answer(true, start);
    session.record_answer(false, start + Duration::minutes(5));
    session.record_video(start + Duration::minutes(6));
    let summary = session.into_summary(start + Duration::minutes(30)).unwrap();

    let id = repo.append_summary(&summary).await.expect("append");
    let fetched = repo.get_summary(id).await.expect("fetch");
    assert_eq!(fetched, summary);
    assert_eq!(fetched.stats().total_answers(), 2);
    assert_eq!(fetched.stats().videos_watched(), 1);
}

#[tokio::test]
async fn sqlite_lists_summaries_newest_first() {
    let repo = open("memdb_recent").await;

    for (subject, offset) in [("Biology", 0), ("History", 1), ("Chemistry", 2)] {
        let start = fixed_now() + Duration::hours(offset);
        let session = StudySession::start(subject, start).unwrap();
        let summary = session.into_summary(start + Duration::minutes(20)).unwrap();
        repo.append_summary(&summary).await.expect("append");
    }

    let recent = repo.recent_summaries(2).await.expect("recent");
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].subject(), "Chemistry");
    assert_eq!(recent[1].subject(), "History");
}

#[tokio::test]
async fn sqlite_rejects_duplicate_session_ids() {
    let repo = open("memdb_conflict").await;

    let session = StudySession::start("Biology", fixed_now()).unwrap();
    let summary = session
        .into_summary(fixed_now() + Duration::minutes(10))
        .unwrap();

    repo.append_summary(&summary).await.expect("first append");
    let err = repo.append_summary(&summary).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));
}

#[tokio::test]
async fn sqlite_missing_summary_is_not_found() {
    let repo = open("memdb_missing").await;
    assert!(matches!(
        repo.get_summary(424_242).await,
        Err(StorageError::NotFound)
    ));
}
