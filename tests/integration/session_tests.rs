//! End-to-end session behavior with scripted sources

use crate::common::{church, registry, AlwaysUp, Behavior, MockSource, Workspace};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use vespers::crawler::Engine;
use vespers::output::ExportedRecord;
use vespers::state::{SessionStatus, SessionTotals, TaskStatus};
use vespers::storage::{ChurchFilter, SqliteStorage, Storage};

fn two_sources() -> Vec<MockSource> {
    vec![
        MockSource::new("oca", vec![church("oca", "Holy Trinity", "Boston", "MA")]),
        MockSource::new("goarch", vec![church("goarch", "Saint Nicholas", "Chicago", "IL")]),
    ]
}

fn totals(found: u64, new: u64, duplicate: u64, updated: u64, errors: u64) -> SessionTotals {
    SessionTotals {
        found,
        new,
        duplicate,
        updated,
        errors,
    }
}

#[tokio::test]
async fn test_two_new_then_two_duplicates() {
    let ws = Workspace::new();
    let mut config = ws.config();
    config.engine.max_concurrent_scrapers = 1;

    let first = Engine::with_registry(config.clone(), "hash".to_string(), registry(two_sources()))
        .run()
        .await
        .unwrap();
    assert_eq!(first.status, SessionStatus::Completed);
    assert_eq!(first.totals, totals(2, 2, 0, 0, 0));
    assert_eq!(ws.storage().count_churches().unwrap(), 2);

    let second = Engine::with_registry(config, "hash".to_string(), registry(two_sources()))
        .run()
        .await
        .unwrap();
    assert_eq!(second.status, SessionStatus::Completed);
    assert_eq!(second.totals, totals(2, 0, 2, 0, 0));
    assert_eq!(ws.storage().count_churches().unwrap(), 2);

    let sessions = ws.storage().list_sessions(10).unwrap();
    assert_eq!(sessions.len(), 2);
    for summary in &sessions {
        assert_eq!(summary.session.status, SessionStatus::Completed);
        assert!(summary.session.totals.is_balanced());
        assert!(summary.session.finished_at.is_some());
        assert_eq!(summary.session.config_hash, "hash");
    }
}

#[tokio::test]
async fn test_new_clergy_contact_is_an_update() {
    let ws = Workspace::new();
    let config = ws.config();

    let before = church("oca", "Holy Trinity", "Boston", "MA");
    Engine::with_registry(
        config.clone(),
        "hash".to_string(),
        registry(vec![MockSource::new("oca", vec![before.clone()])]),
    )
    .run()
    .await
    .unwrap();
    let original = ws.storage().search_churches(&ChurchFilter::default()).unwrap();

    let mut after = before;
    after.clergy_contact = Some("Fr. John Smith".to_string());
    let result = Engine::with_registry(
        config,
        "hash".to_string(),
        registry(vec![MockSource::new("oca", vec![after])]),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(result.totals, totals(1, 0, 0, 1, 0));

    let stored = ws.storage().search_churches(&ChurchFilter::default()).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].clergy_contact.as_deref(), Some("Father John Smith"));
    assert_eq!(stored[0].dedup_key, original[0].dedup_key);
    assert_eq!(stored[0].id, original[0].id);
    assert_eq!(stored[0].last_session_id, result.session_id);
}

#[tokio::test(start_paused = true)]
async fn test_source_timing_out_every_attempt() {
    let ws = Workspace::new();
    let hanging = MockSource::new("slow", vec![church("slow", "Saint Sava", "Denver", "CO")])
        .with_behavior(Behavior::Hang);
    let fetches = Arc::clone(&hanging.fetches);

    let result = Engine::with_registry(
        ws.config(),
        "hash".to_string(),
        registry(vec![
            hanging,
            MockSource::new("oca", vec![church("oca", "Holy Trinity", "Boston", "MA")]),
        ]),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(fetches.load(Ordering::SeqCst), 3);
    assert_eq!(result.status, SessionStatus::Partial);
    assert_eq!(result.totals, totals(2, 1, 0, 0, 1));

    let slow = result.tasks.iter().find(|t| t.source_id == "slow").unwrap();
    assert_eq!(slow.status, TaskStatus::Failed);
    assert_eq!(slow.attempts, 3);

    let errors = ws.storage().errors_for_session(&result.session_id).unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].source, "slow");
    assert_eq!(errors[0].kind, "fetch");
}

#[tokio::test]
async fn test_only_source_failing_fails_session() {
    let ws = Workspace::new();
    let broken = MockSource::new("gone", vec![]).with_behavior(Behavior::NotFound);
    let fetches = Arc::clone(&broken.fetches);

    let result = Engine::with_registry(ws.config(), "hash".to_string(), registry(vec![broken]))
        .run()
        .await
        .unwrap();

    assert_eq!(result.status, SessionStatus::Failed);
    assert_eq!(result.totals, totals(1, 0, 0, 0, 1));
    // 404 is terminal
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
    assert!(result.fatal_error.is_none());
}

#[tokio::test]
async fn test_dry_run_matches_saving_run_and_writes_nothing() {
    let dry = Workspace::new();
    let mut config = dry.config();
    config.engine.save_to_database = false;

    let dry_result = Engine::with_registry(config, "hash".to_string(), registry(two_sources()))
        .run()
        .await
        .unwrap();

    assert!(dry_result.dry_run);
    assert_eq!(dry.storage().count_churches().unwrap(), 0);
    assert!(dry.storage().list_sessions(10).unwrap().is_empty());

    let saving = Workspace::new();
    let saved_result = Engine::with_registry(saving.config(), "hash".to_string(), registry(two_sources()))
        .run()
        .await
        .unwrap();

    assert_eq!(dry_result.totals, saved_result.totals);
    assert_eq!(dry_result.status, saved_result.status);
    assert_eq!(saving.storage().count_churches().unwrap(), 2);
}

#[tokio::test]
async fn test_dry_run_sees_existing_records() {
    let ws = Workspace::new();
    Engine::with_registry(ws.config(), "hash".to_string(), registry(two_sources()))
        .run()
        .await
        .unwrap();

    let mut config = ws.config();
    config.engine.save_to_database = false;
    let result = Engine::with_registry(config, "hash".to_string(), registry(two_sources()))
        .run()
        .await
        .unwrap();

    assert_eq!(result.totals, totals(2, 0, 2, 0, 0));
    assert_eq!(ws.storage().list_sessions(10).unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_bound_respected() {
    let ws = Workspace::new();
    let mut config = ws.config();
    config.engine.max_concurrent_scrapers = 2;

    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let sources = (0..6)
        .map(|i| {
            MockSource::new(
                &format!("source-{}", i),
                vec![church("x", &format!("Saint Church {}", i), "Boston", "MA")],
            )
            .with_behavior(Behavior::Delay(Duration::from_millis(100)))
            .with_counters(&active, &peak)
        })
        .collect();

    let result = Engine::with_registry(config, "hash".to_string(), registry(sources))
        .run()
        .await
        .unwrap();

    assert_eq!(result.status, SessionStatus::Completed);
    assert_eq!(result.totals.new, 6);
    assert_eq!(peak.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_zero_concurrency_is_fatal() {
    let ws = Workspace::new();
    let mut config = ws.config();
    config.engine.max_concurrent_scrapers = 0;

    let source = MockSource::new("oca", vec![church("oca", "Holy Trinity", "Boston", "MA")]);
    let fetches = Arc::clone(&source.fetches);

    let result = Engine::with_registry(config, "hash".to_string(), registry(vec![source]))
        .run()
        .await
        .unwrap();

    assert_eq!(result.status, SessionStatus::Failed);
    assert!(result.fatal_error.unwrap().contains("max_concurrent_scrapers"));
    assert_eq!(result.totals, SessionTotals::default());
    assert_eq!(fetches.load(Ordering::SeqCst), 0);

    let sessions = ws.storage().list_sessions(10).unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].session.status, SessionStatus::Failed);
    assert!(sessions[0].session.error_message.is_some());

    let errors = ws.storage().errors_for_session(&result.session_id).unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, "config");
}

#[tokio::test]
async fn test_unreachable_store_is_fatal() {
    let ws = Workspace::new();
    let mut config = ws.config();
    config.database.path = ws
        .dir
        .path()
        .join("no-such-dir")
        .join("churches.db")
        .display()
        .to_string();

    let source = MockSource::new("oca", vec![church("oca", "Holy Trinity", "Boston", "MA")]);
    let fetches = Arc::clone(&source.fetches);

    let result = Engine::with_registry(config, "hash".to_string(), registry(vec![source]))
        .run()
        .await
        .unwrap();

    assert_eq!(result.status, SessionStatus::Failed);
    assert!(result.fatal_error.unwrap().contains("store unavailable"));
    assert_eq!(result.errors.len(), 1);
    assert_eq!(fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancelled_before_start_fails_every_task() {
    let ws = Workspace::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = Engine::with_registry(ws.config(), "hash".to_string(), registry(two_sources()))
        .with_cancellation(cancel)
        .run()
        .await
        .unwrap();

    assert_eq!(result.status, SessionStatus::Failed);
    assert_eq!(result.totals, totals(2, 0, 0, 0, 2));
    assert!(result.tasks.iter().all(|t| t.status == TaskStatus::Failed && t.attempts == 0));
    assert!(result.errors.iter().all(|e| e.kind == "cancelled"));
}

#[tokio::test]
async fn test_cancel_mid_session_is_partial() {
    let ws = Workspace::new();
    let mut config = ws.config();
    config.engine.max_concurrent_scrapers = 1;
    let cancel = CancellationToken::new();

    let first = MockSource::new("oca", vec![church("oca", "Holy Trinity", "Boston", "MA")])
        .with_behavior(Behavior::CancelSession(cancel.clone()));
    let second = MockSource::new("goarch", vec![church("goarch", "Saint Nicholas", "Chicago", "IL")]);
    let second_fetches = Arc::clone(&second.fetches);

    let result = Engine::with_registry(config, "hash".to_string(), registry(vec![first, second]))
        .with_cancellation(cancel)
        .run()
        .await
        .unwrap();

    assert_eq!(result.status, SessionStatus::Partial);
    assert_eq!(result.totals, totals(2, 1, 0, 0, 1));
    assert_eq!(second_fetches.load(Ordering::SeqCst), 0);
    assert_eq!(ws.storage().count_churches().unwrap(), 1);
}

#[tokio::test]
async fn test_same_church_from_two_sources_stored_once() {
    let ws = Workspace::new();
    let sources = vec![
        MockSource::new("a", vec![church("a", "St. Mary", "Denver", "Colorado")]),
        MockSource::new("b", vec![church("b", "Saint  Mary", "denver", "CO")]),
    ];

    let result = Engine::with_registry(ws.config(), "hash".to_string(), registry(sources))
        .run()
        .await
        .unwrap();

    assert_eq!(result.totals.found, 2);
    assert_eq!(result.totals.new, 1);
    assert_eq!(result.totals.duplicate, 1);
    assert_eq!(ws.storage().count_churches().unwrap(), 1);
}

#[tokio::test]
async fn test_cancel_keeps_output_of_running_task() {
    let ws = Workspace::new();
    let mut config = ws.config();
    config.engine.live_check_urls = true;
    let cancel = CancellationToken::new();

    let mut candidate = church("oca", "Holy Trinity", "Boston", "MA");
    candidate.website = Some("https://holytrinity.example.org".to_string());
    let source = MockSource::new("oca", vec![candidate]).with_behavior(Behavior::CancelSession(cancel.clone()));
    let checker = Arc::new(AlwaysUp::default());

    let result = Engine::with_registry(config, "hash".to_string(), registry(vec![source]))
        .with_link_checker(checker.clone())
        .with_cancellation(cancel)
        .run()
        .await
        .unwrap();

    // The task was already running: its candidate is committed, not rejected
    assert_eq!(result.totals, totals(1, 1, 0, 0, 0));
    assert_eq!(result.status, SessionStatus::Partial);
    assert!(result.errors.is_empty());
    assert_eq!(checker.calls.load(Ordering::SeqCst), 0);
    assert_eq!(ws.storage().count_churches().unwrap(), 1);
}

#[tokio::test]
async fn test_panicking_source_is_contained() {
    let ws = Workspace::new();
    let sources = vec![
        MockSource::new("broken", vec![]).with_behavior(Behavior::PanicOnParse),
        MockSource::new("oca", vec![church("oca", "Holy Trinity", "Boston", "MA")]),
    ];

    let result = Engine::with_registry(ws.config(), "hash".to_string(), registry(sources))
        .run()
        .await
        .unwrap();

    assert_eq!(result.status, SessionStatus::Partial);
    assert_eq!(result.totals, totals(2, 1, 0, 0, 1));

    let broken = result.tasks.iter().find(|t| t.source_id == "broken").unwrap();
    assert_eq!(broken.status, TaskStatus::Failed);
    assert!(broken.error.as_deref().unwrap().contains("unexpected markup in broken"));

    let stored = ws.storage().list_sessions(1).unwrap();
    assert_eq!(stored[0].session.status, SessionStatus::Partial);
    assert!(stored[0].session.finished_at.is_some());

    let errors = ws.storage().errors_for_session(&result.session_id).unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].source, "broken");
    assert_eq!(errors[0].kind, "panic");
}

#[tokio::test(start_paused = true)]
async fn test_store_lost_mid_session() {
    let ws = Workspace::new();
    let mut config = ws.config();
    config.engine.max_concurrent_scrapers = 1;

    let store = Arc::new(Mutex::new(ws.storage()));
    let swap_to_read_only = {
        let store = Arc::clone(&store);
        let path = ws.db_path();
        Arc::new(move || {
            let read_only = SqliteStorage::open_read_only(&path, Duration::from_secs(1)).expect("read-only store");
            *store.lock().expect("store lock") = read_only;
        })
    };

    let sources = vec![
        MockSource::new("oca", vec![church("oca", "Holy Trinity", "Boston", "MA")]),
        MockSource::new("goarch", vec![church("goarch", "Saint Nicholas", "Chicago", "IL")]).with_behavior(
            Behavior::Hook {
                after: Duration::from_secs(1),
                hook: swap_to_read_only,
            },
        ),
        MockSource::new("antiochian", vec![church("antiochian", "Saint George", "Denver", "CO")]),
    ];

    let result = Engine::with_registry(config, "hash".to_string(), registry(sources))
        .with_store(store)
        .run()
        .await
        .unwrap();

    assert_eq!(result.status, SessionStatus::Partial);
    assert_eq!(result.totals, totals(3, 1, 0, 0, 2));
    assert_eq!(result.errors[0].kind, "persistence");
    assert_eq!(result.errors[0].source, "goarch");
    // The last source was either never dispatched or could not be saved
    assert!(["persistence", "cancelled"].contains(&result.errors[1].kind.as_str()));

    assert_eq!(ws.storage().count_churches().unwrap(), 1);
}

#[tokio::test]
async fn test_dry_run_exports_classified_records() {
    let ws = Workspace::new();
    let mut config = ws.config();
    config.engine.save_to_database = false;

    let result = Engine::with_registry(config, "hash".to_string(), registry(two_sources()))
        .run()
        .await
        .unwrap();

    assert_eq!(result.records.len(), 2);
    assert!(result.records.iter().all(|r| r.outcome == "new" && r.church_id.is_none()));
    assert!(result
        .export_paths
        .iter()
        .all(|p| p.starts_with(ws.dir.path().join("out"))));

    let json = std::fs::read_to_string(&result.export_paths[0]).unwrap();
    let exported: Vec<ExportedRecord> = serde_json::from_str(&json).unwrap();
    assert_eq!(exported, result.records);

    let csv = std::fs::read_to_string(&result.export_paths[1]).unwrap();
    assert_eq!(csv.lines().count(), 3);
    assert_eq!(ws.storage().count_churches().unwrap(), 0);
}
