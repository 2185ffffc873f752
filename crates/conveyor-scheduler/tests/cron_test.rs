use chrono::{Duration as ChronoDuration, Utc};
use conveyor_core::{
    ConveyorError, CronScheduleStore, JobFilter, JobStore, ScheduleDefinition, StoreConfig,
};
use conveyor_scheduler::{CronConfig, CronScheduler};
use conveyor_sqlite::SqliteStore;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn scheduler(store: &Arc<SqliteStore>, config: CronConfig) -> CronScheduler {
    CronScheduler::new(store.clone(), store.clone(), config)
}

fn open(path: &Path) -> Arc<SqliteStore> {
    Arc::new(SqliteStore::open(StoreConfig::new(path)).unwrap())
}

fn definitions() -> Vec<ScheduleDefinition> {
    vec![
        ScheduleDefinition::new("every_minute", "heartbeat", "* * * * *")
            .payload(json!({"kind": "ping"}))
            .priority(8)
            .max_attempts(1),
        ScheduleDefinition::new("nightly", "cleanup", "30 2 * * *"),
    ]
}

#[test]
fn test_bootstrap_is_idempotent_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jobs.db");

    {
        let store = open(&path);
        let report = scheduler(&store, CronConfig::default())
            .bootstrap(&definitions())
            .unwrap();
        assert_eq!(report.created, vec!["every_minute", "nightly"]);
        assert!(report.existing.is_empty());
    }

    let store = open(&path);
    let report = scheduler(&store, CronConfig::default())
        .bootstrap(&definitions())
        .unwrap();
    assert!(report.created.is_empty());
    assert_eq!(report.existing, vec!["every_minute", "nightly"]);
    assert_eq!(store.list_schedules().unwrap().len(), 2);
}

#[test]
fn test_bootstrap_rejects_bad_expression() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let result = scheduler(&store, CronConfig::default())
        .bootstrap(&[ScheduleDefinition::new("bad", "t", "0 0 * *")]);

    assert!(matches!(result, Err(ConveyorError::CronParse(_))));
    assert!(store.list_schedules().unwrap().is_empty());
}

#[test]
fn test_tick_enqueues_and_advances() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let cron = scheduler(&store, CronConfig::default());
    cron.bootstrap(&definitions()).unwrap();

    let now = Utc::now() + ChronoDuration::minutes(2);
    assert_eq!(cron.tick(now).unwrap(), 1);

    let jobs = store.list(&JobFilter::new().job_type("heartbeat")).unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].payload, json!({"kind": "ping"}));
    assert_eq!(jobs[0].priority, 8);
    assert_eq!(jobs[0].max_attempts, 1);

    let schedule = store.get_schedule("every_minute").unwrap().unwrap();
    assert_eq!(
        schedule.last_run.map(|t| t.timestamp_millis()),
        Some(now.timestamp_millis())
    );
    assert!(schedule.next_run.unwrap() > now);

    // Already advanced past `now`.
    assert_eq!(cron.tick(now).unwrap(), 0);
}

#[test]
fn test_missed_periods_fire_once() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let cron = scheduler(&store, CronConfig::default());
    cron.bootstrap(&definitions()[..1]).unwrap();

    let much_later = Utc::now() + ChronoDuration::days(1);
    assert_eq!(cron.tick(much_later).unwrap(), 1);
    assert_eq!(store.counts().unwrap().pending, 1);

    let next = store
        .get_schedule("every_minute")
        .unwrap()
        .unwrap()
        .next_run
        .unwrap();
    assert!(next > much_later);
    assert!(next <= much_later + ChronoDuration::minutes(1));
}

#[test]
fn test_disabled_schedule_does_not_fire() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let cron = scheduler(&store, CronConfig::default());
    cron.bootstrap(&definitions()).unwrap();

    assert!(cron.set_enabled("every_minute", false).unwrap());
    let later = Utc::now() + ChronoDuration::minutes(2);
    assert_eq!(cron.tick(later).unwrap(), 0);

    assert!(cron.set_enabled("every_minute", true).unwrap());
    let schedule = store.get_schedule("every_minute").unwrap().unwrap();
    assert!(schedule.enabled);
    assert!(schedule.next_run.unwrap() <= Utc::now() + ChronoDuration::minutes(1));
    assert_eq!(cron.tick(later).unwrap(), 1);

    assert!(!cron.set_enabled("missing", true).unwrap());
}

#[test]
fn test_invalid_stored_expression_is_skipped() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let cron = scheduler(&store, CronConfig::default());
    cron.bootstrap(&[
        ScheduleDefinition::new("broken", "t", "* * * * *"),
        ScheduleDefinition::new("healthy", "t", "* * * * *"),
    ])
    .unwrap();

    store
        .conn()
        .lock()
        .execute(
            "UPDATE cron_schedules SET cron_expression = 'not a cron' WHERE name = 'broken'",
            [],
        )
        .unwrap();

    let later = Utc::now() + ChronoDuration::minutes(2);
    assert_eq!(cron.tick(later).unwrap(), 1);
    assert_eq!(store.counts().unwrap().pending, 1);
    assert!(store
        .get_schedule("healthy")
        .unwrap()
        .unwrap()
        .last_run
        .is_some());
    assert!(store
        .get_schedule("broken")
        .unwrap()
        .unwrap()
        .last_run
        .is_none());
}

#[tokio::test]
async fn test_loop_fires_due_schedules() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let cron = scheduler(
        &store,
        CronConfig::new().with_tick_interval(Duration::from_millis(20)),
    );
    cron.bootstrap(&definitions()[..1]).unwrap();

    let past = (Utc::now() - ChronoDuration::minutes(1)).timestamp_millis();
    store
        .conn()
        .lock()
        .execute(
            "UPDATE cron_schedules SET next_run = ?1 WHERE name = 'every_minute'",
            [past],
        )
        .unwrap();

    cron.start().unwrap();
    assert!(matches!(cron.start(), Err(ConveyorError::AlreadyRunning)));

    for _ in 0..100 {
        if store.counts().unwrap().pending == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cron.stop().await;

    assert!(!cron.is_running());
    assert_eq!(store.counts().unwrap().pending, 1);
}
