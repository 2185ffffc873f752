use chrono::{Duration as ChronoDuration, Utc};
use conveyor_core::{ConveyorError, CronScheduleStore, ScheduleDefinition, StoreConfig};
use conveyor_sqlite::SqliteStore;
use serde_json::json;

fn definition() -> ScheduleDefinition {
    ScheduleDefinition::new("hourly_news", "fetch_news", "0 * * * *")
        .payload(json!({"all": true}))
        .priority(3)
}

#[test]
fn test_create_if_absent_is_idempotent_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jobs.db");
    let next = Utc::now() + ChronoDuration::hours(1);

    let original = {
        let store = SqliteStore::open(StoreConfig::new(&path)).unwrap();
        let insert = store.create_if_absent(&definition(), Some(next)).unwrap();
        assert!(insert.created);
        assert_eq!(insert.schedule.priority, 3);
        assert_eq!(insert.schedule.payload, json!({"all": true}));
        assert!(insert.schedule.enabled);
        assert!(insert.schedule.last_run.is_none());
        insert.schedule
    };

    let store = SqliteStore::open(StoreConfig::new(&path)).unwrap();
    let again = store
        .create_if_absent(&definition().priority(9), Some(next + ChronoDuration::hours(5)))
        .unwrap();
    assert!(!again.created);
    assert_eq!(again.schedule, original);
    assert_eq!(store.list_schedules().unwrap().len(), 1);
}

#[test]
fn test_existing_schedule_keeps_disabled_flag() {
    let store = SqliteStore::open_in_memory().unwrap();
    store
        .create_if_absent(&definition(), Some(Utc::now()))
        .unwrap();
    assert!(store.set_enabled("hourly_news", false, None).unwrap());

    let insert = store
        .create_if_absent(&definition(), Some(Utc::now()))
        .unwrap();
    assert!(!insert.created);
    assert!(!insert.schedule.enabled);
}

#[test]
fn test_due_schedules_filters_enabled_and_time() {
    let store = SqliteStore::open_in_memory().unwrap();
    let now = Utc::now();

    store
        .create_if_absent(
            &ScheduleDefinition::new("due", "t", "* * * * *"),
            Some(now - ChronoDuration::minutes(1)),
        )
        .unwrap();
    store
        .create_if_absent(
            &ScheduleDefinition::new("later", "t", "* * * * *"),
            Some(now + ChronoDuration::minutes(10)),
        )
        .unwrap();
    store
        .create_if_absent(
            &ScheduleDefinition::new("off", "t", "* * * * *").disabled(),
            Some(now - ChronoDuration::minutes(1)),
        )
        .unwrap();
    store
        .create_if_absent(&ScheduleDefinition::new("never", "t", "* * * * *"), None)
        .unwrap();

    let due: Vec<String> = store
        .due_schedules(now)
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(due, vec!["due".to_string()]);
}

#[test]
fn test_record_run_advances_schedule() {
    let store = SqliteStore::open_in_memory().unwrap();
    let now = Utc::now();
    let schedule = store
        .create_if_absent(&definition(), Some(now - ChronoDuration::minutes(1)))
        .unwrap()
        .schedule;

    let next = now + ChronoDuration::hours(1);
    store.record_run(&schedule.id, now, Some(next)).unwrap();

    let updated = store.get_schedule("hourly_news").unwrap().unwrap();
    assert_eq!(
        updated.last_run.map(|t| t.timestamp_millis()),
        Some(now.timestamp_millis())
    );
    assert_eq!(
        updated.next_run.map(|t| t.timestamp_millis()),
        Some(next.timestamp_millis())
    );
    assert!(store.due_schedules(now).unwrap().is_empty());

    assert!(matches!(
        store.record_run("missing", now, None),
        Err(ConveyorError::NotFound(_))
    ));
}

#[test]
fn test_set_enabled_unknown_name() {
    let store = SqliteStore::open_in_memory().unwrap();
    assert!(!store.set_enabled("nope", true, None).unwrap());
}

#[test]
fn test_list_schedules_sorted_by_name() {
    let store = SqliteStore::open_in_memory().unwrap();
    for name in ["weekly", "daily", "hourly"] {
        store
            .create_if_absent(&ScheduleDefinition::new(name, "t", "0 0 * * *"), None)
            .unwrap();
    }

    let names: Vec<String> = store
        .list_schedules()
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["daily", "hourly", "weekly"]);
}
