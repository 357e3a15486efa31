//! End-to-end persistence coverage for the SQLite key/value store.
//!
//! These tests drive the typed `RsvpStore` from the core crate against a real
//! database file so serialization, prefix scans and restarts stay aligned
//! with what the engine expects.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use fluffer_core::{KeyValueStore, RsvpStore};
use fluffer_domain::{BotSettings, Response, RsvpRecord};
use fluffer_infra::database::{DbManager, SqliteKeyValueStore};
use serde_json::json;
use tempfile::TempDir;

struct DbHarness {
    #[allow(dead_code)]
    temp_dir: TempDir,
    kv: Arc<SqliteKeyValueStore>,
}

impl DbHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("temporary directory should be created");
        let kv = open(&temp_dir);
        Self { temp_dir, kv }
    }

    fn reopen(&self) -> Arc<SqliteKeyValueStore> {
        open(&self.temp_dir)
    }

    fn store(&self) -> RsvpStore {
        RsvpStore::new(self.kv.clone())
    }
}

fn open(dir: &TempDir) -> Arc<SqliteKeyValueStore> {
    let manager = DbManager::new(dir.path().join("fluffer-integration.db"), 4)
        .expect("database manager should initialise");
    manager.run_migrations().expect("schema migrations should apply");
    Arc::new(SqliteKeyValueStore::new(Arc::new(manager)))
}

fn record(id: &str) -> RsvpRecord {
    let mut record = RsvpRecord::new(id, Utc.with_ymd_and_hms(2030, 5, 1, 18, 0, 0).unwrap());
    record.title = format!("Event {id}");
    record.invite = Some("core".into());
    for user in ["1", "2", "3"] {
        record.invite_user(user);
    }
    record.change_response("1", Response::Yes);
    record.change_response("2", Response::Zoom);
    record.change_response("3", Response::No);
    record.message_id = Some(format!("msg-{id}"));
    record.posted = true;
    record
}

#[tokio::test(flavor = "multi_thread")]
async fn records_survive_restart() {
    let harness = DbHarness::new();
    let saved = record("evt-1");
    harness.store().save(&saved).await.expect("save");

    let reopened = RsvpStore::new(harness.reopen());
    let loaded = reopened.load("evt-1").await.expect("load").expect("record present");

    assert_eq!(loaded, saved);
    assert!(loaded.invariant_violations().is_empty());
    assert!(loaded.zoom.contains("2") && loaded.yes.contains("2"));
    assert_eq!(loaded.changed.len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn lookups_by_message_and_scheduled_event() {
    let harness = DbHarness::new();
    let store = harness.store();

    let mut second = record("evt-2");
    second.scheduled_event_id = Some("sched-9".into());
    store.save(&record("evt-1")).await.unwrap();
    store.save(&second).await.unwrap();

    let by_message = store.find_by_message("msg-evt-1").await.unwrap().expect("found");
    assert_eq!(by_message.event_id, "evt-1");

    let by_event = store.find_by_scheduled_event("sched-9").await.unwrap().expect("found");
    assert_eq!(by_event.event_id, "evt-2");

    assert!(store.find_by_message("msg-unknown").await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn scan_skips_undecodable_records_and_other_prefixes() {
    let harness = DbHarness::new();
    let store = harness.store();

    store.save(&record("evt-1")).await.unwrap();
    harness.kv.set("rsvp/broken", json!(42)).await.unwrap();
    harness.kv.set("event/evt-1", json!({"id": "evt-1"})).await.unwrap();
    store.save_settings(&BotSettings::default()).await.unwrap();

    let all = store.all().await.expect("scan");
    let ids: Vec<&str> = all.iter().map(|r| r.event_id.as_str()).collect();
    assert_eq!(ids, ["evt-1"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn checkpoint_and_settings_lifecycle() {
    let harness = DbHarness::new();
    let store = harness.store();

    assert_eq!(store.checkpoint().await.unwrap(), None);
    store.set_checkpoint("sync-1").await.unwrap();
    store.set_checkpoint("sync-2").await.unwrap();
    assert_eq!(store.checkpoint().await.unwrap().as_deref(), Some("sync-2"));
    store.clear_checkpoint().await.unwrap();
    assert_eq!(store.checkpoint().await.unwrap(), None);

    let mut settings = BotSettings::default();
    settings.accounts.insert("1".into(), "ada@example.com".into());
    settings.channels.insert("core".into(), "core-events".into());
    store.save_settings(&settings).await.unwrap();

    let reopened = RsvpStore::new(harness.reopen());
    assert_eq!(reopened.load_settings().await.unwrap(), settings);
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_saves_land_in_pool() {
    let harness = DbHarness::new();
    let store = harness.store();

    let mut tasks = Vec::new();
    for i in 0..16 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move { store.save(&record(&format!("evt-{i:02}"))).await }));
    }
    for task in tasks {
        task.await.expect("task joined").expect("save succeeded");
    }

    let all = store.all().await.unwrap();
    assert_eq!(all.len(), 16);
    assert_eq!(all[0].event_id, "evt-00");
    assert_eq!(all[15].event_id, "evt-15");

    store.delete("evt-00").await.unwrap();
    store.delete("evt-00").await.expect("deleting twice is fine");
    assert_eq!(store.all().await.unwrap().len(), 15);
}
