/// Integration tests for the worker pipeline
///
/// These tests run full poll cycles against an on-disk record store and event
/// log, with scripted probe responses and a recording notifier:
/// - State transitions and alert decisions
/// - Skipping malformed checks
/// - Best-effort handling of persistence, logging and notification failures
use crate::config::Config;
use crate::models::CHECKS_COLLECTION;
use crate::monitoring::ProbeExecutor;
use crate::monitoring::checker::{Checker, ProbeError, ProbeRequest};
use crate::notify::{Notifier, NotifyError};
use crate::orchestrator::Orchestrator;
use crate::storage::{FileStore, RecordStore, StoreError};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::{TempDir, tempdir};

const OWNER: &str = "5551234567";

#[derive(Clone, Copy)]
enum Behavior {
    Status(u16),
    Hang,
    Refuse,
}

/// Answers by target host
struct ScriptedChecker {
    by_host: HashMap<String, Behavior>,
}

impl ScriptedChecker {
    fn new(script: &[(&str, Behavior)]) -> Arc<Self> {
        Arc::new(Self {
            by_host: script.iter().map(|(host, behavior)| (host.to_string(), *behavior)).collect(),
        })
    }
}

#[async_trait]
impl Checker for ScriptedChecker {
    async fn check(&self, request: &ProbeRequest) -> Result<u16, ProbeError> {
        match self.by_host.get(&request.host).copied().unwrap_or(Behavior::Refuse) {
            Behavior::Status(code) => Ok(code),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(200)
            }
            Behavior::Refuse => Err(ProbeError::Transport("connection refused".to_string())),
        }
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingNotifier {
    fn failing() -> Self {
        Self { fail: true, ..Default::default() }
    }

    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push((recipient.to_string(), message.to_string()));
        if self.fail {
            Err(NotifyError::Rejected { status: 500, body: "gateway down".to_string() })
        } else {
            Ok(())
        }
    }
}

/// File store whose updates always fail
struct ReadOnlyStore(FileStore);

#[async_trait]
impl RecordStore for ReadOnlyStore {
    async fn list(&self, collection: &str) -> Result<Vec<String>, StoreError> {
        self.0.list(collection).await
    }

    async fn read(&self, collection: &str, id: &str) -> Result<Value, StoreError> {
        self.0.read(collection, id).await
    }

    async fn update(&self, _collection: &str, _id: &str, _record: &Value) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("read-only store")))
    }
}

struct Harness {
    dir: TempDir,
    store: Arc<FileStore>,
}

impl Harness {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let store = Arc::new(FileStore::new(dir.path().join("data")));
        Self { dir, store }
    }

    fn config(&self) -> Config {
        let mut config = Config::default();
        config.storage.data_dir = self.dir.path().join("data");
        config.storage.logs_dir = self.dir.path().join("logs");
        config
    }

    fn logs_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("logs")
    }

    async fn add_check(&self, id: &str, host: &str, extra: Value) {
        let mut record = json!({
            "id": id,
            "userPhone": OWNER,
            "protocol": "http",
            "url": format!("{host}/health"),
            "method": "get",
            "successCodes": [200],
            "timeoutSeconds": 1,
        });
        if let (Some(record), Some(extra)) = (record.as_object_mut(), extra.as_object()) {
            for (key, value) in extra {
                record.insert(key.clone(), value.clone());
            }
        }
        self.store.create(CHECKS_COLLECTION, id, &record).await.unwrap();
    }

    async fn record(&self, id: &str) -> Value {
        self.store.read(CHECKS_COLLECTION, id).await.unwrap()
    }

    fn orchestrator(
        &self,
        store: Arc<dyn RecordStore>,
        checker: Arc<ScriptedChecker>,
        notifier: Arc<RecordingNotifier>,
    ) -> Orchestrator {
        Orchestrator::with_components(
            self.config(),
            store,
            Arc::new(ProbeExecutor::new(checker)),
            notifier,
        )
    }
}

fn log_lines(logs_dir: &Path, id: &str) -> Vec<Value> {
    match std::fs::read_to_string(logs_dir.join(format!("{id}.log"))) {
        Ok(raw) => raw.lines().map(|line| serde_json::from_str(line).unwrap()).collect(),
        Err(_) => Vec::new(),
    }
}

#[tokio::test]
async fn test_recovery_is_persisted_logged_and_alerted() {
    let harness = Harness::new();
    harness.add_check("a", "up.test", json!({"state": "down", "lastChecked": 1_700_000_000_000i64})).await;
    let notifier = Arc::new(RecordingNotifier::default());
    let orchestrator = harness.orchestrator(
        harness.store.clone(),
        ScriptedChecker::new(&[("up.test", Behavior::Status(200))]),
        notifier.clone(),
    );

    let summary = orchestrator.poll_once().await;

    assert_eq!(summary.evaluated, 1);
    assert_eq!(summary.alerts, 1);

    let record = harness.record("a").await;
    assert_eq!(record["state"], "up");
    assert!(record["lastChecked"].as_i64().unwrap() > 1_700_000_000_000);

    let lines = log_lines(&harness.logs_dir(), "a");
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["alert"], true);
    assert_eq!(lines[0]["state"], "up");
    assert_eq!(lines[0]["outcome"]["responseCode"], 200);

    assert_eq!(
        notifier.sent(),
        vec![(OWNER.to_string(), "Alert: Your check for get HTTP://up.test/health is currently up".to_string())]
    );
}

#[tokio::test]
async fn test_unchanged_down_state_is_not_alerted() {
    let harness = Harness::new();
    harness.add_check("b", "broken.test", json!({"state": "down", "lastChecked": 1_700_000_000_000i64})).await;
    let notifier = Arc::new(RecordingNotifier::default());
    let orchestrator = harness.orchestrator(
        harness.store.clone(),
        ScriptedChecker::new(&[("broken.test", Behavior::Status(500))]),
        notifier.clone(),
    );

    let summary = orchestrator.poll_once().await;

    assert_eq!(summary.alerts, 0);
    assert_eq!(harness.record("b").await["state"], "down");
    assert_eq!(log_lines(&harness.logs_dir(), "b")[0]["alert"], false);
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn test_first_evaluation_is_not_alerted() {
    let harness = Harness::new();
    harness.add_check("c", "up.test", json!({})).await;
    let notifier = Arc::new(RecordingNotifier::default());
    let orchestrator = harness.orchestrator(
        harness.store.clone(),
        ScriptedChecker::new(&[("up.test", Behavior::Status(200))]),
        notifier.clone(),
    );

    orchestrator.poll_once().await;

    let record = harness.record("c").await;
    assert_eq!(record["state"], "up");
    assert!(record["lastChecked"].is_i64());
    assert!(notifier.sent().is_empty());

    // The next transition is alerted
    let orchestrator = harness.orchestrator(
        harness.store.clone(),
        ScriptedChecker::new(&[("up.test", Behavior::Status(502))]),
        notifier.clone(),
    );
    orchestrator.poll_once().await;

    assert_eq!(harness.record("c").await["state"], "down");
    assert_eq!(notifier.sent().len(), 1);
    assert_eq!(log_lines(&harness.logs_dir(), "c").len(), 2);
}

#[tokio::test]
async fn test_timeout_marks_check_down() {
    let harness = Harness::new();
    harness.add_check("d", "slow.test", json!({"state": "up", "lastChecked": 1_700_000_000_000i64})).await;
    let notifier = Arc::new(RecordingNotifier::default());
    let orchestrator = harness.orchestrator(
        harness.store.clone(),
        ScriptedChecker::new(&[("slow.test", Behavior::Hang)]),
        notifier.clone(),
    );

    orchestrator.poll_once().await;

    assert_eq!(harness.record("d").await["state"], "down");
    let lines = log_lines(&harness.logs_dir(), "d");
    assert_eq!(lines[0]["outcome"]["errored"], true);
    assert_eq!(lines[0]["outcome"]["errorDetail"], "timeout");
    assert_eq!(notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_malformed_check_is_skipped() {
    let harness = Harness::new();
    harness.add_check("good", "up.test", json!({})).await;
    harness.add_check("bad", "up.test", json!({"timeoutSeconds": 9})).await;
    let orchestrator = harness.orchestrator(
        harness.store.clone(),
        ScriptedChecker::new(&[("up.test", Behavior::Status(200))]),
        Arc::new(RecordingNotifier::default()),
    );

    let summary = orchestrator.poll_once().await;

    assert_eq!(summary.evaluated, 1);
    assert_eq!(summary.rejected, 1);
    assert_eq!(harness.record("good").await["state"], "up");

    let bad = harness.record("bad").await;
    assert!(bad.get("state").is_none());
    assert!(bad.get("lastChecked").is_none());
    assert!(log_lines(&harness.logs_dir(), "bad").is_empty());
}

#[tokio::test]
async fn test_checks_are_independent() {
    let harness = Harness::new();
    harness.add_check("fast", "up.test", json!({})).await;
    harness.add_check("slow", "slow.test", json!({})).await;
    harness.add_check("refused", "nowhere.test", json!({})).await;
    let orchestrator = harness.orchestrator(
        harness.store.clone(),
        ScriptedChecker::new(&[("up.test", Behavior::Status(200)), ("slow.test", Behavior::Hang)]),
        Arc::new(RecordingNotifier::default()),
    );

    let started = std::time::Instant::now();
    let summary = orchestrator.poll_once().await;

    assert_eq!(summary.evaluated, 3);
    // All three ran concurrently, bounded by the single 1s timeout
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(harness.record("fast").await["state"], "up");
    assert_eq!(harness.record("slow").await["state"], "down");
    assert_eq!(
        log_lines(&harness.logs_dir(), "refused")[0]["outcome"]["errorDetail"],
        "connection refused"
    );
}

#[tokio::test]
async fn test_persistence_failure_still_logs_and_alerts() {
    let harness = Harness::new();
    harness.add_check("e", "up.test", json!({"state": "down", "lastChecked": 1_700_000_000_000i64})).await;
    let notifier = Arc::new(RecordingNotifier::default());
    let store = Arc::new(ReadOnlyStore(FileStore::new(harness.dir.path().join("data"))));
    let orchestrator = harness.orchestrator(
        store,
        ScriptedChecker::new(&[("up.test", Behavior::Status(200))]),
        notifier.clone(),
    );

    orchestrator.poll_once().await;

    assert_eq!(harness.record("e").await["state"], "down");
    assert_eq!(log_lines(&harness.logs_dir(), "e")[0]["state"], "up");
    assert_eq!(notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_notification_failure_keeps_state_and_log() {
    let harness = Harness::new();
    harness.add_check("f", "up.test", json!({"state": "down", "lastChecked": 1_700_000_000_000i64})).await;
    let notifier = Arc::new(RecordingNotifier::failing());
    let orchestrator = harness.orchestrator(
        harness.store.clone(),
        ScriptedChecker::new(&[("up.test", Behavior::Status(200))]),
        notifier.clone(),
    );

    orchestrator.poll_once().await;

    assert_eq!(notifier.sent().len(), 1);
    assert_eq!(harness.record("f").await["state"], "up");
    assert_eq!(log_lines(&harness.logs_dir(), "f")[0]["alert"], true);
}

#[tokio::test]
async fn test_log_failure_does_not_block_persistence() {
    let harness = Harness::new();
    harness.add_check("g", "up.test", json!({"state": "down", "lastChecked": 1_700_000_000_000i64})).await;
    std::fs::create_dir_all(harness.logs_dir().join("g.log")).unwrap();
    let notifier = Arc::new(RecordingNotifier::default());
    let orchestrator = harness.orchestrator(
        harness.store.clone(),
        ScriptedChecker::new(&[("up.test", Behavior::Status(200))]),
        notifier.clone(),
    );

    orchestrator.poll_once().await;

    assert_eq!(harness.record("g").await["state"], "up");
    assert_eq!(notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_unknown_fields_survive_write_back() {
    let harness = Harness::new();
    harness.add_check("h", "up.test", json!({"label": "homepage", "createdAt": 1234})).await;
    let orchestrator = harness.orchestrator(
        harness.store.clone(),
        ScriptedChecker::new(&[("up.test", Behavior::Status(200))]),
        Arc::new(RecordingNotifier::default()),
    );

    orchestrator.poll_once().await;

    let record = harness.record("h").await;
    assert_eq!(record["label"], "homepage");
    assert_eq!(record["createdAt"], 1234);
    assert_eq!(record["userPhone"], OWNER);
    assert_eq!(record["successCodes"], json!([200]));
}

#[tokio::test]
async fn test_start_polls_immediately_and_rotates() {
    let harness = Harness::new();
    harness.add_check("i", "up.test", json!({})).await;
    let mut orchestrator = harness.orchestrator(
        harness.store.clone(),
        ScriptedChecker::new(&[("up.test", Behavior::Status(200))]),
        Arc::new(RecordingNotifier::default()),
    );

    orchestrator.start();
    assert!(orchestrator.is_running());

    let mut polled = false;
    for _ in 0..50 {
        // The record may be mid-write, so read errors just mean "not yet"
        let record = harness.store.read(CHECKS_COLLECTION, "i").await.ok();
        if record.is_some_and(|record| record.get("lastChecked").is_some()) {
            polled = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    orchestrator.shutdown();

    assert!(polled, "first poll did not run at startup");
    assert!(!orchestrator.is_running());
}

#[tokio::test]
async fn test_rotation_after_poll_archives_entries() {
    let harness = Harness::new();
    harness.add_check("j", "up.test", json!({})).await;
    let orchestrator = harness.orchestrator(
        harness.store.clone(),
        ScriptedChecker::new(&[("up.test", Behavior::Status(200))]),
        Arc::new(RecordingNotifier::default()),
    );

    orchestrator.poll_once().await;
    let summary = orchestrator.rotator().rotate().await.unwrap();

    assert_eq!(summary.rotated, 1);
    assert!(log_lines(&harness.logs_dir(), "j").is_empty());

    let listed = orchestrator.rotator().list(true).await.unwrap();
    let artifact = listed.iter().find(|name| name.starts_with("j-")).unwrap();
    let archived = orchestrator.rotator().decompress(artifact).await.unwrap();
    let entry: Value = serde_json::from_str(archived.lines().next().unwrap()).unwrap();
    assert_eq!(entry["check"]["id"], "j");
}
