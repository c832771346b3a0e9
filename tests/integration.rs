use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};

use axum::{routing::post, Json, Router};
use serde_json::{json, Value};
use tempfile::TempDir;

fn harvest_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("harvest");
    path
}

fn setup_test_env(backend_url: Option<&str>) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    let backend = match backend_url {
        Some(url) => format!("[backend]\nurl = \"{}\"\n", url),
        None => String::new(),
    };

    let config_content = format!(
        r#"[store]
path = "{root}/data/harvest.sqlite"

[tabs]
file = "{root}/data/tabs.json"

{backend}"#,
        root = root.display(),
        backend = backend,
    );

    let config_path = config_dir.join("harvest.toml");
    fs::write(&config_path, config_content).unwrap();

    fs::write(
        root.join("snapshot.json"),
        serde_json::to_string_pretty(&json!({
            "webhistory": { "webhistory": [
                { "tabsessionId": 11, "tabHistory": [
                    { "url": "https://a.example", "title": "A", "pageContentMarkdown": "alpha" },
                    { "url": "https://b.example", "pageContentMarkdown": "beta" }
                ]},
                { "tabsessionId": 12, "tabHistory": [
                    { "url": "https://c.example", "duration": 900 }
                ]}
            ]},
            "urlQueueList": { "urlQueueList": [
                { "tabsessionId": 11, "urlQueue": ["https://a.example"] },
                { "tabsessionId": 12, "urlQueue": [] }
            ]},
            "timeQueueList": { "timeQueueList": [
                { "tabsessionId": 12, "timeQueue": [1714557600000i64] }
            ]}
        }))
        .unwrap(),
    )
    .unwrap();

    (tmp, config_path)
}

fn run_harvest(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = harvest_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("HARVEST_BACKEND_URL")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run harvest binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn snapshot_path(config_path: &Path) -> String {
    config_path
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("snapshot.json")
        .display()
        .to_string()
}

fn tabs_path(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("data")
        .join("tabs.json")
}

#[test]
fn test_init_creates_store() {
    let (_tmp, config_path) = setup_test_env(None);

    let (stdout, stderr, success) = run_harvest(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env(None);

    let (_, _, success1) = run_harvest(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_harvest(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_import_and_status() {
    let (_tmp, config_path) = setup_test_env(None);
    run_harvest(&config_path, &["init"]);

    let snapshot = snapshot_path(&config_path);
    let (stdout, stderr, success) = run_harvest(&config_path, &["import", &snapshot]);
    assert!(success, "import failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("webhistory"));

    run_harvest(&config_path, &["login", "--token", "tok"]);
    run_harvest(&config_path, &["select", "7"]);

    let (stdout, _, success) = run_harvest(&config_path, &["status"]);
    assert!(success);
    assert!(stdout.contains("sessions:        2"), "stdout={}", stdout);
    assert!(stdout.contains("pending pages:   3"), "stdout={}", stdout);
    assert!(stdout.contains("url queue:       2"), "stdout={}", stdout);
    assert!(stdout.contains("time queue:      1"), "stdout={}", stdout);
    assert!(stdout.contains("authenticated:   true"), "stdout={}", stdout);
    assert!(stdout.contains("search space:    7"), "stdout={}", stdout);
    assert!(stdout.contains("(not configured)"), "stdout={}", stdout);

    run_harvest(&config_path, &["logout"]);
    let (stdout, _, _) = run_harvest(&config_path, &["status"]);
    assert!(stdout.contains("authenticated:   false"), "stdout={}", stdout);
}

#[test]
fn test_save_without_capture_reports_error() {
    let (_tmp, config_path) = setup_test_env(None);
    run_harvest(&config_path, &["init"]);

    let (stdout, _, success) = run_harvest(&config_path, &["save"]);
    assert!(!success, "save should fail without captured pages");
    let reply: Value = serde_json::from_str(stdout.trim()).unwrap();
    assert!(reply["error"]
        .as_str()
        .unwrap()
        .starts_with("No captured pages found"));
}

#[test]
fn test_save_without_backend_drains_then_fails() {
    let (_tmp, config_path) = setup_test_env(None);
    run_harvest(&config_path, &["init"]);
    run_harvest(&config_path, &["import", &snapshot_path(&config_path)]);
    run_harvest(&config_path, &["login", "--token", "tok"]);
    run_harvest(&config_path, &["select", "7"]);

    let (stdout, _, success) = run_harvest(&config_path, &["save"]);
    assert!(!success);
    let reply: Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(
        reply["error"],
        "Backend URL not configured. Please check extension configuration."
    );

    let (stdout, _, _) = run_harvest(&config_path, &["status"]);
    assert!(stdout.contains("pending pages:   0"), "stdout={}", stdout);
}

#[test]
fn test_reconcile_with_tabs_file() {
    let (_tmp, config_path) = setup_test_env(None);
    run_harvest(&config_path, &["init"]);
    run_harvest(&config_path, &["import", &snapshot_path(&config_path)]);

    // No tabs file yet: reconcile fails and leaves the store alone.
    let (_, _, success) = run_harvest(&config_path, &["reconcile"]);
    assert!(!success);

    fs::write(tabs_path(&config_path), r#"[{"id": 12}, {"id": 40}]"#).unwrap();
    let (stdout, stderr, success) = run_harvest(&config_path, &["reconcile"]);
    assert!(success, "reconcile failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("sessions: kept 1, removed 1"), "stdout={}", stdout);
    assert!(stdout.contains("url queue: kept 1, removed 1"), "stdout={}", stdout);
    assert!(stdout.contains("time queue: kept 1, removed 0"), "stdout={}", stdout);

    let (stdout, _, _) = run_harvest(&config_path, &["status"]);
    assert!(stdout.contains("sessions:        1"), "stdout={}", stdout);
    assert!(stdout.contains("pending pages:   1"), "stdout={}", stdout);
}

#[test]
fn test_select_rejects_zero() {
    let (_tmp, config_path) = setup_test_env(None);
    run_harvest(&config_path, &["init"]);
    let (_, _, success) = run_harvest(&config_path, &["select", "0"]);
    assert!(!success);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_save_against_backend() {
    let received: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let app = Router::new().route(
        "/api/v1/documents",
        post(move |Json(body): Json<Value>| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(body);
                Json(json!({ "message": "ok" }))
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    let (_tmp, config_path) = setup_test_env(Some(&url));
    fs::write(tabs_path(&config_path), r#"[{"id": 11}]"#).unwrap();

    let cfg = config_path.clone();
    let (stdout, stderr, success) = tokio::task::spawn_blocking(move || {
        run_harvest(&cfg, &["init"]);
        run_harvest(&cfg, &["import", &snapshot_path(&cfg)]);
        run_harvest(&cfg, &["login", "--token", "tok"]);
        run_harvest(&cfg, &["select", "7"]);
        run_harvest(&cfg, &["save"])
    })
    .await
    .unwrap();

    assert!(success, "save failed: stdout={}, stderr={}", stdout, stderr);
    let reply: Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(reply, json!({ "message": "Save Job Started" }));

    let bodies = received.lock().unwrap().clone();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["content"].as_array().unwrap().len(), 3);
    assert_eq!(bodies[0]["search_space_id"], 7);

    // Tab 12 is closed, so only tab 11 (drained) remains.
    let cfg = config_path.clone();
    let (stdout, _, _) = tokio::task::spawn_blocking(move || run_harvest(&cfg, &["status"]))
        .await
        .unwrap();
    assert!(stdout.contains("sessions:        1"), "stdout={}", stdout);
    assert!(stdout.contains("pending pages:   0"), "stdout={}", stdout);
}
