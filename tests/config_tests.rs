//! Loading configuration files from disk.

use std::fs;

use folio::config::{load_config, BackendKind};
use tempfile::TempDir;

fn write_config(tmp: &TempDir, content: &str) -> std::path::PathBuf {
    let path = tmp.path().join("folio.toml");
    fs::write(&path, content).unwrap();
    path
}

const FULL: &str = r#"
default_project = "prod"

[server]
bind = "0.0.0.0:4000"

[store]
backend = "memory"
chunk_size = 200
poll_interval_ms = 250
timeout_secs = 5

[emulators]
enabled = true
firestore = { host = "127.0.0.1", port = 18080 }
auth = { host = "127.0.0.1", port = 19099 }

[projects.demo]
project_id = "demo-project"

[projects.prod]
api_key = "AIza-test"
auth_domain = "prod.firebaseapp.com"
project_id = "prod-project"
storage_bucket = "prod.appspot.com"
messaging_sender_id = "123"
app_id = "1:123:web:abc"
measurement_id = "G-XYZ"
"#;

#[test]
fn full_config_loads() {
    let tmp = TempDir::new().unwrap();
    let config = load_config(&write_config(&tmp, FULL)).unwrap();

    assert_eq!(config.server.bind, "0.0.0.0:4000");
    assert_eq!(config.store.backend, BackendKind::Memory);
    assert_eq!(config.store.chunk_size, 200);
    assert_eq!(config.store.poll_interval_ms, 250);
    assert_eq!(config.emulators.firestore.url(), "http://127.0.0.1:18080");
    assert_eq!(config.emulators.auth.port, 19099);
    assert_eq!(config.default_project_key(), Some("prod"));

    let prod = &config.projects["prod"];
    assert_eq!(prod.project_id, "prod-project");
    assert_eq!(prod.measurement_id.as_deref(), Some("G-XYZ"));
    assert!(config.projects["demo"].api_key.is_empty());
}

#[test]
fn minimal_config_gets_defaults() {
    let tmp = TempDir::new().unwrap();
    let config = load_config(&write_config(
        &tmp,
        "[projects.demo]\nproject_id = \"demo-project\"\n",
    ))
    .unwrap();

    assert_eq!(config.server.bind, "127.0.0.1:3333");
    assert_eq!(config.store.backend, BackendKind::Rest);
    assert_eq!(config.store.chunk_size, 450);
    assert!(config.emulators.enabled);
    assert_eq!(config.emulators.firestore.url(), "http://localhost:8080");
    assert_eq!(config.emulators.auth.url(), "http://localhost:9099");
    assert_eq!(config.default_project_key(), Some("demo"));
}

#[test]
fn missing_file_names_the_path() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("absent.toml");
    let err = load_config(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("absent.toml"));
}

#[test]
fn invalid_configs_are_rejected() {
    let cases = [
        ("no projects", "[store]\nbackend = \"memory\"\n"),
        (
            "unknown default",
            "default_project = \"nope\"\n[projects.demo]\nproject_id = \"d\"\n",
        ),
        (
            "empty project id",
            "[projects.demo]\nproject_id = \"  \"\n",
        ),
        (
            "zero chunk size",
            "[store]\nchunk_size = 0\n[projects.demo]\nproject_id = \"d\"\n",
        ),
        (
            "oversized chunk",
            "[store]\nchunk_size = 501\n[projects.demo]\nproject_id = \"d\"\n",
        ),
        (
            "zero poll interval",
            "[store]\npoll_interval_ms = 0\n[projects.demo]\nproject_id = \"d\"\n",
        ),
        (
            "unknown backend",
            "[store]\nbackend = \"sqlite\"\n[projects.demo]\nproject_id = \"d\"\n",
        ),
        ("missing project id", "[projects.demo]\napi_key = \"k\"\n"),
        ("not toml", "this is = = not toml"),
    ];

    let tmp = TempDir::new().unwrap();
    for (name, content) in cases {
        let path = write_config(&tmp, content);
        assert!(load_config(&path).is_err(), "case '{}' should fail", name);
    }
}

#[test]
fn example_config_is_valid() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config/folio.example.toml");
    let config = load_config(&path).unwrap();
    assert!(!config.projects.is_empty());
}
