use super::load_config;
use super::settings::{PartialSettings, Settings};
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "0.0.0.0");
    assert_eq!(settings.server.port, 8080);
    assert_eq!(settings.redis.port, 6379);
    assert_eq!(settings.broker.mailbox_capacity, 100);
    assert_eq!(settings.broker.topic_capacity, 1024);
    assert_eq!(settings.broker.heartbeat_secs, 10);
}

#[test]
fn test_empty_partial_merges_to_defaults() {
    let merged = PartialSettings::default().merge_defaults();
    assert_eq!(merged, Settings::default());
}

#[test]
fn test_redis_url() {
    let mut settings = Settings::default();
    assert_eq!(settings.redis.url(), "redis://127.0.0.1:6379/0");

    settings.redis.password = Some("s3cret".to_string());
    settings.redis.db = 2;
    assert_eq!(settings.redis.url(), "redis://:s3cret@127.0.0.1:6379/2");

    settings.redis.password = Some(String::new());
    assert_eq!(settings.redis.url(), "redis://127.0.0.1:6379/2");
}

#[test]
#[serial]
fn test_load_legacy_json_file() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("streaming-api.json");
    let json = r#"{
        "redis": { "host": "redis.internal", "password": "pw", "port": "6380", "db": 3 },
        "port": "9090"
    }"#;
    fs::write(&path, json).expect("write config file");

    let cfg = load_config(Some(path.as_path())).expect("load_config failed");
    assert_eq!(cfg.server.port, 9090);
    assert_eq!(cfg.redis.host, "redis.internal");
    assert_eq!(cfg.redis.port, 6380);
    assert_eq!(cfg.redis.password.as_deref(), Some("pw"));
    assert_eq!(cfg.redis.db, 3);
    assert_eq!(cfg.broker.queue_capacity, 256);
}

#[test]
#[serial]
fn test_load_toml_file_overrides_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("streamhub.toml");
    let toml = r#"
        [server]
        host = "127.0.0.1"
        port = 9000

        [broker]
        queue_capacity = 8
        heartbeat_secs = 0
    "#;
    fs::write(&path, toml).expect("write config file");

    let cfg = load_config(Some(path.as_path())).expect("load_config failed");
    assert_eq!(cfg.server.host, "127.0.0.1");
    assert_eq!(cfg.server.port, 9000);
    assert_eq!(cfg.broker.queue_capacity, 8);
    // zero periods are clamped
    assert_eq!(cfg.broker.heartbeat_secs, 1);
}

#[test]
#[serial]
fn test_env_overrides_file() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("streamhub.toml");
    fs::write(&path, "[server]\nport = 9000\n").expect("write config file");

    temp_env::with_vars(
        [
            ("STREAMHUB_SERVER__PORT", Some("9100")),
            ("STREAMHUB_REDIS__HOST", Some("cache")),
        ],
        || {
            let cfg = load_config(Some(path.as_path())).expect("load_config failed");
            assert_eq!(cfg.server.port, 9100);
            assert_eq!(cfg.redis.host, "cache");
        },
    );
}

#[test]
#[serial]
fn test_missing_explicit_file_is_an_error() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("absent.toml");
    assert!(load_config(Some(path.as_path())).is_err());
}
