use std::env;
use std::fs;

use serial_test::serial;
use tempfile::TempDir;

use super::load_config;
use super::settings::Settings;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 8080);
    assert_eq!(settings.server.path, "/ws");
    assert_eq!(settings.bridge.ping_interval_ms, 1000);
    assert_eq!(settings.bridge.request_delay_ms, 5000);
    assert_eq!(settings.bridge.reply_timeout_ms, 10_000);
    assert_eq!(settings.log.level, "info");
}

#[test]
#[serial]
fn test_load_config_without_sources_uses_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");

    let cfg = load_config();

    env::set_current_dir(orig).expect("restore cwd");
    let cfg = cfg.expect("load_config failed");
    assert_eq!(cfg.server.port, 8080);
    assert_eq!(cfg.log.level, "info");
}

#[test]
#[serial]
fn test_load_config_from_file_overrides_defaults() {
    // load_config reads config/default.toml relative to the cwd
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");

    fs::create_dir_all("config").expect("create config dir");
    let toml = r#"
        [server]
        host = "0.0.0.0"
        port = 9000

        [bridge]
        ping_interval_ms = 250
    "#;
    fs::write("config/default.toml", toml).expect("write config file");

    let cfg = load_config();

    env::set_current_dir(orig).expect("restore cwd");
    let cfg = cfg.expect("load_config failed");
    assert_eq!(cfg.server.host, "0.0.0.0");
    assert_eq!(cfg.server.port, 9000);
    assert_eq!(cfg.server.path, "/ws");
    assert_eq!(cfg.bridge.ping_interval_ms, 250);
    assert_eq!(cfg.bridge.request_delay_ms, 5000);
}

#[test]
#[serial]
fn test_load_config_from_env_overrides_defaults() {
    temp_env::with_vars(
        [
            ("BROKER__SERVER__PORT", Some("9100")),
            ("BROKER__BRIDGE__REPLY_TIMEOUT_MS", Some("1500")),
            ("BROKER__LOG__LEVEL", Some("debug")),
        ],
        || {
            let cfg = load_config().expect("load_config failed");
            assert_eq!(cfg.server.port, 9100);
            assert_eq!(cfg.bridge.reply_timeout_ms, 1500);
            assert_eq!(cfg.log.level, "debug");
            assert_eq!(cfg.server.host, "127.0.0.1");
        },
    );
}
