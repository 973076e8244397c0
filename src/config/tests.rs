use super::load_config;
use super::settings::{PartialLogSettings, PartialServerSettings, PartialSettings, Settings};
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "0.0.0.0");
    assert_eq!(settings.server.port, 3501);
    assert_eq!(settings.server.max_connections, 1000);
    assert_eq!(settings.server.static_path, "assets");
    assert_eq!(settings.log.level, "info");
    assert_eq!(settings.environment, "dev");
    assert_eq!(settings.address(), "0.0.0.0:3501");
}

#[test]
fn test_merge_keeps_defaults_for_missing_fields() {
    let partial = PartialSettings {
        log: Some(PartialLogSettings {
            level: Some("debug".to_string()),
        }),
        ..Default::default()
    };
    let settings = Settings::merge(partial);
    assert_eq!(settings.log.level, "debug");
    assert_eq!(settings.server.port, 3501);
    assert_eq!(settings.environment, "dev");
}

#[test]
#[serial]
fn load_config_from_env_overrides_defaults() {
    temp_env::with_vars(
        [
            ("APP_SERVER__PORT", Some("9100")),
            ("APP_LOG__LEVEL", Some("warn")),
            ("APP_ENVIRONMENT", Some("prod")),
        ],
        || {
            let cfg = load_config().expect("load_config failed");
            assert_eq!(cfg.server.port, 9100);
            assert_eq!(cfg.server.host, "0.0.0.0");
            assert_eq!(cfg.log.level, "warn");
            assert_eq!(cfg.environment, "prod");
        },
    );
}

#[test]
fn test_merge_prefers_nested_keys_over_flat_ones() {
    let partial = PartialSettings {
        server: Some(PartialServerSettings {
            port: Some(8000),
            ..Default::default()
        }),
        port: Some(9000),
        log_level: Some("debug".to_string()),
        static_path: Some("public".to_string()),
        ..Default::default()
    };
    let settings = Settings::merge(partial);
    assert_eq!(settings.server.port, 8000);
    assert_eq!(settings.log.level, "debug");
    assert_eq!(settings.server.static_path, "public");
}

#[test]
#[serial]
fn load_config_accepts_flat_env_names() {
    temp_env::with_vars(
        [
            ("APP_PORT", Some("9100")),
            ("APP_LOG_LEVEL", Some("debug")),
            ("APP_STATIC_PATH", Some("/srv/minichat")),
            ("APP_ENVIRONMENT", Some("prod")),
        ],
        || {
            let cfg = load_config().expect("load_config failed");
            assert_eq!(cfg.server.port, 9100);
            assert_eq!(cfg.log.level, "debug");
            assert_eq!(cfg.server.static_path, "/srv/minichat");
            assert_eq!(cfg.environment, "prod");
        },
    );
}

#[test]
#[serial]
fn load_config_from_file_overrides_defaults() {
    // load_config looks for config/default.toml relative to the cwd
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");

    fs::create_dir_all("config").expect("create config dir");
    let toml = r#"
        environment = "staging"

        [server]
        host = "127.0.0.1"
        port = 9000
        max_connections = 10
    "#;
    fs::write("config/default.toml", toml).expect("write config file");

    let cfg = load_config();
    env::set_current_dir(orig).expect("restore cwd");

    let cfg = cfg.expect("load_config failed");
    assert_eq!(cfg.server.host, "127.0.0.1");
    assert_eq!(cfg.server.port, 9000);
    assert_eq!(cfg.server.max_connections, 10);
    assert_eq!(cfg.log.level, "info");
    assert_eq!(cfg.environment, "staging");
}
