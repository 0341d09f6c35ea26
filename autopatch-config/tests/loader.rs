use std::{collections::HashMap, fs, time::Duration};

use autopatch_config::{
    ConfigGuardRailError, ConfigLoadError, ConfigLoader, EnvConfig,
    constants::{DEFAULT_HOST, DEFAULT_PORT},
};
use tempfile::tempdir;

fn env_from(pairs: &[(&str, &str)]) -> EnvConfig {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    EnvConfig::gather_with(|key| vars.get(key).cloned())
}

const FILE: &str = r#"
dev_mode = false

[server]
host = "0.0.0.0"
port = 8088

[auth]
password_pepper = "a-file-pepper-that-is-long-enough"
session_ttl = "30m"
required = true

[finder]
timeout = "45s"
crash_marker = "BOOM"
probe_fallback = false

[workspace]
root = "/tmp/autopatch-runs"
"#;

#[test]
fn file_values_fill_in_defaults() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("autopatch.toml");
    fs::write(&path, FILE).expect("write config");

    let load = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(EnvConfig::default(), false)
        .expect("load config");
    let config = load.config;

    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 8088);
    assert_eq!(config.auth.session_ttl, Duration::from_secs(30 * 60));
    assert_eq!(config.finder.timeout, Duration::from_secs(45));
    assert_eq!(config.finder.crash_marker, "BOOM");
    assert!(!config.finder.probe_fallback);
    assert_eq!(config.metadata.config_path.as_deref(), Some(path.as_path()));
    assert!(!config.auth.is_default_pepper());
}

#[test]
fn environment_overrides_file() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("autopatch.toml");
    fs::write(&path, FILE).expect("write config");

    let env = env_from(&[
        ("AUTOPATCH_PORT", "9000"),
        ("AUTOPATCH_AUTH_REQUIRED", "false"),
        ("AUTOPATCH_API_KEY", "sk-test"),
    ]);
    let load = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(env, false)
        .expect("load config");

    assert_eq!(load.config.server.host, "0.0.0.0");
    assert_eq!(load.config.server.port, 9000);
    assert!(!load.config.auth.required);
    assert_eq!(load.config.remote.api_key.as_deref(), Some("sk-test"));
    assert!(
        load.warnings
            .items
            .iter()
            .any(|w| w.message.contains("authentication is disabled"))
    );
}

#[test]
fn defaults_apply_without_a_config_file() {
    let env = env_from(&[("AUTOPATCH_CONFIG", "")]);
    let load = ConfigLoader::new()
        .load_with_env(env, false)
        .expect("load defaults");

    // The working directory may carry an autopatch.toml during local runs.
    if load.config.metadata.config_path.is_none() {
        assert_eq!(load.config.server.host, DEFAULT_HOST);
        assert_eq!(load.config.server.port, DEFAULT_PORT);
        assert!(load.config.auth.is_default_pepper());
        assert!(
            load.warnings
                .items
                .iter()
                .any(|w| w.message.contains("placeholder"))
        );
    }
}

#[test]
fn missing_explicit_config_is_an_error() {
    let dir = tempdir().expect("tempdir");
    let err = ConfigLoader::new()
        .with_config_path(dir.path().join("nope.toml"))
        .load_with_env(EnvConfig::default(), false)
        .expect_err("missing file");
    assert!(matches!(err, ConfigLoadError::MissingConfig { .. }));
}

#[test]
fn invalid_duration_is_reported_with_field() {
    let env = env_from(&[("AUTOPATCH_SESSION_TTL", "forever")]);
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("autopatch.toml");
    fs::write(&path, "").expect("write config");

    let err = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(env, false)
        .expect_err("bad duration");
    match err {
        ConfigLoadError::InvalidDuration { field, value, .. } => {
            assert_eq!(field, "auth.session_ttl");
            assert_eq!(value, "forever");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn short_pepper_is_rejected() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("autopatch.toml");
    fs::write(&path, "").expect("write config");

    let env = env_from(&[("AUTOPATCH_PASSWORD_PEPPER", "short")]);
    let err = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(env, false)
        .expect_err("weak pepper");
    assert!(matches!(
        err,
        ConfigLoadError::GuardRail(ConfigGuardRailError::WeakSecret { .. })
    ));
}

#[test]
fn workflow_loads_downgrade_front_end_checks_to_warnings() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("autopatch.toml");
    fs::write(&path, "").expect("write config");

    let env = env_from(&[
        ("AUTOPATCH_PASSWORD_PEPPER", "short"),
        ("AUTOPATCH_CORS_ALLOWED_ORIGINS", "*"),
    ]);
    let load = ConfigLoader::new()
        .with_config_path(&path)
        .workflow_only()
        .load_with_env(env, false)
        .expect("workflow load tolerates front-end settings");
    assert!(
        load.warnings
            .items
            .iter()
            .any(|w| w.message.contains("AUTOPATCH_PASSWORD_PEPPER"))
    );
}

#[test]
fn workflow_loads_still_reject_zero_arg_size() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("autopatch.toml");
    fs::write(&path, "[finder]\narg_size = 0\n").expect("write config");

    let err = ConfigLoader::new()
        .with_config_path(&path)
        .workflow_only()
        .load_with_env(EnvConfig::default(), false)
        .expect_err("zero arg size");
    assert!(matches!(
        err,
        ConfigLoadError::GuardRail(ConfigGuardRailError::InvalidArgSize)
    ));
}

#[test]
fn wildcard_cors_requires_dev_mode() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("autopatch.toml");
    fs::write(&path, "").expect("write config");

    let env = env_from(&[("AUTOPATCH_CORS_ALLOWED_ORIGINS", "*")]);
    let err = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(env, false)
        .expect_err("wildcard cors");
    assert!(matches!(
        err,
        ConfigLoadError::GuardRail(ConfigGuardRailError::DangerousCorsWildcard)
    ));

    let env = env_from(&[
        ("AUTOPATCH_CORS_ALLOWED_ORIGINS", "*"),
        ("AUTOPATCH_DEV_MODE", "true"),
    ]);
    ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(env, false)
        .expect("dev mode allows wildcard");
}

#[test]
fn unknown_keys_fail_to_parse() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("autopatch.toml");
    fs::write(&path, "[server]\nhost = \"x\"\nworkers = 4\n").expect("write config");

    let err = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(EnvConfig::default(), false)
        .expect_err("unknown key");
    assert!(matches!(err, ConfigLoadError::Parse { .. }));
}

#[test]
fn shipped_example_config_loads() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../autopatch.example.toml");
    let load = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(EnvConfig::default(), false)
        .expect("example config loads");
    assert_eq!(load.config.server.port, 3000);
    assert_eq!(load.config.finder.arg_size, 4);
}
