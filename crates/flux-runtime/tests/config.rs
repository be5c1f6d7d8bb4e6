//! Loading configuration and building a runtime from it.

use flux_runtime::config::{ConfigError, ConfigLoader};
use flux_runtime::{logging, Runtime, RuntimeError};
use flux_types::ErrorCode;
use serde_json::json;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_config(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("flux.toml");
    std::fs::write(&path, content).expect("write config");
    path
}

#[tokio::test]
async fn runtime_follows_file_config() {
    let temp = TempDir::new().expect("tempdir");
    let path = write_config(
        temp.path(),
        r#"
[runtime]
version = "2.1.0"
namespace = "billing"

[runtime.metadata]
owner = "payments"

[events]
persistence = true
retention_secs = 600

[hooks]
max_depth = 2

[logging]
filter = "warn,flux_runtime=debug"
"#,
    );
    let config = ConfigLoader::new()
        .with_config_file(&path)
        .skip_env_vars()
        .load()
        .expect("load");
    assert!(logging::env_filter(&config.logging).is_ok());

    let runtime = Runtime::from_config(&config);
    assert!(runtime.bus().is_persistence_enabled());
    assert!(!runtime.is_initialized());
    assert_eq!(runtime.options().namespace, "billing");

    runtime
        .initialize(config.runtime_options())
        .await
        .expect("initialize");
    let options = runtime.options();
    assert_eq!(options.version, "2.1.0");
    assert_eq!(options.metadata.get("owner"), Some(&json!("payments")));
    assert_eq!(runtime.extensions().config()["namespace"], json!("billing"));
}

#[test]
fn defaults_leave_persistence_off() {
    let config = ConfigLoader::new()
        .skip_config_file()
        .skip_env_vars()
        .load()
        .expect("load");
    let runtime = Runtime::from_config(&config);
    assert!(!runtime.bus().is_persistence_enabled());
    assert_eq!(runtime.options().namespace, "default");
}

#[test]
fn malformed_file_surfaces_as_runtime_error() {
    let temp = TempDir::new().expect("tempdir");
    let path = write_config(temp.path(), "[events\npersistence = ");

    let result: Result<_, RuntimeError> = ConfigLoader::new()
        .with_config_file(&path)
        .skip_env_vars()
        .load()
        .map_err(Into::into);
    let err = result.expect_err("malformed");
    assert_eq!(err.code(), "CONFIG_PARSE_FAILED");
}

// The only test in this binary that touches FLUX_* variables.
#[test]
fn env_overrides_file() {
    let temp = TempDir::new().expect("tempdir");
    let path = write_config(
        temp.path(),
        r#"
[runtime]
namespace = "from-file"

[events]
persistence = false
"#,
    );

    std::env::set_var("FLUX_NAMESPACE", "from-env");
    std::env::set_var("FLUX_PERSIST_EVENTS", "yes");
    std::env::set_var("FLUX_EVENT_RETENTION_SECS", "60");
    let loaded = ConfigLoader::new().with_config_file(&path).load();

    std::env::set_var("FLUX_PERSIST_EVENTS", "maybe");
    let invalid = ConfigLoader::new().with_config_file(&path).load();

    std::env::remove_var("FLUX_NAMESPACE");
    std::env::remove_var("FLUX_PERSIST_EVENTS");
    std::env::remove_var("FLUX_EVENT_RETENTION_SECS");

    let config = loaded.expect("load");
    assert_eq!(config.runtime.namespace, "from-env");
    assert!(config.events.persistence);
    assert_eq!(config.events.retention_secs, Some(60));
    assert!(Runtime::from_config(&config).bus().is_persistence_enabled());

    assert!(matches!(
        invalid,
        Err(ConfigError::InvalidEnvVar { ref name, .. }) if name == "FLUX_PERSIST_EVENTS"
    ));
}
