//! Tests for config file resolution and loading
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate PLEXUNIFY_CONFIG are marked with #[serial].

use plexunify_common::config::{
    default_config_path, load_toml, resolve_config_path, LoggingConfig, CONFIG_ENV_VAR,
};
use plexunify_common::Error;
use serde::Deserialize;
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[derive(Debug, Deserialize)]
struct SampleConfig {
    #[serde(default)]
    logging: LoggingConfig,
    name: String,
}

#[test]
#[serial]
fn test_cli_argument_has_highest_priority() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/from-env.toml");

    let resolved = resolve_config_path(Some(Path::new("/tmp/from-cli.toml")), CONFIG_ENV_VAR).unwrap();
    assert_eq!(resolved, PathBuf::from("/tmp/from-cli.toml"));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_used_without_cli_argument() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/from-env.toml");

    let resolved = resolve_config_path(None, CONFIG_ENV_VAR).unwrap();
    assert_eq!(resolved, PathBuf::from("/tmp/from-env.toml"));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_blank_env_var_falls_back_to_default() {
    env::set_var(CONFIG_ENV_VAR, "   ");

    let resolved = resolve_config_path(None, CONFIG_ENV_VAR);
    let default = default_config_path();
    match (resolved, default) {
        (Ok(resolved), Ok(default)) => assert_eq!(resolved, default),
        (Err(_), Err(_)) => {} // No config dir on this platform
        (resolved, default) => panic!("mismatch: {:?} vs {:?}", resolved, default),
    }

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
fn test_default_path_ends_with_plexunify_config() {
    if let Ok(path) = default_config_path() {
        assert!(path.ends_with("plexunify/config.toml"));
    }
}

#[test]
fn test_load_toml_reads_file_and_applies_logging_default() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "name = \"catalog\"\n").unwrap();

    let config: SampleConfig = load_toml(&path).unwrap();
    assert_eq!(config.name, "catalog");
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_load_toml_missing_file_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("absent.toml");

    let result: Result<SampleConfig, Error> = load_toml(&path);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_load_toml_parse_failure_names_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "name = [unterminated").unwrap();

    let err = load_toml::<SampleConfig>(&path).unwrap_err();
    assert!(err.to_string().contains("broken.toml"));
}
