//! Configuration loading from disk.
//!
//! The environment layer is read through a fixed map, so these tests do not
//! depend on the variables of the process running them.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use clanwatch::config::{AppConfig, ConfigError, Overrides};

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

const FILE: &str = r##"
    [roster]
    group_tag = "#FILE"
    token = "t0ken"

    [store]
    url = "rocksdb://from-file"

    [schedule]
    interval_secs = 120
"##;

#[test]
fn test_file_env_and_cli_layers() {
    let file = write_config(FILE);

    let overrides = Overrides {
        group_tag: Some("#CLI".to_string()),
        db_url: None,
        interval_secs: None,
    };
    let config = AppConfig::load_with(
        Some(file.path()),
        &overrides,
        env(&[
            ("CLANWATCH_GROUP_TAG", "#ENV"),
            ("CLANWATCH_DB_URL", "ws://db:8000"),
        ]),
    )
    .unwrap();

    assert_eq!(config.group_tag().unwrap().as_str(), "#CLI");
    assert_eq!(config.store.url, "ws://db:8000");
    assert_eq!(config.roster.token, "t0ken");
    assert_eq!(config.loop_config().interval, Duration::from_secs(120));
}

#[test]
fn test_file_only() {
    let file = write_config(FILE);

    let config = AppConfig::load_with(Some(file.path()), &Overrides::default(), env(&[])).unwrap();

    assert_eq!(config.group_tag().unwrap().as_str(), "#FILE");
    assert_eq!(config.store.url, "rocksdb://from-file");
}

#[test]
fn test_environment_alone_is_enough() {
    let config = AppConfig::load_with(
        None,
        &Overrides::default(),
        env(&[("CLANWATCH_GROUP_TAG", "#ENV"), ("CLANWATCH_TOKEN", "secret")]),
    )
    .unwrap();

    assert_eq!(config.group_tag().unwrap().as_str(), "#ENV");
    assert_eq!(config.store.url, "rocksdb://clanwatch.db");
}

#[test]
fn test_missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");

    let err = AppConfig::load_with(Some(&missing), &Overrides::default(), env(&[])).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn test_zero_interval_is_rejected() {
    let file = write_config(
        r##"
        [roster]
        group_tag = "#FILE"
        token = "t0ken"

        [schedule]
        interval_secs = 0
        "##,
    );

    let err = AppConfig::load_with(Some(file.path()), &Overrides::default(), env(&[])).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { .. }));
}

#[test]
fn test_missing_token_is_reported() {
    let file = write_config(
        r##"
        [roster]
        group_tag = "#FILE"
        "##,
    );

    let err = AppConfig::load_with(Some(file.path()), &Overrides::default(), env(&[])).unwrap_err();
    assert!(matches!(err, ConfigError::Missing(_)));
}
