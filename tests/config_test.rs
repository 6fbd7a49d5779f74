//! Layered configuration loading.

use mode_pyramid::config::PyramidConfig;
use mode_pyramid::{Downsampler, PyramidError, Strategy};
use serial_test::serial;
use std::path::PathBuf;

fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("pyramid.toml");
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
#[serial]
fn test_full_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
        [application]
        name = "pyramid test"
        log_level = "debug"
        log_format = "json"

        [engine]
        workers = 3
        strategy = "rescan"

        [output]
        directory = "levels"
        timestamped = false
        write_source = false

        [synth]
        max_value = 255
        seed = 7
        "#,
    );

    let config = PyramidConfig::load_from(&path).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.application.name, "pyramid test");
    assert_eq!(config.output.directory, PathBuf::from("levels"));
    assert!(!config.output.timestamped);

    let engine = Downsampler::from_config(&config.engine).unwrap();
    assert_eq!(engine.workers(), 3);
    assert_eq!(engine.strategy(), Strategy::Rescan);
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[engine]\nworkers = 3\n");

    std::env::set_var("MODE_PYRAMID_ENGINE__WORKERS", "6");
    std::env::set_var("MODE_PYRAMID_APPLICATION__LOG_LEVEL", "warn");
    let result = PyramidConfig::load_from(&path);
    std::env::remove_var("MODE_PYRAMID_ENGINE__WORKERS");
    std::env::remove_var("MODE_PYRAMID_APPLICATION__LOG_LEVEL");

    let config = result.unwrap();
    assert_eq!(config.engine.workers, 6);
    assert_eq!(config.application.log_level, "warn");
}

#[test]
#[serial]
fn test_validation_rejects_bad_log_level() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[application]\nlog_level = \"chatty\"\n");

    let config = PyramidConfig::load_from(&path).unwrap();
    let err = config.validate().unwrap_err();
    assert!(matches!(err, PyramidError::Configuration(_)));
    assert!(err.to_string().contains("chatty"));
}

#[test]
#[serial]
fn test_wrong_type_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[engine]\nworkers = \"many\"\n");
    assert!(matches!(
        PyramidConfig::load_from(&path),
        Err(PyramidError::Config(_))
    ));
}
