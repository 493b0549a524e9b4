//! Integration tests for loading and saving model configs.

use acoustic_core::{AcousticError, Architecture, ModelConfig};

#[test]
fn test_preset_survives_json_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("final.json");

    let config = Architecture::Final.default_config(13);
    config.save(&path).expect("save config");

    let loaded = ModelConfig::from_file(&path).expect("load config");
    assert_eq!(loaded, config);
    assert_eq!(
        loaded.output_length().apply(Some(1000)).unwrap(),
        config.output_length().apply(Some(1000)).unwrap()
    );
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = ModelConfig::from_file(dir.path().join("missing.json")).unwrap_err();
    assert!(matches!(err, AcousticError::Io(_)));
}

#[test]
fn test_invalid_padding_is_json_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("bad.json");
    std::fs::write(
        &path,
        r#"{"name": "bad", "input_dim": 13, "stages": [
            {"kind": "conv1d", "name": "c", "filters": 29, "kernel_size": 3, "padding": "reflect"}
        ]}"#,
    )
    .unwrap();

    let err = ModelConfig::from_file(&path).unwrap_err();
    assert!(matches!(err, AcousticError::Json(_)));
}
