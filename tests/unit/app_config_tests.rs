/*!
 * Tests for configuration loading, saving and validation.
 */

use lingosub::app_config::{Config, LogLevel};

use crate::common;

/// Test the documented defaults
#[test]
fn test_defaultConfig_shouldCarryDocumentedDefaults() {
    let config = Config::default();

    assert_eq!(config.api_host, "https://api.openai.com");
    assert_eq!(config.api_key, "");
    assert_eq!(config.model, "gpt-4o-mini");
    assert_eq!(config.source_language, "en");
    assert_eq!(config.target_language, "zh");
    assert_eq!(config.translation.batch_size, 40);
    assert_eq!(config.translation.temperature, 0.5);
    assert!(!config.translation.multi_phase);
    assert!(config.translation.terminology_consistency);
    assert!(config.subtitle.show_original);
    assert!(!config.subtitle.clean_punctuation);
    assert!(config.subtitle.netflix_style);
    assert_eq!(config.log_level, LogLevel::Info);
}

/// Test that a missing file is created with the defaults
#[test]
fn test_loadOrCreate_withMissingFile_shouldWriteDefaults() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = temp_dir.path().join("conf.json");

    let config = Config::load_or_create(&path).unwrap();

    assert!(path.exists());
    assert_eq!(config.model, "gpt-4o-mini");
}

/// Test loading a partial config file, with missing fields defaulted
#[test]
fn test_loadOrCreate_withPartialFile_shouldFillDefaults() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(
        temp_dir.path(),
        "conf.json",
        r#"{"api_key": "sk-test", "translation": {"batch_size": 10}}"#,
    )
    .unwrap();

    let config = Config::load_or_create(&path).unwrap();

    assert_eq!(config.api_key, "sk-test");
    assert_eq!(config.translation.batch_size, 10);
    assert_eq!(config.translation.temperature, 0.5);
    assert_eq!(config.target_language, "zh");
}

/// Test that invalid JSON is an error, not silently defaulted
#[test]
fn test_loadOrCreate_withInvalidJson_shouldFail() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(temp_dir.path(), "conf.json", "{not json").unwrap();

    assert!(Config::load_or_create(&path).is_err());
}

/// Test saving into a directory that does not exist yet
#[test]
fn test_save_shouldCreateParentDirectories() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = temp_dir.path().join("nested").join("conf.json");

    Config::default().save(&path).unwrap();

    assert!(path.exists());
}

/// Test the validation rules
#[test]
fn test_validate_shouldRejectBadValues() {
    let mut config = Config::default();
    assert!(config.validate().is_err(), "empty api_key must be rejected");

    config.api_key = "sk-test".to_string();
    assert!(config.validate().is_ok());

    config.translation.batch_size = 0;
    assert!(config.validate().is_err());
    config.translation.batch_size = 40;

    config.translation.temperature = 3.0;
    assert!(config.validate().is_err());
    config.translation.temperature = 0.5;

    config.translation.delay_secs = -1.0;
    assert!(config.validate().is_err());
    config.translation.delay_secs = 1.0;

    config.model = " ".to_string();
    assert!(config.validate().is_err());
}
