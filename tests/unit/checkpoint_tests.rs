/*!
 * Tests for the file-backed checkpoint store.
 */

use lingosub::checkpoint::{CheckpointStore, TranslationRecord};

use crate::common;

/// Test that creating a store writes an empty checkpoint beside the output
#[test]
fn test_create_shouldWriteCheckpointFileBesideOutput() {
    let temp_dir = common::create_temp_dir().unwrap();
    let output_path = temp_dir.path().join("movie.zh.srt");

    let store = CheckpointStore::create(&output_path, 3).unwrap();

    assert!(store.path().exists());
    assert!(store
        .path()
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with(".temp_translations_"));
    assert_eq!(store.state().total, 3);
    assert_eq!(store.state().translations.len(), 3);
    assert_eq!(store.state().completed, 0);
}

/// Test persisting records and loading them back
#[test]
fn test_persistThenLoad_shouldRoundTripRecords() {
    let temp_dir = common::create_temp_dir().unwrap();
    let output_path = temp_dir.path().join("movie.zh.srt");

    let mut store = CheckpointStore::create(&output_path, 3).unwrap();
    store.set_record(0, TranslationRecord::text("你好"));
    store.set_record(2, TranslationRecord::Detailed {
        translation: "世界".to_string(),
        original: Some("World".to_string()),
        time_info: Some("0:00:01.000 --> 0:00:03.000".to_string()),
    });
    store.mark_failed([1]);
    store.persist().unwrap();

    let loaded = CheckpointStore::load(store.path()).unwrap();
    assert_eq!(loaded.state().translations, store.state().translations);
    assert_eq!(loaded.state().failed_indices, vec![1]);
    assert_eq!(loaded.state().completed, 2);
    assert_eq!(loaded.state().total, 3);
}

/// Test that marking failure deduplicates and keeps positions sorted
#[test]
fn test_markFailed_shouldDeduplicateAndSort() {
    let temp_dir = common::create_temp_dir().unwrap();
    let output_path = temp_dir.path().join("out.srt");

    let mut store = CheckpointStore::create(&output_path, 5).unwrap();
    store.mark_failed([4, 1, 4, 2]);

    assert_eq!(store.failed_indices(), &[1, 2, 4]);
}

/// Test clearing a recovered position from the failed set
#[test]
fn test_clearFailed_shouldRemovePosition() {
    let temp_dir = common::create_temp_dir().unwrap();
    let output_path = temp_dir.path().join("out.srt");

    let mut store = CheckpointStore::create(&output_path, 5).unwrap();
    store.mark_failed([1, 3]);
    store.clear_failed(1);

    assert_eq!(store.failed_indices(), &[3]);
}

/// Test reconciling the record count before composition
#[test]
fn test_finalize_shouldPadOrTruncateToScheduledCount() {
    let temp_dir = common::create_temp_dir().unwrap();
    let output_path = temp_dir.path().join("out.srt");

    let mut short_store = CheckpointStore::create(&output_path, 2).unwrap();
    let state = short_store.finalize(4).unwrap();
    assert_eq!(state.translations.len(), 4);

    let mut long_store = CheckpointStore::create(&output_path, 5).unwrap();
    let state = long_store.finalize(3).unwrap();
    assert_eq!(state.translations.len(), 3);
}

/// Test that remove deletes the checkpoint file
#[test]
fn test_remove_shouldDeleteCheckpointFile() {
    let temp_dir = common::create_temp_dir().unwrap();
    let output_path = temp_dir.path().join("out.srt");

    let store = CheckpointStore::create(&output_path, 1).unwrap();
    let path = store.path().to_path_buf();
    assert!(path.exists());

    store.remove().unwrap();
    assert!(!path.exists());
}

/// Test that both record shapes survive JSON serialization untagged
#[test]
fn test_translationRecord_serde_shouldRoundTripBothShapes() {
    let text = TranslationRecord::text("你好");
    let json = serde_json::to_string(&text).unwrap();
    assert_eq!(json, "\"你好\"");
    assert_eq!(serde_json::from_str::<TranslationRecord>(&json).unwrap(), text);

    let detailed = TranslationRecord::Detailed {
        translation: "世界".to_string(),
        original: Some("World".to_string()),
        time_info: None,
    };
    let json = serde_json::to_string(&detailed).unwrap();
    assert!(json.contains("\"translation\""));
    assert!(!json.contains("time_info"));
    assert_eq!(
        serde_json::from_str::<TranslationRecord>(&json).unwrap(),
        detailed
    );
}
