use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use chrono::Local;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

// @module: Durable per-batch translation progress
//
// The checkpoint file is the only durable state of a running job: it is
// rewritten whole after every batch and on stop, and the final output
// is composed exclusively from it. Single-writer; concurrent external
// readers are not supported.

/// One translated cue as stored in the checkpoint.
///
/// The single-phase pipeline produces bare strings; the final phase of
/// the multi-phase pipeline may also carry a resegmented original and a
/// recomputed time range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TranslationRecord {
    /// Structured record from the final translation phase
    Detailed {
        translation: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        original: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_info: Option<String>,
    },
    /// Plain translation text
    Text(String),
}

impl TranslationRecord {
    pub fn text(translation: impl Into<String>) -> Self {
        TranslationRecord::Text(translation.into())
    }

    /// The translation payload
    pub fn translation(&self) -> &str {
        match self {
            TranslationRecord::Text(text) => text,
            TranslationRecord::Detailed { translation, .. } => translation,
        }
    }

    /// The resegmented original, when the final phase produced one
    pub fn original(&self) -> Option<&str> {
        match self {
            TranslationRecord::Text(_) => None,
            TranslationRecord::Detailed { original, .. } => original.as_deref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.translation().trim().is_empty()
    }

    /// Replace the translation text, preserving any structured fields
    pub fn set_translation(&mut self, text: impl Into<String>) {
        match self {
            TranslationRecord::Text(t) => *t = text.into(),
            TranslationRecord::Detailed { translation, .. } => *translation = text.into(),
        }
    }
}

impl Default for TranslationRecord {
    fn default() -> Self {
        TranslationRecord::Text(String::new())
    }
}

/// Persisted checkpoint document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointState {
    /// Per-cue translations, index-aligned with the scheduled cue list
    pub translations: Vec<TranslationRecord>,

    /// Positions of cues whose translation failed, aligned with
    /// `translations`
    pub failed_indices: Vec<usize>,

    /// Wall-clock time of the last write
    pub timestamp: String,

    /// Number of cues scheduled for translation
    pub total: usize,

    /// Number of cues with a non-empty translation
    pub completed: usize,
}

impl CheckpointState {
    pub fn new(total: usize) -> Self {
        CheckpointState {
            translations: vec![TranslationRecord::default(); total],
            failed_indices: Vec::new(),
            timestamp: String::new(),
            total,
            completed: 0,
        }
    }

    fn refresh_completed(&mut self) {
        self.completed = self.translations.iter().filter(|r| !r.is_empty()).count();
    }
}

/// File-backed checkpoint store with whole-document rewrite on every
/// update.
pub struct CheckpointStore {
    path: PathBuf,
    state: CheckpointState,
}

impl CheckpointStore {
    /// Create a fresh store beside the output path, with a
    /// process-unique temporary name, and persist the empty state.
    pub fn create(output_path: &Path, total: usize) -> Result<Self> {
        let unix_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let file_name = format!(".temp_translations_{}.json", unix_time);

        let dir = output_path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

        let mut store = CheckpointStore {
            path: dir.join(file_name),
            state: CheckpointState::new(total),
        };
        store.persist()?;
        Ok(store)
    }

    /// Load an existing checkpoint file, e.g. for manual recovery
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read checkpoint file: {}", path.display()))?;
        let state: CheckpointState = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse checkpoint file: {}", path.display()))?;

        Ok(CheckpointStore {
            path: path.to_path_buf(),
            state,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &CheckpointState {
        &self.state
    }

    /// Record one translation by 0-based position. Does not persist;
    /// call `persist` once per batch.
    pub fn set_record(&mut self, position: usize, record: TranslationRecord) {
        if position >= self.state.translations.len() {
            self.state
                .translations
                .resize(position + 1, TranslationRecord::default());
        }
        self.state.translations[position] = record;
    }

    /// Mark 0-based cue positions as failed
    pub fn mark_failed(&mut self, indices: impl IntoIterator<Item = usize>) {
        for index in indices {
            if !self.state.failed_indices.contains(&index) {
                self.state.failed_indices.push(index);
            }
        }
        self.state.failed_indices.sort_unstable();
    }

    /// Clear a position from the failed set after a successful retry
    pub fn clear_failed(&mut self, index: usize) {
        self.state.failed_indices.retain(|&i| i != index);
    }

    pub fn failed_indices(&self) -> &[usize] {
        &self.state.failed_indices
    }

    /// Rewrite the whole checkpoint file
    pub fn persist(&mut self) -> Result<()> {
        self.state.refresh_completed();
        self.state.timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

        let json = serde_json::to_string_pretty(&self.state)
            .context("Failed to serialize checkpoint state")?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write checkpoint file: {}", self.path.display()))?;

        debug!(
            "Checkpoint persisted: {}/{} completed, {} failed",
            self.state.completed,
            self.state.total,
            self.state.failed_indices.len()
        );
        Ok(())
    }

    /// Reconcile the record count with the scheduled cue count before
    /// composition: pad with empty records (warned as a length
    /// mismatch) or truncate extras.
    pub fn finalize(&mut self, scheduled: usize) -> Result<&CheckpointState> {
        if self.state.translations.len() < scheduled {
            warn!(
                "Checkpoint holds {} records for {} scheduled cues; padding",
                self.state.translations.len(),
                scheduled
            );
            self.state
                .translations
                .resize(scheduled, TranslationRecord::default());
        } else if self.state.translations.len() > scheduled {
            warn!(
                "Checkpoint holds {} records for {} scheduled cues; truncating",
                self.state.translations.len(),
                scheduled
            );
            self.state.translations.truncate(scheduled);
        }

        self.persist()?;
        Ok(&self.state)
    }

    /// Remove the checkpoint file after a successful run
    pub fn remove(self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).with_context(|| {
                format!("Failed to remove checkpoint file: {}", self.path.display())
            })?;
        }
        Ok(())
    }
}
