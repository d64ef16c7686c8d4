/*!
 * Shared helpers for the test suite: temp files, sample subtitles and
 * scripted doubles for the chat gateway.
 */

pub mod mock_gateway;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tempfile::TempDir;

use lingosub::subtitle_processor::SubtitleCue;

/// Small but realistic SRT document used across tests
pub const SAMPLE_SRT: &str = "1\n00:00:01,000 --> 00:00:04,000\nThis is a test subtitle.\n\n2\n00:00:05,000 --> 00:00:08,000\nIt contains multiple entries.\n\n3\n00:00:09,000 --> 00:00:12,000\nFor testing purposes.\n";

/// Create a temporary directory for test artifacts
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Create a file with the given content inside the directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let path = dir.join(filename);
    fs::write(&path, content)?;
    Ok(path)
}

/// Create a three-entry SRT file inside the directory
pub fn create_test_subtitle(dir: &Path, filename: &str) -> Result<PathBuf> {
    create_test_file(dir, filename, SAMPLE_SRT)
}

/// Build evenly spaced cues from plain contents, 3s each with a 1s gap
pub fn make_cues(contents: &[&str]) -> Vec<SubtitleCue> {
    contents
        .iter()
        .enumerate()
        .map(|(i, content)| {
            SubtitleCue::new(
                i + 1,
                (i as u64) * 4000,
                (i as u64) * 4000 + 3000,
                content.to_string(),
            )
        })
        .collect()
}
