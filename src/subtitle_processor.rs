use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;

// @module: Cue model, SRT parsing/serialization and text utilities

// @const: SRT timestamp regex
static TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2}):(\d{2}):(\d{2})[,.](\d{3})\s*-->\s*(\d{1,2}):(\d{2}):(\d{2})[,.](\d{3})")
        .unwrap()
});

// @const: Punctuation class replaced by spaces when clean_punctuation is on
static PUNCTUATION_CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[,.!?;:，、。！？；：…~·"'“”‘’【】《》\-—*]"#).unwrap()
});

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

// @struct: Single timed subtitle cue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleCue {
    // @field: 1-based contiguous index
    pub index: usize,

    // @field: Start time in ms
    pub start_ms: u64,

    // @field: End time in ms
    pub end_ms: u64,

    // @field: Cue text, may be multi-line
    pub content: String,
}

impl SubtitleCue {
    pub fn new(index: usize, start_ms: u64, end_ms: u64, content: String) -> Self {
        SubtitleCue {
            index,
            start_ms,
            end_ms,
            content,
        }
    }

    // @creates: Validated cue
    // @validates: Time range and non-empty content
    pub fn new_validated(index: usize, start_ms: u64, end_ms: u64, content: String) -> Result<Self> {
        if end_ms <= start_ms {
            return Err(anyhow!(
                "Invalid time range: end time {} <= start time {}",
                end_ms,
                start_ms
            ));
        }

        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(anyhow!("Empty content for cue {}", index));
        }

        Ok(SubtitleCue {
            index,
            start_ms,
            end_ms,
            content: trimmed.to_string(),
        })
    }

    /// Parse an SRT timestamp (HH:MM:SS,mmm) to milliseconds
    pub fn parse_timestamp(timestamp: &str) -> Result<u64> {
        let parts: Vec<&str> = timestamp.split(&[':', ',', '.'][..]).collect();

        if parts.len() != 4 {
            return Err(anyhow!("Invalid timestamp format: {}", timestamp));
        }

        let hours: u64 = parts[0].trim().parse().context("Failed to parse hours")?;
        let minutes: u64 = parts[1].parse().context("Failed to parse minutes")?;
        let seconds: u64 = parts[2].parse().context("Failed to parse seconds")?;
        let millis: u64 = parts[3].parse().context("Failed to parse milliseconds")?;

        if minutes >= 60 || seconds >= 60 || millis >= 1000 {
            return Err(anyhow!("Invalid time components in timestamp: {}", timestamp));
        }

        Ok(hours * 3_600_000 + minutes * 60_000 + seconds * 1_000 + millis)
    }

    pub fn format_start_time(&self) -> String {
        format_timestamp(self.start_ms)
    }

    pub fn format_end_time(&self) -> String {
        format_timestamp(self.end_ms)
    }

    /// Duration of the cue in seconds
    pub fn duration_secs(&self) -> f64 {
        (self.end_ms.saturating_sub(self.start_ms)) as f64 / 1000.0
    }

    /// Formatted time range as shown in prompts, e.g. `00:00:01,000 --> 00:00:03,000`
    pub fn time_info(&self) -> String {
        format!("{} --> {}", self.format_start_time(), self.format_end_time())
    }
}

impl fmt::Display for SubtitleCue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.index)?;
        writeln!(f, "{} --> {}", self.format_start_time(), self.format_end_time())?;
        writeln!(f, "{}", self.content)?;
        writeln!(f)
    }
}

/// Format a timestamp in milliseconds to SRT format (HH:MM:SS,mmm)
pub fn format_timestamp(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1_000;
    let millis = ms % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
}

/// Short timecode used inside phase prompts (H:MM:SS.mmm)
pub fn format_timecode(seconds: f64) -> String {
    let total_ms = (seconds * 1000.0).round().max(0.0) as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) as f64 / 1000.0;
    format!("{}:{:02}:{:06.3}", hours, minutes, secs)
}

/// Renumber cues to a contiguous 1..N sequence.
///
/// Mandatory after every transformation that changes the cue count.
pub fn renumber(cues: &mut [SubtitleCue]) {
    for (i, cue) in cues.iter_mut().enumerate() {
        cue.index = i + 1;
    }
}

/// Count CJK ideographs in a string
pub fn count_cjk_chars(text: &str) -> usize {
    text.chars()
        .filter(|c| ('\u{4e00}'..='\u{9fff}').contains(c))
        .count()
}

/// Replace punctuation with spaces and collapse whitespace runs.
///
/// Applied to both original and translated text when the
/// `clean_punctuation` option is enabled.
pub fn clean_punctuation(text: &str) -> String {
    let replaced = PUNCTUATION_CLASS.replace_all(text, " ");
    WHITESPACE_RUN.replace_all(replaced.trim(), " ").to_string()
}

/// Parse SRT format string into cues.
///
/// Tolerant of malformed blocks: invalid entries are skipped with a
/// warning rather than failing the whole document. Entries are sorted by
/// start time and renumbered before being returned.
pub fn parse_srt_string(content: &str) -> Result<Vec<SubtitleCue>> {
    let mut cues: Vec<SubtitleCue> = Vec::new();

    let mut current_index: Option<usize> = None;
    let mut current_start_ms: Option<u64> = None;
    let mut current_end_ms: Option<u64> = None;
    let mut current_text = String::new();
    let mut line_count = 0;

    let mut push_current = |index: usize, start_ms: u64, end_ms: u64, text: &str| {
        if text.trim().is_empty() {
            warn!("Skipping empty cue {}", index);
            return;
        }
        match SubtitleCue::new_validated(index, start_ms, end_ms, text.trim().to_string()) {
            Ok(cue) => cues.push(cue),
            Err(e) => warn!("Skipping invalid cue {}: {}", index, e),
        }
    };

    for line in content.lines() {
        line_count += 1;
        let trimmed = line.trim().trim_start_matches('\u{feff}');

        if trimmed.is_empty() {
            if let (Some(index), Some(start_ms), Some(end_ms)) =
                (current_index, current_start_ms, current_end_ms)
            {
                if !current_text.is_empty() {
                    push_current(index, start_ms, end_ms, &current_text);
                    current_index = None;
                    current_start_ms = None;
                    current_end_ms = None;
                    current_text.clear();
                }
            }
            continue;
        }

        // Sequence number only opens a new block
        if current_index.is_none() && current_text.is_empty() {
            if let Ok(num) = trimmed.parse::<usize>() {
                current_index = Some(num);
                continue;
            }
        }

        if current_index.is_some() && current_start_ms.is_none() && current_end_ms.is_none() {
            if let Some(caps) = TIMESTAMP_REGEX.captures(trimmed) {
                match (parse_timestamp_to_ms(&caps, 1), parse_timestamp_to_ms(&caps, 5)) {
                    (Ok(start_ms), Ok(end_ms)) => {
                        current_start_ms = Some(start_ms);
                        current_end_ms = Some(end_ms);
                        continue;
                    }
                    _ => {
                        warn!("Invalid timestamp format at line {}: {}", line_count, trimmed);
                    }
                }
            }
        }

        if current_index.is_some() && current_start_ms.is_some() && current_end_ms.is_some() {
            if !current_text.is_empty() {
                current_text.push('\n');
            }
            current_text.push_str(trimmed);
        } else {
            warn!(
                "Unexpected text at line {} before sequence number or timestamp: {}",
                line_count, trimmed
            );
        }
    }

    if let (Some(index), Some(start_ms), Some(end_ms)) =
        (current_index, current_start_ms, current_end_ms)
    {
        if !current_text.is_empty() {
            push_current(index, start_ms, end_ms, &current_text);
        }
    }

    if cues.is_empty() {
        return Err(anyhow!("No valid subtitle cues were found in the SRT content"));
    }

    cues.sort_by_key(|cue| cue.start_ms);

    let overlap_count = cues
        .windows(2)
        .filter(|w| w[0].end_ms > w[1].start_ms)
        .count();
    if overlap_count > 0 {
        warn!("Found {} overlapping subtitle cues", overlap_count);
    }

    renumber(&mut cues);

    Ok(cues)
}

fn parse_timestamp_to_ms(caps: &regex::Captures, start_idx: usize) -> Result<u64> {
    let hours: u64 = caps
        .get(start_idx)
        .map_or(0, |m| m.as_str().parse().unwrap_or(0));
    let minutes: u64 = caps
        .get(start_idx + 1)
        .map_or(0, |m| m.as_str().parse().unwrap_or(0));
    let seconds: u64 = caps
        .get(start_idx + 2)
        .map_or(0, |m| m.as_str().parse().unwrap_or(0));
    let millis: u64 = caps
        .get(start_idx + 3)
        .map_or(0, |m| m.as_str().parse().unwrap_or(0));

    Ok((hours * 3600 + minutes * 60 + seconds) * 1000 + millis)
}

/// Serialize cues to a single SRT document string
pub fn compose_srt(cues: &[SubtitleCue]) -> String {
    let mut out = String::new();
    for cue in cues {
        out.push_str(&cue.to_string());
    }
    out
}

/// Write cues to an SRT file, creating the parent directory if needed
pub fn write_srt_file<P: AsRef<Path>>(cues: &[SubtitleCue], path: P) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let mut file = File::create(path)
        .with_context(|| format!("Failed to create subtitle file: {}", path.display()))?;

    for cue in cues {
        write!(file, "{}", cue)?;
    }

    Ok(())
}
