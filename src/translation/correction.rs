/*!
 * Error-correction sweep over finished translations.
 *
 * After a pipeline (and any retries) completes, some records can still
 * be visibly broken: they carry an untranslated marker or a leaked
 * `#n#` block header. Each flagged record is re-requested with ten
 * cues of context on either side, and the model answers with
 * `<translation index="n">` tags for just the lines it fixed. Applying
 * the same sweep twice is harmless: a fixed record no longer matches
 * the flag predicate.
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::checkpoint::TranslationRecord;
use crate::errors::TranslationError;
use crate::gateway::{ChatApi, ChatRequest};
use crate::subtitle_processor::{format_timecode, SubtitleCue};

use super::prompts;
use super::ProgressSink;

/// Cues of context included before and after a flagged cue
const CONTEXT_RADIUS: usize = 10;

const CORRECTION_TIMEOUT: Duration = Duration::from_secs(60);

/// Marker substring that flags a record as untranslated
pub const UNTRANSLATED_MARKER: &str = "未翻译";

static FIXED_TRANSLATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)<translation index="(\d+)">(.*?)</translation>"#).unwrap());

/// Whether a record needs the correction sweep
pub fn needs_correction(record: &TranslationRecord) -> bool {
    let translation = record.translation();
    translation.contains(UNTRANSLATED_MARKER) || translation.trim().starts_with('#')
}

/// Re-request every flagged record with surrounding context and apply
/// the fixes in place. Returns the number of records fixed.
pub async fn correct_flagged_translations(
    api: &dyn ChatApi,
    cues: &[SubtitleCue],
    records: &mut [TranslationRecord],
    delay_secs: f64,
    sink: &dyn ProgressSink,
    stop: &Arc<AtomicBool>,
) -> Result<usize, TranslationError> {
    if cues.is_empty() || records.is_empty() {
        return Ok(0);
    }

    let flagged: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, record)| needs_correction(record))
        .map(|(position, _)| position)
        .collect();

    if flagged.is_empty() {
        sink.progress("No broken translations found, skipping correction sweep");
        return Ok(0);
    }

    sink.progress(&format!(
        "Correction sweep: {} flagged translations",
        flagged.len()
    ));

    let mut fixed_count = 0;
    for position in flagged {
        if stop.load(Ordering::Relaxed) {
            sink.progress("Stop requested, ending correction sweep");
            break;
        }

        let context_start = position.saturating_sub(CONTEXT_RADIUS);
        let context_end = (position + CONTEXT_RADIUS + 1).min(cues.len());

        let blocks: Vec<String> = cues[context_start..context_end]
            .iter()
            .enumerate()
            .map(|(offset, cue)| {
                let cue_position = context_start + offset;
                let translation = records
                    .get(cue_position)
                    .map(TranslationRecord::translation)
                    .unwrap_or("");
                format!(
                    "{}\n{} --> {}\n{}\n{}\n",
                    cue_position + 1,
                    format_timecode(cue.start_ms as f64 / 1000.0),
                    format_timecode(cue.end_ms as f64 / 1000.0),
                    translation,
                    cue.content
                )
            })
            .collect();

        let pair = prompts::correction(&blocks.join("\n"));
        // The repair contract is embedded in one user turn so models
        // that ignore system messages still see it.
        let request = ChatRequest::new(api.model())
            .add_message("user", format!("{}\n\n{}", pair.system, pair.user))
            .timeout(CORRECTION_TIMEOUT);

        let response = match api.chat(request).await {
            Ok(response) => response,
            Err(e) => {
                sink.error(&format!("Correction of cue {} failed: {}", position + 1, e));
                continue;
            }
        };

        for caps in FIXED_TRANSLATION.captures_iter(&response) {
            let display_index: usize = match caps[1].parse() {
                Ok(index) => index,
                Err(_) => continue,
            };
            if display_index == 0 {
                continue;
            }
            let fixed_position = display_index - 1;
            let fixed_text = caps[2].trim();
            if fixed_text.is_empty() {
                continue;
            }

            if let Some(record) = records.get_mut(fixed_position) {
                debug!("Fixed translation {}: {}", display_index, fixed_text);
                record.set_translation(fixed_text);
                fixed_count += 1;
            }
        }

        if !stop.load(Ordering::Relaxed) {
            tokio::time::sleep(Duration::from_secs_f64(delay_secs)).await;
        }
    }

    sink.progress(&format!("Correction sweep fixed {} translations", fixed_count));
    Ok(fixed_count)
}
