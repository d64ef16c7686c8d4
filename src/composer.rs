/*!
 * Final SRT composition from cues and their translation records.
 *
 * The composer is the last line of defense: whatever the pipelines
 * left in the records, the output file gets exactly one well-formed
 * block per surviving cue. A record that is empty, parrots the source
 * text back, or still reads like model boilerplate is replaced with a
 * visible placeholder ahead of the source text rather than silently
 * passed through, so a human reviewer can grep for it. A cue whose
 * rendered content is nothing but the placeholder is dropped.
 */

use std::path::Path;

use anyhow::Result;
use log::{debug, warn};

use crate::checkpoint::TranslationRecord;
use crate::response_parser;
use crate::subtitle_processor::{
    self, clean_punctuation, count_cjk_chars, renumber, SubtitleCue,
};

/// Placeholder written for cues without a usable translation.
///
/// Also what the correction sweep looks for, so a placeholder that
/// survives to a later run is picked up again.
pub const UNTRANSLATED_PLACEHOLDER: &str = "[未翻译]";

/// Output shaping options
#[derive(Debug, Clone, Default)]
pub struct ComposeOptions {
    /// Append the source text under each translation
    pub show_original: bool,

    /// Replace sentence punctuation with spaces, Netflix style
    pub clean_punctuation: bool,
}

/// Build the output cue list from the source cues and their records.
///
/// Always one output cue per input cue with usable content; cues whose
/// source and translation are both blank are dropped and the survivors
/// renumbered.
pub fn compose(
    cues: &[SubtitleCue],
    records: &[TranslationRecord],
    options: &ComposeOptions,
) -> Vec<SubtitleCue> {
    let mut composed: Vec<SubtitleCue> = Vec::with_capacity(cues.len());

    for (position, cue) in cues.iter().enumerate() {
        let record = records.get(position);
        let translation = finalize_translation(
            record.map(TranslationRecord::translation).unwrap_or(""),
            &cue.content,
        );

        let translation = if options.clean_punctuation {
            clean_punctuation(&translation)
        } else {
            translation
        };

        let content = if options.show_original {
            // Bilingual block: translation above, source below. The
            // refinement phase may carry a reformatted source line.
            let original = record
                .and_then(TranslationRecord::original)
                .unwrap_or(&cue.content);
            format!("{}\n{}", translation, original)
        } else {
            translation
        };

        if !has_renderable_content(&content) {
            debug!("Dropping contentless cue at position {}", position + 1);
            continue;
        }

        composed.push(SubtitleCue::new(0, cue.start_ms, cue.end_ms, content));
    }

    if composed.len() < cues.len() {
        warn!("Dropped {} contentless cues", cues.len() - composed.len());
    }

    renumber(&mut composed);
    composed
}

/// Compose and write the final SRT file
pub fn write_output(
    cues: &[SubtitleCue],
    records: &[TranslationRecord],
    options: &ComposeOptions,
    path: &Path,
) -> Result<Vec<SubtitleCue>> {
    let composed = compose(cues, records, options);
    subtitle_processor::write_srt_file(&composed, path)?;
    Ok(composed)
}

/// Reduce a raw record translation to output-worthy text or the
/// placeholder.
fn finalize_translation(translation: &str, source: &str) -> String {
    let trimmed = translation.trim();
    if trimmed.is_empty() {
        return untranslated(source);
    }

    // A translation identical to its source means the model echoed the
    // input back.
    if !source.trim().is_empty() && trimmed.eq_ignore_ascii_case(source.trim()) {
        debug!("Translation echoes source text, replacing with placeholder");
        return untranslated(source);
    }

    if response_parser::is_boilerplate(trimmed) {
        debug!("Translation still reads as boilerplate, replacing with placeholder");
        return untranslated(source);
    }

    // Last-chance rescue for explanatory prose that slipped through
    // the parser.
    if count_cjk_chars(trimmed) > response_parser::DENSITY_THRESHOLD
        && response_parser::is_explanation_text(trimmed)
    {
        let extracted = response_parser::extract_valid_translation(trimmed);
        if !extracted.trim().is_empty() {
            debug!("Rescued translation from explanatory prose");
            return extracted;
        }
        return untranslated(source);
    }

    trimmed.to_string()
}

/// Placeholder followed by the source text, so the viewer still sees
/// the dialogue and the line stays greppable.
pub fn untranslated(source: &str) -> String {
    let source = source.trim();
    if source.is_empty() {
        UNTRANSLATED_PLACEHOLDER.to_string()
    } else {
        format!("{} {}", UNTRANSLATED_PLACEHOLDER, source)
    }
}

/// A cue renders only when some line carries text beyond the
/// untranslated marker.
fn has_renderable_content(content: &str) -> bool {
    if !content.contains("未翻译") {
        return !content.trim().is_empty();
    }
    content.lines().any(|line| {
        !line
            .replace(UNTRANSLATED_PLACEHOLDER, "")
            .replace("未翻译", "")
            .trim()
            .is_empty()
    })
}
