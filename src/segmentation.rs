use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::subtitle_processor::{SubtitleCue, renumber};

// @module: Cue segmentation before translation
//
// Pure transformations over the cue list: hearing-impaired cleanup,
// similar-consecutive merge, short-cue merge and length balancing.
// Every stage renumbers cues 1..N on exit.

/// Tunable thresholds for the segmentation stages.
///
/// The defaults are empirically tuned; override individual fields when
/// a different material calls for it.
#[derive(Debug, Clone)]
pub struct SegmentationOptions {
    /// Max gap between identical consecutive cues that still merges (seconds)
    pub similar_gap_secs: f64,
    /// Max gap between members of a short-cue group (seconds)
    pub short_gap_secs: f64,
    /// Trimmed length at or below which a cue counts as short (chars)
    pub short_cue_max_chars: usize,
    /// Max total duration of a merged short-cue group (seconds)
    pub group_duration_secs: f64,
    /// Soft cap on merged content length; groups beyond twice this are bisected
    pub max_word_per_sub: usize,
    /// Advisory minimum cue length for length balancing (chars)
    pub min_chars: usize,
    /// Hard maximum cue length for length balancing (chars)
    pub max_chars: usize,
}

impl Default for SegmentationOptions {
    fn default() -> Self {
        SegmentationOptions {
            similar_gap_secs: 1.0,
            short_gap_secs: 0.5,
            short_cue_max_chars: 3,
            group_duration_secs: 5.0,
            max_word_per_sub: 25,
            min_chars: 10,
            max_chars: 42,
        }
    }
}

// Hearing-impaired annotation patterns, applied in order
static DASH_BRACKET_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*-\s*\[.*?\]").unwrap());
static DASH_BRACKET: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*-\s*\[.*?\]").unwrap());
static BRACKETED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[.*?\]").unwrap());
static PARENTHESIZED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(.*?\)").unwrap());
static STARRED_OR_HASHED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[*#].*?[*#]").unwrap());
static DASH_SOUND_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)^\s*-\s*(音乐|音效|笑声|掌声|叹息|喘息|脚步声|门响|电话铃|引擎声|Music|Sound|Laughter|Applause|Sighs|Breathing|Footsteps|Door|Phone|Engine)$",
    )
    .unwrap()
});
static SOUND_WORD_CJK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^(?:音乐|音效|笑声|掌声|叹息|喘息|脚步声|门响|电话铃|引擎声)$").unwrap()
});
static SOUND_WORD_LATIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^(?:Music|Sound|Laughter|Applause|Sighs|Breathing|Footsteps|Door|Phone|Engine)$")
        .unwrap()
});
static LONE_DASH_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*-\s*$").unwrap());
static ONLY_DASHES: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(-\s*)+$").unwrap());

/// Strip hearing-impaired annotations and sound-effect tokens.
///
/// Returns an empty string when nothing but annotations remains; the
/// caller drops such cues entirely.
pub fn remove_hearing_impaired(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    // A cue made only of "- [..]" lines is dropped wholesale
    if DASH_BRACKET_LINE.is_match(text) {
        let all_dash_hi = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .all(|line| DASH_BRACKET_LINE.is_match(line.trim()));
        if all_dash_hi {
            return String::new();
        }
    }

    let mut cleaned = DASH_BRACKET.replace_all(text, "").into_owned();
    cleaned = BRACKETED.replace_all(&cleaned, "").into_owned();
    cleaned = PARENTHESIZED.replace_all(&cleaned, "").into_owned();
    cleaned = STARRED_OR_HASHED.replace_all(&cleaned, "").into_owned();
    cleaned = DASH_SOUND_WORD.replace_all(&cleaned, "").into_owned();
    cleaned = SOUND_WORD_CJK.replace_all(&cleaned, "").into_owned();
    cleaned = SOUND_WORD_LATIN.replace_all(&cleaned, "").into_owned();

    let cleaned = cleaned.trim();
    let cleaned = LONE_DASH_LINE.replace_all(cleaned, "").into_owned();

    if ONLY_DASHES.is_match(cleaned.trim()) {
        return String::new();
    }

    cleaned.trim().to_string()
}

/// Apply hearing-impaired cleanup to every cue and drop cues left empty
pub fn strip_hearing_impaired(mut cues: Vec<SubtitleCue>) -> Vec<SubtitleCue> {
    let before = cues.len();
    for cue in &mut cues {
        cue.content = remove_hearing_impaired(&cue.content);
    }
    cues.retain(|cue| !cue.content.trim().is_empty());
    if cues.len() != before {
        debug!("Dropped {} annotation-only cues", before - cues.len());
    }
    renumber(&mut cues);
    cues
}

fn gap_secs(prev_end_ms: u64, next_start_ms: u64) -> f64 {
    (next_start_ms as i64 - prev_end_ms as i64) as f64 / 1000.0
}

/// Merge consecutive cues with byte-identical trimmed content when the
/// gap between them is within `options.similar_gap_secs`.
pub fn merge_similar_consecutive(
    cues: Vec<SubtitleCue>,
    options: &SegmentationOptions,
) -> Vec<SubtitleCue> {
    if cues.len() < 2 {
        return cues;
    }

    let mut merged: Vec<SubtitleCue> = Vec::with_capacity(cues.len());
    let mut i = 0;

    while i < cues.len() {
        let mut accumulator = cues[i].clone();

        let mut next_index = i + 1;
        while next_index < cues.len() {
            let next = &cues[next_index];
            let time_diff = gap_secs(accumulator.end_ms, next.start_ms);

            if next.content.trim() == accumulator.content.trim()
                && time_diff <= options.similar_gap_secs
            {
                accumulator.end_ms = next.end_ms;
                next_index += 1;
            } else {
                break;
            }
        }

        merged.push(accumulator);
        i = next_index;
    }

    renumber(&mut merged);
    merged
}

/// Whether a group of consecutive cues qualifies for the short-cue merge
fn should_merge_group(group: &[SubtitleCue], options: &SegmentationOptions) -> bool {
    if group.len() <= 1 {
        return false;
    }

    let all_short = group
        .iter()
        .all(|cue| cue.content.trim().chars().count() <= options.short_cue_max_chars);
    if !all_short {
        return false;
    }

    for pair in group.windows(2) {
        if gap_secs(pair[0].end_ms, pair[1].start_ms) > options.short_gap_secs {
            return false;
        }
    }

    let total_duration =
        (group[group.len() - 1].end_ms as i64 - group[0].start_ms as i64) as f64 / 1000.0;
    total_duration <= options.group_duration_secs
}

/// Merge runs of very short cues into semantically whole cues.
///
/// Groups are formed while successive gaps stay within
/// `options.short_gap_secs`; a group merges only when every member is
/// short and the whole group fits inside `options.group_duration_secs`.
/// Groups whose concatenation exceeds `2 × max_word_per_sub` characters
/// are bisected and each half merged independently.
pub fn smart_merge_short_cues(
    cues: Vec<SubtitleCue>,
    options: &SegmentationOptions,
) -> Vec<SubtitleCue> {
    if cues.len() < 2 {
        return cues;
    }

    let mut result: Vec<SubtitleCue> = Vec::with_capacity(cues.len());
    let mut i = 0;

    while i < cues.len() {
        let mut j = i;
        while j + 1 < cues.len() && gap_secs(cues[j].end_ms, cues[j + 1].start_ms) <= options.short_gap_secs
        {
            j += 1;
        }
        let group = &cues[i..=j];

        if group.len() == 1 || !should_merge_group(group, options) {
            result.push(cues[i].clone());
            i += 1;
            continue;
        }

        let merged_content: String = group.iter().map(|cue| cue.content.trim()).collect();

        if merged_content.chars().count() > options.max_word_per_sub * 2 {
            let mid_point = group.len() / 2;
            result.extend(smart_merge_short_cues(group[..mid_point].to_vec(), options));
            result.extend(smart_merge_short_cues(group[mid_point..].to_vec(), options));
        } else {
            result.push(SubtitleCue {
                index: group[0].index,
                start_ms: group[0].start_ms,
                end_ms: group[group.len() - 1].end_ms,
                content: merged_content,
            });
        }

        i = j + 1;
    }

    renumber(&mut result);
    result
}

static SENTENCE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[。！？.!?]+").unwrap());
static COMMA_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[，,、]+").unwrap());

/// Split text at the given separator, keeping each separator attached to
/// the segment it terminates.
fn split_keeping_separators(text: &str, separator: &Regex) -> Vec<String> {
    let mut segments = Vec::new();
    let mut last_end = 0;

    for m in separator.find_iter(text) {
        let segment = &text[last_end..m.end()];
        if !segment.is_empty() {
            segments.push(segment.to_string());
        }
        last_end = m.end();
    }
    if last_end < text.len() {
        segments.push(text[last_end..].to_string());
    }

    segments
}

/// Force-split a single over-long segment at whitespace boundaries where
/// possible, otherwise at the raw character boundary.
fn force_split(text: &str, max_chars: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current: Vec<char> = text.chars().collect();

    while current.len() > max_chars {
        let head: String = current[..max_chars].iter().collect();
        match head.rfind(' ') {
            Some(byte_idx) if byte_idx > 0 => {
                let space_char_idx = head[..byte_idx].chars().count();
                let part: String = current[..space_char_idx].iter().collect();
                parts.push(part.trim().to_string());
                current = current[space_char_idx..]
                    .iter()
                    .collect::<String>()
                    .trim()
                    .chars()
                    .collect();
            }
            _ => {
                parts.push(current[..max_chars].iter().collect());
                current = current[max_chars..].to_vec();
            }
        }
    }
    if !current.is_empty() {
        parts.push(current.iter().collect());
    }

    parts
}

/// Split over-long cues at sentence breaks, then commas, then forcibly,
/// assigning each part a prorated time slice.
///
/// The first part keeps the original start, the final part keeps the
/// original end exactly, and consecutive parts are contiguous.
pub fn balance_cue_length(
    cues: Vec<SubtitleCue>,
    options: &SegmentationOptions,
) -> Vec<SubtitleCue> {
    let max_chars = options.max_chars;
    let mut result: Vec<SubtitleCue> = Vec::with_capacity(cues.len());

    for cue in cues {
        let content = cue.content.trim().to_string();
        let content_chars = content.chars().count();

        if content_chars <= max_chars {
            result.push(cue);
            continue;
        }

        let mut sentences = split_keeping_separators(&content, &SENTENCE_BREAK);
        if sentences.is_empty() {
            sentences = vec![content.clone()];
        }

        if sentences.len() == 1 && sentences[0].chars().count() > max_chars {
            let comma_parts = split_keeping_separators(&sentences[0], &COMMA_BREAK);
            if !comma_parts.is_empty() {
                sentences = comma_parts;
            }
        }

        if sentences.len() == 1 && sentences[0].chars().count() > max_chars {
            sentences = force_split(&sentences[0], max_chars);
        }

        let duration_ms = cue.end_ms.saturating_sub(cue.start_ms);
        let mut current_content = String::new();
        let mut start_ms = cue.start_ms;
        let mut consumed_chars = 0usize;

        for sentence in &sentences {
            if sentence.is_empty() {
                continue;
            }

            if current_content.chars().count() + sentence.chars().count() <= max_chars {
                if !current_content.is_empty()
                    && sentence.chars().next().is_some_and(|c| c.is_alphabetic())
                {
                    current_content.push(' ');
                }
                current_content.push_str(sentence);
            } else {
                if !current_content.is_empty() {
                    let progress = if content_chars > 0 {
                        consumed_chars as f64 / content_chars as f64
                    } else {
                        0.5
                    };
                    let end_ms = cue.start_ms + (duration_ms as f64 * progress) as u64;

                    result.push(SubtitleCue {
                        index: cue.index,
                        start_ms,
                        end_ms,
                        content: current_content.clone(),
                    });
                    start_ms = end_ms;
                }
                current_content = sentence.clone();
            }
            consumed_chars += sentence.chars().count();
        }

        if !current_content.is_empty() {
            result.push(SubtitleCue {
                index: cue.index,
                start_ms,
                end_ms: cue.end_ms,
                content: current_content,
            });
        }
    }

    renumber(&mut result);
    result
}

/// Run the full segmentation pipeline in order: hearing-impaired
/// cleanup, similar-consecutive merge, short-cue merge, length
/// balancing.
pub fn segment(cues: Vec<SubtitleCue>, options: &SegmentationOptions) -> Vec<SubtitleCue> {
    let cues = strip_hearing_impaired(cues);
    let cues = merge_similar_consecutive(cues, options);
    let cues = smart_merge_short_cues(cues, options);
    balance_cue_length(cues, options)
}
