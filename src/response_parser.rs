use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::subtitle_processor::count_cjk_chars;

// @module: Defensive parsing of free-form model output
//
// The model is asked for `[n] translation` lines and nothing else, but
// real responses carry explanatory preambles, alternate numbering
// schemes, merged or missing entries and stray commentary. Every
// detector here is a named entry in an ordered rule table so each rule
// can be unit-tested on its own. `parse_batch` never fails: it always
// returns exactly `expected_count` strings, leaving unrecoverable items
// empty for the caller to mark as failed.

/// CJK character count above which a single-line item is treated as
/// explanatory prose rather than a translation.
pub const DENSITY_THRESHOLD: usize = 25;

/// CJK character count above which a line is skipped entirely in the
/// no-marker line fallback.
pub const LINE_SKIP_THRESHOLD: usize = 30;

/// A numbered-item marker scheme, in priority order
struct MarkerScheme {
    regex: &'static Lazy<Regex>,
}

static BRACKET_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\s*(\d+)\s*\]").unwrap());
static DOTTED_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*(\d+)[\.。:：、]").unwrap());
static TRANSLATION_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*Translation\s+(\d+)\s*:").unwrap());
static LOCALIZED_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*翻译\s*(\d+)\s*[\.。:：、]").unwrap());

static MARKER_SCHEMES: &[MarkerScheme] = &[
    MarkerScheme { regex: &BRACKET_MARKER },
    MarkerScheme { regex: &DOTTED_MARKER },
    MarkerScheme { regex: &TRANSLATION_MARKER },
    MarkerScheme { regex: &LOCALIZED_MARKER },
];

// Markers for item 1 specifically, used to cut leading preamble
static FIRST_MARKER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?m)^\s*\[\s*1\s*\]").unwrap(),
        Regex::new(r"(?m)^\s*1[\.。:：、]").unwrap(),
        Regex::new(r"(?m)^\s*Translation\s+1\s*:").unwrap(),
        Regex::new(r"(?m)^\s*翻译\s*1\s*[\.。:：、]").unwrap(),
    ]
});

static ANY_NUMBER_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*\d+\s*[\.\]\):：、]").unwrap());

// Boilerplate openings that signal an explanatory response
static BOILERPLATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)^[\s\n]*(根据要求|根据您的要求|遵循规则|遵循您的规则|按照规则)[，,\s\n]").unwrap(),
        Regex::new(r"(?i)^[\s\n]*(我已|已经|现已)[对将把].*?(进行了|完成了|做了)[优校调修][整改善化]").unwrap(),
        Regex::new(r"(?i)^[\s\n]*这(是|里是)[修优校调]正[后的]*译文").unwrap(),
        Regex::new(r"(?i)^[\s\n]*Translation:").unwrap(),
        Regex::new(r"(?i)^[\s\n]*以下是[优修校][化正对]后的[字翻译]幕").unwrap(),
    ]
});

// Prefixes stripped from a response or a single item, in order
static RESPONSE_PREFIXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?is)^[\s\n]*根据时间轴和字幕长度要求[^，。\n]*[，。]?").unwrap(),
        Regex::new(r"(?is)^[\s\n]*最终翻译[\s\n]*").unwrap(),
        Regex::new(r"(?is)^[\s\n]*翻译结果[:：][\s\n]*").unwrap(),
        Regex::new(r"(?is)^[\s\n]*最终译文[:：][\s\n]*").unwrap(),
        Regex::new(r"(?is)^[\s\n]*译文[:：][\s\n]*").unwrap(),
        Regex::new(r"(?is)^[\s\n]*Translation:[\s\n]*").unwrap(),
        Regex::new(r"(?is)^[\s\n]*最终字幕[\s\n]*").unwrap(),
        Regex::new(r"(?is)^[\s\n]*Translated subtitle:[\s\n]*").unwrap(),
        Regex::new(r"(?is)^[\s\n]*优化后的翻译[:：][\s\n]*").unwrap(),
        Regex::new(r"(?is)^[\s\n]*修正后的翻译[:：][\s\n]*").unwrap(),
        Regex::new(r"(?is)^[\s\n]*字幕翻译[:：][\s\n]*").unwrap(),
        Regex::new(r"(?is)^[\s\n]*Final translation:[\s\n]*").unwrap(),
        Regex::new(r"(?is)^[\s\n]*以下是(最终)?(的)?翻译(结果)?[:：]?[\s\n]*").unwrap(),
        Regex::new(r"(?is)^[\s\n]*以下是(最终)?(的)?译文[:：]?[\s\n]*").unwrap(),
        Regex::new(r"(?is)^[\s\n]*这是(最终)?(的)?翻译(结果)?[:：]?[\s\n]*").unwrap(),
        Regex::new(r"(?is)^[\s\n]*这是(最终)?(的)?译文[:：]?[\s\n]*").unwrap(),
        Regex::new(r"(?is)^[\s\n]*下面是(最终)?(的)?翻译(结果)?[:：]?[\s\n]*").unwrap(),
        Regex::new(r"(?is)^[\s\n]*Here is the translation:[\s\n]*").unwrap(),
        Regex::new(r"(?is)^[\s\n]*Here is the subtitle:[\s\n]*").unwrap(),
        Regex::new(r"(?is)^[\s\n]*The optimized translation:[\s\n]*").unwrap(),
        Regex::new(r"(?is)^[\s\n]*根据(您|你)(提供的)?(规则|要求).*?(我|以下是)?.*?翻译(结果)?[:：]?[\s\n]*").unwrap(),
        Regex::new(r"(?is)^[\s\n]*(根据|按照|遵循).*?(要求|规则|标准).{0,50}(翻译|优化|调整)(结果)?[:：]?[\s\n]*").unwrap(),
        Regex::new(r"(?is)^[\s\n]*(我已|我已经|我对|我将).{0,30}(翻译|优化|调整).{0,50}[:：]?[\s\n]*").unwrap(),
        Regex::new(r"(?is)^[\s\n]*(以下|如下|下面)(是|为).{0,20}(翻译|结果|译文)([:：])?[\s\n]*").unwrap(),
        Regex::new(r"(?is)^[\s\n]*(确保|保持).{0,30}(语义|字幕|翻译).{0,50}[:：]?[\s\n]*").unwrap(),
    ]
});

static INLINE_NOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\(\[]注:.*?[\)\]]").unwrap());
static LEADING_ACCORDING_SENTENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\s\n]*根据[^。\n]+。").unwrap());
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static ITEM_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(翻译|译文|Translation)\s*[:：]").unwrap());
static SURROUNDING_QUOTES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^["“”「『』」'‘’]+|["“”「『』」'‘’]+$"#).unwrap()
});
static BRACKETED_NOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(.*?\)|\[.*?\]").unwrap());

static COLON_TAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"[:：](.+)$").unwrap());
static QUOTED_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"["“”「『』」](.*?)["“”「『』」]"#).unwrap()
});

// Explanation-text signatures
static EXPLANATION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^(根据|按照|参考).{0,25}(要求|规则|标准)").unwrap(),
        Regex::new(r"^(这|以下|如下).{0,5}(是|为).{0,10}(翻译|结果)").unwrap(),
        Regex::new(r"(保持|确保).{0,25}(完整|一致|准确)").unwrap(),
        Regex::new(r"(为了|已经).{0,25}(优化|调整)").unwrap(),
        Regex::new(r"(我已|我对|我将).{0,25}(翻译|优化)").unwrap(),
        Regex::new(r"(字幕|翻译).{0,10}(质量|风格|特点)").unwrap(),
    ]
});

const EXPLANATION_WORDS: &[&str] = &[
    "翻译", "优化", "调整", "确保", "保持", "遵循", "规则", "要求", "风格",
    "质量", "长度", "适中", "流畅", "准确", "语义", "字幕", "完整", "分段",
];

static FIRST_ITEM_SUSPECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"根据|翻译|调整|优化|确保|保持|字幕|提供|以下是|这是|按照|参考").unwrap()
});
static FINAL_CHECK_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(根据|按照|如下|以下|这是).{0,10}(翻译|优化|调整)").unwrap());
static FINAL_COLON_EXTRACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[:：].{0,5}(.{1,25})").unwrap());

/// Whether text opens with a known boilerplate-preamble template
pub fn is_boilerplate(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    BOILERPLATE_PATTERNS.iter().any(|p| p.is_match(text))
}

/// Whether text looks like commentary about the translation instead of
/// a translation: signature patterns, or a high density of
/// meta-vocabulary in a long item.
pub fn is_explanation_text(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }

    if EXPLANATION_PATTERNS.iter().any(|p| p.is_match(text)) {
        return true;
    }

    let word_count = EXPLANATION_WORDS
        .iter()
        .filter(|word| text.contains(**word))
        .count();

    word_count >= 3 && text.chars().count() > DENSITY_THRESHOLD
}

/// Strip known prefixes and notes from a response fragment and collapse
/// whitespace runs.
pub fn clean_llm_response(response: &str) -> String {
    if response.is_empty() {
        return String::new();
    }

    let mut cleaned = response.to_string();
    for prefix in RESPONSE_PREFIXES.iter() {
        cleaned = prefix.replace(&cleaned, "").into_owned();
    }

    cleaned = INLINE_NOTE.replace_all(&cleaned, "").into_owned();
    cleaned = LEADING_ACCORDING_SENTENCE.replace(&cleaned, "").into_owned();

    WHITESPACE_RUN.replace_all(&cleaned, " ").trim().to_string()
}

/// Clean a single extracted item: label prefixes, wrapping quotes,
/// bracketed asides.
pub fn clean_translation_content(content: &str) -> String {
    if content.is_empty() {
        return String::new();
    }

    let cleaned = ITEM_PREFIX.replace(content, "");
    let cleaned = SURROUNDING_QUOTES.replace_all(cleaned.trim(), "");
    BRACKETED_NOTE.replace_all(cleaned.trim(), "").trim().to_string()
}

/// Truncate text after `max_chars` CJK characters, preferring to cut at
/// a punctuation mark within a five-character lookback, appending an
/// ellipsis otherwise.
pub fn truncate_cjk(text: &str, max_chars: usize) -> String {
    if text.is_empty() {
        return String::new();
    }

    if count_cjk_chars(text) <= max_chars {
        return text.to_string();
    }

    let chars: Vec<char> = text.chars().collect();
    let mut count = 0;
    let mut cut_pos = 0;
    for (i, c) in chars.iter().enumerate() {
        if ('\u{4e00}'..='\u{9fff}').contains(c) {
            count += 1;
        }
        if count == max_chars {
            cut_pos = i + 1;
            break;
        }
    }

    if cut_pos > 0 {
        let punctuation = ['。', '，', '.', ',', '!', '?', '；', ';'];
        let lookback_floor = cut_pos.saturating_sub(5);
        for i in (lookback_floor..=cut_pos).rev() {
            if i < chars.len() && punctuation.contains(&chars[i]) {
                return chars[..=i].iter().collect();
            }
        }
    }

    let truncated: String = chars[..cut_pos].iter().collect();
    truncated + "..."
}

/// Pull a plausible translation out of a long mixed item: colon/quote
/// tail, post-punctuation segment, then hard truncation.
pub fn extract_valid_translation(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    if let Some(caps) = COLON_TAIL.captures(text) {
        let extracted = caps[1].trim();
        let count = count_cjk_chars(extracted);
        if (1..=DENSITY_THRESHOLD).contains(&count) {
            return extracted.to_string();
        }
    }
    if let Some(caps) = QUOTED_SEGMENT.captures(text) {
        let extracted = caps[1].trim();
        let count = count_cjk_chars(extracted);
        if (1..=DENSITY_THRESHOLD).contains(&count) {
            return extracted.to_string();
        }
    }

    for sep in ['。', '，', '.', ','] {
        if let Some((_, tail)) = text.split_once(sep) {
            let tail = tail.trim();
            let count = count_cjk_chars(tail);
            if (1..=DENSITY_THRESHOLD).contains(&count) {
                return tail.to_string();
            }
        }
    }

    truncate_cjk(text, DENSITY_THRESHOLD)
}

/// Deep-clean an item still flagged as explanation: colon split, quoted
/// segment, prefix trimming, then truncation.
pub fn deep_clean_explanation(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    if let Some((head, tail)) = text.split_once([':', '：']) {
        if is_explanation_text(head) {
            let cleaned = tail.trim();
            if !cleaned.is_empty() && count_cjk_chars(cleaned) <= DENSITY_THRESHOLD {
                return cleaned.to_string();
            }
        }
    }

    if let Some(caps) = QUOTED_SEGMENT.captures(text) {
        let quoted = caps[1].trim();
        if !quoted.is_empty() {
            return quoted.to_string();
        }
    }

    let chars: Vec<char> = text.chars().collect();
    for i in (DENSITY_THRESHOLD + 1)..chars.len() {
        let head: String = chars[..i].iter().collect();
        if !is_explanation_text(&head) {
            let remaining: String = chars[i..].iter().collect();
            let remaining = remaining.trim();
            if !remaining.is_empty() && count_cjk_chars(remaining) <= DENSITY_THRESHOLD {
                return remaining.to_string();
            }
        }
    }

    truncate_cjk(text, DENSITY_THRESHOLD)
}

/// Extract `[n]`-marked items positionally, without the recovery chain.
///
/// Item content runs to the next marker or the first blank line, so a
/// trailing section (a glossary, a closing note) is not swallowed into
/// the last item. Returns None when no bracket marker is present.
pub fn extract_bracketed(text: &str, expected_count: usize) -> Option<Vec<String>> {
    let matches: Vec<(usize, usize, usize)> = BRACKET_MARKER
        .captures_iter(text)
        .filter_map(|caps| {
            let m = caps.get(0)?;
            let index: usize = caps.get(1)?.as_str().parse().ok()?;
            Some((m.start(), m.end(), index))
        })
        .collect();

    if matches.is_empty() {
        return None;
    }

    let mut items = vec![String::new(); expected_count];
    for (i, &(_, content_start, index)) in matches.iter().enumerate() {
        if !(1..=expected_count).contains(&index) {
            continue;
        }
        let content_end = matches
            .get(i + 1)
            .map(|&(next_start, _, _)| next_start)
            .unwrap_or(text.len());
        let mut content = &text[content_start..content_end];
        if let Some(blank) = content.find("\n\n") {
            content = &content[..blank];
        }
        items[index - 1] = content.trim().to_string();
    }

    Some(items)
}

/// Cut everything before the first recognizable item marker
fn strip_leading_preamble(response: &str) -> &str {
    for pattern in FIRST_MARKER_PATTERNS.iter() {
        if let Some(m) = pattern.find(response) {
            if m.start() > 0 {
                debug!("Dropping {} bytes of preamble before first marker", m.start());
            }
            return &response[m.start()..];
        }
    }

    if let Some(m) = ANY_NUMBER_MARKER.find(response) {
        if m.start() > 0 {
            debug!("Dropping {} bytes before first numbered line", m.start());
        }
        return &response[m.start()..];
    }

    response
}

/// Run the density/explanation recovery chain on one extracted item
fn sanitize_item(index: usize, content: &str) -> String {
    let mut cleaned = clean_translation_content(content);
    let cjk_count = count_cjk_chars(&cleaned);

    if index == 1 && cjk_count > DENSITY_THRESHOLD && !cleaned.contains('\n') {
        // The first item is the most likely to carry the preamble
        let head: String = cleaned.chars().take(DENSITY_THRESHOLD).collect();
        if FIRST_ITEM_SUSPECT.is_match(&head) {
            debug!("First item looks explanatory ({} CJK chars), extracting", cjk_count);
            cleaned = extract_valid_translation(&cleaned);
        }
    } else if cjk_count > DENSITY_THRESHOLD && !cleaned.contains('\n') {
        debug!("Item {} looks explanatory ({} CJK chars), extracting", index, cjk_count);
        cleaned = extract_valid_translation(&cleaned);
    }

    if is_explanation_text(&cleaned) {
        debug!("Item {} still explanatory, deep-cleaning", index);
        cleaned = deep_clean_explanation(&cleaned);
    }

    cleaned
}

/// Extract translations by marker scheme; returns None when no scheme
/// matched anything.
fn extract_by_markers(response: &str) -> Option<Vec<String>> {
    for scheme in MARKER_SCHEMES {
        let matches: Vec<(usize, usize, usize)> = scheme
            .regex
            .captures_iter(response)
            .filter_map(|caps| {
                let m = caps.get(0)?;
                let index: usize = caps.get(1)?.as_str().parse().ok()?;
                Some((m.start(), m.end(), index))
            })
            .collect();

        if matches.is_empty() {
            continue;
        }

        let mut translations: Vec<String> = Vec::new();
        for (i, &(_, content_start, index)) in matches.iter().enumerate() {
            let content_end = matches
                .get(i + 1)
                .map(|&(next_start, _, _)| next_start)
                .unwrap_or(response.len());
            let content = response[content_start..content_end].trim();

            if index == 0 {
                continue;
            }
            while translations.len() < index {
                translations.push(String::new());
            }
            translations[index - 1] = sanitize_item(index, content);
        }

        if !translations.is_empty() {
            return Some(translations);
        }
    }

    None
}

/// Fallback when no marker scheme matched: one translation per
/// non-empty, non-explanatory line.
fn extract_by_lines(response: &str) -> Vec<String> {
    let mut valid_lines = Vec::new();

    for line in response.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let cjk_count = count_cjk_chars(line);
        if cjk_count > LINE_SKIP_THRESHOLD {
            debug!("Skipping over-long line ({} CJK chars)", cjk_count);
            continue;
        }
        if is_explanation_text(line) {
            debug!("Skipping explanatory line");
            continue;
        }

        let cleaned = clean_translation_content(line);
        if !cleaned.is_empty() {
            valid_lines.push(cleaned);
        }
    }

    valid_lines
}

/// Parse a batch response into exactly `expected_count` translations.
///
/// Items that cannot be recovered stay empty; the caller is responsible
/// for marking them failed. Never invents text and never fails.
pub fn parse_batch(response: &str, expected_count: usize) -> Vec<String> {
    if response.trim().is_empty() {
        return vec![String::new(); expected_count];
    }

    if is_boilerplate(response) {
        debug!("Batch response opens with boilerplate preamble");
    }

    let response = strip_leading_preamble(response);

    let mut translations = match extract_by_markers(response) {
        Some(translations) => translations,
        None => {
            warn!("No item markers found, falling back to line extraction");
            extract_by_lines(response)
        }
    };

    if translations.len() < expected_count {
        if !translations.is_empty() {
            warn!(
                "Expected {} translations, recovered {}; padding with empties",
                expected_count,
                translations.len()
            );
        }
        translations.resize(expected_count, String::new());
    } else if translations.len() > expected_count {
        warn!(
            "Expected {} translations, got {}; truncating extras",
            expected_count,
            translations.len()
        );
        translations.truncate(expected_count);
    }

    for (i, translation) in translations.iter_mut().enumerate() {
        if !translation.is_empty() {
            *translation = clean_llm_response(translation);
        }

        // The first item gets one last strict pass
        if i == 0 && translation.chars().count() > 30 && FINAL_CHECK_PATTERN.is_match(translation) {
            debug!("First translation still explanatory after cleanup, truncating");
            *translation = match FINAL_COLON_EXTRACT.captures(translation) {
                Some(caps) => caps[1].trim().to_string(),
                None => truncate_cjk(translation, DENSITY_THRESHOLD),
            };
        }
    }

    translations
}
