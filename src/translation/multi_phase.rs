/*!
 * Three-phase translation pipeline.
 *
 * Phase 1 drafts every cue in large batches while asking the model to
 * extract a glossary of recurring terms. Phase 2 sends that glossary
 * back for review and normalization, with the user's custom terms
 * always taking final precedence. Phase 3 re-translates in half-size
 * batches, giving the model each cue's draft, timing and the reviewed
 * glossary, and expects a structured block per cue so the original
 * text and timing survive alongside the refined translation.
 *
 * Every phase degrades instead of failing: a bad refinement block
 * falls back to its draft, a bad terminology review falls back to the
 * raw extraction. The only hard error is a draft phase that covers
 * less than half the cues, which would make refinement pointless.
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::checkpoint::TranslationRecord;
use crate::errors::TranslationError;
use crate::gateway::{ChatApi, ChatRequest};
use crate::response_parser;
use crate::segmentation;
use crate::subtitle_processor::SubtitleCue;

use super::prompts::PromptSet;
use super::terminology::TerminologyMap;
use super::ProgressSink;

/// Request timeout for the draft and refinement phases
const TRANSLATION_TIMEOUT: Duration = Duration::from_secs(180);

/// Request timeout for the terminology review, a much smaller request
const REVIEW_TIMEOUT: Duration = Duration::from_secs(60);

/// Terms included in the refinement prompt, longest first
const PROMPT_TERM_LIMIT: usize = 30;

/// Glossary section of a draft response, everything after the heading
static TERM_SECTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)术语表[：:]\s*(.*)$").unwrap());

/// `#n#` block marker in a refinement response
static BLOCK_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*#(\d+)#").unwrap());

/// Fields inside one refinement block
static BLOCK_FIELDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)TIME:\s*(.*?)\s*\nORIG:\s*(.*?)\s*\nTRANS:\s*(.*)").unwrap()
});

/// Tuning for the multi-phase pipeline
#[derive(Debug, Clone)]
pub struct MultiPhaseOptions {
    /// Cues per draft-phase request; the refinement phase uses half
    pub batch_size: usize,

    /// Pause between consecutive requests, in seconds
    pub delay_secs: f64,

    /// User-defined terms that override anything the model extracts
    pub custom_terms: TerminologyMap,
}

impl Default for MultiPhaseOptions {
    fn default() -> Self {
        Self {
            batch_size: 40,
            delay_secs: 1.0,
            custom_terms: TerminologyMap::new(),
        }
    }
}

/// Draft, review and refine translator
pub struct MultiPhaseTranslator<'a> {
    api: &'a dyn ChatApi,
    prompts: PromptSet,
    options: MultiPhaseOptions,
}

impl<'a> MultiPhaseTranslator<'a> {
    pub fn new(api: &'a dyn ChatApi, prompts: PromptSet, options: MultiPhaseOptions) -> Self {
        Self {
            api,
            prompts,
            options,
        }
    }

    /// Run all three phases over the cues.
    ///
    /// Returns exactly one record per cue plus the reviewed glossary.
    /// Fails with [`TranslationError::DraftPhaseFailed`] when fewer
    /// than half the cues obtained a draft.
    pub async fn translate(
        &self,
        cues: &[SubtitleCue],
        sink: &dyn ProgressSink,
        stop: &Arc<AtomicBool>,
    ) -> Result<(Vec<TranslationRecord>, TerminologyMap), TranslationError> {
        if cues.is_empty() {
            return Ok((Vec::new(), TerminologyMap::new()));
        }

        sink.progress(&format!(
            "Starting multi-phase translation of {} cues",
            cues.len()
        ));

        sink.progress("Phase 1/3: draft translation and term extraction");
        let (drafts, extracted, drafted) = self.draft_phase(cues, sink, stop).await?;
        if stop.load(Ordering::Relaxed) {
            // A user stop is not a failure; hand back whatever drafts
            // exist and skip the review and refinement requests.
            sink.progress(&format!(
                "Stop requested, keeping {}/{} draft translations",
                drafted,
                cues.len()
            ));
            let mut terminology = extracted;
            terminology.apply_overrides(&self.options.custom_terms);
            // The drafts predate the glossary, so enforce it here.
            let records = drafts
                .iter()
                .map(|draft| TranslationRecord::text(terminology.apply_to(draft)))
                .collect();
            return Ok((records, terminology));
        }
        if drafted * 2 < cues.len() {
            return Err(TranslationError::DraftPhaseFailed {
                completed: drafted,
                total: cues.len(),
            });
        }

        sink.progress("Phase 2/3: terminology review");
        let terminology = self.review_phase(extracted, sink).await;

        sink.progress("Phase 3/3: refinement with timing and glossary");
        let records = self
            .refine_phase(cues, &drafts, &terminology, sink, stop)
            .await;

        sink.progress(&format!(
            "Multi-phase translation finished: {} cues, {} glossary terms",
            records.len(),
            terminology.len()
        ));
        Ok((records, terminology))
    }

    /// Phase 1: batched draft translation plus glossary extraction.
    ///
    /// Returns one draft slot per cue (empty where the batch failed),
    /// the raw extracted terms, and the count of cues that obtained a
    /// draft.
    async fn draft_phase(
        &self,
        cues: &[SubtitleCue],
        sink: &dyn ProgressSink,
        stop: &Arc<AtomicBool>,
    ) -> Result<(Vec<String>, TerminologyMap, usize), TranslationError> {
        let batch_size = self.options.batch_size.max(1);
        let total_batches = cues.len().div_ceil(batch_size);

        let mut drafts: Vec<String> = Vec::with_capacity(cues.len());
        let mut extracted = TerminologyMap::new();
        let mut stripped_count = 0;

        for (batch_number, chunk_start) in (0..cues.len()).step_by(batch_size).enumerate() {
            let chunk = &cues[chunk_start..(chunk_start + batch_size).min(cues.len())];
            if stop.load(Ordering::Relaxed) {
                drafts.resize(cues.len(), String::new());
                break;
            }

            sink.progress(&format!(
                "Draft batch {}/{}",
                batch_number + 1,
                total_batches
            ));

            // Hearing-impaired annotations add noise the draft does
            // not need even when the caller kept them in the cues.
            let texts: Vec<String> = chunk
                .iter()
                .map(|cue| {
                    let cleaned = segmentation::remove_hearing_impaired(&cue.content);
                    if cleaned != cue.content {
                        stripped_count += 1;
                    }
                    cleaned
                })
                .collect();

            let pair = self.prompts.draft(&texts);
            let request = ChatRequest::new(self.api.model())
                .with_prompts(pair.system, pair.user)
                .temperature(0.3)
                .timeout(TRANSLATION_TIMEOUT);

            let response = match self.api.chat(request).await {
                Ok(response) => response,
                Err(e) => {
                    sink.error(&format!("Draft batch {} failed: {}", batch_number + 1, e));
                    drafts.extend(std::iter::repeat_n(String::new(), chunk.len()));
                    continue;
                }
            };

            let translation_part = TERM_SECTION
                .find(&response)
                .map(|m| &response[..m.start()])
                .unwrap_or(&response);
            match response_parser::extract_bracketed(translation_part, chunk.len()) {
                Some(items) => drafts.extend(items),
                None => {
                    warn!("Draft batch {} had no [n] markers", batch_number + 1);
                    drafts.extend(std::iter::repeat_n(String::new(), chunk.len()));
                }
            }

            if let Some(caps) = TERM_SECTION.captures(&response) {
                let terms = TerminologyMap::parse_term_lines(&caps[1]);
                debug!(
                    "Draft batch {} extracted {} terms",
                    batch_number + 1,
                    terms.len()
                );
                extracted.apply_overrides(&terms);
            }

            if !stop.load(Ordering::Relaxed) {
                tokio::time::sleep(Duration::from_secs_f64(self.options.delay_secs)).await;
            }
        }

        drafts.resize(cues.len(), String::new());
        let drafted = drafts.iter().filter(|d| !d.is_empty()).count();
        sink.progress(&format!(
            "Phase 1 done: {}/{} drafts, {} terms, {} cues had annotations stripped",
            drafted,
            cues.len(),
            extracted.len(),
            stripped_count
        ));
        Ok((drafts, extracted, drafted))
    }

    /// Phase 2: send the extracted glossary for review. Falls back to
    /// the raw extraction when the review fails; custom terms are
    /// applied last either way.
    async fn review_phase(&self, extracted: TerminologyMap, sink: &dyn ProgressSink) -> TerminologyMap {
        let mut terminology = if extracted.is_empty() {
            TerminologyMap::new()
        } else {
            // The review sees the custom terms too, so it can
            // normalize the rest around them.
            let mut submitted = extracted.clone();
            submitted.apply_overrides(&self.options.custom_terms);

            let pair = self.prompts.terminology_review(&submitted.as_term_lines());
            let request = ChatRequest::new(self.api.model())
                .with_prompts(pair.system, pair.user)
                .temperature(0.2)
                .timeout(REVIEW_TIMEOUT);

            match self.api.chat(request).await {
                Ok(response) => {
                    let reviewed = TerminologyMap::parse_term_lines(&response);
                    if reviewed.is_empty() {
                        warn!("Terminology review returned no terms, keeping extraction");
                        submitted
                    } else {
                        sink.progress(&format!(
                            "Terminology review kept {} of {} terms",
                            reviewed.len(),
                            submitted.len()
                        ));
                        reviewed
                    }
                }
                Err(e) => {
                    sink.error(&format!("Terminology review failed: {}", e));
                    submitted
                }
            }
        };

        terminology.apply_overrides(&self.options.custom_terms);
        terminology
    }

    /// Phase 3: half-size batches, one structured block per cue.
    /// Always returns exactly one record per cue.
    async fn refine_phase(
        &self,
        cues: &[SubtitleCue],
        drafts: &[String],
        terminology: &TerminologyMap,
        sink: &dyn ProgressSink,
        stop: &Arc<AtomicBool>,
    ) -> Vec<TranslationRecord> {
        let batch_size = (self.options.batch_size / 2).max(1);
        let total_batches = cues.len().div_ceil(batch_size);
        let terminology_section = terminology.prompt_section(PROMPT_TERM_LIMIT);

        let mut records: Vec<TranslationRecord> = Vec::with_capacity(cues.len());

        for (batch_number, chunk_start) in (0..cues.len()).step_by(batch_size).enumerate() {
            let chunk_end = (chunk_start + batch_size).min(cues.len());
            let chunk = &cues[chunk_start..chunk_end];
            let chunk_drafts = &drafts[chunk_start..chunk_end];

            if stop.load(Ordering::Relaxed) {
                break;
            }

            sink.progress(&format!(
                "Refinement batch {}/{}",
                batch_number + 1,
                total_batches
            ));

            let pair = self
                .prompts
                .refine(chunk, chunk_drafts, &terminology_section);
            let request = ChatRequest::new(self.api.model())
                .with_prompts(pair.system, pair.user)
                .temperature(0.3)
                .timeout(TRANSLATION_TIMEOUT);

            match self.api.chat(request).await {
                Ok(response) => {
                    records.extend(parse_refined_blocks(&response, chunk, chunk_drafts));
                }
                Err(e) => {
                    sink.error(&format!(
                        "Refinement batch {} failed, keeping drafts: {}",
                        batch_number + 1,
                        e
                    ));
                    // Drafts predate the reviewed glossary, so at least
                    // the agreed terms are enforced on the fallback.
                    records.extend(chunk.iter().zip(chunk_drafts).map(|(cue, draft)| {
                        TranslationRecord::Detailed {
                            translation: terminology.apply_to(draft),
                            original: Some(cue.content.clone()),
                            time_info: None,
                        }
                    }));
                }
            }

            if !stop.load(Ordering::Relaxed) {
                tokio::time::sleep(Duration::from_secs_f64(self.options.delay_secs)).await;
            }
        }

        // A stopped or short run still yields one record per cue
        if records.len() < cues.len() {
            warn!(
                "Refinement produced {} records for {} cues, padding",
                records.len(),
                cues.len()
            );
            for cue in &cues[records.len()..] {
                records.push(TranslationRecord::Detailed {
                    translation: String::new(),
                    original: Some(cue.content.clone()),
                    time_info: None,
                });
            }
        } else if records.len() > cues.len() {
            records.truncate(cues.len());
        }

        records
    }
}

/// Parse `#n#` / TIME / ORIG / TRANS blocks back into records, one per
/// chunk cue, falling back to the draft and the source text for any
/// missing field.
fn parse_refined_blocks(
    response: &str,
    chunk: &[SubtitleCue],
    drafts: &[String],
) -> Vec<TranslationRecord> {
    let markers: Vec<(usize, usize, usize)> = BLOCK_MARKER
        .captures_iter(response)
        .filter_map(|caps| {
            let m = caps.get(0)?;
            let number: usize = caps.get(1)?.as_str().parse().ok()?;
            Some((m.start(), m.end(), number))
        })
        .collect();

    let mut translations = vec![String::new(); chunk.len()];
    let mut originals = vec![String::new(); chunk.len()];
    let mut time_infos = vec![String::new(); chunk.len()];

    for (i, &(_, block_start, number)) in markers.iter().enumerate() {
        if !(1..=chunk.len()).contains(&number) {
            debug!("Refined block #{}# outside batch of {}", number, chunk.len());
            continue;
        }
        let block_end = markers
            .get(i + 1)
            .map(|&(next_start, _, _)| next_start)
            .unwrap_or(response.len());
        let block = &response[block_start..block_end];

        if let Some(caps) = BLOCK_FIELDS.captures(block) {
            time_infos[number - 1] = caps[1].trim().to_string();
            originals[number - 1] = caps[2].trim().to_string();
            translations[number - 1] = caps[3].trim().to_string();
        }
    }

    let missing = translations.iter().filter(|t| t.is_empty()).count();
    if missing > 0 {
        debug!("{}/{} refined blocks missing, using drafts", missing, chunk.len());
    }

    chunk
        .iter()
        .enumerate()
        .map(|(i, cue)| {
            let translation = if translations[i].is_empty() {
                drafts.get(i).cloned().unwrap_or_default()
            } else {
                std::mem::take(&mut translations[i])
            };
            let original = if originals[i].is_empty() {
                cue.content.clone()
            } else {
                std::mem::take(&mut originals[i])
            };
            let time_info = if time_infos[i].is_empty() {
                None
            } else {
                Some(std::mem::take(&mut time_infos[i]))
            };

            TranslationRecord::Detailed {
                translation,
                original: Some(original),
                time_info,
            }
        })
        .collect()
}
