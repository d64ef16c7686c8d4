/*!
 * Standard one-pass batch translation pipeline.
 *
 * Cues are translated in fixed-size batches; each batch is requested,
 * parsed defensively, and persisted to the checkpoint before the next
 * one starts. A failed batch never aborts the run: its positions are
 * recorded as failed for the retry coordinator, and the pipeline moves
 * on.
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use crate::checkpoint::{CheckpointStore, TranslationRecord};
use crate::errors::TranslationError;
use crate::gateway::{ChatApi, ChatRequest};
use crate::response_parser;
use crate::subtitle_processor::SubtitleCue;

use super::prompts::PromptSet;
use super::ProgressSink;

/// Request timeout for full-size translation batches
pub const BATCH_TIMEOUT: Duration = Duration::from_secs(180);

/// Tuning for the standard pipeline
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Cues per request
    pub batch_size: usize,

    /// Sampling temperature forwarded to the model
    pub temperature: f32,

    /// Pause between consecutive requests, in seconds
    pub delay_secs: f64,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: 40,
            temperature: 0.5,
            delay_secs: 1.0,
        }
    }
}

/// One-pass translator writing through a checkpoint store
pub struct BatchTranslator<'a> {
    api: &'a dyn ChatApi,
    prompts: PromptSet,
    options: BatchOptions,
}

impl<'a> BatchTranslator<'a> {
    pub fn new(api: &'a dyn ChatApi, prompts: PromptSet, options: BatchOptions) -> Self {
        Self {
            api,
            prompts,
            options,
        }
    }

    /// Translate all cues, resuming past positions the store already
    /// holds. Returns the number of cues translated in this run.
    ///
    /// A raised stop flag ends the run at the next batch boundary with
    /// whatever the store holds; that partial state is a valid resume
    /// point, not an error.
    pub async fn translate(
        &self,
        cues: &[SubtitleCue],
        store: &mut CheckpointStore,
        sink: &dyn ProgressSink,
        stop: &Arc<AtomicBool>,
    ) -> Result<usize, TranslationError> {
        if cues.is_empty() {
            return Ok(0);
        }

        let batch_size = self.options.batch_size.max(1);
        let total_batches = cues.len().div_ceil(batch_size);
        let mut translated = 0;

        for (batch_number, chunk_start) in (0..cues.len()).step_by(batch_size).enumerate() {
            if stop.load(Ordering::Relaxed) {
                sink.progress("Stop requested, ending translation at batch boundary");
                store.persist().map_err(checkpoint_error)?;
                return Ok(translated);
            }

            let chunk = &cues[chunk_start..(chunk_start + batch_size).min(cues.len())];

            // Resume support: only request positions without a stored
            // translation.
            let pending: Vec<(usize, &SubtitleCue)> = chunk
                .iter()
                .enumerate()
                .filter(|(offset, _)| {
                    store
                        .state()
                        .translations
                        .get(chunk_start + offset)
                        .map(TranslationRecord::is_empty)
                        .unwrap_or(true)
                })
                .map(|(offset, cue)| (chunk_start + offset, cue))
                .collect();

            if pending.is_empty() {
                debug!("Batch {} already translated, skipping", batch_number + 1);
                continue;
            }

            sink.progress(&format!(
                "Translating batch {}/{} ({} cues)",
                batch_number + 1,
                total_batches,
                pending.len()
            ));

            let items: Vec<(usize, &str)> = pending
                .iter()
                .enumerate()
                .map(|(display, (_, cue))| (display + 1, cue.content.as_str()))
                .collect();
            let pair = self.prompts.batch(&items);
            let request = ChatRequest::new(self.api.model())
                .with_prompts(pair.system, pair.user)
                .temperature(self.options.temperature)
                .timeout(BATCH_TIMEOUT);

            match self.api.chat(request).await {
                Ok(response) => {
                    let parsed = response_parser::parse_batch(&response, pending.len());
                    let mut batch_failed = Vec::new();

                    for ((position, _), translation) in pending.iter().zip(parsed) {
                        let cleaned = response_parser::clean_translation_content(&translation);
                        if cleaned.is_empty() {
                            batch_failed.push(*position);
                        } else {
                            store.set_record(*position, TranslationRecord::text(cleaned));
                            translated += 1;
                        }
                    }

                    if !batch_failed.is_empty() {
                        warn!(
                            "Batch {} left {} cues untranslated",
                            batch_number + 1,
                            batch_failed.len()
                        );
                        store.mark_failed(batch_failed);
                    }
                }
                Err(e) => {
                    sink.error(&format!("Batch {} request failed: {}", batch_number + 1, e));
                    store.mark_failed(pending.iter().map(|(position, _)| *position));
                }
            }

            store.persist().map_err(checkpoint_error)?;

            if !stop.load(Ordering::Relaxed) {
                tokio::time::sleep(Duration::from_secs_f64(self.options.delay_secs)).await;
            }
        }

        Ok(translated)
    }
}

pub(super) fn checkpoint_error(e: anyhow::Error) -> TranslationError {
    TranslationError::Checkpoint(e.to_string())
}
