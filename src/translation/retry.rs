/*!
 * Retry coordinator for cues whose translation failed.
 *
 * Failed positions accumulate in the checkpoint during the main run;
 * this coordinator re-requests them in small batches for up to three
 * rounds. A position leaves the failed set only when a round produced
 * a non-empty translation for it, so nothing is silently dropped:
 * whatever survives all rounds is returned to the caller and stays in
 * the checkpoint.
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::warn;

use crate::checkpoint::{CheckpointStore, TranslationRecord};
use crate::errors::TranslationError;
use crate::gateway::{ChatApi, ChatRequest};
use crate::response_parser;
use crate::subtitle_processor::SubtitleCue;

use super::batch::{checkpoint_error, BATCH_TIMEOUT};
use super::prompts::PromptSet;
use super::ProgressSink;

/// Rounds before giving up on a position
pub const MAX_RETRY_ROUNDS: usize = 3;

/// Retries use small batches so one bad cue cannot poison many
pub const RETRY_BATCH_SIZE: usize = 10;

/// Re-requests failed positions recorded in the checkpoint
pub struct RetryCoordinator<'a> {
    api: &'a dyn ChatApi,
    prompts: PromptSet,
    temperature: f32,
    delay_secs: f64,
}

impl<'a> RetryCoordinator<'a> {
    pub fn new(api: &'a dyn ChatApi, prompts: PromptSet, temperature: f32, delay_secs: f64) -> Self {
        Self {
            api,
            prompts,
            temperature,
            delay_secs,
        }
    }

    /// Retry every failed position in the store. Returns the positions
    /// still failed after all rounds.
    pub async fn retry_failed(
        &self,
        cues: &[SubtitleCue],
        store: &mut CheckpointStore,
        sink: &dyn ProgressSink,
        stop: &Arc<AtomicBool>,
    ) -> Result<Vec<usize>, TranslationError> {
        let mut remaining: Vec<usize> = store
            .failed_indices()
            .iter()
            .copied()
            .filter(|&position| position < cues.len())
            .collect();
        if remaining.is_empty() {
            return Ok(Vec::new());
        }

        let mut round = 0;
        while !remaining.is_empty() && round < MAX_RETRY_ROUNDS && !stop.load(Ordering::Relaxed) {
            round += 1;
            sink.progress(&format!(
                "Retry round {}/{}: {} cues remaining",
                round,
                MAX_RETRY_ROUNDS,
                remaining.len()
            ));

            let mut still_failed = Vec::new();

            for batch in remaining.chunks(RETRY_BATCH_SIZE) {
                if stop.load(Ordering::Relaxed) {
                    still_failed.extend_from_slice(batch);
                    continue;
                }

                let items: Vec<(usize, &str)> = batch
                    .iter()
                    .enumerate()
                    .map(|(display, &position)| (display + 1, cues[position].content.as_str()))
                    .collect();
                let pair = self.prompts.batch(&items);
                let request = ChatRequest::new(self.api.model())
                    .with_prompts(pair.system, pair.user)
                    .temperature(self.temperature)
                    .timeout(BATCH_TIMEOUT);

                match self.api.chat(request).await {
                    Ok(response) => {
                        let parsed = response_parser::parse_batch(&response, batch.len());
                        for (&position, translation) in batch.iter().zip(parsed) {
                            let cleaned =
                                response_parser::clean_translation_content(&translation);
                            if cleaned.is_empty() {
                                still_failed.push(position);
                            } else {
                                store.set_record(position, TranslationRecord::text(cleaned));
                                store.clear_failed(position);
                            }
                        }
                    }
                    Err(e) => {
                        sink.error(&format!("Retry batch failed: {}", e));
                        still_failed.extend_from_slice(batch);
                    }
                }

                store.persist().map_err(checkpoint_error)?;

                if !stop.load(Ordering::Relaxed) {
                    tokio::time::sleep(Duration::from_secs_f64(self.delay_secs)).await;
                }
            }

            remaining = still_failed;

            if remaining.is_empty() {
                sink.progress("All failed translations recovered");
            } else if round < MAX_RETRY_ROUNDS && !stop.load(Ordering::Relaxed) {
                // Longer pause between rounds to let a struggling
                // endpoint recover.
                tokio::time::sleep(Duration::from_secs_f64(self.delay_secs * 2.0)).await;
            }
        }

        if !remaining.is_empty() {
            warn!("{} cues still untranslated after retries", remaining.len());
            sink.error(&format!(
                "{} cues could not be translated; they will carry a placeholder in the output",
                remaining.len()
            ));
        }
        Ok(remaining)
    }
}
