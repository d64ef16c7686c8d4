use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::Config;
use crate::checkpoint::CheckpointStore;
use crate::composer::{self, ComposeOptions};
use crate::file_utils::FileManager;
use crate::gateway::ChatClient;
use crate::language_utils;
use crate::segmentation::{self, SegmentationOptions};
use crate::subtitle_processor;
use crate::translation::{
    correct_flagged_translations, BatchOptions, BatchTranslator, MultiPhaseOptions,
    MultiPhaseTranslator, ProgressSink, RetryCoordinator, TerminologyMap,
};
use crate::translation::prompts::PromptSet;

// @module: Application controller for subtitle translation

/// Main application controller for subtitle translation
pub struct Controller {
    // @field: App configuration
    config: Config,

    // @field: Cooperative stop flag shared with the pipelines
    stop: Arc<AtomicBool>,
}

/// Progress sink backed by an indicatif spinner.
///
/// Errors are logged through `suspend` so they do not tear the bar.
struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

impl ProgressSink for ProgressReporter {
    fn progress(&self, message: &str) {
        debug!("{}", message);
        self.bar.set_message(message.to_string());
    }

    fn error(&self, message: &str) {
        self.bar.suspend(|| error!("{}", message));
    }

    fn finished(&self) {
        // Keeps whatever closing message `finish` already set.
        self.bar.finish();
    }
}

impl Controller {
    /// Create a new controller for test purposes with default configuration
    pub fn new_for_test() -> Result<Self> {
        Self::with_config(Config::default())
    }

    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        Ok(Self {
            config,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Check if the controller is properly initialized with configuration
    pub fn is_initialized(&self) -> bool {
        !self.config.source_language.is_empty() && !self.config.target_language.is_empty()
    }

    /// The shared stop flag, for wiring up a Ctrl-C handler
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Ask the running pipeline to stop at the next batch boundary.
    /// Progress up to that point stays in the checkpoint for resuming.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Probe the configured endpoint with a one-word request
    pub async fn test_connection(&self) -> Result<()> {
        let client = self.build_client()?;
        client
            .test_connection()
            .await
            .context("Connection test failed")?;
        info!(
            "Connection to {} with model {} OK",
            self.config.api_host, self.config.model
        );
        Ok(())
    }

    /// Run the full workflow: parse, segment, translate, retry,
    /// correct, compose.
    ///
    /// With `resume`, translations already present in that checkpoint
    /// are kept and only the gaps are requested (standard pipeline
    /// only; the multi-phase pipeline always starts fresh).
    pub async fn run(
        &self,
        input_file: PathBuf,
        output_file: Option<PathBuf>,
        resume: Option<PathBuf>,
        force_overwrite: bool,
    ) -> Result<()> {
        let start_time = std::time::Instant::now();

        if !input_file.exists() {
            return Err(anyhow!("Input file does not exist: {:?}", input_file));
        }

        let output_path = match output_file {
            Some(path) => path,
            None => FileManager::generate_output_path(&input_file, &self.config.target_language),
        };
        if output_path.exists() && !force_overwrite {
            warn!(
                "Skipping, output already exists (use -f to force overwrite): {}",
                output_path.display()
            );
            return Ok(());
        }

        // Parse and segment
        let raw = FileManager::read_to_string_lossy(&input_file)?;
        let parsed = subtitle_processor::parse_srt_string(&raw)?;
        info!("Parsed {} cues from {}", parsed.len(), input_file.display());

        let cues = if self.config.subtitle.netflix_style {
            let segmented = segmentation::segment(parsed, &SegmentationOptions::default());
            info!("Segmentation produced {} cues", segmented.len());
            segmented
        } else {
            segmentation::strip_hearing_impaired(parsed)
        };
        if cues.is_empty() {
            return Err(anyhow!("No translatable cues in {}", input_file.display()));
        }

        let client = self.build_client()?;
        client
            .test_connection()
            .await
            .context("Connection test failed, not starting translation")?;

        let mut store = match resume {
            Some(checkpoint_path) => {
                let store = CheckpointStore::load(&checkpoint_path)?;
                if store.state().total != cues.len() {
                    return Err(anyhow!(
                        "Checkpoint holds {} cues but the input segments into {}; \
                         it belongs to a different input or segmentation setting",
                        store.state().total,
                        cues.len()
                    ));
                }
                info!(
                    "Resuming from {} ({}/{} done)",
                    checkpoint_path.display(),
                    store.state().completed,
                    store.state().total
                );
                store
            }
            None => CheckpointStore::create(&output_path, cues.len())?,
        };

        let reporter = ProgressReporter::new();
        let prompts = self.prompt_set();

        // Translate
        if self.config.translation.multi_phase {
            let options = MultiPhaseOptions {
                batch_size: self.config.translation.batch_size,
                delay_secs: self.config.translation.delay_secs,
                custom_terms: self.custom_terms(),
            };
            let translator = MultiPhaseTranslator::new(&client, prompts.clone(), options);
            let (records, terminology) =
                translator.translate(&cues, &reporter, &self.stop).await?;

            for (position, record) in records.into_iter().enumerate() {
                if record.is_empty() {
                    store.mark_failed([position]);
                }
                store.set_record(position, record);
            }
            store.persist()?;
            info!("Multi-phase glossary holds {} terms", terminology.len());
        } else {
            let options = BatchOptions {
                batch_size: self.config.translation.batch_size,
                temperature: self.config.translation.temperature,
                delay_secs: self.config.translation.delay_secs,
            };
            let translator = BatchTranslator::new(&client, prompts.clone(), options);
            translator
                .translate(&cues, &mut store, &reporter, &self.stop)
                .await?;
        }

        // Retry what failed
        if !self.stop.load(Ordering::Relaxed) {
            let coordinator = RetryCoordinator::new(
                &client,
                prompts,
                self.config.translation.temperature,
                self.config.translation.delay_secs,
            );
            coordinator
                .retry_failed(&cues, &mut store, &reporter, &self.stop)
                .await?;
        }

        // Placeholder anything still empty, keeping the source text
        // visible, so the correction sweep and the output both see it.
        store.finalize(cues.len())?;
        let mut records = store.state().translations.clone();
        for (position, record) in records.iter_mut().enumerate() {
            if record.is_empty() {
                let source = cues.get(position).map(|cue| cue.content.as_str()).unwrap_or("");
                record.set_translation(composer::untranslated(source));
            }
        }

        if !self.stop.load(Ordering::Relaxed) {
            correct_flagged_translations(
                &client,
                &cues,
                &mut records,
                self.config.translation.delay_secs,
                &reporter,
                &self.stop,
            )
            .await?;
        }

        for (position, record) in records.iter().enumerate() {
            store.set_record(position, record.clone());
        }
        store.persist()?;

        // Compose the output even after a stop: a partial bilingual
        // file with placeholders is more useful than nothing, and the
        // checkpoint stays behind for resuming.
        let options = ComposeOptions {
            show_original: self.config.subtitle.show_original,
            clean_punctuation: self.config.subtitle.clean_punctuation,
        };
        let composed = composer::write_output(&cues, &records, &options, &output_path)?;

        let stopped = self.stop.load(Ordering::Relaxed);
        if stopped {
            reporter.finish("Stopped; partial output written");
            warn!(
                "Stopped early; checkpoint kept at {} for resuming",
                store.path().display()
            );
        } else {
            reporter.finish("Done");
            store.remove()?;
        }
        reporter.finished();

        info!(
            "Wrote {} cues to {} in {:.1}s",
            composed.len(),
            output_path.display(),
            start_time.elapsed().as_secs_f64()
        );
        Ok(())
    }

    /// Translate every .srt file in a directory, sequentially
    pub async fn run_folder(&self, input_dir: PathBuf, force_overwrite: bool) -> Result<()> {
        if !input_dir.is_dir() {
            return Err(anyhow!("Not a directory: {:?}", input_dir));
        }

        let mut srt_files: Vec<PathBuf> = std::fs::read_dir(&input_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .map(|ext| ext.eq_ignore_ascii_case("srt"))
                    .unwrap_or(false)
            })
            .collect();
        srt_files.sort();

        if srt_files.is_empty() {
            warn!("No .srt files found in {}", input_dir.display());
            return Ok(());
        }

        info!("Translating {} files from {}", srt_files.len(), input_dir.display());
        for file in srt_files {
            if self.stop.load(Ordering::Relaxed) {
                warn!("Stop requested, remaining files skipped");
                break;
            }
            if let Err(e) = self.run(file.clone(), None, None, force_overwrite).await {
                error!("Failed to translate {}: {}", file.display(), e);
            }
        }
        Ok(())
    }

    fn build_client(&self) -> Result<ChatClient> {
        ChatClient::new(
            &self.config.api_host,
            &self.config.api_key,
            &self.config.model,
        )
        .map_err(|e| anyhow!("Invalid API configuration: {}", e))
    }

    fn prompt_set(&self) -> PromptSet {
        PromptSet::new(
            language_utils::prompt_name(&self.config.source_language),
            language_utils::prompt_name(&self.config.target_language),
        )
    }

    fn custom_terms(&self) -> TerminologyMap {
        self.config
            .custom_terminology
            .iter()
            .map(|(source, target)| (source.clone(), target.clone()))
            .collect()
    }
}

