/*!
 * # LingoSub - LLM-powered subtitle translation
 *
 * A Rust library for translating subtitle files with a chat-completions
 * LLM API while preserving timing and recovering from partial failures.
 *
 * ## Features
 *
 * - SRT parsing and serialization with mandatory renumbering
 * - Segmentation: hearing-impaired cleanup, cue merging, length balancing
 * - Single-phase batched translation with strict output contracts
 * - Multi-phase pipeline: draft + terminology extraction, terminology
 *   reconciliation, final translate/resegment, error correction
 * - Defensive response parsing against free-form model output
 * - Checkpointed progress with bounded retry of failed batches
 * - Bilingual or monolingual output composition
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `subtitle_processor`: Cue model, SRT handling, text utilities
 * - `segmentation`: Cue merging and splitting before translation
 * - `response_parser`: Defensive extraction of per-index translations
 * - `gateway`: Chat-completions HTTP client abstraction
 * - `translation`: Translation pipelines:
 *   - `translation::batch`: Single-phase batched translation
 *   - `translation::multi_phase`: Three-phase pipeline + error correction
 *   - `translation::retry`: Bounded re-submission of failed indices
 *   - `translation::terminology`: Terminology map and persistence
 *   - `translation::prompts`: Prompt templates
 * - `checkpoint`: Durable per-batch progress store
 * - `composer`: Final output assembly and SRT serialization
 * - `file_utils`: File system operations
 * - `app_controller`: Main application controller
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod checkpoint;
pub mod composer;
pub mod errors;
pub mod file_utils;
pub mod gateway;
pub mod language_utils;
pub mod response_parser;
pub mod segmentation;
pub mod subtitle_processor;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use checkpoint::{CheckpointState, CheckpointStore};
pub use errors::{AppError, GatewayError, SubtitleError, TranslationError};
pub use gateway::{ChatApi, ChatClient};
pub use language_utils::{get_language_name, language_codes_match};
pub use subtitle_processor::SubtitleCue;
pub use translation::terminology::TerminologyMap;
