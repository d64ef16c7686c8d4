/*!
 * Translation pipelines.
 *
 * Two pipelines share the same chat gateway and checkpoint store:
 *
 * - `batch`: the standard pipeline, translating fixed-size batches in
 *   one pass with checkpoint persistence after every batch
 * - `multi_phase`: draft pass, terminology review and timing-aware
 *   refinement pass
 *
 * Either can be followed by the `retry` coordinator for failed items
 * and the `correction` sweep for items that parsed but look broken.
 * `prompts` holds the request templates and `terminology` the shared
 * term map.
 */

// Re-export main types for easier usage
pub use self::batch::{BatchOptions, BatchTranslator};
pub use self::correction::correct_flagged_translations;
pub use self::multi_phase::{MultiPhaseOptions, MultiPhaseTranslator};
pub use self::retry::RetryCoordinator;
pub use self::terminology::TerminologyMap;

// Submodules
pub mod batch;
pub mod correction;
pub mod multi_phase;
pub mod prompts;
pub mod retry;
pub mod terminology;

/// Receiver for human-readable pipeline progress.
///
/// Implementations are called from async contexts, so they keep their
/// own locking and never block for long.
pub trait ProgressSink: Send + Sync {
    /// A progress message worth surfacing to the user
    fn progress(&self, message: &str);

    /// A non-fatal error; the pipeline continues after reporting it
    fn error(&self, message: &str);

    /// Signaled exactly once when the job is over, stop or not
    fn finished(&self);
}

/// Sink that drops everything, for tests and non-interactive callers
pub struct SilentSink;

impl ProgressSink for SilentSink {
    fn progress(&self, _message: &str) {}

    fn error(&self, _message: &str) {}

    fn finished(&self) {}
}
