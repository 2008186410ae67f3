//! Progress reporting trait for paginated fetches.
//!
//! Decouples progress reporting from any particular rendering backend.
//! The CLI supplies an `indicatif`-backed implementation; tests and
//! non-interactive callers use [`NullProgress`].

use std::sync::Arc;

/// Trait for reporting fetch progress.
///
/// Implementations must be `Send + Sync` so a single callback can be
/// shared across the sequential awaits of a fetch.
pub trait ProgressCallback: Send + Sync {
    /// Set the total expected units of work (enables percentage display).
    fn set_total(&self, total: u64);

    /// Advance progress by `delta` units.
    fn inc(&self, delta: u64);

    /// Update the message displayed alongside the progress indicator.
    fn set_message(&self, msg: String);

    /// Mark progress as complete with a final message.
    fn finish(&self, msg: String);

    /// Mark progress as complete and remove the progress indicator.
    fn finish_and_clear(&self);
}

/// A [`ProgressCallback`] that silently ignores all updates.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
    fn finish_and_clear(&self) {}
}

/// Returns a shared [`NullProgress`] instance for convenient use.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
