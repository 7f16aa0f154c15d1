//! Progress reporting for batch runs.
//!
//! [`ProgressCallback`] keeps the batch helper independent of any
//! rendering backend; the CLI supplies an `indicatif` implementation.

use std::sync::Arc;

/// Receives progress updates from [`crate::batch::run_batch`].
///
/// Implementations must be `Send + Sync` so they can be shared through an
/// `Arc` across the batch's futures.
pub trait ProgressCallback: Send + Sync {
    /// Sets the number of queries in the batch.
    fn set_total(&self, total: u64);

    /// Advances by `delta` finished queries.
    fn inc(&self, delta: u64);

    /// Replaces the message shown next to the indicator.
    fn set_message(&self, msg: String);

    /// Marks the batch as complete.
    fn finish(&self, msg: String);
}

/// A [`ProgressCallback`] that discards every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
