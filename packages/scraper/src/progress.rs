//! Progress reporting for a harvest run.
//!
//! A run reports on two sinks: one advanced per visited results page and
//! one tracking the store size against the target listing count. The CLI
//! draws both as `indicatif` bars; library callers and tests pass
//! [`NullProgress`].

use std::sync::Arc;

/// Receives page and listing counts from a running harvest.
pub trait ProgressCallback: Send + Sync {
    /// Sets the goal, such as the page budget or the target listing count.
    fn set_total(&self, total: u64);

    /// Jumps to an absolute count, such as the current store size.
    fn set_position(&self, pos: u64);

    /// Records `delta` more pages or listings.
    fn inc(&self, delta: u64);

    /// Replaces the status text, e.g. `"42 listing(s)"`.
    fn set_message(&self, msg: String);

    /// Ends reporting with a closing summary line.
    fn finish(&self, msg: String);
}

/// Discards every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn set_position(&self, _pos: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// A shared [`NullProgress`] for runs nobody watches.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
