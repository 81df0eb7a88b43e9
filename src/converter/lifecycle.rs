//! Run-wide cancellation.

use tokio_util::sync::CancellationToken;

use super::Converter;

impl Converter {
    /// Stop admitting new resources
    ///
    /// Pipelines already in flight finish normally. Resources that were never
    /// admitted are reported as cancelled failures, so a run still returns one
    /// outcome per resource. Cancellation is permanent for this converter and
    /// all of its clones.
    pub fn cancel(&self) {
        if !self.cancel_token.is_cancelled() {
            tracing::info!("Cancellation requested, draining in-flight pipelines");
        }
        self.cancel_token.cancel();
    }

    /// Whether [`Converter::cancel`] has been called
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Token that is cancelled together with this converter
    ///
    /// Useful for wiring external shutdown sources (signals, timers) into a run.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }
}
