//! Structured observability hooks for a promotion run.
//!
//! Events are emitted at `info!` level and carry an `event` field so they can
//! be picked out of JSON logs (`--json`).

use tracing::info;
use uuid::Uuid;

/// RAII guard that enters a run-scoped span for the duration of a promotion.
///
/// ```ignore
/// let _span = RunSpan::enter("testtostaging");
/// // every event below carries run_id and promotion
/// ```
pub struct RunSpan {
    run_id: Uuid,
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    /// Create and enter a span tagged with a fresh run id.
    pub fn enter(promotion: &str) -> Self {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("promoter.run", run_id = %run_id, promotion = %promotion);
        Self {
            run_id,
            _span: span.entered(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }
}

/// Emit event: scan finished, with candidate and eligible counts.
pub fn emit_promotion_planned(promotion: &str, candidates: usize, eligible: usize) {
    info!(
        event = "promotion.planned",
        promotion = %promotion,
        candidates = candidates,
        eligible = eligible,
    );
}

/// Emit event: records written.
pub fn emit_promotion_committed(promotion: &str, written: usize) {
    info!(event = "promotion.committed", promotion = %promotion, written = written);
}

pub fn emit_notify_sent(ring: &str, items: usize) {
    info!(event = "notify.sent", ring = %ring, items = items);
}

/// Emit event: notification failed (error level, never fatal).
pub fn emit_notify_failed(ring: &str, error: &dyn std::fmt::Display) {
    tracing::error!(event = "notify.failed", ring = %ring, error = %error);
}
