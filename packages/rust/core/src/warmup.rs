//! Phase one: tab through every context so the host materializes its content.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use tabharvest_host::{Checkpoint, ContextHost, Workspace};
use tabharvest_shared::{ContextId, Result};

use crate::progress::ProgressReporter;

/// Outcome of one warm-up pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarmupSummary {
    /// Contexts activated, in activation order.
    pub activated: Vec<ContextId>,
    /// Contexts whose activation failed (context, reason).
    pub failed: Vec<(ContextId, String)>,
    /// The originally active context, if there was one.
    pub restored: Option<ContextId>,
    /// Whether the confirmation checkpoint was injected.
    pub checkpoint_injected: bool,
}

/// Sequentially activates every scriptable context, then hands control to
/// the confirmation checkpoint in the originally active context.
pub struct WarmupCoordinator {
    host: Arc<dyn ContextHost>,
    settle_interval: Duration,
    progress: Arc<dyn ProgressReporter>,
}

impl WarmupCoordinator {
    pub fn new(
        host: Arc<dyn ContextHost>,
        settle_interval: Duration,
        progress: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            host,
            settle_interval,
            progress,
        }
    }

    /// Run one warm-up pass and inject `checkpoint` when it finishes.
    ///
    /// Only enumeration failure is returned as an error; a context that
    /// cannot be activated is logged and skipped.
    #[instrument(skip_all, fields(settle_ms = self.settle_interval.as_millis() as u64))]
    pub async fn run(&self, checkpoint: Arc<dyn Checkpoint>) -> Result<WarmupSummary> {
        self.progress.phase("Activating contexts");

        let workspace = Workspace::enumerate(self.host.as_ref()).await?;
        let original = workspace.active().cloned();
        let targets: Vec<_> = workspace.scriptable().collect();
        let total = targets.len();

        info!(
            contexts = workspace.len(),
            scriptable = total,
            original = ?original.as_ref().map(|c| c.id),
            "starting warm-up"
        );

        let mut summary = WarmupSummary::default();

        for (i, ctx) in targets.into_iter().enumerate() {
            match self.host.activate(ctx.id).await {
                Ok(()) => {
                    debug!(context = %ctx.id, address = %ctx.address, "activated, settling");
                    summary.activated.push(ctx.id);
                    self.progress.context_activated(&ctx.address, i + 1, total);
                    tokio::time::sleep(self.settle_interval).await;
                }
                Err(e) => {
                    warn!(context = %ctx.id, address = %ctx.address, error = %e, "activation failed, skipping");
                    summary.failed.push((ctx.id, e.to_string()));
                }
            }
        }

        let Some(original) = original else {
            warn!("no context was active; nothing to restore and no prompt to show");
            self.progress.warmup_done(&summary);
            return Ok(summary);
        };

        if let Err(e) = self.host.activate(original.id).await {
            warn!(context = %original.id, error = %e, "failed to restore original context");
        }
        summary.restored = Some(original.id);

        match self.host.inject_checkpoint(original.id, checkpoint).await {
            Ok(()) => summary.checkpoint_injected = true,
            Err(e) => {
                warn!(context = %original.id, error = %e, "could not inject confirmation checkpoint");
            }
        }

        info!(
            activated = summary.activated.len(),
            failed = summary.failed.len(),
            checkpoint = summary.checkpoint_injected,
            "warm-up completed"
        );
        self.progress.warmup_done(&summary);

        Ok(summary)
    }
}
