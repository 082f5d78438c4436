//! The yes/no checkpoint between warm-up and extraction.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use tabharvest_host::Checkpoint;
use tabharvest_shared::Context;

use crate::controller::SignalSender;
use crate::progress::{GateAnswer, ProgressReporter};

/// Text shown by the confirmation prompt.
pub const CONFIRM_MESSAGE: &str = "All contexts have been activated.\n\n\
     Confirm to extract from every context in the background and save the result.\n\
     Cancel to abandon.";

/// A blocking yes/no question put to the user.
#[async_trait]
pub trait UserPrompt: Send + Sync {
    /// Ask `message` inside `context`. `None` means no answer was given.
    async fn confirm(&self, context: &Context, message: &str) -> Option<bool>;
}

/// Prompt that always answers yes, for unattended runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

#[async_trait]
impl UserPrompt for AutoConfirm {
    async fn confirm(&self, _context: &Context, _message: &str) -> Option<bool> {
        Some(true)
    }
}

/// Checkpoint injected into the restored context after warm-up.
///
/// On "yes" it sends `confirm_extract` back to the controller; on "no" or no
/// answer it does nothing further and the process stays idle.
pub struct ConfirmationGate {
    prompt: Arc<dyn UserPrompt>,
    signals: SignalSender,
    delay: Duration,
    progress: Arc<dyn ProgressReporter>,
}

impl ConfirmationGate {
    pub fn new(
        prompt: Arc<dyn UserPrompt>,
        signals: SignalSender,
        delay: Duration,
        progress: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            prompt,
            signals,
            delay,
            progress,
        }
    }
}

#[async_trait]
impl Checkpoint for ConfirmationGate {
    async fn run(&self, context: Context) {
        // Let the activation transition settle before blocking on the user.
        tokio::time::sleep(self.delay).await;

        let answer = match self.prompt.confirm(&context, CONFIRM_MESSAGE).await {
            Some(true) => GateAnswer::Confirmed,
            Some(false) => GateAnswer::Declined,
            None => GateAnswer::Unanswered,
        };

        match answer {
            GateAnswer::Confirmed => {
                info!(context = %context.id, "extraction confirmed");
                self.signals.confirm_extract();
            }
            GateAnswer::Declined => info!(context = %context.id, "extraction declined"),
            GateAnswer::Unanswered => debug!(context = %context.id, "confirmation left unanswered"),
        }

        self.progress.gate(answer);
    }
}
