//! Host collaborator layer: the browser-side capabilities tabharvest consumes.
//!
//! This crate provides:
//! - [`ContextHost`]: enumerate, activate and run logic inside contexts
//! - [`Checkpoint`]: logic injected fire-and-forget into one context
//! - [`Workspace`]: a snapshot of the current window's contexts
//! - [`SessionHost`]: a host backed by a JSON session file

pub mod session;
pub mod session_host;
pub mod workspace;

use std::sync::Arc;

use async_trait::async_trait;

use tabharvest_extractor::ExtractionAgent;
use tabharvest_shared::{Context, ContextId, ExtractedIdentifier, Result};

pub use session::{SessionContext, SessionFile, load_session};
pub use session_host::SessionHost;
pub use workspace::Workspace;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Capabilities exposed by the environment that owns the browsing contexts.
///
/// Every call is a suspension point. Implementations decide what
/// "activation" means for content materialization; callers must not assume
/// content is ready when `activate` returns.
#[async_trait]
pub trait ContextHost: Send + Sync {
    /// List every context of the current workspace, in host order.
    async fn list_contexts(&self) -> Result<Vec<Context>>;

    /// Make `id` the active context of its workspace.
    async fn activate(&self, id: ContextId) -> Result<()>;

    /// Run `agent` inside the content realm of `id` and return its result.
    async fn execute(
        &self,
        id: ContextId,
        agent: Arc<dyn ExtractionAgent>,
    ) -> Result<Vec<ExtractedIdentifier>>;

    /// Inject `checkpoint` into `id` and return without waiting for it.
    async fn inject_checkpoint(&self, id: ContextId, checkpoint: Arc<dyn Checkpoint>)
    -> Result<()>;
}

/// Logic the host runs inside a context on tabharvest's behalf.
#[async_trait]
pub trait Checkpoint: Send + Sync {
    /// Run against `context`. Outcomes are reported out-of-band.
    async fn run(&self, context: Context);
}
