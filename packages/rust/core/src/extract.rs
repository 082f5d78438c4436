//! Phase two: concurrent extraction across every context, merged into one set.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};

use tabharvest_artifacts::{ArtifactOutcome, ArtifactWriter};
use tabharvest_extractor::ExtractionAgent;
use tabharvest_host::{ContextHost, Workspace};
use tabharvest_shared::{
    Context, ContextId, ExtractedIdentifier, HarvestError, ResultSet, Result, RunId,
};

use crate::progress::ProgressReporter;

// ---------------------------------------------------------------------------
// HarvestReport
// ---------------------------------------------------------------------------

/// A context whose extraction failed and contributed nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextFailure {
    pub id: ContextId,
    pub address: String,
    pub reason: String,
}

/// What happened to the artifact at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactStatus {
    Saved { path: PathBuf, filename: String },
    /// Nothing was found; no save was requested.
    Empty,
    /// The sink refused or failed the save.
    Failed(String),
}

/// Diagnostics for one completed extraction phase.
#[derive(Debug, Clone)]
pub struct HarvestReport {
    pub run_id: RunId,
    /// Contexts in the workspace at enumeration time.
    pub contexts_total: usize,
    /// Scriptable contexts an agent was sent to.
    pub contexts_scanned: usize,
    /// Isolated per-context failures.
    pub failures: Vec<ContextFailure>,
    /// Unique identifiers after merge.
    pub identifiers: usize,
    pub artifact: ArtifactStatus,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// ParallelExtractor
// ---------------------------------------------------------------------------

/// Fans the extraction agent out to every scriptable context.
///
/// Every invocation is isolated: an error, a timeout or a panic in one
/// context counts as zero identifiers from it. All invocations settle before
/// anything is merged or written.
pub struct ParallelExtractor {
    host: Arc<dyn ContextHost>,
    agent: Arc<dyn ExtractionAgent>,
    writer: ArtifactWriter,
    max_concurrency: Option<usize>,
    timeout: Duration,
    progress: Arc<dyn ProgressReporter>,
}

impl ParallelExtractor {
    pub fn new(
        host: Arc<dyn ContextHost>,
        agent: Arc<dyn ExtractionAgent>,
        writer: ArtifactWriter,
        progress: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            host,
            agent,
            writer,
            max_concurrency: None,
            timeout: Duration::from_secs(10),
            progress,
        }
    }

    /// Cap in-flight invocations (`None` = one task per context).
    pub fn max_concurrency(mut self, limit: Option<usize>) -> Self {
        self.max_concurrency = limit;
        self
    }

    /// Per-context deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run phase two and write the artifact.
    #[instrument(skip_all, fields(run_id = tracing::field::Empty))]
    pub async fn run(&self) -> HarvestReport {
        let start = Instant::now();
        let run_id = RunId::new();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));

        self.progress.phase("Extracting");

        // Always re-enumerate: contexts may have opened or closed since warm-up.
        let workspace = match Workspace::enumerate(self.host.as_ref()).await {
            Ok(ws) => ws,
            Err(e) => {
                error!(error = %e, "failed to enumerate contexts");
                Workspace::default()
            }
        };
        let targets: Vec<Context> = workspace.scriptable().cloned().collect();
        let total = targets.len();

        info!(
            agent = self.agent.name(),
            contexts = workspace.len(),
            scriptable = total,
            max_concurrency = ?self.max_concurrency,
            "starting extraction"
        );

        let semaphore = self
            .max_concurrency
            .map(|limit| Arc::new(Semaphore::new(limit.max(1))));

        let mut handles = Vec::with_capacity(total);
        for ctx in &targets {
            let host = Arc::clone(&self.host);
            let agent = Arc::clone(&self.agent);
            let semaphore = semaphore.clone();
            let timeout = self.timeout;
            let id = ctx.id;

            handles.push(tokio::spawn(async move {
                let _permit = match semaphore {
                    Some(sem) => Some(
                        sem.acquire_owned()
                            .await
                            .map_err(|e| HarvestError::Task(e.to_string()))?,
                    ),
                    None => None,
                };
                extract_one(host.as_ref(), agent, id, timeout).await
            }));
        }

        // Full barrier: every invocation settles before anything is merged.
        let mut per_context: Vec<Vec<ExtractedIdentifier>> = Vec::with_capacity(total);
        let mut failures = Vec::new();

        for (i, (ctx, handle)) in targets.iter().zip(handles).enumerate() {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(e) => Err(HarvestError::Task(e.to_string())),
            };

            match outcome {
                Ok(found) => {
                    debug!(context = %ctx.id, address = %ctx.address, found = found.len(), "extracted");
                    self.progress
                        .context_extracted(&ctx.address, found.len(), i + 1, total);
                    per_context.push(found);
                }
                Err(e) => {
                    warn!(context = %ctx.id, address = %ctx.address, error = %e, "extraction failed, skipping context");
                    self.progress.context_extracted(&ctx.address, 0, i + 1, total);
                    failures.push(ContextFailure {
                        id: ctx.id,
                        address: ctx.address.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let mut set = ResultSet::new();
        for found in per_context {
            set.extend(found);
        }
        let identifiers = set.len();

        self.progress.phase("Writing artifact");
        let artifact = match self.writer.write(set).await {
            Ok(ArtifactOutcome::Saved { path, filename, .. }) => {
                ArtifactStatus::Saved { path, filename }
            }
            Ok(ArtifactOutcome::Empty) => ArtifactStatus::Empty,
            Err(e) => {
                warn!(error = %e, "artifact save failed");
                ArtifactStatus::Failed(e.to_string())
            }
        };

        let report = HarvestReport {
            run_id,
            contexts_total: workspace.len(),
            contexts_scanned: total,
            failures,
            identifiers,
            artifact,
            elapsed: start.elapsed(),
        };

        info!(
            scanned = report.contexts_scanned,
            failed = report.failures.len(),
            identifiers = report.identifiers,
            duration_ms = report.elapsed.as_millis(),
            "extraction completed"
        );
        self.progress.done(&report);

        report
    }
}

/// Run the agent in one context under a deadline.
async fn extract_one(
    host: &dyn ContextHost,
    agent: Arc<dyn ExtractionAgent>,
    id: ContextId,
    timeout: Duration,
) -> Result<Vec<ExtractedIdentifier>> {
    let started = Instant::now();
    match tokio::time::timeout(timeout, host.execute(id, agent)).await {
        Ok(result) => result,
        Err(_) => Err(HarvestError::Timeout {
            id,
            elapsed: started.elapsed(),
        }),
    }
}
