//! In-memory collaborators for orchestration tests.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use tabharvest_artifacts::ArtifactSink;
use tabharvest_extractor::ExtractionAgent;
use tabharvest_host::{Checkpoint, ContextHost};
use tabharvest_shared::{
    Context, ContextId, ExtractedIdentifier, HarvestError, PageContent, Result,
};

use crate::extract::HarvestReport;
use crate::gate::UserPrompt;
use crate::progress::{GateAnswer, ProgressReporter};
use crate::warmup::WarmupSummary;

pub(crate) fn magnet(c: char, len: usize) -> String {
    format!("magnet:?xt=urn:btih:{}", c.to_string().repeat(len))
}

/// What a fake context does when an agent runs in it.
#[derive(Debug, Clone)]
pub(crate) enum FakePage {
    Html(String),
    /// Sleep, then serve the markup.
    Slow(Duration, String),
    /// Content realm rejects the injection.
    Fail,
    /// Content realm crashes mid-call.
    Panic,
}

/// Host whose contexts are plain strings; records every call.
#[derive(Default)]
pub(crate) struct FakeHost {
    contexts: Mutex<Vec<Context>>,
    pages: HashMap<ContextId, FakePage>,
    failing_activation: HashSet<ContextId>,
    activations: Mutex<Vec<ContextId>>,
    injected: Mutex<Vec<ContextId>>,
    executions: AtomicUsize,
    pub(crate) in_flight: Arc<AtomicUsize>,
    pub(crate) max_in_flight: AtomicUsize,
    list_calls: AtomicUsize,
}

impl FakeHost {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a context; ids are assigned 1, 2, 3, ...
    pub(crate) fn with(mut self, address: &str, page: FakePage) -> Self {
        let contexts = self.contexts.get_mut().unwrap();
        let id = ContextId(contexts.len() as u64 + 1);
        contexts.push(Context {
            id,
            address: address.into(),
            active: false,
        });
        self.pages.insert(id, page);
        self
    }

    pub(crate) fn active(mut self, id: u64) -> Self {
        for ctx in self.contexts.get_mut().unwrap().iter_mut() {
            ctx.active = ctx.id == ContextId(id);
        }
        self
    }

    pub(crate) fn failing_activation(mut self, id: u64) -> Self {
        self.failing_activation.insert(ContextId(id));
        self
    }

    pub(crate) fn activations(&self) -> Vec<ContextId> {
        self.activations.lock().unwrap().clone()
    }

    pub(crate) fn injected(&self) -> Vec<ContextId> {
        self.injected.lock().unwrap().clone()
    }

    pub(crate) fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Simulate a context opening between phases.
    pub(crate) fn open(&self, address: &str) -> ContextId {
        let mut contexts = self.contexts.lock().unwrap();
        let id = ContextId(contexts.len() as u64 + 1);
        contexts.push(Context {
            id,
            address: address.into(),
            active: false,
        });
        id
    }

    fn context(&self, id: ContextId) -> Result<Context> {
        self.contexts
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or(HarvestError::UnknownContext(id))
    }
}

#[async_trait]
impl ContextHost for FakeHost {
    async fn list_contexts(&self) -> Result<Vec<Context>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.contexts.lock().unwrap().clone())
    }

    async fn activate(&self, id: ContextId) -> Result<()> {
        tokio::task::yield_now().await;
        if self.failing_activation.contains(&id) {
            return Err(HarvestError::host(format!("context {id} refused activation")));
        }
        self.context(id)?;
        for ctx in self.contexts.lock().unwrap().iter_mut() {
            ctx.active = ctx.id == id;
        }
        self.activations.lock().unwrap().push(id);
        Ok(())
    }

    async fn execute(
        &self,
        id: ContextId,
        agent: Arc<dyn ExtractionAgent>,
    ) -> Result<Vec<ExtractedIdentifier>> {
        let context = self.context(id)?;
        self.executions.fetch_add(1, Ordering::SeqCst);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let page = self.pages.get(&id).cloned().unwrap_or(FakePage::Fail);
        let outcome = match page {
            FakePage::Html(html) => Ok(html),
            FakePage::Slow(delay, html) => {
                tokio::time::sleep(delay).await;
                Ok(html)
            }
            FakePage::Fail => Err(HarvestError::NotMaterialized(id)),
            FakePage::Panic => {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                panic!("content realm of {id} crashed");
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let html = outcome?;
        Ok(agent.extract(&PageContent {
            address: context.address,
            html,
        }))
    }

    async fn inject_checkpoint(
        &self,
        id: ContextId,
        checkpoint: Arc<dyn Checkpoint>,
    ) -> Result<()> {
        let context = self.context(id)?;
        if !context.is_scriptable() {
            return Err(HarvestError::NotScriptable {
                id,
                address: context.address,
            });
        }
        self.injected.lock().unwrap().push(id);
        tokio::spawn(async move { checkpoint.run(context).await });
        Ok(())
    }
}

/// Checkpoint that does nothing.
pub(crate) struct NoopCheckpoint;

#[async_trait]
impl Checkpoint for NoopCheckpoint {
    async fn run(&self, _context: Context) {}
}

/// Prompt with a fixed answer that counts how often it was asked.
pub(crate) struct ScriptedPrompt {
    answer: Option<bool>,
    asked: AtomicUsize,
}

impl ScriptedPrompt {
    pub(crate) fn new(answer: Option<bool>) -> Self {
        Self {
            answer,
            asked: AtomicUsize::new(0),
        }
    }

    pub(crate) fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserPrompt for ScriptedPrompt {
    async fn confirm(&self, _context: &Context, _message: &str) -> Option<bool> {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.answer
    }
}

/// Sink that keeps saved artifacts in memory.
#[derive(Default)]
pub(crate) struct RecordingSink {
    pub(crate) saved: Mutex<Vec<(String, String)>>,
    pub(crate) empty_notices: AtomicUsize,
    /// In-flight extraction counter observed at save time.
    pub(crate) in_flight_gauge: Option<Arc<AtomicUsize>>,
    pub(crate) in_flight_at_save: Mutex<Vec<usize>>,
}

impl RecordingSink {
    pub(crate) fn watching_in_flight(in_flight: Arc<AtomicUsize>) -> Self {
        Self {
            in_flight_gauge: Some(in_flight),
            ..Self::default()
        }
    }

    pub(crate) fn saved(&self) -> Vec<(String, String)> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactSink for RecordingSink {
    async fn save_as(&self, filename: &str, content: &str) -> Result<PathBuf> {
        if let Some(gauge) = &self.in_flight_gauge {
            self.in_flight_at_save
                .lock()
                .unwrap()
                .push(gauge.load(Ordering::SeqCst));
        }
        self.saved
            .lock()
            .unwrap()
            .push((filename.to_string(), content.to_string()));
        Ok(PathBuf::from(filename))
    }

    async fn notify_empty(&self) {
        self.empty_notices.fetch_add(1, Ordering::SeqCst);
    }
}

/// Reporter that records warm-up and gate outcomes and wakes waiters.
#[derive(Default)]
pub(crate) struct RecordingProgress {
    pub(crate) warmups: Mutex<Vec<WarmupSummary>>,
    pub(crate) answers: Mutex<Vec<GateAnswer>>,
    pub(crate) reports: Mutex<Vec<HarvestReport>>,
    pub(crate) settled: Notify,
}

impl ProgressReporter for RecordingProgress {
    fn phase(&self, _name: &str) {}

    fn context_activated(&self, _address: &str, _current: usize, _total: usize) {}

    fn warmup_done(&self, summary: &WarmupSummary) {
        self.warmups.lock().unwrap().push(summary.clone());
    }

    fn gate(&self, answer: GateAnswer) {
        self.answers.lock().unwrap().push(answer);
        if answer != GateAnswer::Confirmed {
            self.settled.notify_one();
        }
    }

    fn context_extracted(&self, _address: &str, _found: usize, _settled: usize, _total: usize) {}

    fn done(&self, report: &HarvestReport) {
        self.reports.lock().unwrap().push(report.clone());
        self.settled.notify_one();
    }
}
