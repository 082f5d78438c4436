//! Top-level state machine: warm-up → confirmation → extraction → artifact.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

use tabharvest_artifacts::{ArtifactSink, ArtifactWriter};
use tabharvest_extractor::{ExtractionAgent, MagnetAgent};
use tabharvest_host::ContextHost;
use tabharvest_shared::HarvestConfig;

use crate::extract::{HarvestReport, ParallelExtractor};
use crate::gate::{ConfirmationGate, UserPrompt};
use crate::progress::{ProgressReporter, SilentProgress};
use crate::warmup::{WarmupCoordinator, WarmupSummary};

// ---------------------------------------------------------------------------
// ProcessState
// ---------------------------------------------------------------------------

/// Where the controller is in its cycle.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Idle = 0,
    WarmingUp = 1,
    AwaitingConfirmation = 2,
    Extracting = 3,
}

impl ProcessState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::WarmingUp,
            2 => Self::AwaitingConfirmation,
            3 => Self::Extracting,
            _ => Self::Idle,
        }
    }
}

/// The single process-wide state value. Entry transitions are compare-and-set.
#[derive(Debug)]
struct StateCell(AtomicU8);

impl StateCell {
    fn new() -> Self {
        Self(AtomicU8::new(ProcessState::Idle as u8))
    }

    fn load(&self) -> ProcessState {
        ProcessState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn store(&self, state: ProcessState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Move `from` → `to` only if the current state is `from`.
    fn transition(&self, from: ProcessState, to: ProcessState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

/// Inbound notifications the controller listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Begin a warm-up cycle.
    StartProcess,
    /// Begin an extraction cycle.
    ConfirmExtract,
}

/// Fire-and-forget handle for sending [`Signal`]s to a controller.
#[derive(Debug, Clone)]
pub struct SignalSender(mpsc::UnboundedSender<Signal>);

impl SignalSender {
    pub fn from_channel(tx: mpsc::UnboundedSender<Signal>) -> Self {
        Self(tx)
    }

    pub fn start_process(&self) {
        self.send(Signal::StartProcess);
    }

    pub fn confirm_extract(&self) {
        self.send(Signal::ConfirmExtract);
    }

    fn send(&self, signal: Signal) {
        if self.0.send(signal).is_err() {
            debug!(?signal, "controller is gone, signal dropped");
        }
    }
}

// ---------------------------------------------------------------------------
// ProcessController
// ---------------------------------------------------------------------------

struct Inner {
    state: StateCell,
    host: Arc<dyn ContextHost>,
    agent: Arc<dyn ExtractionAgent>,
    prompt: Arc<dyn UserPrompt>,
    sink: Arc<dyn ArtifactSink>,
    progress: Arc<dyn ProgressReporter>,
    config: HarvestConfig,
    /// Handed to each confirmation gate.
    signals: SignalSender,
}

/// Owns the process state and sequences the two phases.
///
/// Signals arrive over an unbounded channel ([`ProcessController::signals`])
/// and are served by [`ProcessController::run`].
/// Each phase runs as its own task so the signal loop keeps draining, which
/// is what lets a second `start_process` be observed and ignored while the
/// first warm-up is still running.
pub struct ProcessController {
    inner: Arc<Inner>,
    signals_tx: SignalSender,
    signals_rx: mpsc::UnboundedReceiver<Signal>,
}

impl ProcessController {
    pub fn new(
        host: Arc<dyn ContextHost>,
        prompt: Arc<dyn UserPrompt>,
        sink: Arc<dyn ArtifactSink>,
        config: HarvestConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Inner {
            state: StateCell::new(),
            host,
            agent: Arc::new(MagnetAgent),
            prompt,
            sink,
            progress: Arc::new(SilentProgress),
            config,
            signals: SignalSender::from_channel(tx.clone()),
        };
        Self {
            inner: Arc::new(inner),
            signals_tx: SignalSender::from_channel(tx),
            signals_rx: rx,
        }
    }

    /// Replace the extraction agent. Must be called before any phase starts.
    pub fn with_agent(mut self, agent: Arc<dyn ExtractionAgent>) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.agent = agent;
        }
        self
    }

    /// Replace the progress reporter. Must be called before any phase starts.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.progress = progress;
        }
        self
    }

    /// A sender for this controller's inbound signals.
    pub fn signals(&self) -> SignalSender {
        self.signals_tx.clone()
    }

    pub fn state(&self) -> ProcessState {
        self.inner.state.load()
    }

    /// Start a warm-up cycle if idle. Returns `None` when the call was ignored.
    pub fn start_process(&self) -> Option<JoinHandle<()>> {
        start_process(&self.inner)
    }

    /// Run extraction now, whatever the recorded state.
    pub fn confirm_extract(&self) -> JoinHandle<HarvestReport> {
        confirm_extract(&self.inner)
    }

    /// Serve signals until `shutdown` resolves, then wait for phases still
    /// in flight.
    #[instrument(skip_all)]
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let Self {
            inner,
            signals_tx: _,
            mut signals_rx,
        } = self;
        tokio::pin!(shutdown);

        let mut warmups: Vec<JoinHandle<()>> = Vec::new();
        let mut extractions: Vec<JoinHandle<HarvestReport>> = Vec::new();

        loop {
            let signal = tokio::select! {
                biased;
                Some(signal) = signals_rx.recv() => signal,
                () = &mut shutdown => break,
            };
            debug!(?signal, state = ?inner.state.load(), "signal received");
            match signal {
                Signal::StartProcess => warmups.extend(start_process(&inner)),
                Signal::ConfirmExtract => extractions.push(confirm_extract(&inner)),
            }
            warmups.retain(|h| !h.is_finished());
            extractions.retain(|h| !h.is_finished());
        }

        debug!("shutting down, waiting for running phases");
        for handle in warmups {
            if let Err(e) = handle.await {
                error!(error = %e, "warm-up task failed");
            }
        }
        for handle in extractions {
            if let Err(e) = handle.await {
                error!(error = %e, "extraction task failed");
            }
        }
    }
}

fn start_process(inner: &Arc<Inner>) -> Option<JoinHandle<()>> {
    if !inner
        .state
        .transition(ProcessState::Idle, ProcessState::WarmingUp)
    {
        debug!(state = ?inner.state.load(), "start_process ignored, already busy");
        return None;
    }

    info!("starting warm-up");
    let inner = Arc::clone(inner);
    Some(tokio::spawn(async move {
        let gate = ConfirmationGate::new(
            Arc::clone(&inner.prompt),
            inner.signals.clone(),
            inner.config.confirm_delay,
            Arc::clone(&inner.progress),
        );
        let coordinator = WarmupCoordinator::new(
            Arc::clone(&inner.host),
            inner.config.settle_interval,
            Arc::clone(&inner.progress),
        );

        if let Err(e) = coordinator.run(Arc::new(gate)).await {
            error!(error = %e, "warm-up failed");
            inner.progress.warmup_done(&WarmupSummary::default());
        }

        // Confirmation is decoupled from the controller: hand off, then idle.
        inner.state.store(ProcessState::AwaitingConfirmation);
        inner.state.store(ProcessState::Idle);
    }))
}

fn confirm_extract(inner: &Arc<Inner>) -> JoinHandle<HarvestReport> {
    let claimed = inner
        .state
        .transition(ProcessState::AwaitingConfirmation, ProcessState::Extracting)
        || inner
            .state
            .transition(ProcessState::Idle, ProcessState::Extracting);
    if !claimed {
        debug!(state = ?inner.state.load(), "confirm_extract while busy, extracting anyway");
    }

    let inner = Arc::clone(inner);
    tokio::spawn(async move {
        let writer = ArtifactWriter::new(Arc::clone(&inner.sink), &inner.config.file_prefix)
            .sorted(inner.config.sort_output);
        let report = ParallelExtractor::new(
            Arc::clone(&inner.host),
            Arc::clone(&inner.agent),
            writer,
            Arc::clone(&inner.progress),
        )
        .max_concurrency(inner.config.max_concurrency)
        .timeout(inner.config.extract_timeout)
        .run()
        .await;

        if claimed {
            inner
                .state
                .transition(ProcessState::Extracting, ProcessState::Idle);
        }
        report
    })
}
