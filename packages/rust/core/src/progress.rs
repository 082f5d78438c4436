//! Progress callbacks for reporting harvest status to a front end.

use crate::extract::HarvestReport;
use crate::warmup::WarmupSummary;

/// How the confirmation checkpoint was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateAnswer {
    Confirmed,
    Declined,
    /// The prompt could not be shown or was dismissed without an answer.
    Unanswered,
}

/// Progress callback for reporting process status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each context is activated during warm-up.
    fn context_activated(&self, address: &str, current: usize, total: usize);
    /// Called when warm-up has restored the original context.
    fn warmup_done(&self, summary: &WarmupSummary);
    /// Called when the confirmation checkpoint settles.
    fn gate(&self, answer: GateAnswer);
    /// Called when one context's extraction settles (success or isolated failure).
    fn context_extracted(&self, address: &str, found: usize, settled: usize, total: usize);
    /// Called when phase two completes.
    fn done(&self, report: &HarvestReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn context_activated(&self, _address: &str, _current: usize, _total: usize) {}
    fn warmup_done(&self, _summary: &WarmupSummary) {}
    fn gate(&self, _answer: GateAnswer) {}
    fn context_extracted(&self, _address: &str, _found: usize, _settled: usize, _total: usize) {}
    fn done(&self, _report: &HarvestReport) {}
}
