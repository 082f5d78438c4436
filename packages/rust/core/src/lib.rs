//! Harvest orchestration for tabharvest.
//!
//! This crate ties the host, the extraction agent and the artifact writer
//! into the two-phase harvest cycle driven by [`ProcessController`]:
//! warm-up ([`WarmupCoordinator`]), confirmation ([`ConfirmationGate`]),
//! then extraction ([`ParallelExtractor`]).

pub mod controller;
pub mod extract;
pub mod gate;
pub mod progress;
pub mod warmup;

#[cfg(test)]
mod testing;

pub use controller::{ProcessController, ProcessState, Signal, SignalSender};
pub use extract::{ArtifactStatus, ContextFailure, HarvestReport, ParallelExtractor};
pub use gate::{AutoConfirm, CONFIRM_MESSAGE, ConfirmationGate, UserPrompt};
pub use progress::{GateAnswer, ProgressReporter, SilentProgress};
pub use warmup::{WarmupCoordinator, WarmupSummary};
