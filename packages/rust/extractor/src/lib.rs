//! Identifier extraction from materialized page content.
//!
//! This crate provides:
//! - [`ExtractionAgent`]: the contract for logic run inside one context
//! - [`MagnetAgent`]: the built-in agent (structural + textual scan)
//! - [`visible_text`]: an approximation of a document's rendered text

pub mod agent;
mod text;

pub use agent::{ExtractionAgent, MagnetAgent};
pub use text::visible_text;
