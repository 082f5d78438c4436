//! Shared types, error model, and configuration for tabharvest.
//!
//! This crate is the foundation depended on by all other tabharvest crates.
//! It provides:
//! - [`HarvestError`]: the unified error type
//! - Domain types ([`Context`], [`ExtractedIdentifier`], [`ResultSet`], [`RunId`])
//! - Configuration ([`AppConfig`], [`HarvestConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ArtifactSection, ConfirmSection, ExtractSection, FetchSection, HarvestConfig,
    WarmupSection, config_dir, config_file_path, load_config, load_config_from,
};
pub use error::{HarvestError, Result};
pub use types::{
    Context, ContextId, ExtractedIdentifier, PageContent, ResultSet, RunId, SCHEME_PREFIX,
    SYSTEM_SCHEMES, is_scriptable_address,
};
