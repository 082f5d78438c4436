//! JSON session file describing a workspace of browsing contexts.
//!
//! ```json
//! {
//!   "contexts": [
//!     { "address": "chrome://settings" },
//!     { "id": 7, "address": "https://tracker.example.org/t/1", "active": true },
//!     { "address": "file:///tmp/saved.html", "html_path": "saved.html" }
//!   ]
//! }
//! ```
//!
//! Contexts with inline `html` (or `html_path`, relative to the session file)
//! are materialized from the start; the rest are materialized on activation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use tabharvest_shared::{HarvestError, Result};

/// Root structure of a session file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionFile {
    pub contexts: Vec<SessionContext>,
}

/// One context entry in a session file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionContext {
    /// Host handle; defaults to the 1-based position in the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Address of the context.
    #[serde(default)]
    pub address: String,
    /// Whether the context is currently active.
    #[serde(default)]
    pub active: bool,
    /// Inline snapshot of the rendered document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    /// Snapshot stored next to the session file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_path: Option<PathBuf>,
}

impl SessionFile {
    /// Parse a session from JSON text. `html_path` entries are left unresolved.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut session: SessionFile = serde_json::from_str(json)
            .map_err(|e| HarvestError::session(format!("invalid session JSON: {e}")))?;
        session.assign_ids();
        session.validate()?;
        Ok(session)
    }

    fn assign_ids(&mut self) {
        for (i, ctx) in self.contexts.iter_mut().enumerate() {
            if ctx.id.is_none() {
                ctx.id = Some(i as u64 + 1);
            }
        }
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for ctx in &self.contexts {
            let id = ctx.id.unwrap_or_default();
            if !seen.insert(id) {
                return Err(HarvestError::session(format!("duplicate context id {id}")));
            }
        }

        let active = self.contexts.iter().filter(|c| c.active).count();
        if active > 1 {
            return Err(HarvestError::session(format!(
                "{active} contexts are marked active; at most one is allowed"
            )));
        }

        Ok(())
    }

    /// Read every `html_path` snapshot into `html`, relative to `base_dir`.
    fn resolve_snapshots(&mut self, base_dir: &Path) -> Result<()> {
        for ctx in &mut self.contexts {
            if ctx.html.is_some() {
                continue;
            }
            if let Some(rel) = &ctx.html_path {
                let path = base_dir.join(rel);
                let html =
                    std::fs::read_to_string(&path).map_err(|e| HarvestError::io(&path, e))?;
                ctx.html = Some(html);
            }
        }
        Ok(())
    }
}

/// Load and validate a session file from disk.
pub fn load_session(path: &Path) -> Result<SessionFile> {
    let content = std::fs::read_to_string(path).map_err(|e| HarvestError::io(path, e))?;
    let mut session = SessionFile::from_json(&content)?;

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    session.resolve_snapshots(base_dir)?;

    tracing::debug!(
        path = %path.display(),
        contexts = session.contexts.len(),
        "loaded session"
    );

    Ok(session)
}
