//! Save-as capability consumed by the artifact writer.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{info, warn};

use tabharvest_shared::{HarvestError, Result};

/// Where finished artifacts go.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Save `content` under a suggested `filename`; returns the final location.
    ///
    /// Interactive sinks may let the user change the name or decline.
    async fn save_as(&self, filename: &str, content: &str) -> Result<PathBuf>;

    /// Tell the user that nothing was found. Best effort.
    async fn notify_empty(&self) {
        warn!("no identifiers found, nothing to save");
    }
}

/// Writes artifacts into a fixed directory without prompting.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ArtifactSink for DirectorySink {
    async fn save_as(&self, filename: &str, content: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| HarvestError::io(&self.dir, e))?;

        let path = self.dir.join(filename);
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| HarvestError::io(&path, e))?;

        info!(path = %path.display(), bytes = content.len(), "artifact saved");
        Ok(path)
    }
}
