//! Final step of a harvest: result set → named, timestamped text artifact.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Local, Timelike};
use tracing::{info, instrument};

use tabharvest_shared::{ResultSet, Result};

use crate::sink::ArtifactSink;

/// What the writer did with a result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactOutcome {
    /// The set was empty; the sink was notified and nothing was saved.
    Empty,
    /// The artifact was handed to the sink and saved.
    Saved {
        path: PathBuf,
        filename: String,
        count: usize,
    },
}

/// Serializes result sets and hands them to an [`ArtifactSink`].
pub struct ArtifactWriter {
    sink: Arc<dyn ArtifactSink>,
    file_prefix: String,
    sort_output: bool,
}

impl ArtifactWriter {
    pub fn new(sink: Arc<dyn ArtifactSink>, file_prefix: impl Into<String>) -> Self {
        Self {
            sink,
            file_prefix: file_prefix.into(),
            sort_output: false,
        }
    }

    /// Sort identifiers lexicographically instead of keeping merge order.
    pub fn sorted(mut self, sort_output: bool) -> Self {
        self.sort_output = sort_output;
        self
    }

    /// Write `set` through the sink.
    ///
    /// An empty set is a terminal notice, not an error: the sink is told and
    /// no save is requested.
    #[instrument(skip_all, fields(count = set.len()))]
    pub async fn write(&self, mut set: ResultSet) -> Result<ArtifactOutcome> {
        if set.is_empty() {
            info!("empty result set, skipping save");
            self.sink.notify_empty().await;
            return Ok(ArtifactOutcome::Empty);
        }

        if self.sort_output {
            set.sort();
        }

        let filename = artifact_filename(&self.file_prefix, set.len(), &Local::now());
        let content = render_content(&set);
        let path = self.sink.save_as(&filename, &content).await?;

        Ok(ArtifactOutcome::Saved {
            path,
            filename,
            count: set.len(),
        })
    }
}

/// `<prefix>_<count>_<hour>_<minute>_<second>.txt`, without zero-padding.
pub fn artifact_filename(prefix: &str, count: usize, at: &impl Timelike) -> String {
    format!(
        "{prefix}_{count}_{}_{}_{}.txt",
        at.hour(),
        at.minute(),
        at.second()
    )
}

/// One identifier per line, every line newline-terminated.
pub fn render_content(set: &ResultSet) -> String {
    let mut out = String::new();
    for id in set.iter() {
        out.push_str(id.as_str());
        out.push('\n');
    }
    out
}
