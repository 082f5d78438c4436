//! Artifact output: serializing a harvested [`ResultSet`] to a text file.
//!
//! - [`ArtifactWriter`]: renders content and filename, hands them to a sink
//! - [`ArtifactSink`]: the host's save-as capability
//! - [`DirectorySink`]: saves straight into a directory
//!
//! [`ResultSet`]: tabharvest_shared::ResultSet

pub mod sink;
pub mod writer;

pub use sink::{ArtifactSink, DirectorySink};
pub use writer::{ArtifactOutcome, ArtifactWriter, artifact_filename, render_content};
