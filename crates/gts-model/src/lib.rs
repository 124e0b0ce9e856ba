//! Normalized mesh model for the GTS exporter.
//!
//! The reader (`gts-fpn`) produces a [`MeshModel`]; every writer in `gts-io`
//! consumes it read-only. The [`progress`] module carries the progress and
//! cancellation protocol both sides report through.

pub mod error;
pub mod mesh;
pub mod progress;
pub mod summary;

pub use error::ValidationError;
pub use mesh::{Element, ElementKind, Group, Member, MeshModel, Node, Property};
pub use progress::{
    Cancellable, Cancelled, NoProgress, ProgressSink, ProgressTracker, ProgressUpdate,
};
pub use summary::{GroupSummary, MeshSummary};
