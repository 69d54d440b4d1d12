//! Error types for the streaming and mesh coordination core.
//!
//! Every variant describes a broken invariant between the coordinator and its
//! workers or callers. Expected conditions (a column that does not exist yet,
//! a dirty mark outside the view) are never reported as errors.

use thiserror::Error;

use crate::voxels::coords::SectionKey;

/// Result alias used throughout the crate.
pub type StreamResult<T> = Result<T, StreamError>;

/// Unrecoverable coordinator failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// A message was dispatched before the worker pool was created.
    #[error("mesh workers are not initialized")]
    WorkersNotInitialized,

    /// A section was marked dirty before the view distance was configured.
    #[error("view distance is not set")]
    ViewDistanceNotSet,

    /// A column was added before a version was set on the renderer.
    #[error("renderer is not active, set a version first")]
    RendererInactive,

    /// A worker reported a finished section nobody was waiting for.
    #[error("sectionFinished for non-outstanding section {key}")]
    UnmatchedSectionFinished {
        /// The section named by the worker
        key: SectionKey,
    },

    /// A worker thread hung up while the pool was still in use.
    #[error("mesh worker {index} disconnected")]
    WorkerDisconnected {
        /// Index of the worker in the pool
        index: usize,
    },

    /// The world was reset while a caller waited for convergence.
    #[error("world was reset before chunks finished rendering")]
    WorldReset,
}
