#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel Stream
//!
//! Streams a voxel world to a renderer and coordinates a pool of parallel
//! mesh workers.
//!
//! The crate decides which columns of world data matter to a moving observer,
//! fetches and publishes them, and schedules the (re)meshing of every affected
//! 16³ section across a fixed set of workers. Completion is tracked per
//! section, rolled up per chunk and per world, so callers can wait for the
//! view to be fully rendered.
//!
//! ## Key Modules
//!
//! * `voxels` - Block, section and column addressing, and the world provider interface
//! * `streaming` - The viewport chunk streamer and its event channel
//! * `rendering` - The mesh coordinator: dirty propagation, batching and completion tracking
//! * `task_management` - Worker pools and the messages exchanged with workers
//! * `config` - Serde-loadable settings
//! * `error` - Fatal coordinator errors
//!
//! ## Architecture
//!
//! ```text
//! WorldProvider -> ViewportChunkStreamer --WorldEvent--> WorldRenderer
//!                                                          |   ^
//!                                           WorkerMessage  v   |  WorkerReply
//!                                                        WorkerPool
//! ```
//!
//! Both the streamer and the renderer are single threaded. Only the workers of
//! a [`task_management::ThreadWorkerPool`] run in parallel, and they share
//! nothing with the coordinator beyond their channels.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let streamer = ViewportChunkStreamer::new(world, StreamerConfig::default());
//! let events = streamer.subscribe();
//! let mut renderer = WorldRenderer::new(
//!     WorldRendererConfig::default(),
//!     WorldConfig::default(),
//!     |n| ThreadWorkerPool::new(n, |_| Box::new(MyMesher::default())),
//!     RendererHooks::default(),
//! );
//! renderer.set_view_distance(streamer.config().view_distance);
//! renderer.set_version("1.20.4", game_data)?;
//!
//! pollster::block_on(streamer.init(position));
//! for event in events.try_iter() {
//!     renderer.apply_world_event(&event)?;
//! }
//! renderer.process_tick()?;
//! ```

pub mod config;
pub mod error;
pub mod rendering;
pub mod streaming;
pub mod task_management;
pub mod voxels;

pub use config::{StreamerConfig, WorldConfig, WorldRendererConfig};
pub use error::{StreamError, StreamResult};
pub use rendering::{RendererHooks, WorldRenderer};
pub use streaming::events::{EntityEvent, WorldEvent};
pub use streaming::ViewportChunkStreamer;
pub use task_management::{InlineWorkerPool, SectionMesher, ThreadWorkerPool, WorkerPool};
pub use voxels::coords::{BlockPos, ChunkKey, SectionKey};
pub use voxels::world::{Column, WorldProvider};

/// Initializes `env_logger` on stdout, filtered by `RUST_LOG`.
///
/// Meant for binaries; the library itself only logs through the `log` facade.
pub fn init_logging() {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();
}
