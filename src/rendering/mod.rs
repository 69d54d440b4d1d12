//! # Mesh Coordination
//!
//! The [`WorldRenderer`] is the single owner of all mesh bookkeeping. It turns
//! column and block changes into dirty sections, routes each section to a
//! fixed worker, batches the messages per scheduling tick, and tracks worker
//! completions until the world converges.
//!
//! ## Key Components
//!
//! * [`WorldRenderer`] - the coordinator, generic over its [`WorkerPool`]
//! * [`completion::SectionCompletionTracker`] - outstanding job counts and
//!   chunk/world completion state
//! * [`dirty::DirtyRegionPropagator`] - which sections a change touches
//! * [`dispatch::PendingMessageQueue`] - per-worker batching, one flush per tick
//! * [`RendererHooks`] - optional callbacks into the rendering owner
//!
//! ## Scheduling
//!
//! The coordinator is single threaded. The owner drives it once per tick:
//!
//! ```rust,ignore
//! loop {
//!     for event in events.try_iter() {
//!         renderer.apply_world_event(&event)?;
//!     }
//!     renderer.process_tick()?; // flush queued batches, handle worker replies
//! }
//! ```
//!
//! Every error returned here is fatal: it means coordinator and workers no
//! longer agree, and the renderer has to be reset.

pub mod completion;
pub mod dirty;
pub mod dispatch;

use std::sync::Arc;

use cgmath::Point3;
use log::{debug, info, trace, warn};

use crate::config::{WorldConfig, WorldRendererConfig};
use crate::error::{StreamError, StreamResult};
use crate::streaming::events::WorldEvent;
use crate::task_management::messages::{DirtySection, MesherConfig, WorkerMessage, WorkerReply};
use crate::task_management::WorkerPool;
use crate::voxels::coords::{chunk_pos, BlockPos, ChunkKey, CHUNK_DIMENSION};
use completion::{RenderWaiter, SectionCompletionTracker};
use dirty::DirtyRegionPropagator;
use dispatch::{worker_for_section, PendingMessageQueue};

/// Optional callbacks into the rendering owner.
///
/// Every field may be left as `None`.
#[derive(Default)]
pub struct RendererHooks {
    /// Worker replies other than completions, forwarded verbatim with the
    /// index of the sending worker
    pub on_worker_message: Option<Box<dyn FnMut(usize, serde_json::Value)>>,
    /// The world converged: nothing outstanding and every loaded chunk finished
    pub on_all_chunks_loaded: Option<Box<dyn FnMut()>>,
    /// A section was accepted for (re)meshing; the flag is the dirty value
    pub on_dirty: Option<Box<dyn FnMut(BlockPos, bool)>>,
    /// Called for every loaded chunk when the viewer moves
    pub update_pos_data_chunk: Option<Box<dyn FnMut(ChunkKey)>>,
    /// A completion was processed
    pub on_update: Option<Box<dyn FnMut()>>,
    /// The chunk border setting changed
    pub update_show_chunk_borders: Option<Box<dyn FnMut(bool)>>,
}

/// Builds a worker pool of the requested size.
pub type PoolFactory<P> = Box<dyn FnMut(usize) -> P>;

/// Coordinator of the mesh worker pool and its completion bookkeeping.
pub struct WorldRenderer<P: WorkerPool> {
    config: WorldRendererConfig,
    mesher_config: Arc<MesherConfig>,
    spawn_pool: PoolFactory<P>,
    pool: Option<P>,
    active: bool,
    version: Option<String>,
    view_distance: Option<i32>,
    viewer_position: Point3<f64>,
    tracker: SectionCompletionTracker,
    queue: PendingMessageQueue,
    propagator: DirtyRegionPropagator,
    hooks: RendererHooks,
}

impl<P: WorkerPool> WorldRenderer<P> {
    /// Creates an inactive renderer without workers.
    ///
    /// # Arguments
    /// * `config` - Worker count and display settings
    /// * `world` - Vertical extent of the world
    /// * `spawn_pool` - Builds a pool of the given size on `init_workers`
    /// * `hooks` - Optional callbacks into the rendering owner
    pub fn new<F>(
        config: WorldRendererConfig,
        world: WorldConfig,
        spawn_pool: F,
        hooks: RendererHooks,
    ) -> Self
    where
        F: FnMut(usize) -> P + 'static,
    {
        WorldRenderer {
            config,
            mesher_config: Arc::new(MesherConfig::default()),
            spawn_pool: Box::new(spawn_pool),
            pool: None,
            active: false,
            version: None,
            view_distance: None,
            viewer_position: Point3::new(0.0, 0.0, 0.0),
            tracker: SectionCompletionTracker::new(world),
            queue: PendingMessageQueue::new(),
            propagator: DirtyRegionPropagator::new(world),
            hooks,
        }
    }

    /// Replaces the worker pool with `num_workers` fresh workers.
    pub fn init_workers(&mut self, num_workers: usize) {
        if let Some(mut pool) = self.pool.take() {
            pool.terminate();
        }
        self.pool = Some((self.spawn_pool)(num_workers));
    }

    /// Terminates every worker and clears all bookkeeping.
    ///
    /// Callers waiting for convergence get [`StreamError::WorldReset`]. The
    /// renderer stays inactive until the next [`set_version`](Self::set_version).
    pub fn reset_world(&mut self) {
        if let Some(mut pool) = self.pool.take() {
            pool.terminate();
        }
        self.tracker.reset();
        self.queue.clear();
        self.active = false;
        info!("World reset");
    }

    /// Starts a new game session for `version`.
    ///
    /// Resets the world, spawns the configured number of workers and
    /// broadcasts the version's game data to them.
    pub fn set_version(
        &mut self,
        version: &str,
        global_data: serde_json::Value,
    ) -> StreamResult<()> {
        self.reset_world();
        self.version = Some(version.to_owned());
        self.init_workers(self.config.num_workers);
        self.active = true;
        Arc::make_mut(&mut self.mesher_config).version = version.to_owned();
        info!(
            "Renderer active for version {version} with {} workers",
            self.worker_count()
        );

        self.broadcast(&WorkerMessage::GlobalData {
            data: Arc::new(global_data),
            config: self.mesher_config.clone(),
        })
    }

    /// Sends the block state and texture atlas description to every worker.
    pub fn set_atlas_data(
        &mut self,
        json: serde_json::Value,
        texture_size: u32,
    ) -> StreamResult<()> {
        Arc::make_mut(&mut self.mesher_config).texture_size = texture_size;
        self.broadcast(&WorkerMessage::AtlasData {
            json: Arc::new(json),
            config: self.mesher_config.clone(),
        })
    }

    /// Mutable access to the meshing parameters attached to future requests.
    pub fn mesher_config_mut(&mut self) -> &mut MesherConfig {
        Arc::make_mut(&mut self.mesher_config)
    }

    /// Sets the view distance in chunks. Required before any dirty mark.
    pub fn set_view_distance(&mut self, view_distance: i32) {
        self.view_distance = Some(view_distance);
    }

    /// Toggles chunk border outlines and hands the new value to the owner.
    pub fn set_show_chunk_borders(&mut self, show: bool) {
        self.config.show_chunk_borders = show;
        if let Some(update) = self.hooks.update_show_chunk_borders.as_mut() {
            update(show);
        }
    }

    /// Stores the viewer position and lets the owner refresh position
    /// dependent data of every loaded chunk.
    pub fn update_viewer_position(&mut self, position: Point3<f64>) {
        self.viewer_position = position;
        if let Some(update) = self.hooks.update_pos_data_chunk.as_mut() {
            for key in self.tracker.loaded_chunks() {
                update(key);
            }
        }
    }

    /// Sends an identical message to every worker.
    ///
    /// # Errors
    /// [`StreamError::WorkersNotInitialized`] before `init_workers`.
    pub fn broadcast(&mut self, message: &WorkerMessage) -> StreamResult<()> {
        self.pool
            .as_mut()
            .ok_or(StreamError::WorkersNotInitialized)?
            .broadcast(message)
    }

    /// Queues `pos`'s section for (re)meshing on its worker.
    ///
    /// A silent no-op without workers or when the section lies further than
    /// the view distance from the viewer. Accepted marks clear the sticky
    /// fully-rendered flag.
    ///
    /// # Errors
    /// [`StreamError::ViewDistanceNotSet`] before `set_view_distance`.
    pub fn set_section_dirty(&mut self, pos: BlockPos, value: bool) -> StreamResult<()> {
        let view_distance = self.view_distance.ok_or(StreamError::ViewDistanceNotSet)?;

        let worker_count = self.worker_count();
        let (dx, dz) = self.chunk_distance(pos);
        if worker_count == 0 || dx > view_distance || dz > view_distance {
            return Ok(());
        }

        let key = pos.section_key();
        if let Some(on_dirty) = self.hooks.on_dirty.as_mut() {
            on_dirty(pos, value);
        }

        let worker = worker_for_section(key, worker_count);
        self.tracker.mark_dirty(key);
        trace!("Section {key} dirty ({value}) -> worker {worker}");
        self.dispatch_message(
            worker,
            DirtySection {
                x: pos.x,
                y: pos.y,
                z: pos.z,
                value,
                config: self.mesher_config.clone(),
            },
        );
        Ok(())
    }

    fn dispatch_message(&mut self, worker: usize, section: DirtySection) {
        if self.queue.push(worker, section) {
            trace!("Dirty flush scheduled for end of tick");
        }
    }

    /// Sends every queued dirty batch, one message per worker, if a flush was
    /// scheduled this tick. Returns the number of sections sent.
    pub fn flush_messages(&mut self) -> StreamResult<usize> {
        if !self.queue.is_flush_scheduled() {
            return Ok(0);
        }
        let batches = self.queue.take_batches();
        let pool = self.pool.as_mut().ok_or(StreamError::WorkersNotInitialized)?;

        let mut sent = 0;
        for (worker, sections) in batches {
            sent += sections.len();
            pool.send_to(worker, WorkerMessage::Dirty { sections })?;
        }
        trace!("Flushed {sent} dirty sections");
        Ok(sent)
    }

    /// Makes a column available to the workers and queues all of its
    /// sections, plus neighbour seams, for meshing.
    ///
    /// Neighbour sections are skipped for light-only updates unless smooth
    /// lighting is enabled.
    ///
    /// # Errors
    /// [`StreamError::RendererInactive`] before `set_version`, and
    /// [`StreamError::WorkersNotInitialized`] without workers.
    pub fn add_column(
        &mut self,
        x: i32,
        z: i32,
        chunk: Arc<[u8]>,
        is_light_update: bool,
    ) -> StreamResult<()> {
        if !self.active {
            return Err(StreamError::RendererInactive);
        }
        if self.worker_count() == 0 {
            return Err(StreamError::WorkersNotInitialized);
        }

        let key = ChunkKey::containing(x, z);
        self.tracker.add_chunk(key);
        self.broadcast(&WorkerMessage::Chunk { x, z, chunk })?;

        let include_neighbours = !is_light_update || self.mesher_config.smooth_lighting;
        for mark in self.propagator.column_added(x, z, include_neighbours) {
            self.set_section_dirty(mark.pos, mark.value)?;
        }
        debug!("Column {key} added");
        Ok(())
    }

    /// Tells the workers a column is gone and drops its bookkeeping.
    ///
    /// Jobs already in flight for the column are retired so their
    /// completions are still accepted. The column's sections are then queued
    /// with `value = false` so workers drop their geometry; those jobs count
    /// as outstanding like any other until answered.
    ///
    /// A removal only converges the world when it retired the last
    /// outstanding job and queued nothing new.
    pub fn remove_column(&mut self, x: i32, z: i32) -> StreamResult<()> {
        let key = ChunkKey::containing(x, z);
        let retired = self.tracker.remove_chunk(key);
        self.broadcast(&WorkerMessage::UnloadChunk { x, z })?;
        for mark in self.propagator.column_removed(x, z) {
            self.set_section_dirty(mark.pos, mark.value)?;
        }

        if retired && self.tracker.check_convergence() {
            self.notify_converged();
        }
        debug!("Column {key} removed");
        Ok(())
    }

    /// Applies a single block change and queues every section it touches.
    pub fn set_block_state_id(&mut self, pos: BlockPos, state_id: u32) -> StreamResult<()> {
        self.broadcast(&WorkerMessage::BlockUpdate { pos, state_id })?;
        for mark in self.propagator.block_changed(pos) {
            self.set_section_dirty(mark.pos, mark.value)?;
        }
        Ok(())
    }

    /// Feeds a streamer event into the renderer.
    pub fn apply_world_event(&mut self, event: &WorldEvent) -> StreamResult<()> {
        match event {
            WorldEvent::LoadChunk { x, z, chunk, .. } => {
                self.add_column(*x, *z, chunk.clone(), false)
            }
            WorldEvent::UnloadChunk { x, z } => self.remove_column(*x, *z),
            WorldEvent::BlockUpdate { pos, state_id } => self.set_block_state_id(*pos, *state_id),
            WorldEvent::Entity(_) | WorldEvent::BlockClicked { .. } => Ok(()),
        }
    }

    /// Handles one reply from the worker at `worker`.
    ///
    /// Replies arriving while the renderer is inactive are ignored.
    ///
    /// # Errors
    /// [`StreamError::UnmatchedSectionFinished`] for a completion nobody was
    /// waiting for.
    pub fn handle_worker_reply(&mut self, worker: usize, reply: WorkerReply) -> StreamResult<()> {
        if !self.active {
            warn!("Ignoring reply from worker {worker} while inactive");
            return Ok(());
        }

        match reply {
            WorkerReply::Output { payload } => {
                if let Some(forward) = self.hooks.on_worker_message.as_mut() {
                    forward(worker, payload);
                }
            }
            WorkerReply::SectionFinished { key } => {
                let outcome = self.tracker.section_finished(key)?;
                if outcome.converged {
                    self.notify_converged();
                }
                if let Some(on_update) = self.hooks.on_update.as_mut() {
                    on_update();
                }
            }
        }
        Ok(())
    }

    /// End-of-tick work: flushes queued batches and handles every worker
    /// reply received so far.
    pub fn process_tick(&mut self) -> StreamResult<()> {
        self.flush_messages()?;
        let replies = match self.pool.as_mut() {
            Some(pool) => pool.drain_replies()?,
            None => return Ok(()),
        };
        for (worker, reply) in replies {
            self.handle_worker_reply(worker, reply)?;
        }
        Ok(())
    }

    /// Resolves once no mesh job is outstanding; immediately if none is now.
    pub fn wait_for_chunks_to_render(&mut self) -> RenderWaiter {
        self.tracker.wait_for_chunks_to_render()
    }

    fn notify_converged(&mut self) {
        debug!("All chunks converged");
        if let Some(on_all_chunks_loaded) = self.hooks.on_all_chunks_loaded.as_mut() {
            on_all_chunks_loaded();
        }
    }

    /// Distance in chunks between the viewer and `pos`, per axis.
    pub fn chunk_distance(&self, pos: BlockPos) -> (i32, i32) {
        let (viewer_x, viewer_z) = chunk_pos(self.viewer_position);
        (
            (viewer_x - pos.x.div_euclid(CHUNK_DIMENSION)).abs(),
            (viewer_z - pos.z.div_euclid(CHUNK_DIMENSION)).abs(),
        )
    }

    /// Number of live workers.
    pub fn worker_count(&self) -> usize {
        self.pool.as_ref().map_or(0, WorkerPool::len)
    }

    /// Whether a version has been set since the last reset.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The sticky flag raised on convergence and cleared by the next dirty mark.
    pub fn all_chunks_finished(&self) -> bool {
        self.tracker.is_fully_rendered()
    }

    /// The version set last.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// The configured view distance.
    pub fn view_distance(&self) -> Option<i32> {
        self.view_distance
    }

    /// Renderer settings.
    pub fn config(&self) -> &WorldRendererConfig {
        &self.config
    }

    /// Meshing parameters attached to new requests.
    pub fn mesher_config(&self) -> &MesherConfig {
        &self.mesher_config
    }

    /// Read-only view of the completion bookkeeping.
    pub fn tracker(&self) -> &SectionCompletionTracker {
        &self.tracker
    }

    /// Dirty messages waiting for the end of the tick.
    pub fn pending_messages(&self) -> &PendingMessageQueue {
        &self.queue
    }

    /// The current worker pool.
    pub fn pool(&self) -> Option<&P> {
        self.pool.as_ref()
    }
}
