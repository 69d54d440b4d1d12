//! # Viewport Chunk Streaming
//!
//! The [`ViewportChunkStreamer`] decides which columns matter to a moving
//! observer, fetches them from a [`WorldProvider`] and publishes load and
//! unload events on its [`EventBus`].
//!
//! ## Loading
//!
//! Candidate columns are enumerated in a spiral around the observer, so the
//! closest ones are requested first, and fetched in slices of at most
//! `slice_size` concurrent requests. Fetch completion order inside a slice is
//! unspecified.
//!
//! A column is in view when it is strictly closer than the view distance to
//! the observer's column on both axes. Membership is checked when a fetch is
//! issued and again when it completes, so a column the observer left while it
//! was being fetched is dropped. A column can still be loaded and then
//! unloaded right away when the observer leaves it just after its fetch
//! completed.
//!
//! ## Concurrency
//!
//! Everything runs on one thread. Fetches inside a slice interleave at their
//! await points, so the streamer keeps its state behind `Cell`/`RefCell` and
//! all of its operations take `&self`.

pub mod bot;
pub mod events;

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::sync::mpsc::{Receiver, TryRecvError};

use cgmath::Point3;
use futures::future::join_all;
use futures_timer::Delay;
use log::{debug, trace, warn};

use crate::config::StreamerConfig;
use crate::voxels::coords::{chunk_pos, spiral, ChunkKey, ViewRect};
use crate::voxels::world::{MouseClick, WorldProvider, RAYCAST_MAX_DISTANCE};
use bot::{BotEvent, BotListener, BotSession};
use events::{EntityEvent, EventBus, WorldEvent};

/// Streams the columns around an observer out of a world provider.
pub struct ViewportChunkStreamer<W: WorldProvider> {
    world: W,
    config: StreamerConfig,
    loaded: RefCell<HashSet<ChunkKey>>,
    last_position: Cell<Point3<f64>>,
    events: EventBus<WorldEvent>,
    bots: RefCell<HashMap<String, BotListener>>,
}

impl<W: WorldProvider> ViewportChunkStreamer<W> {
    /// Creates a streamer with nothing loaded and the observer at the origin.
    pub fn new(world: W, config: StreamerConfig) -> Self {
        ViewportChunkStreamer {
            world,
            config,
            loaded: RefCell::new(HashSet::new()),
            last_position: Cell::new(Point3::new(0.0, 0.0, 0.0)),
            events: EventBus::new(),
            bots: RefCell::new(HashMap::new()),
        }
    }

    /// Subscribes to the streamer's events.
    pub fn subscribe(&self) -> Receiver<WorldEvent> {
        self.events.subscribe()
    }

    /// Places the observer at `position` and loads every column in view.
    ///
    /// # Returns
    /// The number of columns that were loaded
    pub async fn init(&self, position: Point3<f64>) -> usize {
        self.last_position.set(position);
        let candidates = self.candidates_around(position);
        debug!(
            "Initial load of {} candidate columns around {:?}",
            candidates.len(),
            chunk_pos(position)
        );
        self.load_chunks(candidates).await
    }

    /// Moves the observer.
    ///
    /// Without a column boundary crossing, and unless `force` is set, only the
    /// stored position changes. Otherwise every loaded column that left the
    /// view is unloaded and the columns that entered it are loaded.
    ///
    /// # Returns
    /// The number of columns that were loaded
    pub async fn update_position(&self, position: Point3<f64>, force: bool) -> usize {
        let previous = chunk_pos(self.last_position.get());
        let (cx, cz) = chunk_pos(position);
        self.last_position.set(position);
        if previous == (cx, cz) && !force {
            return 0;
        }

        let view = ViewRect::new(cx, cz, self.config.view_distance);
        let stale: Vec<ChunkKey> = self
            .loaded
            .borrow()
            .iter()
            .filter(|key| !view.contains_key(**key))
            .copied()
            .collect();
        for key in stale {
            self.unload_chunk(key);
        }

        let candidates: Vec<ChunkKey> = {
            let loaded = self.loaded.borrow();
            self.candidates_around(position)
                .into_iter()
                .filter(|key| !loaded.contains(key))
                .collect()
        };
        self.load_chunks(candidates).await
    }

    /// Loads `keys` in slices of at most `slice_size` concurrent fetches,
    /// pausing `slice_delay` between slices.
    pub async fn load_chunks(&self, keys: Vec<ChunkKey>) -> usize {
        let mut loaded = 0;
        for (index, slice) in keys.chunks(self.config.slice_size.max(1)).enumerate() {
            if index > 0 && !self.config.slice_delay.is_zero() {
                Delay::new(self.config.slice_delay).await;
            }
            let results = join_all(slice.iter().map(|key| self.load_chunk(*key))).await;
            loaded += results.into_iter().filter(|loaded| *loaded).count();
        }
        loaded
    }

    /// Fetches one column and publishes it.
    ///
    /// Returns `false` when the column is out of view, when the provider has
    /// no such column, or when the observer left it during the fetch.
    pub async fn load_chunk(&self, key: ChunkKey) -> bool {
        if !self.in_view(key) {
            return false;
        }
        let Some(column) = self.world.column_at(key).await else {
            trace!("Column {key} does not exist yet");
            return false;
        };
        if !self.in_view(key) {
            trace!("Dropping stale column {key}");
            return false;
        }

        self.loaded.borrow_mut().insert(key);
        self.events.emit(WorldEvent::LoadChunk {
            x: key.x,
            z: key.z,
            chunk: column.data,
            block_entities: column.block_entities,
        });
        debug!("Loaded column {key}");
        true
    }

    /// Unloads a column. A no-op when it is not loaded.
    pub fn unload_chunk(&self, key: ChunkKey) {
        if !self.loaded.borrow_mut().remove(&key) {
            return;
        }
        self.events.emit(WorldEvent::UnloadChunk { x: key.x, z: key.z });
        debug!("Unloaded column {key}");
    }

    /// Attaches a bot session.
    ///
    /// Entities the session already knows, except the bot itself, are
    /// published as spawned right away. A session with the same username
    /// replaces the previous one.
    pub fn listen_to_bot(&self, session: BotSession) {
        let (username, entities, listener) = session.into_listener();
        for entity in entities {
            if entity.id != listener.entity_id {
                self.events.emit(WorldEvent::Entity(EntityEvent::Spawned(entity)));
            }
        }
        if self.bots.borrow_mut().insert(username.clone(), listener).is_some() {
            warn!("Replaced existing listeners of bot {username}");
        }
    }

    /// Detaches the session of `username`. Returns whether one was attached.
    pub fn remove_listeners_from_bot(&self, username: &str) -> bool {
        self.bots.borrow_mut().remove(username).is_some()
    }

    /// Handles every event the attached bot sessions produced so far.
    ///
    /// Sessions whose feed closed are detached.
    ///
    /// # Returns
    /// The number of bot events handled
    pub async fn pump_bot_events(&self) -> usize {
        let mut pending = Vec::new();
        let mut closed = Vec::new();
        {
            let bots = self.bots.borrow();
            for (username, listener) in bots.iter() {
                loop {
                    match listener.events.try_recv() {
                        Ok(event) => pending.push((listener.entity_id, event)),
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => {
                            closed.push(username.clone());
                            break;
                        }
                    }
                }
            }
        }
        for username in closed {
            debug!("Bot {username} disconnected");
            self.bots.borrow_mut().remove(&username);
        }

        let handled = pending.len();
        for (own_id, event) in pending {
            self.handle_bot_event(own_id, event).await;
        }
        handled
    }

    async fn handle_bot_event(&self, own_id: u32, event: BotEvent) {
        match event {
            BotEvent::EntitySpawn(entity) => {
                if entity.id != own_id {
                    self.events.emit(WorldEvent::Entity(EntityEvent::Spawned(entity)));
                }
            }
            BotEvent::EntityMoved(entity) => {
                self.events.emit(WorldEvent::Entity(EntityEvent::Moved {
                    id: entity.id,
                    position: entity.position,
                    pitch: entity.pitch,
                    yaw: entity.yaw,
                }));
            }
            BotEvent::EntityGone(entity) => {
                self.events
                    .emit(WorldEvent::Entity(EntityEvent::Removed { id: entity.id }));
            }
            BotEvent::ChunkColumnLoad(pos) => {
                self.load_chunk(pos.chunk_key()).await;
            }
            BotEvent::BlockUpdate { new, .. } => {
                self.events.emit(WorldEvent::BlockUpdate {
                    pos: new.position,
                    state_id: new.effective_state_id(),
                });
            }
        }
    }

    /// Picks the block under a mouse click and publishes it.
    ///
    /// Returns whether a block was hit within range.
    pub fn handle_mouse_click(&self, click: MouseClick) -> bool {
        let Some(hit) = self
            .world
            .raycast(click.origin, click.direction, RAYCAST_MAX_DISTANCE)
        else {
            return false;
        };
        self.events.emit(WorldEvent::BlockClicked {
            block: hit.block,
            face: hit.face,
            button: click.button,
        });
        true
    }

    fn in_view(&self, key: ChunkKey) -> bool {
        let (cx, cz) = chunk_pos(self.last_position.get());
        ViewRect::new(cx, cz, self.config.view_distance).contains_key(key)
    }

    fn candidates_around(&self, position: Point3<f64>) -> Vec<ChunkKey> {
        let (cx, cz) = chunk_pos(position);
        let side = self.config.view_distance * 2;
        spiral(side, side)
            .into_iter()
            .map(|(dx, dz)| ChunkKey::from_chunk_coords(cx + dx, cz + dz))
            .collect()
    }

    /// Currently loaded columns, in no particular order.
    pub fn loaded_chunks(&self) -> Vec<ChunkKey> {
        self.loaded.borrow().iter().copied().collect()
    }

    /// Whether `key` is loaded.
    pub fn is_loaded(&self, key: ChunkKey) -> bool {
        self.loaded.borrow().contains(&key)
    }

    /// Last observer position.
    pub fn last_position(&self) -> Point3<f64> {
        self.last_position.get()
    }

    /// Streamer settings.
    pub fn config(&self) -> &StreamerConfig {
        &self.config
    }

    /// The world provider.
    pub fn world(&self) -> &W {
        &self.world
    }
}
