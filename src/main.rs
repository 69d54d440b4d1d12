//! # Headless Streaming Demo
//!
//! Walks a random observer across a Perlin heightmap world, streams the
//! columns around it into a [`WorldRenderer`] backed by a thread pool, and
//! waits for the view to be fully meshed.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release
//! ```

use std::cell::Cell;
use std::collections::HashMap;
use std::future::{ready, Future};
use std::rc::Rc;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use cgmath::{InnerSpace, Point3, Vector3};
use futures::FutureExt;
use log::info;
use noise::{NoiseFn, Perlin};
use serde_json::{json, Value};
use web_time::{Duration, Instant};

use voxel_stream::task_management::messages::{DirtySection, WorkerMessage};
use voxel_stream::voxels::coords::CHUNK_DIMENSION;
use voxel_stream::voxels::world::{Block, BlockFace, MouseClick, RaycastHit};
use voxel_stream::{
    BlockPos, ChunkKey, Column, RendererHooks, SectionMesher, StreamResult, StreamerConfig,
    ThreadWorkerPool, ViewportChunkStreamer, WorldConfig, WorldEvent, WorldProvider,
    WorldRenderer, WorldRendererConfig,
};

const SEED: u32 = 42;
const VERSION: &str = "1.20.4";
const WALK_STEPS: usize = 20;

const PERLIN_SCALE_FACTOR: f64 = 0.02;
const BASE_HEIGHT: f64 = 64.0;
const HEIGHT_AMPLITUDE: f64 = 24.0;
const RAY_STEP: f64 = 0.1;

/// Terrain whose surface height is a 2D Perlin sample.
struct PerlinWorld {
    perlin: Perlin,
}

impl PerlinWorld {
    fn new(seed: u32) -> Self {
        PerlinWorld {
            perlin: Perlin::new(seed),
        }
    }

    fn height_at(&self, x: i32, z: i32) -> i32 {
        let sample = self.perlin.get([
            x as f64 * PERLIN_SCALE_FACTOR,
            z as f64 * PERLIN_SCALE_FACTOR,
        ]);
        (BASE_HEIGHT + sample * HEIGHT_AMPLITUDE) as i32
    }
}

impl WorldProvider for PerlinWorld {
    /// Column bytes are the 16x16 surface heights, row by row along z.
    fn column_at(&self, key: ChunkKey) -> impl Future<Output = Option<Column>> {
        let heights: Vec<u8> = (0..CHUNK_DIMENSION)
            .flat_map(|z| (0..CHUNK_DIMENSION).map(move |x| (x, z)))
            .map(|(x, z)| self.height_at(key.x + x, key.z + z).clamp(0, 255) as u8)
            .collect();
        ready(Some(Column::new(heights)))
    }

    fn raycast(
        &self,
        origin: Point3<f64>,
        direction: Vector3<f64>,
        max_distance: f64,
    ) -> Option<RaycastHit> {
        let step = direction.normalize() * RAY_STEP;
        let mut point = origin;
        let mut previous = BlockPos::containing(point);

        let mut travelled = 0.0;
        while travelled <= max_distance {
            let current = BlockPos::containing(point);
            if current.y <= self.height_at(current.x, current.z) {
                let face = match (
                    current.x - previous.x,
                    current.y - previous.y,
                    current.z - previous.z,
                ) {
                    (dx, _, _) if dx > 0 => BlockFace::West,
                    (dx, _, _) if dx < 0 => BlockFace::East,
                    (_, _, dz) if dz > 0 => BlockFace::North,
                    (_, _, dz) if dz < 0 => BlockFace::South,
                    (_, dy, _) if dy > 0 => BlockFace::Down,
                    _ => BlockFace::Up,
                };
                return Some(RaycastHit {
                    block: Block {
                        position: current,
                        type_id: 1,
                        metadata: 0,
                        state_id: None,
                    },
                    face,
                });
            }
            previous = current;
            point += step;
            travelled += RAY_STEP;
        }
        None
    }
}

/// Reports the number of solid blocks per section instead of real geometry.
#[derive(Default)]
struct SolidCountMesher {
    columns: HashMap<ChunkKey, Arc<[u8]>>,
}

impl SectionMesher for SolidCountMesher {
    fn apply(&mut self, message: &WorkerMessage) {
        match message {
            WorkerMessage::Chunk { x, z, chunk } => {
                self.columns.insert(ChunkKey::containing(*x, *z), chunk.clone());
            }
            WorkerMessage::UnloadChunk { x, z } => {
                self.columns.remove(&ChunkKey::containing(*x, *z));
            }
            _ => {}
        }
    }

    fn mesh_section(&mut self, section: &DirtySection) -> Vec<Value> {
        let key = section.key();
        if !section.value {
            return vec![json!({ "type": "sectionRemoved", "key": key.to_string() })];
        }
        let Some(heights) = self.columns.get(&key.chunk()) else {
            return Vec::new();
        };
        let solid: i32 = heights
            .iter()
            .map(|height| (*height as i32 - key.y + 1).clamp(0, CHUNK_DIMENSION))
            .sum();
        vec![json!({ "type": "geometry", "key": key.to_string(), "solid": solid })]
    }
}

fn apply_events(
    events: &Receiver<WorldEvent>,
    renderer: &mut WorldRenderer<ThreadWorkerPool>,
) -> StreamResult<()> {
    for event in events.try_iter() {
        if let WorldEvent::BlockClicked { block, face, button } = &event {
            info!("Button {button} clicked {:?} face of block at {:?}", face, block.position);
        }
        renderer.apply_world_event(&event)?;
    }
    Ok(())
}

fn main() -> StreamResult<()> {
    voxel_stream::init_logging();

    let streamer = ViewportChunkStreamer::new(
        PerlinWorld::new(SEED),
        StreamerConfig {
            view_distance: 4,
            ..Default::default()
        },
    );
    let events = streamer.subscribe();

    let geometry_updates = Rc::new(Cell::new(0usize));
    let counter = geometry_updates.clone();
    let hooks = RendererHooks {
        on_worker_message: Some(Box::new(move |_, _| counter.set(counter.get() + 1))),
        on_all_chunks_loaded: Some(Box::new(|| info!("All loaded chunks are meshed"))),
        ..Default::default()
    };
    let mut renderer = WorldRenderer::new(
        WorldRendererConfig::default(),
        WorldConfig::default(),
        |num_workers| ThreadWorkerPool::new(num_workers, |_| Box::new(SolidCountMesher::default())),
        hooks,
    );
    renderer.set_view_distance(streamer.config().view_distance);
    renderer.set_version(VERSION, json!({ "version": VERSION }))?;
    renderer.set_atlas_data(json!({ "textures": {} }), 1024)?;

    let start = Instant::now();
    let mut position = Point3::new(8.0, 90.0, 8.0);
    renderer.update_viewer_position(position);
    let loaded = pollster::block_on(streamer.init(position));
    info!("Initial load streamed {loaded} columns");
    apply_events(&events, &mut renderer)?;
    renderer.process_tick()?;

    let mut rng = fastrand::Rng::with_seed(u64::from(SEED));
    for _ in 0..WALK_STEPS {
        position.x += rng.f64() * 24.0 - 12.0;
        position.z += rng.f64() * 24.0 - 12.0;
        renderer.update_viewer_position(position);
        pollster::block_on(streamer.update_position(position, false));
        apply_events(&events, &mut renderer)?;
        renderer.process_tick()?;
    }

    streamer.handle_mouse_click(MouseClick {
        origin: position,
        direction: Vector3::new(0.3, -1.0, 0.2),
        button: 0,
    });
    apply_events(&events, &mut renderer)?;

    let mut waiter = renderer.wait_for_chunks_to_render();
    loop {
        renderer.process_tick()?;
        if let Some(result) = (&mut waiter).now_or_never() {
            result?;
            break;
        }
        std::thread::sleep(Duration::from_millis(1));
    }

    info!(
        "{} columns meshed in {:?} with {} geometry updates",
        renderer.tracker().loaded_count(),
        start.elapsed(),
        geometry_updates.get()
    );
    Ok(())
}
