#![allow(dead_code)]

use std::collections::HashSet;
use std::future::{ready, Future};
use std::sync::mpsc::Receiver;

use cgmath::{Point3, Vector3};
use serde_json::{json, Value};

use voxel_stream::task_management::messages::{DirtySection, WorkerMessage};
use voxel_stream::voxels::world::RaycastHit;
use voxel_stream::{
    ChunkKey, Column, InlineWorkerPool, RendererHooks, SectionMesher, StreamResult, WorkerPool,
    WorldConfig, WorldEvent, WorldProvider, WorldRenderer, WorldRendererConfig,
};

/// Every column exists and is solid up to `height`.
pub struct FlatWorld {
    pub height: u8,
}

impl WorldProvider for FlatWorld {
    fn column_at(&self, _key: ChunkKey) -> impl Future<Output = Option<Column>> {
        ready(Some(Column::new(vec![self.height; 256])))
    }

    fn raycast(&self, _: Point3<f64>, _: Vector3<f64>, _: f64) -> Option<RaycastHit> {
        None
    }
}

/// Emits one payload per meshed section of a known column.
#[derive(Default)]
pub struct RecordingMesher {
    pub columns: HashSet<ChunkKey>,
}

impl SectionMesher for RecordingMesher {
    fn apply(&mut self, message: &WorkerMessage) {
        match message {
            WorkerMessage::Chunk { x, z, .. } => {
                self.columns.insert(ChunkKey::containing(*x, *z));
            }
            WorkerMessage::UnloadChunk { x, z } => {
                self.columns.remove(&ChunkKey::containing(*x, *z));
            }
            _ => {}
        }
    }

    fn mesh_section(&mut self, section: &DirtySection) -> Vec<Value> {
        let key = section.key();
        if section.value && self.columns.contains(&key.chunk()) {
            vec![json!({ "type": "geometry", "key": key.to_string() })]
        } else {
            Vec::new()
        }
    }
}

pub fn inline_renderer(
    num_workers: usize,
    hooks: RendererHooks,
) -> WorldRenderer<InlineWorkerPool> {
    WorldRenderer::new(
        WorldRendererConfig {
            num_workers,
            ..Default::default()
        },
        WorldConfig::default(),
        |n| InlineWorkerPool::new(n, |_| Box::new(RecordingMesher::default())),
        hooks,
    )
}

pub fn apply_events<P: WorkerPool>(
    events: &Receiver<WorldEvent>,
    renderer: &mut WorldRenderer<P>,
) -> StreamResult<usize> {
    let mut applied = 0;
    for event in events.try_iter() {
        renderer.apply_world_event(&event)?;
        applied += 1;
    }
    Ok(applied)
}
