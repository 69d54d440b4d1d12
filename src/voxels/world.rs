//! # World Provider Interface
//!
//! The streamer never owns world data. Everything it knows about the world
//! arrives through a [`WorldProvider`]: column snapshots fetched by position,
//! and ray casts for block picking. The types in this module are the data
//! exchanged across that seam.

use std::future::Future;
use std::sync::Arc;

use cgmath::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use super::coords::{BlockPos, ChunkKey};

/// Maximum distance, in blocks, of a block-picking ray cast.
pub const RAYCAST_MAX_DISTANCE: f64 = 256.0;

/// Source of world data for the streamer.
///
/// Fetches are asynchronous; several may be in flight at once and complete in
/// any order.
pub trait WorldProvider {
    /// Fetches the column at `key`.
    ///
    /// Returns `None` when the column does not exist yet (for instance it has
    /// not been generated). That is an expected outcome, not an error.
    fn column_at(&self, key: ChunkKey) -> impl Future<Output = Option<Column>>;

    /// Casts a ray from `origin` along `direction` and returns the first solid
    /// block hit within `max_distance` blocks.
    fn raycast(
        &self,
        origin: Point3<f64>,
        direction: Vector3<f64>,
        max_distance: f64,
    ) -> Option<RaycastHit>;
}

/// Serialized snapshot of one world column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Opaque serialized column bytes, forwarded untouched to mesh workers
    pub data: Arc<[u8]>,
    /// Block entities (signs, chests, ...) embedded in the column
    pub block_entities: serde_json::Value,
}

impl Column {
    /// Creates a column without block entities.
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Column {
            data: data.into(),
            block_entities: serde_json::Value::Null,
        }
    }
}

/// A block as reported by the world provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// World position of the block
    pub position: BlockPos,
    /// Numeric block type
    pub type_id: u32,
    /// Legacy metadata nibble
    pub metadata: u32,
    /// Flattened block state id, when the world format has one
    pub state_id: Option<u32>,
}

impl Block {
    /// The block state id, derived from type and metadata for legacy worlds.
    pub fn effective_state_id(&self) -> u32 {
        self.state_id
            .unwrap_or((self.type_id << 4) | (self.metadata & 0xF))
    }
}

/// Face of a block hit by a ray.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockFace {
    /// Negative y
    Down,
    /// Positive y
    Up,
    /// Negative z
    North,
    /// Positive z
    South,
    /// Negative x
    West,
    /// Positive x
    East,
}

/// Result of a successful ray cast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaycastHit {
    /// The block that was hit
    pub block: Block,
    /// The face the ray entered through
    pub face: BlockFace,
}

/// A mouse click in world space, as sent by the rendering owner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MouseClick {
    /// Ray origin (camera position)
    pub origin: Point3<f64>,
    /// Ray direction
    pub direction: Vector3<f64>,
    /// Mouse button index
    pub button: u8,
}

/// An entity known to a bot session.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Entity id, unique per session
    pub id: u32,
    /// Entity type name
    pub name: Option<String>,
    /// Player name, for player entities
    pub username: Option<String>,
    /// World position
    pub position: Point3<f64>,
    /// Bounding box width
    pub width: f32,
    /// Bounding box height
    pub height: f32,
    /// Head pitch in radians
    pub pitch: f32,
    /// Body yaw in radians
    pub yaw: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_state_id_packs_type_and_metadata() {
        let block = Block {
            position: BlockPos::new(0, 0, 0),
            type_id: 35,
            metadata: 14,
            state_id: None,
        };
        assert_eq!(block.effective_state_id(), (35 << 4) | 14);

        let flattened = Block {
            state_id: Some(9),
            ..block
        };
        assert_eq!(flattened.effective_state_id(), 9);
    }
}
