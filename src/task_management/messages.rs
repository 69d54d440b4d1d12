//! # Worker Protocol
//!
//! Messages exchanged between the coordinator and its mesh workers. Both
//! directions are fire-and-forget and preserve order per worker.
//!
//! The serde representation is tagged by a `type` field so that a worker
//! living behind a real process or web-worker boundary sees the same shape
//! as an in-process one:
//!
//! ```json
//! { "type": "dirty", "sections": [{ "x": 0, "y": 16, "z": 0, "value": true, "config": { ... } }] }
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::voxels::coords::{BlockPos, SectionKey};

/// Geometry layout the workers should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputFormat {
    /// Separate position, normal, color and index arrays
    #[default]
    Indexed,
    /// One interleaved vertex buffer per section
    Packed,
}

/// Meshing parameters sent along with every dirty section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MesherConfig {
    /// Game data version the workers were loaded with
    pub version: String,
    /// Geometry layout to produce
    pub output_format: OutputFormat,
    /// Width of the block texture atlas in pixels
    pub texture_size: u32,
    /// Whether block light is applied at all
    pub enable_lighting: bool,
    /// Whether vertex light is smoothed across neighbouring blocks
    pub smooth_lighting: bool,
    /// Sky light level used for open sky
    pub sky_light: u8,
}

impl Default for MesherConfig {
    fn default() -> Self {
        MesherConfig {
            version: String::new(),
            output_format: OutputFormat::default(),
            texture_size: 1024,
            enable_lighting: true,
            smooth_lighting: true,
            sky_light: 15,
        }
    }
}

/// One section a worker must (re)mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirtySection {
    /// Block x of the position that triggered the update
    pub x: i32,
    /// Block y of the position that triggered the update
    pub y: i32,
    /// Block z of the position that triggered the update
    pub z: i32,
    /// `false` asks the worker to drop the section's geometry
    pub value: bool,
    /// Meshing parameters at the time of the request
    pub config: Arc<MesherConfig>,
}

impl DirtySection {
    /// The section this request refers to.
    pub fn key(&self) -> SectionKey {
        SectionKey::containing(BlockPos::new(self.x, self.y, self.z))
    }
}

/// Coordinator to worker messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WorkerMessage {
    /// Versioned game and material data, broadcast once per version load
    GlobalData {
        /// Opaque game data
        data: Arc<serde_json::Value>,
        /// Meshing parameters
        config: Arc<MesherConfig>,
    },
    /// Block state and texture atlas description
    AtlasData {
        /// Atlas JSON
        json: Arc<serde_json::Value>,
        /// Meshing parameters, including the atlas size
        config: Arc<MesherConfig>,
    },
    /// A new or updated column
    Chunk {
        /// Column origin x
        x: i32,
        /// Column origin z
        z: i32,
        /// Serialized column bytes
        chunk: Arc<[u8]>,
    },
    /// A column left the view
    UnloadChunk {
        /// Column origin x
        x: i32,
        /// Column origin z
        z: i32,
    },
    /// A single block changed
    BlockUpdate {
        /// Position of the block
        pos: BlockPos,
        /// New block state id
        state_id: u32,
    },
    /// A batch of sections to mesh
    Dirty {
        /// Sections in the order they were marked
        sections: Vec<DirtySection>,
    },
}

/// Worker to coordinator messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WorkerReply {
    /// One dirty request for `key` has been processed
    SectionFinished {
        /// The processed section
        key: SectionKey,
    },
    /// Anything else, forwarded verbatim to the rendering owner
    Output {
        /// Worker-defined payload, typically section geometry
        payload: serde_json::Value,
    },
}
