//! # Dirty Region Propagation
//!
//! Works out which sections have to be re-meshed after a change. Geometry at
//! a section face depends on the blocks just across it, so a change often
//! reaches into neighbouring sections:
//!
//! - a column arriving repairs the seams of the four horizontally adjacent
//!   columns, slice by slice
//! - a block on a section face touches the section across that face
//! - a column leaving asks workers to drop the geometry they hold for it

use crate::config::WorldConfig;
use crate::voxels::coords::{BlockPos, CHUNK_DIMENSION};

/// One dirty mark to apply: a position inside the affected section, and
/// whether the section should be meshed (`true`) or cleared (`false`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyMark {
    /// Any block position inside the section
    pub pos: BlockPos,
    /// Mesh (`true`) or clear (`false`)
    pub value: bool,
}

impl DirtyMark {
    fn mesh(pos: BlockPos) -> Self {
        DirtyMark { pos, value: true }
    }
}

/// Computes dirty marks for column and block changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirtyRegionPropagator {
    world: WorldConfig,
}

impl DirtyRegionPropagator {
    /// Creates a propagator for a world with the given vertical extent.
    pub fn new(world: WorldConfig) -> Self {
        DirtyRegionPropagator { world }
    }

    /// Marks for a column arriving at block coordinates `(x, z)`.
    ///
    /// Every vertical section of the column is marked. With
    /// `include_neighbours`, each slice also marks the sections directly west,
    /// east, north and south of it, in that order.
    pub fn column_added(&self, x: i32, z: i32, include_neighbours: bool) -> Vec<DirtyMark> {
        let per_slice = if include_neighbours { 5 } else { 1 };
        let mut marks = Vec::with_capacity(self.world.sections_per_column() * per_slice);

        for y in self.world.section_ys() {
            let pos = BlockPos::new(x, y, z);
            marks.push(DirtyMark::mesh(pos));
            if include_neighbours {
                marks.push(DirtyMark::mesh(pos.offset(-CHUNK_DIMENSION, 0, 0)));
                marks.push(DirtyMark::mesh(pos.offset(CHUNK_DIMENSION, 0, 0)));
                marks.push(DirtyMark::mesh(pos.offset(0, 0, -CHUNK_DIMENSION)));
                marks.push(DirtyMark::mesh(pos.offset(0, 0, CHUNK_DIMENSION)));
            }
        }

        marks
    }

    /// Marks for a column leaving at block coordinates `(x, z)`: every
    /// vertical section, cleared.
    pub fn column_removed(&self, x: i32, z: i32) -> Vec<DirtyMark> {
        self.world
            .section_ys()
            .map(|y| DirtyMark {
                pos: BlockPos::new(x, y, z),
                value: false,
            })
            .collect()
    }

    /// Marks for a single block change at `pos`.
    ///
    /// The owning section is always marked. For each axis where the block
    /// sits on the low (local 0) or high (local 15) face of its section, the
    /// section across that face is marked too.
    pub fn block_changed(&self, pos: BlockPos) -> Vec<DirtyMark> {
        let (lx, ly, lz) = pos.local();
        let last = CHUNK_DIMENSION - 1;
        let mut marks = vec![DirtyMark::mesh(pos)];

        let mut across = |local: i32, low: BlockPos, high: BlockPos| {
            if local == 0 {
                marks.push(DirtyMark::mesh(low));
            }
            if local == last {
                marks.push(DirtyMark::mesh(high));
            }
        };
        across(
            lx,
            pos.offset(-CHUNK_DIMENSION, 0, 0),
            pos.offset(CHUNK_DIMENSION, 0, 0),
        );
        across(
            ly,
            pos.offset(0, -CHUNK_DIMENSION, 0),
            pos.offset(0, CHUNK_DIMENSION, 0),
        );
        across(
            lz,
            pos.offset(0, 0, -CHUNK_DIMENSION),
            pos.offset(0, 0, CHUNK_DIMENSION),
        );

        marks
    }
}
