//! # Coordinate Types
//!
//! Quantized keys for world columns and sections, plus the helpers that turn a
//! free-floating observer position into chunk coordinates.
//!
//! All keys store *block* coordinates of the cell origin (always a multiple of
//! [`CHUNK_DIMENSION`]) so that a key can be printed, compared and shipped to a
//! worker without further conversion.

use std::fmt;

use cgmath::Point3;
use serde::{Deserialize, Serialize};

/// The width, depth and section height of a chunk, in blocks.
pub const CHUNK_DIMENSION: i32 = 16;

/// Integer position of a single block in world space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    /// Block x coordinate
    pub x: i32,
    /// Block y coordinate
    pub y: i32,
    /// Block z coordinate
    pub z: i32,
}

impl BlockPos {
    /// Creates a new block position.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        BlockPos { x, y, z }
    }

    /// Returns the block containing a floating point world position.
    pub fn containing(position: Point3<f64>) -> Self {
        BlockPos {
            x: position.x.floor() as i32,
            y: position.y.floor() as i32,
            z: position.z.floor() as i32,
        }
    }

    /// Returns this position shifted by the given amounts.
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        BlockPos {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }

    /// The section this block belongs to.
    pub fn section_key(self) -> SectionKey {
        SectionKey::containing(self)
    }

    /// The column this block belongs to.
    pub fn chunk_key(self) -> ChunkKey {
        ChunkKey::containing(self.x, self.z)
    }

    /// Position of the block inside its section, each component in `0..16`.
    pub fn local(self) -> (i32, i32, i32) {
        (
            self.x.rem_euclid(CHUNK_DIMENSION),
            self.y.rem_euclid(CHUNK_DIMENSION),
            self.z.rem_euclid(CHUNK_DIMENSION),
        )
    }
}

/// Identifies one 16x16 column of the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkKey {
    /// Block x coordinate of the column origin
    pub x: i32,
    /// Block z coordinate of the column origin
    pub z: i32,
}

impl ChunkKey {
    /// Quantizes arbitrary block coordinates to the column containing them.
    pub fn containing(x: i32, z: i32) -> Self {
        ChunkKey {
            x: quantize(x),
            z: quantize(z),
        }
    }

    /// Builds the key of the column at chunk coordinates `(chunk_x, chunk_z)`.
    pub const fn from_chunk_coords(chunk_x: i32, chunk_z: i32) -> Self {
        ChunkKey {
            x: chunk_x * CHUNK_DIMENSION,
            z: chunk_z * CHUNK_DIMENSION,
        }
    }

    /// Chunk coordinates of this column.
    pub fn chunk_coords(self) -> (i32, i32) {
        (
            self.x.div_euclid(CHUNK_DIMENSION),
            self.z.div_euclid(CHUNK_DIMENSION),
        )
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.z)
    }
}

/// Identifies one 16³ section inside a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SectionKey {
    /// Block x coordinate of the section origin
    pub x: i32,
    /// Block y coordinate of the section origin
    pub y: i32,
    /// Block z coordinate of the section origin
    pub z: i32,
}

impl SectionKey {
    /// Quantizes a block position to the section containing it.
    pub fn containing(pos: BlockPos) -> Self {
        SectionKey {
            x: quantize(pos.x),
            y: quantize(pos.y),
            z: quantize(pos.z),
        }
    }

    /// The column owning this section.
    pub fn chunk(self) -> ChunkKey {
        ChunkKey {
            x: self.x,
            z: self.z,
        }
    }

    /// Sum of the section coordinates, used to route the section to a worker.
    pub fn coordinate_sum(self) -> i64 {
        (self.x.div_euclid(CHUNK_DIMENSION) as i64)
            + (self.y.div_euclid(CHUNK_DIMENSION) as i64)
            + (self.z.div_euclid(CHUNK_DIMENSION) as i64)
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

fn quantize(value: i32) -> i32 {
    value.div_euclid(CHUNK_DIMENSION) * CHUNK_DIMENSION
}

/// Chunk coordinates `(x, z)` of the column containing a world position.
pub fn chunk_pos(position: Point3<f64>) -> (i32, i32) {
    (
        (position.x / CHUNK_DIMENSION as f64).floor() as i32,
        (position.z / CHUNK_DIMENSION as f64).floor() as i32,
    )
}

/// The square of chunk columns considered in view around an observer.
///
/// A column is inside when its distance to the centre is strictly less than
/// the radius on both axes. Loading and unloading share this predicate so that
/// every loaded column stays inside the rect after a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewRect {
    /// Observer chunk x
    pub cx: i32,
    /// Observer chunk z
    pub cz: i32,
    /// View distance in chunks
    pub radius: i32,
}

impl ViewRect {
    /// Creates a view rect centred on chunk `(cx, cz)`.
    pub const fn new(cx: i32, cz: i32, radius: i32) -> Self {
        ViewRect { cx, cz, radius }
    }

    /// Whether the column at chunk coordinates `(x, z)` is in view.
    pub fn contains(&self, x: i32, z: i32) -> bool {
        (self.cx - x).abs() < self.radius && (self.cz - z).abs() < self.radius
    }

    /// Whether the given column is in view.
    pub fn contains_key(&self, key: ChunkKey) -> bool {
        let (x, z) = key.chunk_coords();
        self.contains(x, z)
    }
}

/// Enumerates offsets of a `width` x `height` rectangle as a square spiral
/// walking outwards from `(0, 0)`.
///
/// Offsets range over `-width/2 < x <= width/2` (and likewise for `z`), so
/// the closest columns always come first.
pub fn spiral(width: i32, height: i32) -> Vec<(i32, i32)> {
    let side = width.max(height).max(0);
    let steps = side * side;
    let half_x = width as f64 / 2.0;
    let half_z = height as f64 / 2.0;

    let mut offsets = Vec::with_capacity(steps as usize);
    let (mut x, mut z) = (0i32, 0i32);
    let (mut dx, mut dz) = (0i32, -1i32);

    for _ in 0..steps {
        if -half_x < x as f64 && x as f64 <= half_x && -half_z < z as f64 && z as f64 <= half_z {
            offsets.push((x, z));
        }
        // Turn at the corners of the current ring
        if x == z || (x < 0 && x == -z) || (x > 0 && x == 1 - z) {
            let previous_dx = dx;
            dx = -dz;
            dz = previous_dx;
        }
        x += dx;
        z += dz;
    }

    offsets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_blocks_quantize_downwards() {
        let pos = BlockPos::new(-1, 17, -16);
        assert_eq!(pos.section_key(), SectionKey { x: -16, y: 16, z: -16 });
        assert_eq!(pos.chunk_key(), ChunkKey { x: -16, z: -16 });
        assert_eq!(pos.local(), (15, 1, 0));
    }

    #[test]
    fn chunk_pos_floors_observer_position() {
        assert_eq!(chunk_pos(Point3::new(0.5, 70.0, 15.9)), (0, 0));
        assert_eq!(chunk_pos(Point3::new(-0.1, 0.0, 32.0)), (-1, 2));
    }

    #[test]
    fn spiral_starts_at_centre_and_covers_rect() {
        let offsets = spiral(4, 4);
        assert_eq!(offsets.len(), 16);
        assert_eq!(offsets[0], (0, 0));

        let mut unique = offsets.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 16);
        assert!(offsets
            .iter()
            .all(|&(x, z)| (-1..=2).contains(&x) && (-1..=2).contains(&z)));
    }

    #[test]
    fn spiral_is_closest_first() {
        let offsets = spiral(6, 6);
        let ring = |&(x, z): &(i32, i32)| x.abs().max(z.abs());
        let first_ring_two = offsets.iter().position(|o| ring(o) == 2).unwrap();
        assert!(offsets[..first_ring_two].iter().all(|o| ring(o) <= 1));
    }

    #[test]
    fn view_rect_is_strict_on_both_axes() {
        let view = ViewRect::new(0, 0, 2);
        assert!(view.contains(1, -1));
        assert!(!view.contains(2, 0));
        assert!(!view.contains(0, -2));
        assert!(view.contains_key(ChunkKey::from_chunk_coords(-1, 1)));
    }
}
