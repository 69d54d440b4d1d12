//! # Configuration
//!
//! Plain configuration structs with sensible defaults. Each derives
//! `Deserialize` with `#[serde(default)]`, so an embedding application can
//! override only the fields it cares about from a JSON document.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::voxels::coords::CHUNK_DIMENSION;

/// Default number of columns fetched concurrently by the streamer.
pub const DEFAULT_SLICE_SIZE: usize = 5;

/// Default number of mesh workers.
pub const DEFAULT_NUM_WORKERS: usize = 4;

/// Settings of the mesh coordination side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldRendererConfig {
    /// Whether chunk border outlines are drawn by the rendering owner
    pub show_chunk_borders: bool,
    /// Number of parallel mesh workers spawned on `set_version`
    pub num_workers: usize,
}

impl Default for WorldRendererConfig {
    fn default() -> Self {
        WorldRendererConfig {
            show_chunk_borders: false,
            num_workers: DEFAULT_NUM_WORKERS,
        }
    }
}

/// Vertical extent of the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Lowest block y coordinate
    pub min_y: i32,
    /// Height of the world in blocks
    pub world_height: i32,
}

impl WorldConfig {
    /// Number of 16³ sections stacked in one column.
    pub fn sections_per_column(&self) -> usize {
        (self.world_height.max(0) / CHUNK_DIMENSION) as usize
    }

    /// Iterates the base y coordinate of every section in a column, bottom up.
    pub fn section_ys(&self) -> impl Iterator<Item = i32> {
        let top = self.min_y + self.world_height;
        (self.min_y..top).step_by(CHUNK_DIMENSION as usize)
    }

    /// Index of the section starting at `y` inside its column.
    pub fn section_index(&self, y: i32) -> Option<usize> {
        let top = self.min_y + self.world_height;
        if y < self.min_y || y >= top {
            return None;
        }
        Some(((y - self.min_y) / CHUNK_DIMENSION) as usize)
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        WorldConfig {
            min_y: 0,
            world_height: 256,
        }
    }
}

/// Settings of the viewport chunk streamer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamerConfig {
    /// View distance in chunks
    pub view_distance: i32,
    /// Maximum number of concurrent column fetches
    pub slice_size: usize,
    /// Pause between consecutive slices of fetches, for constrained devices
    #[serde(with = "millis")]
    pub slice_delay: Duration,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        StreamerConfig {
            view_distance: 6,
            slice_size: DEFAULT_SLICE_SIZE,
            slice_delay: Duration::ZERO,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_world_has_sixteen_sections() {
        let world = WorldConfig::default();
        assert_eq!(world.sections_per_column(), 16);
        assert_eq!(world.section_ys().count(), 16);
        assert_eq!(world.section_index(240), Some(15));
        assert_eq!(world.section_index(256), None);
    }

    #[test]
    fn negative_min_y_shifts_section_indices() {
        let world = WorldConfig {
            min_y: -64,
            world_height: 384,
        };
        assert_eq!(world.sections_per_column(), 24);
        assert_eq!(world.section_ys().next(), Some(-64));
        assert_eq!(world.section_index(-64), Some(0));
        assert_eq!(world.section_index(0), Some(4));
    }

    #[test]
    fn streamer_config_reads_partial_json() {
        let config: StreamerConfig =
            serde_json::from_str(r#"{ "view_distance": 3, "slice_delay": 20 }"#).unwrap();
        assert_eq!(config.view_distance, 3);
        assert_eq!(config.slice_size, DEFAULT_SLICE_SIZE);
        assert_eq!(config.slice_delay, Duration::from_millis(20));
    }

    #[test]
    fn renderer_config_defaults_to_four_workers() {
        let config: WorldRendererConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.num_workers, 4);
        assert!(!config.show_chunk_borders);
    }
}
