//! # Voxel Addressing and World Access
//!
//! This module holds the vocabulary shared by the streaming and rendering
//! sides of the crate.
//!
//! ## Architecture
//!
//! * **Coords**: block positions, column keys, section keys and the view rect
//! * **World**: the provider interface the streamer fetches columns from,
//!   and the block/entity data it reports
//!
//! A column is a 16x16 vertical slab of the world and the unit of loading. A
//! section is a 16³ cube inside a column and the unit of mesh generation.

pub mod coords;
pub mod world;
