//! Glyph world library
//!
//! Procedural terrain rendered as glyphs, with live entities synced from a
//! world state server. Re-exports modules for use by the binary.

pub mod animation;
pub mod biomes;
pub mod config;
pub mod display;
pub mod entities;
pub mod entity_render;
pub mod explorer;
pub mod export;
pub mod heightmap;
pub mod interaction;
pub mod noise_engine;
pub mod seeds;
pub mod surface;
pub mod terrain;
pub mod tilemap;
pub mod world;
