//! Titan: a small real-time 3D engine, and Dam Defense, the game built on it.

pub mod animation;
pub mod assets;
pub mod audio;
pub mod config;
pub mod dam_defense;
pub mod ecs;
pub mod engine;
pub mod error;
pub mod graphics;
pub mod input;
pub mod particles;
pub mod physics;
pub mod scene;
pub mod screen;
pub mod transform;
pub mod window;

pub use engine::{Engine, EngineBuilder};
pub use error::TitanError;
