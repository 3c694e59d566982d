//! In-memory host world for tests and demos.
//!
//! Implements every host capability trait over a small rectangular grid.
//! Intended for tests/dev; not optimized for performance.

pub mod world;

pub use world::{SimWorker, SimWorld};
