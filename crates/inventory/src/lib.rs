//! Inventory records: per-stack-type accounting inside a relocation order.
//!
//! This crate contains the quantity rules (selected / requested / moved /
//! in flight) as deterministic domain logic; no host access.

pub mod record;

pub use record::{InventoryRecord, RecordState, RemovalReason, stacks_worth};
