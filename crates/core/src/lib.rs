//! `haulx-core`: foundation building blocks for explicit hauling.
//!
//! This crate contains **pure domain** primitives (identifiers, grid geometry,
//! stack identity, the error model, configuration) plus the capability traits a
//! host simulation implements. No rendering, no pathfinding, no IO.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod geom;
pub mod host;
pub mod id;
pub mod mix;

pub use aggregate::AggregateRoot;
pub use config::{LogisticsConfig, MergeSlotPolicy};
pub use error::{LogisticsError, LogisticsResult};
pub use geom::{Cell, Point};
pub use host::{
    ClaimLedger, ClaimTarget, Danger, DropOutcome, Grid, Haulability, HostWorld, ItemLocation,
    ItemState, Items, JobSummary, Occupant, Physical, Reachability, TravelMode, Workforce,
};
pub use id::{DefId, ItemId, JobId, MixTypeId, PostingId, RegionId, WorkerId, ZoneId};
pub use mix::{MixType, MixTypeRegistry};
