//! `haulx-postings`: explicit relocation orders.
//!
//! A [`Posting`] groups selected items into per-stack-type inventory records
//! and finds destination cells for them. Postings live in per-region
//! [`PostingRegistry`]s owned by the top-level [`LogisticsState`].

pub mod haulability;
pub mod posting;
pub mod registry;
pub mod search;
pub mod snapshot;
pub mod state;
pub mod status;

pub use haulability::{is_haulable_set_to_haulable, is_haulable_set_to_unhaulable, should_be_haulable};
pub use posting::Posting;
pub use registry::PostingRegistry;
pub use search::NearestFirst;
pub use snapshot::{LogisticsSnapshot, PostingState, RecordSnapshot, RegionSnapshot};
pub use state::LogisticsState;
pub use status::PostingStatus;
