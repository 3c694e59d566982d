//! `haulx-delivery`: workers carrying posting items to their destinations.
//!
//! [`WorkProposer`] turns an idle worker plus a posting item into a
//! [`DeliveryPlan`], using a [`DestinationView`] to stay clear of cells other
//! workers are already filling. [`DeliveryJob`] walks the plan through
//! pickup, optional bundling and placement. [`DeliveryRoster`] keeps each
//! worker's job queue.

pub mod job;
pub mod proposer;
pub mod roster;
pub mod view;

pub use job::{DeliveryJob, IncompleteReason, JobState, Tick};
pub use proposer::{DeliveryPlan, WorkProposer, amount_worker_wants, can_get_item};
pub use roster::DeliveryRoster;
pub use view::{DestinationView, Grader, uninformative};
