//! Capabilities the host simulation provides to the logistics core.
//!
//! The core never reaches into host internals; it asks through these traits
//! and the host answers with consistent snapshots (the simulation is
//! single-threaded per step). Each trait covers one concern so a host can
//! back them with whatever subsystems it already has.

use serde::{Deserialize, Serialize};

use crate::geom::Cell;
use crate::id::{ItemId, JobId, PostingId, WorkerId};
use crate::mix::MixType;

/// Something standing in a cell.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Occupant {
    /// A storable item stack.
    Item(ItemId),
    /// A door; never a valid drop spot.
    Door,
    /// A structure items cannot share a cell with (wall, blueprint of one, ...).
    Blocking,
    /// Something standable that does not take storage (plant, filth, ...).
    Standable,
}

/// Where an item currently is.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemLocation {
    Ground(Cell),
    Carried(WorkerId),
}

/// Host snapshot of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemState {
    pub id: ItemId,
    pub mix: MixType,
    pub stack_count: u32,
    pub stack_limit: u32,
    pub location: ItemLocation,
    pub destroyed: bool,
    pub burning: bool,
    pub forbidden: bool,
    /// The item's definition can ever be hauled.
    pub ever_haulable: bool,
    /// The item's definition is hauled by default (the haul toggle inverts it).
    pub always_haulable: bool,
    /// Unfinished work bound to a bill; never picked up by explicit hauls.
    pub bound_to_bill: bool,
    /// Already sitting in the best storage available to it.
    pub in_best_storage: bool,
}

impl ItemState {
    /// Ground cell, if the item lies on the ground.
    pub fn cell(&self) -> Option<Cell> {
        match self.location {
            ItemLocation::Ground(c) => Some(c),
            ItemLocation::Carried(_) => None,
        }
    }

    pub fn is_spawned(&self) -> bool {
        !self.destroyed && matches!(self.location, ItemLocation::Ground(_))
    }

    pub fn space_left(&self) -> u32 {
        self.stack_limit.saturating_sub(self.stack_count)
    }
}

/// Anything a worker can hold a claim on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ClaimTarget {
    Item(ItemId),
    Cell(Cell),
}

/// Movement capability used for reachability queries.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TravelMode {
    /// Travel as this worker may (locked doors, allowed areas).
    ByWorker(WorkerId),
    /// Ignore worker-specific restrictions.
    Unrestricted,
}

/// How much danger a path may cross.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Danger {
    None,
    Some,
    #[default]
    Deadly,
}

/// Result of trying to drop a carried stack into a cell.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropOutcome {
    /// Units that left the worker's hands.
    pub placed: u32,
    /// The stack now holding the placed units, if any.
    pub placed_item: Option<ItemId>,
    /// Whether the worker's hands are now empty.
    pub complete: bool,
}

/// Snapshot of one delivery job, as seen by other workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub worker: WorkerId,
    pub job: JobId,
    pub posting: PostingId,
    pub mix: MixType,
    pub item: ItemId,
    /// Units this job still intends to deliver.
    pub count: u32,
    pub dest: Option<Cell>,
    pub queued_dests: Vec<Cell>,
    /// The worker's current job (as opposed to one queued behind it).
    pub current: bool,
}

impl JobSummary {
    pub fn targets_cell(&self, cell: Cell) -> bool {
        self.dest == Some(cell) || self.queued_dests.contains(&cell)
    }
}

/// Static and semi-static facts about grid cells.
pub trait Grid {
    fn in_bounds(&self, cell: Cell) -> bool;
    fn fogged(&self, cell: Cell) -> bool;
    /// Inside the no-build band along the region edge.
    fn in_edge_zone(&self, cell: Cell) -> bool;
    fn terrain_passable(&self, cell: Cell) -> bool;
    fn on_fire(&self, cell: Cell) -> bool;
    fn occupants(&self, cell: Cell) -> Vec<Occupant>;
}

/// Item lookup. `None` means the host no longer knows the item at all.
pub trait Items {
    fn item(&self, id: ItemId) -> Option<ItemState>;

    /// Destroyed or forgotten.
    fn is_gone(&self, id: ItemId) -> bool {
        self.item(id).is_none_or(|i| i.destroyed)
    }
}

/// Cooperative claim ledger shared by all workers.
pub trait ClaimLedger {
    /// Take a claim. Returns `false` when someone else holds the target.
    fn claim(&mut self, worker: WorkerId, target: ClaimTarget, job: JobId) -> bool;
    fn release(&mut self, worker: WorkerId, target: ClaimTarget, job: JobId);
    fn release_all(&mut self, worker: WorkerId, job: JobId);
    fn claimant(&self, target: ClaimTarget) -> Option<WorkerId>;
    /// First claimant of `target` whose claim `asker` must respect (including
    /// `asker` itself).
    fn first_respected_claimant(&self, target: ClaimTarget, asker: WorkerId) -> Option<WorkerId>;

    fn can_claim(&self, worker: WorkerId, target: ClaimTarget) -> bool {
        self.claimant(target).is_none_or(|w| w == worker)
    }
}

pub trait Reachability {
    fn reachable(&self, from: Cell, to: Cell, mode: TravelMode, danger: Danger) -> bool;
}

/// Worker-side facts.
pub trait Workforce {
    fn position(&self, worker: WorkerId) -> Option<Cell>;
    /// How many more units of `mix` the worker could carry right now.
    fn available_stack_space(&self, worker: WorkerId, mix: &MixType, stack_limit: u32) -> u32;
    fn cell_forbidden(&self, worker: WorkerId, cell: Cell) -> bool;
    fn carried(&self, worker: WorkerId) -> Option<ItemId>;

    /// Standing on or next to `cell` (close enough to interact with it).
    fn is_adjacent(&self, worker: WorkerId, cell: Cell) -> bool {
        self.position(worker).is_some_and(|p| p.touches(cell))
    }
}

/// The host-owned per-item "haul" toggle plus the forbidden flag.
pub trait Haulability {
    fn haul_toggled(&self, item: ItemId) -> bool;
    fn toggle_haul(&mut self, item: ItemId);
    fn set_forbidden(&mut self, item: ItemId, forbidden: bool);
}

/// Physical actions a worker performs.
pub trait Physical {
    /// Pick up to `count` units of `item`. Returns the carried item (a new
    /// runtime object when the stack was split) and the units actually taken.
    fn start_carry(&mut self, worker: WorkerId, item: ItemId, count: u32) -> Option<(ItemId, u32)>;
    /// Drop the carried stack directly into `cell`, merging where possible.
    fn drop_carried(&mut self, worker: WorkerId, cell: Cell) -> DropOutcome;
    /// Generic "put it down somewhere close" placement.
    fn place_nearby(&mut self, worker: WorkerId) -> bool;
    fn destroy_carried(&mut self, worker: WorkerId);
}

/// Everything the delivery machinery needs from a host.
pub trait HostWorld:
    Grid + Items + ClaimLedger + Reachability + Workforce + Haulability + Physical
{
}

impl<T> HostWorld for T where
    T: Grid + Items + ClaimLedger + Reachability + Workforce + Haulability + Physical + ?Sized
{
}

/// Whether `cell` may ever be part of a destination area.
///
/// Used to grow the nearest-first search: rejected cells are never expanded.
pub fn is_possible_destination<W: Grid + ?Sized>(world: &W, cell: Cell) -> bool {
    if !world.in_bounds(cell)
        || world.fogged(cell)
        || world.in_edge_zone(cell)
        || !world.terrain_passable(cell)
    {
        return false;
    }
    !world
        .occupants(cell)
        .iter()
        .any(|o| matches!(o, Occupant::Door | Occupant::Blocking))
}

/// Storable items in `cell`, or `None` when the cell cannot take items right
/// now (all of [`is_possible_destination`], plus not burning).
pub fn storable_items_if_valid<W: Grid + Items + ?Sized>(
    world: &W,
    cell: Cell,
) -> Option<Vec<ItemState>> {
    if !is_possible_destination(world, cell) || world.on_fire(cell) {
        return None;
    }
    let items = world
        .occupants(cell)
        .into_iter()
        .filter_map(|o| match o {
            Occupant::Item(id) => world.item(id).filter(|i| !i.destroyed),
            _ => None,
        })
        .collect();
    Some(items)
}
