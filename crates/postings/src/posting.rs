use haulx_core::host::storable_items_if_valid;
use haulx_core::{
    AggregateRoot, Cell, ClaimLedger, ClaimTarget, Grid, ItemId, ItemState, Items, JobSummary,
    LogisticsConfig, LogisticsError, LogisticsResult, MergeSlotPolicy, MixType, MixTypeRegistry,
    Point, PostingId, RegionId,
};
use haulx_inventory::{InventoryRecord, RemovalReason};

use crate::search::NearestFirst;
use crate::snapshot::{PostingState, RecordSnapshot};
use crate::status::PostingStatus;

/// Aggregate root: one explicit relocation order.
///
/// A posting owns its inventory records and keeps a flattened `items` list
/// mirroring their membership. Every mutating method leaves the two in sync.
#[derive(Debug, Clone, PartialEq)]
pub struct Posting {
    id: PostingId,
    region: RegionId,
    records: Vec<InventoryRecord>,
    items: Vec<ItemId>,
    destinations: Option<Vec<Cell>>,
    cursor: Option<Point>,
    center: Point,
    radius: f32,
    registered: bool,
    version: u64,
}

impl Posting {
    /// Build an order from the operator's selection. Items that can never be
    /// hauled and repeated items are skipped.
    pub fn new(id: PostingId, region: RegionId, selected: &[ItemState]) -> Self {
        let mut posting = Self {
            id,
            region,
            records: Vec::new(),
            items: Vec::new(),
            destinations: None,
            cursor: None,
            center: Point::default(),
            radius: 0.0,
            registered: false,
            version: 0,
        };
        for item in selected {
            if !item.ever_haulable || posting.items.contains(&item.id) {
                continue;
            }
            posting.items.push(item.id);
            if !posting.records.iter_mut().any(|r| r.try_add_item(item, true)) {
                posting.records.push(InventoryRecord::new(id, item));
            }
        }
        posting
    }

    pub fn id_typed(&self) -> PostingId {
        self.id
    }

    pub fn region(&self) -> RegionId {
        self.region
    }

    pub fn records(&self) -> &[InventoryRecord] {
        &self.records
    }

    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    pub fn has_item(&self, item: ItemId) -> bool {
        self.items.contains(&item)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Cached destination cells, if the last search succeeded.
    pub fn destinations(&self) -> Option<&[Cell]> {
        self.destinations.as_deref()
    }

    pub fn cursor(&self) -> Option<Point> {
        self.cursor
    }

    pub fn center(&self) -> Point {
        self.center
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub(crate) fn mark_registered(&mut self) {
        self.registered = true;
        self.version += 1;
    }

    pub fn record_with_item(&self, item: ItemId) -> Option<&InventoryRecord> {
        self.records.iter().find(|r| r.has_item(item))
    }

    pub fn record_for_mix(&self, mix: &MixType) -> Option<&InventoryRecord> {
        self.records.iter().find(|r| r.mix() == mix)
    }

    fn record_for_mix_mut(&mut self, mix: &MixType) -> Option<&mut InventoryRecord> {
        self.records.iter_mut().find(|r| r.mix() == mix)
    }

    /// Detach `item` from its record and from the flattened list.
    ///
    /// A player cancellation that empties a record drops the record too.
    pub fn try_remove_item(&mut self, item: ItemId, reason: RemovalReason) -> bool {
        if !self.items.contains(&item) {
            return false;
        }
        let Some(index) = self.records.iter().position(|r| r.has_item(item)) else {
            let err = LogisticsError::consistency(format!(
                "posting {} lists item {item} but no record holds it",
                self.id
            ));
            tracing::error!(posting = %self.id, item = %item, error = %err, "refusing item removal");
            return false;
        };
        self.records[index].try_remove_item(item, reason);
        if matches!(reason, RemovalReason::PlayerCancelled { .. }) && self.records[index].is_empty()
        {
            self.records.remove(index);
        }
        self.items.retain(|i| *i != item);
        self.version += 1;
        true
    }

    /// Re-associate a runtime-distinct stack split off a member item. The
    /// splinter joins the matching record without counting its units again.
    pub fn try_add_item_splinter(&mut self, splinter: &ItemState) -> bool {
        if self.items.contains(&splinter.id) {
            return false;
        }
        let Some(record) = self.records.iter_mut().find(|r| r.can_mix_with(splinter)) else {
            tracing::error!(
                posting = %self.id,
                item = %splinter.id,
                "no record matches splinter"
            );
            return false;
        };
        record.try_add_item(splinter, false);
        self.items.push(splinter.id);
        self.version += 1;
        true
    }

    /// Drop destroyed or forgotten items, keeping record skeletons. Returns
    /// how many items were removed.
    pub fn clean<W: Items + ?Sized>(&mut self, world: &W) -> usize {
        let gone: Vec<ItemId> = self
            .items
            .iter()
            .copied()
            .filter(|i| world.is_gone(*i))
            .collect();
        gone.iter()
            .filter(|i| self.try_remove_item(**i, RemovalReason::Destroyed))
            .count()
    }

    /// Rebuild the flattened item list from record membership.
    pub fn reload_items_from_records(&mut self) {
        self.items = self
            .records
            .iter()
            .flat_map(|r| r.items().iter().copied())
            .collect();
    }

    /// `items` holds exactly the union of record members.
    pub fn is_coherent(&self) -> bool {
        let mut flat = self.items.clone();
        let mut union: Vec<ItemId> = self
            .records
            .iter()
            .flat_map(|r| r.items().iter().copied())
            .collect();
        flat.sort();
        union.sort();
        flat == union
    }

    pub fn coherence_report(&self) -> String {
        let mut out = format!(
            "posting {} (region {}): coherent={}\n",
            self.id,
            self.region,
            self.is_coherent()
        );
        out.push_str(&format!("  items: {:?}\n", self.items));
        for record in &self.records {
            out.push_str(&format!(
                "  record {:?}: items={:?} selected={} to_move={} moved={}\n",
                record.mix(),
                record.items(),
                record.selected_quantity(),
                record.quantity_to_move(),
                record.moved_quantity()
            ));
        }
        match &self.destinations {
            Some(d) => out.push_str(&format!("  destinations: {d:?}\n")),
            None => out.push_str("  destinations: none\n"),
        }
        out
    }

    /// Destination cells needed given the merge slots found so far.
    pub fn stacks_required(&self) -> u32 {
        self.records.iter().map(|r| r.stacks_required()).sum()
    }

    /// Find destination cells near `cursor` able to take every record.
    ///
    /// With `lazy` and an unchanged cursor the cached result is returned
    /// without scanning. On failure the cached destinations are cleared.
    pub fn try_make_destinations<W>(
        &mut self,
        world: &W,
        cursor: Point,
        lazy: bool,
        config: &LogisticsConfig,
    ) -> bool
    where
        W: Grid + Items + ClaimLedger + ?Sized,
    {
        if lazy && self.cursor == Some(cursor) {
            return self.destinations.is_some();
        }
        self.cursor = Some(cursor);
        self.version += 1;
        for record in &mut self.records {
            record.reset_merge();
        }

        let lower_bound: u32 = self
            .records
            .iter()
            .map(|r| r.stacks_required_without_merges())
            .sum();
        if lower_bound == 0 {
            self.accept_destinations(Vec::new(), cursor);
            return true;
        }

        let mut dests: Vec<Cell> = Vec::new();
        for (visited, cell) in NearestFirst::new(world, cursor).enumerate() {
            if visited >= config.max_search_cells {
                tracing::debug!(posting = %self.id, visited, "destination search hit its cell limit");
                break;
            }
            if world.claimant(ClaimTarget::Cell(cell)).is_some() {
                continue;
            }
            let Some(in_cell) = storable_items_if_valid(world, cell) else {
                continue;
            };
            match in_cell.as_slice() {
                [] => dests.push(cell),
                [single] => {
                    if self.items.contains(&single.id) || single.space_left() == 0 {
                        continue;
                    }
                    if self.take_merge_cell(single, config.merge_slot_policy) {
                        dests.push(cell);
                    }
                }
                _ => continue,
            }

            let found = dests.len() as u32;
            if found >= lower_bound && found >= self.stacks_required() {
                tracing::debug!(
                    posting = %self.id,
                    cells = found,
                    "destination search succeeded"
                );
                self.accept_destinations(dests, cursor);
                return true;
            }
        }

        tracing::debug!(
            posting = %self.id,
            required = self.stacks_required(),
            found = dests.len(),
            "no destination set fits near cursor"
        );
        self.destinations = None;
        false
    }

    fn take_merge_cell(&mut self, occupant: &ItemState, policy: MergeSlotPolicy) -> bool {
        match policy {
            MergeSlotPolicy::FirstMatchingRecord => {
                match self.records.iter_mut().find(|r| r.can_mix_with(occupant)) {
                    Some(record) => {
                        record.add_merge_cell(occupant.stack_count);
                        true
                    }
                    None => false,
                }
            }
        }
    }

    fn accept_destinations(&mut self, dests: Vec<Cell>, cursor: Point) {
        self.center = Point::mean_of(&dests).unwrap_or(cursor);
        self.radius = (dests.len() as f32 / core::f32::consts::PI).sqrt();
        self.destinations = Some(dests);
    }

    /// Drop the cached destination set so the next search rescans.
    pub fn invalidate_destinations(&mut self) {
        self.destinations = None;
        self.cursor = None;
        self.version += 1;
    }

    /// Player override of a record's target quantity.
    pub fn set_quantity_to_move(&mut self, mix: &MixType, value: i64) -> LogisticsResult<()> {
        let id = self.id;
        let record = self
            .record_for_mix_mut(mix)
            .ok_or_else(|| LogisticsError::validation(format!("posting {id} has no such record")))?;
        record.set_quantity_to_move(value)?;
        self.version += 1;
        Ok(())
    }

    /// Count `amount` delivered units against the record of `mix`.
    pub fn record_moved(&mut self, mix: &MixType, amount: u32) -> bool {
        match self.record_for_mix_mut(mix) {
            Some(record) => {
                record.record_moved(amount);
                self.version += 1;
                true
            }
            None => false,
        }
    }

    /// Members still lying on the ground.
    pub fn spawned_items<W: Items + ?Sized>(&self, world: &W) -> Vec<ItemId> {
        self.items
            .iter()
            .copied()
            .filter(|i| world.item(*i).is_some_and(|s| s.is_spawned()))
            .collect()
    }

    pub fn status(&self, deliveries: &[JobSummary]) -> PostingStatus {
        if !self.registered {
            return PostingStatus::Planning;
        }
        if self.records.iter().any(|r| r.is_over_delivered()) {
            return PostingStatus::OverkillError;
        }
        if self.records.iter().all(|r| r.is_satisfied()) {
            return PostingStatus::Complete;
        }
        let stranded = self.records.iter().any(|r| {
            !r.is_satisfied() && r.is_empty() && r.in_flight(deliveries) == 0
        });
        if stranded {
            return PostingStatus::Incompletable;
        }
        if self.destinations.is_none() {
            return PostingStatus::DestinationBlocked;
        }
        PostingStatus::InProgress
    }

    pub(crate) fn to_state(&self, mixes: &mut MixTypeRegistry) -> PostingState {
        PostingState {
            id: self.id,
            region: self.region,
            records: self
                .records
                .iter()
                .map(|r| RecordSnapshot {
                    mix: mixes.intern(*r.mix()),
                    state: r.to_state(),
                })
                .collect(),
            destinations: self.destinations.clone(),
            cursor: self.cursor,
            center: self.center,
            radius: self.radius,
        }
    }

    /// Rebuild a registered posting; the item list comes from the records.
    pub(crate) fn restore(state: PostingState, mixes: &MixTypeRegistry) -> LogisticsResult<Self> {
        let mut records = Vec::with_capacity(state.records.len());
        for snapshot in state.records {
            let mix = mixes.get(snapshot.mix).ok_or_else(|| {
                LogisticsError::validation(format!(
                    "posting {} references unknown mix type {}",
                    state.id, snapshot.mix
                ))
            })?;
            records.push(InventoryRecord::restore(state.id, mix, snapshot.state)?);
        }
        let mut posting = Self {
            id: state.id,
            region: state.region,
            records,
            items: Vec::new(),
            destinations: state.destinations,
            cursor: state.cursor,
            center: state.center,
            radius: state.radius,
            registered: true,
            version: 0,
        };
        posting.reload_items_from_records();
        Ok(posting)
    }
}

impl AggregateRoot for Posting {
    type Id = PostingId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
