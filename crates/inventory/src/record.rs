use serde::{Deserialize, Serialize};

use haulx_core::{
    ItemId, ItemState, JobSummary, LogisticsError, LogisticsResult, MixType, PostingId,
};

/// Number of stacks `quantity` units occupy at `stack_limit` units per stack.
pub fn stacks_worth(quantity: u32, stack_limit: u32) -> u32 {
    if stack_limit == 0 {
        return 0;
    }
    quantity.div_ceil(stack_limit)
}

/// Why an item leaves a record.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RemovalReason {
    /// Placed at a destination.
    Delivered,
    /// Destroyed in the world (garbage collection, last-resort disposal).
    Destroyed,
    /// Merged into another stack the record still tracks.
    Absorbed,
    /// Claimed by a newer order.
    Reassigned,
    /// The player took the item out of the order; its units no longer count
    /// as selected.
    PlayerCancelled { stack_count: u32 },
}

/// Per-MixType subtotal of a posting.
///
/// A record always belongs to exactly one posting (`posting()`); it is created
/// by that posting and never moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryRecord {
    posting: PostingId,
    mix: MixType,
    stack_limit: u32,
    items: Vec<ItemId>,
    selected_quantity: u32,
    player_set_quantity: Option<u32>,
    merge_capacity: u32,
    merge_cells_used: u32,
    moved_quantity: u32,
}

/// Persisted form of a record (the MixType and owning posting are stored by
/// the caller).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordState {
    #[serde(default)]
    pub items: Vec<ItemId>,
    #[serde(default = "default_stack_limit")]
    pub stack_limit: u32,
    #[serde(default)]
    pub selected_quantity: u32,
    #[serde(default)]
    pub set_quantity: Option<u32>,
    #[serde(default)]
    pub moved_quantity: u32,
    #[serde(default)]
    pub merge_capacity: u32,
    #[serde(default)]
    pub merge_cells_used: u32,
}

fn default_stack_limit() -> u32 {
    1
}

impl InventoryRecord {
    /// Start a record from the first item of a new stack type.
    pub fn new(posting: PostingId, initial: &ItemState) -> Self {
        Self {
            posting,
            mix: initial.mix,
            stack_limit: initial.stack_limit.max(1),
            items: vec![initial.id],
            selected_quantity: initial.stack_count,
            player_set_quantity: None,
            merge_capacity: 0,
            merge_cells_used: 0,
            moved_quantity: 0,
        }
    }

    /// Rebuild a record from its persisted form.
    pub fn restore(posting: PostingId, mix: MixType, state: RecordState) -> LogisticsResult<Self> {
        if state.stack_limit == 0 {
            return Err(LogisticsError::validation(format!(
                "record of posting {posting} has a zero stack limit"
            )));
        }
        let player_set_quantity = match state.set_quantity {
            Some(q) if q > state.selected_quantity => {
                tracing::warn!(
                    posting = %posting,
                    set = q,
                    selected = state.selected_quantity,
                    "clamping restored quantity override to selected quantity"
                );
                Some(state.selected_quantity)
            }
            other => other,
        };
        Ok(Self {
            posting,
            mix,
            stack_limit: state.stack_limit,
            items: state.items,
            selected_quantity: state.selected_quantity,
            player_set_quantity,
            merge_capacity: state.merge_capacity,
            merge_cells_used: state.merge_cells_used,
            moved_quantity: state.moved_quantity,
        })
    }

    pub fn to_state(&self) -> RecordState {
        RecordState {
            items: self.items.clone(),
            stack_limit: self.stack_limit,
            selected_quantity: self.selected_quantity,
            set_quantity: self.player_set_quantity,
            moved_quantity: self.moved_quantity,
            merge_capacity: self.merge_capacity,
            merge_cells_used: self.merge_cells_used,
        }
    }

    pub fn posting(&self) -> PostingId {
        self.posting
    }

    pub fn mix(&self) -> &MixType {
        &self.mix
    }

    pub fn stack_limit(&self) -> u32 {
        self.stack_limit
    }

    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn selected_quantity(&self) -> u32 {
        self.selected_quantity
    }

    pub fn moved_quantity(&self) -> u32 {
        self.moved_quantity
    }

    pub fn merge_capacity(&self) -> u32 {
        self.merge_capacity
    }

    pub fn merge_cells_used(&self) -> u32 {
        self.merge_cells_used
    }

    /// Units the order asks for: the player's override, else everything selected.
    pub fn quantity_to_move(&self) -> u32 {
        self.player_set_quantity.unwrap_or(self.selected_quantity)
    }

    pub fn player_changed_quantity(&self) -> bool {
        self.player_set_quantity.is_some()
    }

    /// Player override of the requested quantity. Rejects values outside
    /// `[0, selected_quantity]` without touching the record.
    pub fn set_quantity_to_move(&mut self, value: i64) -> LogisticsResult<()> {
        if value < 0 || value > i64::from(self.selected_quantity) {
            return Err(LogisticsError::validation(format!(
                "quantity {value} outside 0..={}",
                self.selected_quantity
            )));
        }
        self.player_set_quantity = Some(value as u32);
        Ok(())
    }

    pub fn can_mix_with(&self, item: &ItemState) -> bool {
        self.mix.can_mix_with(&item.mix)
    }

    pub fn has_item(&self, item: ItemId) -> bool {
        self.items.contains(&item)
    }

    /// Add a compatible item. With `count_quantity == false` the item joins
    /// without changing `selected_quantity` (a splinter of a stack that was
    /// already counted).
    pub fn try_add_item(&mut self, item: &ItemState, count_quantity: bool) -> bool {
        if !self.can_mix_with(item) || self.has_item(item.id) {
            return false;
        }
        self.items.push(item.id);
        if count_quantity {
            self.selected_quantity += item.stack_count;
        }
        true
    }

    pub fn try_remove_item(&mut self, item: ItemId, reason: RemovalReason) -> bool {
        let Some(pos) = self.items.iter().position(|i| *i == item) else {
            return false;
        };
        self.items.remove(pos);
        if let RemovalReason::PlayerCancelled { stack_count } = reason {
            self.selected_quantity = self.selected_quantity.saturating_sub(stack_count);
            if let Some(set) = self.player_set_quantity.as_mut() {
                *set = (*set).min(self.selected_quantity);
            }
        }
        true
    }

    /// Forget merge slots found by a previous destination search.
    pub fn reset_merge(&mut self) {
        self.merge_capacity = 0;
        self.merge_cells_used = 0;
    }

    /// Count a partially filled destination stack holding `current_count` units.
    pub fn add_merge_cell(&mut self, current_count: u32) {
        self.merge_cells_used += 1;
        self.merge_capacity += self.stack_limit.saturating_sub(current_count);
    }

    /// Destination cells this record needs given the merge slots found so far.
    pub fn stacks_required(&self) -> u32 {
        stacks_worth(
            self.quantity_to_move().saturating_sub(self.merge_capacity),
            self.stack_limit,
        ) + self.merge_cells_used
    }

    /// Lower bound of [`Self::stacks_required`]: adding a merge cell never
    /// lowers the requirement, so the merge-free figure is the minimum.
    pub fn stacks_required_without_merges(&self) -> u32 {
        stacks_worth(self.quantity_to_move(), self.stack_limit)
    }

    pub fn record_moved(&mut self, amount: u32) {
        self.moved_quantity += amount;
    }

    /// Whether `job` is a delivery of this record.
    pub fn is_delivered_by(&self, job: &JobSummary) -> bool {
        job.posting == self.posting && job.mix == self.mix
    }

    /// Units currently carried (or about to be) by active deliveries.
    pub fn in_flight(&self, deliveries: &[JobSummary]) -> u32 {
        deliveries
            .iter()
            .filter(|j| j.current && self.is_delivered_by(j))
            .map(|j| j.count)
            .sum()
    }

    /// Units nobody has delivered or is delivering yet.
    pub fn remaining_to_haul(&self, deliveries: &[JobSummary]) -> u32 {
        self.quantity_to_move()
            .saturating_sub(self.moved_quantity + self.in_flight(deliveries))
    }

    pub fn is_satisfied(&self) -> bool {
        self.moved_quantity >= self.quantity_to_move()
    }

    pub fn is_over_delivered(&self) -> bool {
        self.moved_quantity > self.quantity_to_move()
    }

    /// "Steel x75"-style label using a host naming callback.
    pub fn label(&self, namer: impl Fn(&MixType) -> String) -> String {
        let name = namer(&self.mix);
        let mut chars = name.chars();
        let capitalized = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => String::new(),
        };
        format!("{capitalized} x{}", self.quantity_to_move())
    }
}
