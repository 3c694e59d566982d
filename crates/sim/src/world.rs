use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use haulx_core::host::storable_items_if_valid;
use haulx_core::{
    Cell, ClaimLedger, ClaimTarget, Danger, DropOutcome, Grid, Haulability, ItemId, ItemLocation,
    ItemState, Items, JobId, MixType, Occupant, Physical, Reachability, TravelMode, WorkerId,
    Workforce,
};

/// Radius searched by [`SimWorld::place_nearby`].
const PLACE_NEARBY_RADIUS: u32 = 8;

/// One simulated worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimWorker {
    pub position: Cell,
    /// Units the worker can hold at once (further capped by the stack limit).
    pub capacity: u32,
    pub carried: Option<ItemId>,
    pub forbidden_cells: HashSet<Cell>,
}

/// In-memory world: one rectangular region.
#[derive(Debug, Clone)]
pub struct SimWorld {
    width: i32,
    height: i32,
    edge_band: i32,
    fog: HashSet<Cell>,
    impassable: HashSet<Cell>,
    fire: HashSet<Cell>,
    structures: HashMap<Cell, Occupant>,
    items: BTreeMap<ItemId, ItemState>,
    toggled: HashSet<ItemId>,
    workers: BTreeMap<WorkerId, SimWorker>,
    claims: BTreeMap<ClaimTarget, (WorkerId, JobId)>,
    place_nearby_enabled: bool,
    next_item: u64,
    next_worker: u64,
}

impl SimWorld {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            edge_band: 0,
            fog: HashSet::new(),
            impassable: HashSet::new(),
            fire: HashSet::new(),
            structures: HashMap::new(),
            items: BTreeMap::new(),
            toggled: HashSet::new(),
            workers: BTreeMap::new(),
            claims: BTreeMap::new(),
            place_nearby_enabled: true,
            next_item: 1,
            next_worker: 1,
        }
    }

    /// Cells closer than `band` to the border count as the no-build edge.
    pub fn with_edge_band(mut self, band: i32) -> Self {
        self.edge_band = band;
        self
    }

    pub fn spawn_item(&mut self, mix: MixType, count: u32, stack_limit: u32, cell: Cell) -> ItemId {
        let id = ItemId::new(self.next_item);
        self.next_item += 1;
        self.items.insert(
            id,
            ItemState {
                id,
                mix,
                stack_count: count,
                stack_limit,
                location: ItemLocation::Ground(cell),
                destroyed: false,
                burning: false,
                forbidden: false,
                ever_haulable: true,
                always_haulable: true,
                bound_to_bill: false,
                in_best_storage: false,
            },
        );
        id
    }

    pub fn item_mut(&mut self, id: ItemId) -> Option<&mut ItemState> {
        self.items.get_mut(&id)
    }

    pub fn destroy_item(&mut self, id: ItemId) {
        if let Some(item) = self.items.get_mut(&id) {
            item.destroyed = true;
        }
        for worker in self.workers.values_mut() {
            if worker.carried == Some(id) {
                worker.carried = None;
            }
        }
    }

    pub fn add_worker(&mut self, position: Cell, capacity: u32) -> WorkerId {
        let id = WorkerId::new(self.next_worker);
        self.next_worker += 1;
        self.workers.insert(
            id,
            SimWorker {
                position,
                capacity,
                carried: None,
                forbidden_cells: HashSet::new(),
            },
        );
        id
    }

    pub fn worker(&self, id: WorkerId) -> Option<&SimWorker> {
        self.workers.get(&id)
    }

    pub fn move_worker(&mut self, id: WorkerId, to: Cell) {
        if let Some(worker) = self.workers.get_mut(&id) {
            worker.position = to;
        }
    }

    pub fn forbid_cell_for(&mut self, worker: WorkerId, cell: Cell) {
        if let Some(w) = self.workers.get_mut(&worker) {
            w.forbidden_cells.insert(cell);
        }
    }

    pub fn set_fogged(&mut self, cell: Cell) {
        self.fog.insert(cell);
    }

    pub fn set_impassable(&mut self, cell: Cell) {
        self.impassable.insert(cell);
    }

    pub fn set_fire(&mut self, cell: Cell, burning: bool) {
        if burning {
            self.fire.insert(cell);
        } else {
            self.fire.remove(&cell);
        }
    }

    pub fn add_structure(&mut self, cell: Cell, occupant: Occupant) {
        self.structures.insert(cell, occupant);
    }

    /// Make [`Physical::place_nearby`] always fail.
    pub fn disable_place_nearby(&mut self) {
        self.place_nearby_enabled = false;
    }

    /// Live ground items in `cell`.
    pub fn items_at(&self, cell: Cell) -> Vec<ItemId> {
        self.items
            .values()
            .filter(|i| !i.destroyed && i.location == ItemLocation::Ground(cell))
            .map(|i| i.id)
            .collect()
    }

    /// Units of `mix` lying on the ground in `cell`.
    pub fn units_at(&self, cell: Cell, mix: &MixType) -> u32 {
        self.items_at(cell)
            .iter()
            .filter_map(|id| self.items.get(id))
            .filter(|i| i.mix == *mix)
            .map(|i| i.stack_count)
            .sum()
    }

    pub fn claims_of(&self, worker: WorkerId) -> Vec<ClaimTarget> {
        self.claims
            .iter()
            .filter(|(_, (w, _))| *w == worker)
            .map(|(t, _)| *t)
            .collect()
    }

    fn walkable(&self, cell: Cell, mode: TravelMode) -> bool {
        if !self.in_bounds(cell) || !self.terrain_passable(cell) {
            return false;
        }
        if matches!(self.structures.get(&cell), Some(Occupant::Blocking)) {
            return false;
        }
        match mode {
            TravelMode::ByWorker(w) => !self.cell_forbidden(w, cell),
            TravelMode::Unrestricted => true,
        }
    }

    fn carried_item(&self, worker: WorkerId) -> Option<ItemId> {
        let id = self.workers.get(&worker)?.carried?;
        self.items.get(&id).filter(|i| !i.destroyed).map(|i| i.id)
    }

    fn set_carried(&mut self, worker: WorkerId, item: Option<ItemId>) {
        if let Some(w) = self.workers.get_mut(&worker) {
            w.carried = item;
        }
    }
}

impl Grid for SimWorld {
    fn in_bounds(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.z >= 0 && cell.x < self.width && cell.z < self.height
    }

    fn fogged(&self, cell: Cell) -> bool {
        self.fog.contains(&cell)
    }

    fn in_edge_zone(&self, cell: Cell) -> bool {
        let b = self.edge_band;
        b > 0
            && (cell.x < b || cell.z < b || cell.x >= self.width - b || cell.z >= self.height - b)
    }

    fn terrain_passable(&self, cell: Cell) -> bool {
        !self.impassable.contains(&cell)
    }

    fn on_fire(&self, cell: Cell) -> bool {
        self.fire.contains(&cell)
    }

    fn occupants(&self, cell: Cell) -> Vec<Occupant> {
        let mut out: Vec<Occupant> = self.structures.get(&cell).copied().into_iter().collect();
        out.extend(self.items_at(cell).into_iter().map(Occupant::Item));
        out
    }
}

impl Items for SimWorld {
    fn item(&self, id: ItemId) -> Option<ItemState> {
        self.items.get(&id).cloned()
    }
}

impl ClaimLedger for SimWorld {
    fn claim(&mut self, worker: WorkerId, target: ClaimTarget, job: JobId) -> bool {
        match self.claims.get(&target) {
            Some((holder, _)) if *holder != worker => false,
            _ => {
                self.claims.insert(target, (worker, job));
                true
            }
        }
    }

    fn release(&mut self, worker: WorkerId, target: ClaimTarget, job: JobId) {
        if self.claims.get(&target) == Some(&(worker, job)) {
            self.claims.remove(&target);
        }
    }

    fn release_all(&mut self, worker: WorkerId, job: JobId) {
        self.claims.retain(|_, holder| *holder != (worker, job));
    }

    fn claimant(&self, target: ClaimTarget) -> Option<WorkerId> {
        self.claims.get(&target).map(|(w, _)| *w)
    }

    fn first_respected_claimant(&self, target: ClaimTarget, _asker: WorkerId) -> Option<WorkerId> {
        self.claimant(target)
    }
}

impl Reachability for SimWorld {
    fn reachable(&self, from: Cell, to: Cell, mode: TravelMode, _danger: Danger) -> bool {
        if !self.in_bounds(from) || !self.in_bounds(to) {
            return false;
        }
        let mut seen = HashSet::from([from]);
        let mut queue = VecDeque::from([from]);
        while let Some(cell) = queue.pop_front() {
            if cell.touches(to) {
                return true;
            }
            for next in cell.neighbours() {
                if !seen.contains(&next) && self.walkable(next, mode) {
                    seen.insert(next);
                    queue.push_back(next);
                }
            }
        }
        false
    }
}

impl Workforce for SimWorld {
    fn position(&self, worker: WorkerId) -> Option<Cell> {
        self.workers.get(&worker).map(|w| w.position)
    }

    fn available_stack_space(&self, worker: WorkerId, mix: &MixType, stack_limit: u32) -> u32 {
        let Some(w) = self.workers.get(&worker) else {
            return 0;
        };
        let cap = w.capacity.min(stack_limit);
        match self.carried_item(worker).and_then(|id| self.items.get(&id)) {
            Some(c) if c.mix == *mix => cap.saturating_sub(c.stack_count),
            Some(_) => 0,
            None => cap,
        }
    }

    fn cell_forbidden(&self, worker: WorkerId, cell: Cell) -> bool {
        self.workers
            .get(&worker)
            .is_some_and(|w| w.forbidden_cells.contains(&cell))
    }

    fn carried(&self, worker: WorkerId) -> Option<ItemId> {
        self.carried_item(worker)
    }
}

impl Haulability for SimWorld {
    fn haul_toggled(&self, item: ItemId) -> bool {
        self.toggled.contains(&item)
    }

    fn toggle_haul(&mut self, item: ItemId) {
        if !self.toggled.remove(&item) {
            self.toggled.insert(item);
        }
    }

    fn set_forbidden(&mut self, item: ItemId, forbidden: bool) {
        if let Some(i) = self.items.get_mut(&item) {
            i.forbidden = forbidden;
        }
    }
}

impl Physical for SimWorld {
    fn start_carry(&mut self, worker: WorkerId, item: ItemId, count: u32) -> Option<(ItemId, u32)> {
        let source = self.items.get(&item).filter(|i| i.is_spawned())?.clone();
        let space = self.available_stack_space(worker, &source.mix, source.stack_limit);
        let take = count.min(source.stack_count).min(space);
        if take == 0 {
            return None;
        }

        if let Some(carried_id) = self.carried_item(worker) {
            let carried = self.items.get_mut(&carried_id)?;
            if carried.mix != source.mix {
                return None;
            }
            carried.stack_count += take;
            let src = self.items.get_mut(&item)?;
            src.stack_count -= take;
            if src.stack_count == 0 {
                src.destroyed = true;
            }
            return Some((carried_id, take));
        }

        if take == source.stack_count {
            self.items.get_mut(&item)?.location = ItemLocation::Carried(worker);
            self.set_carried(worker, Some(item));
            return Some((item, take));
        }

        let splinter = ItemId::new(self.next_item);
        self.next_item += 1;
        let mut split = source;
        split.id = splinter;
        split.stack_count = take;
        split.location = ItemLocation::Carried(worker);
        self.items.insert(splinter, split);
        self.items.get_mut(&item)?.stack_count -= take;
        self.set_carried(worker, Some(splinter));
        Some((splinter, take))
    }

    fn drop_carried(&mut self, worker: WorkerId, cell: Cell) -> DropOutcome {
        let nothing = DropOutcome {
            placed: 0,
            placed_item: None,
            complete: false,
        };
        let Some(carried_id) = self.carried_item(worker) else {
            return nothing;
        };
        let Some(in_cell) = storable_items_if_valid(&*self, cell) else {
            return nothing;
        };
        let Some(carried) = self.items.get(&carried_id).cloned() else {
            return nothing;
        };

        match in_cell.as_slice() {
            [] => {
                if let Some(c) = self.items.get_mut(&carried_id) {
                    c.location = ItemLocation::Ground(cell);
                }
                self.set_carried(worker, None);
                DropOutcome {
                    placed: carried.stack_count,
                    placed_item: Some(carried_id),
                    complete: true,
                }
            }
            [floor] if floor.mix == carried.mix && floor.space_left() > 0 => {
                let n = floor.space_left().min(carried.stack_count);
                if let Some(f) = self.items.get_mut(&floor.id) {
                    f.stack_count += n;
                }
                let mut complete = false;
                if let Some(c) = self.items.get_mut(&carried_id) {
                    c.stack_count -= n;
                    if c.stack_count == 0 {
                        c.destroyed = true;
                        complete = true;
                    }
                }
                if complete {
                    self.set_carried(worker, None);
                }
                DropOutcome {
                    placed: n,
                    placed_item: Some(floor.id),
                    complete,
                }
            }
            _ => nothing,
        }
    }

    fn place_nearby(&mut self, worker: WorkerId) -> bool {
        if !self.place_nearby_enabled {
            return false;
        }
        let (Some(carried_id), Some(origin)) = (self.carried_item(worker), self.position(worker))
        else {
            return false;
        };
        let r = PLACE_NEARBY_RADIUS as i32;
        let mut candidates: Vec<Cell> = (-r..=r)
            .flat_map(|dx| (-r..=r).map(move |dz| Cell::new(origin.x + dx, origin.z + dz)))
            .filter(|c| c.manhattan(origin) <= PLACE_NEARBY_RADIUS)
            .collect();
        candidates.sort_by_key(|c| (c.manhattan(origin), *c));
        let spot = candidates
            .into_iter()
            .find(|c| storable_items_if_valid(&*self, *c).is_some_and(|items| items.is_empty()));
        let Some(spot) = spot else {
            return false;
        };
        if let Some(c) = self.items.get_mut(&carried_id) {
            c.location = ItemLocation::Ground(spot);
        }
        self.set_carried(worker, None);
        tracing::debug!(worker = %worker, cell = %spot, "placed carried item nearby");
        true
    }

    fn destroy_carried(&mut self, worker: WorkerId) {
        if let Some(id) = self.carried_item(worker) {
            self.destroy_item(id);
        }
    }
}
