//! Contention-aware view of a posting's destination cells.
//!
//! Built fresh for one (item, worker, posting) triple whenever a delivery is
//! planned or extended. The view reflects claims and other workers' queued
//! deliveries at build time only.

use rand::RngCore;
use rand::seq::SliceRandom;

use haulx_core::host::storable_items_if_valid;
use haulx_core::{
    Cell, ClaimLedger, ClaimTarget, Grid, ItemState, Items, JobSummary, LogisticsConfig,
    LogisticsError, LogisticsResult, MixType, Reachability, TravelMode, WorkerId, Workforce,
};
use haulx_postings::Posting;

/// Ranks free cells; higher is preferred.
pub type Grader = fn(Cell) -> f32;

/// Every free cell scores the same.
pub fn uninformative(_: Cell) -> f32 {
    0.0
}

#[derive(Debug, Clone)]
pub struct DestinationView {
    mix: MixType,
    stack_limit: u32,
    stacks_required: u32,
    /// Usable cells holding a compatible partial stack, with their free space.
    partial: Vec<(Cell, u32)>,
    /// Usable empty cells.
    free: Vec<Cell>,
    /// Destination cells that hold, or are about to receive, this stack type.
    same_type_cells: u32,
    grader: Grader,
}

impl DestinationView {
    pub fn build<W>(
        world: &W,
        posting: &Posting,
        item: &ItemState,
        worker: WorkerId,
        deliveries: &[JobSummary],
        config: &LogisticsConfig,
    ) -> LogisticsResult<Self>
    where
        W: Grid + Items + ClaimLedger + Reachability + Workforce + ?Sized,
    {
        let record = posting
            .record_with_item(item.id)
            .or_else(|| posting.record_for_mix(&item.mix))
            .ok_or_else(LogisticsError::not_found)?;
        let origin = item
            .cell()
            .or_else(|| world.position(worker))
            .ok_or_else(LogisticsError::not_found)?;

        let mut view = Self {
            mix: *record.mix(),
            stack_limit: record.stack_limit(),
            stacks_required: record.stacks_required(),
            partial: Vec::new(),
            free: Vec::new(),
            same_type_cells: 0,
            grader: uninformative,
        };

        for &cell in posting.destinations().unwrap_or_default() {
            let in_cell = storable_items_if_valid(world, cell);
            let mut same_type = in_cell
                .as_ref()
                .is_some_and(|items| items.iter().any(|i| i.mix == view.mix));

            let claimant = world.first_respected_claimant(ClaimTarget::Cell(cell), worker);
            if let Some(holder) = claimant {
                same_type |= deliveries
                    .iter()
                    .any(|j| j.worker == holder && j.targets_cell(cell) && j.mix == view.mix);
            }
            if same_type {
                view.same_type_cells += 1;
            }

            let Some(in_cell) = in_cell else {
                continue;
            };
            let reachable = world.reachable(
                origin,
                cell,
                TravelMode::ByWorker(worker),
                config.max_path_danger,
            );
            if !reachable || claimant.is_some() || world.cell_forbidden(worker, cell) {
                continue;
            }

            match in_cell.as_slice() {
                [] => view.free.push(cell),
                [single] if same_type && single.space_left() > 0 => {
                    view.partial.push((cell, single.space_left()));
                }
                _ => {}
            }
        }
        Ok(view)
    }

    pub fn with_grader(mut self, grader: Grader) -> Self {
        self.grader = grader;
        self
    }

    pub fn partial_cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.partial.iter().map(|(c, _)| *c)
    }

    pub fn free_cells(&self) -> &[Cell] {
        &self.free
    }

    pub fn same_type_cells(&self) -> u32 {
        self.same_type_cells
    }

    /// All partial cells plus as many of the best free cells as the record
    /// still needs beyond the cells already holding its stack type.
    pub fn usable_dests(&self) -> Vec<Cell> {
        let wanted = self.stacks_required.saturating_sub(self.same_type_cells) as usize;
        let mut free = self.free.clone();
        free.sort_by(|a, b| (self.grader)(*b).total_cmp(&(self.grader)(*a)));
        self.partial_cells()
            .chain(free.into_iter().take(wanted.min(self.free.len())))
            .collect()
    }

    fn space_of(&self, cell: Cell) -> u32 {
        self.partial
            .iter()
            .find(|(c, _)| *c == cell)
            .map(|(_, space)| *space)
            .unwrap_or(self.stack_limit)
    }

    /// A spatially tight run of usable cells holding at least `amount` units,
    /// or every usable cell when they cannot.
    ///
    /// A random usable cell anchors the run; the rest are taken by Manhattan
    /// distance to it until enough space is collected. An empty result means
    /// nothing is usable right now.
    pub fn request_space_for_amount(&self, amount: u32, rng: &mut dyn RngCore) -> Vec<Cell> {
        let mut usable = self.usable_dests();
        let Some(&anchor) = usable.choose(rng) else {
            return Vec::new();
        };
        usable.sort_by_key(|c| c.manhattan(anchor));

        let mut space = 0u32;
        let mut taken = 0usize;
        while taken < usable.len() && space < amount {
            space += self.space_of(usable[taken]);
            taken += 1;
        }
        usable.truncate(taken);
        usable
    }

    /// Units the given cells can still take. Cells outside the view are an
    /// error.
    pub fn free_space_in_cells(&self, cells: &[Cell]) -> LogisticsResult<u32> {
        cells.iter().try_fold(0u32, |acc, cell| {
            if !self.free.contains(cell) && !self.partial.iter().any(|(c, _)| c == cell) {
                return Err(LogisticsError::validation(format!(
                    "cell {cell} is not a usable destination"
                )));
            }
            Ok(acc + self.space_of(*cell))
        })
    }

    /// Total units every usable cell can take.
    pub fn usable_capacity(&self) -> u32 {
        self.usable_dests().iter().map(|c| self.space_of(*c)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haulx_core::{DefId, ItemId, JobId, Point, PostingId, RegionId};
    use haulx_sim::SimWorld;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn steel() -> MixType {
        MixType::new(DefId::new(1))
    }

    /// A 12x1 strip; the posting's items sit at the east end.
    fn setup(units: &[u32]) -> (SimWorld, Posting, Vec<ItemId>, WorkerId) {
        let mut world = SimWorld::new(12, 1);
        let ids: Vec<ItemId> = units
            .iter()
            .enumerate()
            .map(|(i, n)| world.spawn_item(steel(), *n, 75, Cell::new(11 - i as i32, 0)))
            .collect();
        let selected: Vec<ItemState> = ids.iter().filter_map(|i| world.item(*i)).collect();
        let mut posting = Posting::new(PostingId::new(1), RegionId::new(0), &selected);
        assert!(posting.try_make_destinations(
            &world,
            Point::new(0.5, 0.5),
            true,
            &LogisticsConfig::default()
        ));
        let worker = world.add_worker(Cell::new(6, 0), 75);
        (world, posting, ids, worker)
    }

    fn view(world: &SimWorld, posting: &Posting, item: ItemId, worker: WorkerId) -> DestinationView {
        let state = world.item(item).unwrap();
        DestinationView::build(world, posting, &state, worker, &[], &LogisticsConfig::default()).unwrap()
    }

    #[test]
    fn empty_destinations_are_free_cells() {
        let (world, posting, ids, worker) = setup(&[75, 75]);
        let v = view(&world, &posting, ids[0], worker);
        assert_eq!(v.free_cells().len(), 2);
        assert_eq!(v.usable_dests().len(), 2);
        assert_eq!(v.usable_capacity(), 150);
    }

    #[test]
    fn cells_claimed_by_others_are_unusable_but_counted_when_same_type() {
        let (mut world, posting, ids, worker) = setup(&[75, 75]);
        let other = world.add_worker(Cell::new(5, 0), 75);
        let dest = posting.destinations().unwrap()[0];
        let job = JobId::new();
        world.claim(other, ClaimTarget::Cell(dest), job);
        let deliveries = vec![JobSummary {
            worker: other,
            job,
            posting: PostingId::new(1),
            mix: steel(),
            item: ids[1],
            count: 75,
            dest: Some(dest),
            queued_dests: vec![],
            current: true,
        }];
        let state = world.item(ids[0]).unwrap();
        let v = DestinationView::build(
            &world,
            &posting,
            &state,
            worker,
            &deliveries,
            &LogisticsConfig::default(),
        )
        .unwrap();
        assert_eq!(v.same_type_cells(), 1);
        assert_eq!(v.free_cells().len(), 1);
        // Two stacks required, one already spoken for.
        assert_eq!(v.usable_dests().len(), 1);
    }

    #[test]
    fn forbidden_and_unreachable_cells_are_dropped() {
        let (mut world, posting, ids, worker) = setup(&[75, 75]);
        let dests = posting.destinations().unwrap().to_vec();
        world.forbid_cell_for(worker, dests[0]);
        assert_eq!(view(&world, &posting, ids[0], worker).usable_dests(), vec![dests[1]]);
        world.set_impassable(Cell::new(3, 0));
        assert!(view(&world, &posting, ids[0], worker).usable_dests().is_empty());
    }

    #[test]
    fn request_space_takes_a_local_prefix() {
        let (world, posting, ids, worker) = setup(&[75, 75, 75]);
        let v = view(&world, &posting, ids[0], worker);
        let mut rng = StdRng::seed_from_u64(7);
        let dests = v.request_space_for_amount(100, &mut rng);
        assert_eq!(dests.len(), 2);
        assert_eq!(dests[0].manhattan(dests[1]), 1);
        assert_eq!(v.free_space_in_cells(&dests).unwrap(), 150);
    }

    #[test]
    fn request_space_beyond_capacity_returns_everything() {
        let (world, posting, ids, worker) = setup(&[75, 75]);
        let v = view(&world, &posting, ids[0], worker);
        let mut rng = StdRng::seed_from_u64(1);
        let dests = v.request_space_for_amount(10_000, &mut rng);
        assert_eq!(dests.len(), v.usable_dests().len());
    }

    #[test]
    fn partial_cells_use_their_real_space() {
        let mut world = SimWorld::new(6, 1);
        let a = world.spawn_item(steel(), 20, 75, Cell::new(5, 0));
        world.spawn_item(steel(), 50, 75, Cell::new(0, 0));
        let selected = vec![world.item(a).unwrap()];
        let mut posting = Posting::new(PostingId::new(1), RegionId::new(0), &selected);
        let config = LogisticsConfig::default();
        assert!(posting.try_make_destinations(&world, Point::new(0.5, 0.5), true, &config));
        let worker = world.add_worker(Cell::new(4, 0), 75);

        let v = view(&world, &posting, a, worker);
        assert_eq!(v.partial_cells().collect::<Vec<_>>(), vec![Cell::new(0, 0)]);
        assert_eq!(v.free_space_in_cells(&[Cell::new(0, 0)]).unwrap(), 25);
        assert!(v.free_space_in_cells(&[Cell::new(3, 0)]).is_err());
    }

    #[test]
    fn grader_orders_free_cells() {
        let (world, posting, ids, worker) = setup(&[75, 75]);
        let v = view(&world, &posting, ids[0], worker).with_grader(|c| c.x as f32);
        assert_eq!(v.usable_dests(), vec![Cell::new(1, 0), Cell::new(0, 0)]);
    }
}
