//! Offers idle workers explicit-haul work.

use rand::RngCore;
use serde::{Deserialize, Serialize};

use haulx_core::{
    Cell, ClaimLedger, ClaimTarget, Grid, ItemId, ItemState, Items, JobSummary, LogisticsConfig,
    MixType, PostingId, Reachability, RegionId, TravelMode, WorkerId, Workforce,
};
use haulx_inventory::InventoryRecord;
use haulx_postings::{LogisticsState, Posting};

use crate::view::DestinationView;

/// What a worker should do: carry `count` units of `item` to `dest`, then to
/// `queued_dests` in order if the first cell fills up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryPlan {
    pub region: RegionId,
    pub posting: PostingId,
    pub item: ItemId,
    pub mix: MixType,
    pub count: u32,
    pub dest: Cell,
    pub queued_dests: Vec<Cell>,
    /// Units the planned destination cells can take in total.
    pub dest_space: u32,
    pub bundling: bool,
}

/// Whether `worker` may go for `item` at all.
pub fn can_get_item<W>(world: &W, worker: WorkerId, item: &ItemState, config: &LogisticsConfig) -> bool
where
    W: ClaimLedger + Reachability + Workforce + ?Sized,
{
    if item.bound_to_bill || item.burning || !item.is_spawned() {
        return false;
    }
    let (Some(from), Some(at)) = (world.position(worker), item.cell()) else {
        return false;
    };
    world.reachable(from, at, TravelMode::ByWorker(worker), config.max_path_danger)
        && world.can_claim(worker, ClaimTarget::Item(item.id))
}

/// Units a worker would pick up: bounded by what the record still owes, by
/// what the worker can hold, and by the stack itself.
pub fn amount_worker_wants<W: Workforce + ?Sized>(
    world: &W,
    worker: WorkerId,
    item: &ItemState,
    record: &InventoryRecord,
    deliveries: &[JobSummary],
) -> u32 {
    record
        .remaining_to_haul(deliveries)
        .min(world.available_stack_space(worker, &item.mix, item.stack_limit))
        .min(item.stack_count)
}

/// Matches idle workers to posting items.
#[derive(Debug, Clone, Default)]
pub struct WorkProposer {
    config: LogisticsConfig,
}

impl WorkProposer {
    pub fn new(config: LogisticsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LogisticsConfig {
        &self.config
    }

    /// Items any worker in `region` could be offered.
    pub fn potential_work(&self, state: &LogisticsState, region: RegionId) -> Vec<ItemId> {
        state.haulables(region)
    }

    pub fn should_skip(&self, state: &LogisticsState, region: RegionId) -> bool {
        state.haulables(region).is_empty()
    }

    /// Plan a delivery of `item` for `worker`, or `None` when nothing useful
    /// can be done with it right now.
    pub fn propose<W>(
        &self,
        world: &W,
        posting: &Posting,
        worker: WorkerId,
        item: ItemId,
        deliveries: &[JobSummary],
        rng: &mut dyn RngCore,
    ) -> Option<DeliveryPlan>
    where
        W: Grid + Items + ClaimLedger + Reachability + Workforce + ?Sized,
    {
        let state = world.item(item)?;
        if !can_get_item(world, worker, &state, &self.config) {
            return None;
        }
        let record = posting.record_with_item(item)?;
        let wanted = amount_worker_wants(world, worker, &state, record, deliveries);
        if wanted == 0 {
            return None;
        }

        let view = DestinationView::build(world, posting, &state, worker, deliveries, &self.config)
            .ok()?;
        let dests = view.request_space_for_amount(wanted, rng);
        let dest_space = view.free_space_in_cells(&dests).ok()?;
        let count = wanted.min(dest_space);
        let Some((&dest, queued)) = dests.split_first().filter(|_| count > 0) else {
            tracing::debug!(item = %item, worker = %worker, wanted, "no usable destination space");
            return None;
        };

        Some(DeliveryPlan {
            region: posting.region(),
            posting: posting.id_typed(),
            item,
            mix: *record.mix(),
            count,
            dest,
            queued_dests: queued.to_vec(),
            dest_space,
            bundling: self.config.bundling_enabled,
        })
    }

    /// First item of `region`, nearest to the worker, that yields a plan.
    pub fn propose_any<W>(
        &self,
        world: &W,
        state: &LogisticsState,
        region: RegionId,
        worker: WorkerId,
        deliveries: &[JobSummary],
        rng: &mut dyn RngCore,
    ) -> Option<DeliveryPlan>
    where
        W: Grid + Items + ClaimLedger + Reachability + Workforce + ?Sized,
    {
        let origin = world.position(worker)?;
        let mut candidates: Vec<(u32, ItemId)> = self
            .potential_work(state, region)
            .into_iter()
            .filter_map(|id| {
                let cell = world.item(id)?.cell()?;
                Some((cell.manhattan(origin), id))
            })
            .collect();
        candidates.sort();
        candidates.into_iter().find_map(|(_, id)| {
            let posting = state.posting_owning(region, id)?;
            self.propose(world, posting, worker, id, deliveries, rng)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haulx_core::{DefId, JobId, Point};
    use haulx_sim::SimWorld;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn steel() -> MixType {
        MixType::new(DefId::new(1))
    }

    fn setup(units: u32, capacity: u32) -> (SimWorld, LogisticsState, ItemId, WorkerId) {
        let mut world = SimWorld::new(10, 10);
        let item = world.spawn_item(steel(), units, 75, Cell::new(8, 8));
        let worker = world.add_worker(Cell::new(7, 8), capacity);
        let mut state = LogisticsState::default();
        let selected = vec![world.item(item).unwrap()];
        let mut posting = state.create_posting(RegionId::new(0), &selected);
        assert!(posting.try_make_destinations(&world, Point::new(1.5, 1.5), true, state.config()));
        assert!(state.register_posting(posting, &mut world));
        (world, state, item, worker)
    }

    #[test]
    fn plan_is_bounded_by_worker_capacity() {
        let (world, state, item, worker) = setup(60, 25);
        let posting = state.posting_owning(RegionId::new(0), item).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let plan = WorkProposer::default()
            .propose(&world, posting, worker, item, &[], &mut rng)
            .unwrap();
        assert_eq!(plan.count, 25);
        assert_eq!(plan.dest, posting.destinations().unwrap()[0]);
        assert!(plan.queued_dests.is_empty());
        assert_eq!(plan.dest_space, 75);
    }

    #[test]
    fn in_flight_units_reduce_the_offer() {
        let (world, state, item, worker) = setup(60, 75);
        let posting = state.posting_owning(RegionId::new(0), item).unwrap();
        let busy = vec![JobSummary {
            worker: WorkerId::new(99),
            job: JobId::new(),
            posting: posting.id_typed(),
            mix: steel(),
            item,
            count: 50,
            dest: None,
            queued_dests: vec![],
            current: true,
        }];
        let mut rng = StdRng::seed_from_u64(3);
        let plan = WorkProposer::default()
            .propose(&world, posting, worker, item, &busy, &mut rng)
            .unwrap();
        assert_eq!(plan.count, 10);
    }

    #[test]
    fn claimed_or_bill_bound_items_are_not_offered() {
        let (mut world, state, item, worker) = setup(60, 75);
        world.claim(WorkerId::new(42), ClaimTarget::Item(item), JobId::new());
        let posting = state.posting_owning(RegionId::new(0), item).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        assert!(WorkProposer::default()
            .propose(&world, posting, worker, item, &[], &mut rng)
            .is_none());

        let mut bound = world.item(item).unwrap();
        bound.bound_to_bill = true;
        assert!(!can_get_item(&world, worker, &bound, &LogisticsConfig::default()));
    }

    #[test]
    fn nothing_is_offered_once_the_record_is_covered() {
        let (world, mut state, item, worker) = setup(60, 75);
        let pid = state.posting_owning(RegionId::new(0), item).unwrap().id_typed();
        state
            .set_quantity_to_move(RegionId::new(0), pid, &steel(), 0)
            .unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let proposer = WorkProposer::default();
        assert!(!proposer.should_skip(&state, RegionId::new(0)));
        assert!(proposer
            .propose_any(&world, &state, RegionId::new(0), worker, &[], &mut rng)
            .is_none());
    }

    #[test]
    fn propose_any_picks_a_plan_in_region() {
        let (world, state, item, worker) = setup(60, 75);
        let mut rng = StdRng::seed_from_u64(3);
        let plan = WorkProposer::default()
            .propose_any(&world, &state, RegionId::new(0), worker, &[], &mut rng)
            .unwrap();
        assert_eq!(plan.item, item);
        assert!(WorkProposer::default().should_skip(&state, RegionId::new(4)));
    }
}
