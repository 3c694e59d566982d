//! Jobs held by every worker.
//!
//! Each worker runs the job at the front of its queue; jobs behind it are
//! already claimed and count against their records as queued work.

use std::collections::{BTreeMap, VecDeque};

use rand::RngCore;
use serde::{Deserialize, Serialize};

use haulx_core::{HostWorld, ItemId, JobId, JobSummary, LogisticsResult, RegionId, WorkerId};
use haulx_postings::LogisticsState;

use crate::job::{DeliveryJob, Tick};
use crate::proposer::{DeliveryPlan, WorkProposer};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeliveryRoster {
    jobs: BTreeMap<WorkerId, VecDeque<DeliveryJob>>,
    #[serde(skip)]
    proposer: WorkProposer,
}

impl DeliveryRoster {
    pub fn new(proposer: WorkProposer) -> Self {
        Self {
            jobs: BTreeMap::new(),
            proposer,
        }
    }

    pub fn proposer(&self) -> &WorkProposer {
        &self.proposer
    }

    pub fn set_proposer(&mut self, proposer: WorkProposer) {
        self.proposer = proposer;
    }

    pub fn current(&self, worker: WorkerId) -> Option<&DeliveryJob> {
        self.jobs.get(&worker).and_then(|q| q.front())
    }

    pub fn jobs_of(&self, worker: WorkerId) -> impl Iterator<Item = &DeliveryJob> {
        self.jobs.get(&worker).into_iter().flatten()
    }

    pub fn is_idle(&self, worker: WorkerId) -> bool {
        self.jobs.get(&worker).is_none_or(|q| q.is_empty())
    }

    pub fn len(&self) -> usize {
        self.jobs.values().map(|q| q.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every job, current and queued, as other workers see it.
    pub fn summaries(&self) -> Vec<JobSummary> {
        self.jobs
            .values()
            .flat_map(|q| q.iter().enumerate().map(|(i, j)| j.summary(i == 0)))
            .collect()
    }

    /// Claim `plan`'s targets and queue it behind the worker's other jobs.
    pub fn assign<W: HostWorld + ?Sized>(
        &mut self,
        world: &mut W,
        worker: WorkerId,
        plan: DeliveryPlan,
    ) -> LogisticsResult<JobId> {
        let job = DeliveryJob::from_plan(worker, plan);
        job.start(world)?;
        let id = job.id();
        tracing::debug!(job = %id, worker = %worker, item = %job.item(), count = job.count(), "delivery assigned");
        self.jobs.entry(worker).or_default().push_back(job);
        Ok(id)
    }

    /// Offer an idle worker the nearest useful delivery in `region`.
    pub fn try_assign_work<W: HostWorld + ?Sized>(
        &mut self,
        world: &mut W,
        state: &LogisticsState,
        region: RegionId,
        worker: WorkerId,
        rng: &mut dyn RngCore,
    ) -> Option<JobId> {
        if !self.is_idle(worker) || self.proposer.should_skip(state, region) {
            return None;
        }
        let deliveries = self.summaries();
        let plan = self
            .proposer
            .propose_any(&*world, state, region, worker, &deliveries, rng)?;
        match self.assign(world, worker, plan) {
            Ok(id) => Some(id),
            Err(err) => {
                tracing::debug!(worker = %worker, error = %err, "proposed delivery not started");
                None
            }
        }
    }

    /// Advance every worker's current job once. Finished jobs leave the
    /// queue.
    pub fn step<W: HostWorld + ?Sized>(
        &mut self,
        world: &mut W,
        state: &mut LogisticsState,
        rng: &mut dyn RngCore,
    ) -> Vec<(WorkerId, Tick)> {
        let workers: Vec<WorkerId> = self.jobs.keys().copied().collect();
        let mut ticks = Vec::with_capacity(workers.len());
        for worker in workers {
            let deliveries = self.summaries();
            let Some(job) = self.jobs.get_mut(&worker).and_then(|q| q.front_mut()) else {
                continue;
            };
            let tick = job.advance(world, state, &deliveries, rng);
            if matches!(tick, Tick::Finished(_)) {
                self.pop_front(worker);
            }
            ticks.push((worker, tick));
        }
        self.jobs.retain(|_, q| !q.is_empty());
        ticks
    }

    fn pop_front(&mut self, worker: WorkerId) {
        if let Some(q) = self.jobs.get_mut(&worker) {
            q.pop_front();
        }
    }

    /// Cancel the listed jobs wherever they sit in their queues.
    pub fn cancel_jobs<W: HostWorld + ?Sized>(&mut self, world: &mut W, ids: &[JobId]) -> usize {
        let mut cancelled = 0;
        for queue in self.jobs.values_mut() {
            queue.retain_mut(|job| {
                if !ids.contains(&job.id()) {
                    return true;
                }
                job.cancel(world);
                cancelled += 1;
                false
            });
        }
        self.jobs.retain(|_, q| !q.is_empty());
        cancelled
    }

    /// Drop every job the worker holds.
    pub fn cancel_worker<W: HostWorld + ?Sized>(&mut self, world: &mut W, worker: WorkerId) {
        for mut job in self.jobs.remove(&worker).into_iter().flatten() {
            job.cancel(world);
        }
    }

    /// Take `item` out of its order and end the jobs working on it.
    pub fn cancel_item<W: HostWorld + ?Sized>(
        &mut self,
        world: &mut W,
        state: &mut LogisticsState,
        region: RegionId,
        item: ItemId,
    ) -> usize {
        let deliveries = self.summaries();
        let affected = state.cancel_item(region, item, &*world, &deliveries);
        self.cancel_jobs(world, &affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haulx_core::{Cell, ClaimLedger, DefId, Items, ItemState, MixType, Point};
    use haulx_sim::SimWorld;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn steel() -> MixType {
        MixType::new(DefId::new(1))
    }

    fn setup() -> (SimWorld, LogisticsState, Vec<ItemId>) {
        let mut world = SimWorld::new(16, 4);
        let items = vec![
            world.spawn_item(steel(), 75, 75, Cell::new(14, 1)),
            world.spawn_item(steel(), 75, 75, Cell::new(14, 2)),
        ];
        let mut state = LogisticsState::default();
        let selected: Vec<ItemState> = items.iter().filter_map(|i| world.item(*i)).collect();
        let mut posting = state.create_posting(RegionId::new(0), &selected);
        assert!(posting.try_make_destinations(&world, Point::new(1.5, 1.5), true, state.config()));
        assert!(state.register_posting(posting, &mut world));
        (world, state, items)
    }

    #[test]
    fn two_workers_split_the_order() {
        let (mut world, state, _) = setup();
        let a = world.add_worker(Cell::new(13, 1), 75);
        let b = world.add_worker(Cell::new(13, 2), 75);
        let mut roster = DeliveryRoster::default();
        let mut rng = StdRng::seed_from_u64(5);

        let ja = roster.try_assign_work(&mut world, &state, RegionId::new(0), a, &mut rng);
        let jb = roster.try_assign_work(&mut world, &state, RegionId::new(0), b, &mut rng);
        assert!(ja.is_some() && jb.is_some());
        let da = roster.current(a).unwrap().dest();
        let db = roster.current(b).unwrap().dest();
        assert_ne!(da, db);
        assert_ne!(roster.current(a).unwrap().item(), roster.current(b).unwrap().item());
        assert_eq!(roster.summaries().len(), 2);

        // Busy workers are not offered more.
        assert!(roster.try_assign_work(&mut world, &state, RegionId::new(0), a, &mut rng).is_none());
    }

    #[test]
    fn cancel_worker_releases_everything() {
        let (mut world, state, _) = setup();
        let a = world.add_worker(Cell::new(13, 1), 75);
        let mut roster = DeliveryRoster::default();
        let mut rng = StdRng::seed_from_u64(5);
        roster
            .try_assign_work(&mut world, &state, RegionId::new(0), a, &mut rng)
            .unwrap();
        roster.cancel_worker(&mut world, a);
        assert!(roster.is_idle(a));
        assert!(world.claims_of(a).is_empty());
    }

    #[test]
    fn cancel_item_ends_the_job_on_it() {
        let (mut world, mut state, _) = setup();
        let a = world.add_worker(Cell::new(13, 1), 75);
        let mut roster = DeliveryRoster::default();
        let mut rng = StdRng::seed_from_u64(5);
        roster
            .try_assign_work(&mut world, &state, RegionId::new(0), a, &mut rng)
            .unwrap();
        let item = roster.current(a).unwrap().item();

        assert_eq!(roster.cancel_item(&mut world, &mut state, RegionId::new(0), item), 1);
        assert!(roster.is_empty());
        assert!(!state.is_part_of_active_order(item));
        assert_eq!(world.claimant(haulx_core::ClaimTarget::Item(item)), None);
    }

    #[test]
    fn step_runs_jobs_to_completion() {
        let (mut world, mut state, _) = setup();
        let a = world.add_worker(Cell::new(13, 1), 75);
        let mut roster = DeliveryRoster::default();
        let mut rng = StdRng::seed_from_u64(5);

        let mut finished = 0;
        for _ in 0..200 {
            if roster.is_idle(a) {
                if roster
                    .try_assign_work(&mut world, &state, RegionId::new(0), a, &mut rng)
                    .is_none()
                {
                    break;
                }
            }
            for (worker, tick) in roster.step(&mut world, &mut state, &mut rng) {
                match tick {
                    Tick::MoveTo(cell) => world.move_worker(worker, cell),
                    Tick::Finished(_) => finished += 1,
                    Tick::Continue => {}
                }
            }
        }
        assert_eq!(finished, 2);
        let posting = state.registry(RegionId::new(0)).unwrap().postings().next().unwrap();
        assert!(posting.records()[0].is_satisfied());
        assert_eq!(posting.records()[0].moved_quantity(), 150);
    }

    #[test]
    fn roster_round_trips_through_json() {
        let (mut world, state, _) = setup();
        let a = world.add_worker(Cell::new(13, 1), 75);
        let mut roster = DeliveryRoster::default();
        let mut rng = StdRng::seed_from_u64(5);
        roster
            .try_assign_work(&mut world, &state, RegionId::new(0), a, &mut rng)
            .unwrap();
        let json = serde_json::to_string(&roster).unwrap();
        let back: DeliveryRoster = serde_json::from_str(&json).unwrap();
        assert_eq!(back.summaries(), roster.summaries());
    }
}
