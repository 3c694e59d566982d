//! Per-worker delivery state machine.
//!
//! The host's scheduler calls [`DeliveryJob::advance`] once per opportunity.
//! Each call checks the fail conditions, runs one state's action and reports
//! what the worker should do next. Between calls only the state tag and the
//! job's targets are kept, so a job can be persisted at any suspension point.

use std::collections::VecDeque;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use haulx_core::host::storable_items_if_valid;
use haulx_core::{
    Cell, ClaimTarget, HostWorld, ItemId, ItemState, JobId, JobSummary, LogisticsConfig,
    LogisticsError, LogisticsResult, MixType, PostingId, RegionId, WorkerId,
};
use haulx_inventory::RemovalReason;
use haulx_postings::{LogisticsState, Posting, is_haulable_set_to_haulable};

use crate::proposer::{DeliveryPlan, amount_worker_wants, can_get_item};
use crate::view::DestinationView;

/// Why a job gave up.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncompleteReason {
    /// The target item was destroyed or vanished.
    TargetGone,
    DestinationOnFire,
    /// The destination cannot take the item any more.
    DestinationBlocked,
    ClaimLost,
    /// The item left the order or was forbidden.
    HaulabilityRevoked,
    PostingGone,
    /// Nothing could be picked up.
    NothingToCarry,
    Cancelled,
    /// The carried stack had nowhere to go and was destroyed.
    LastResort,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum JobState {
    Init,
    GotoItem,
    PickUp,
    CarryToDestination,
    PlaceAtDestination,
    Done,
    Incompletable(IncompleteReason),
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Incompletable(_))
    }

    /// The worker already holds the job's item.
    fn is_carrying(self) -> bool {
        matches!(
            self,
            JobState::CarryToDestination | JobState::PlaceAtDestination
        )
    }
}

/// What the worker should do after one [`DeliveryJob::advance`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Tick {
    /// Walk next to this cell, then advance again.
    MoveTo(Cell),
    /// Advance again on the next opportunity.
    Continue,
    /// The job reached a terminal state.
    Finished(JobState),
}

/// One explicit delivery by one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryJob {
    id: JobId,
    worker: WorkerId,
    region: RegionId,
    posting: PostingId,
    mix: MixType,
    /// Item to pick up next; after the last pickup, the carried stack.
    item: ItemId,
    dest: Cell,
    queued_dests: VecDeque<Cell>,
    /// Units this job still intends to deliver.
    count: u32,
    /// Units the claimed destination cells could take when claimed.
    dest_space: u32,
    bundling: bool,
    carried: Option<ItemId>,
    /// Items whose haul toggle this job flipped.
    toggled: Vec<ItemId>,
    state: JobState,
}

impl DeliveryJob {
    pub fn from_plan(worker: WorkerId, plan: DeliveryPlan) -> Self {
        Self {
            id: JobId::new(),
            worker,
            region: plan.region,
            posting: plan.posting,
            mix: plan.mix,
            item: plan.item,
            dest: plan.dest,
            queued_dests: plan.queued_dests.into(),
            count: plan.count,
            dest_space: plan.dest_space,
            bundling: plan.bundling,
            carried: None,
            toggled: Vec::new(),
            state: JobState::Init,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    pub fn posting(&self) -> PostingId {
        self.posting
    }

    pub fn item(&self) -> ItemId {
        self.item
    }

    pub fn dest(&self) -> Cell {
        self.dest
    }

    pub fn queued_dests(&self) -> impl Iterator<Item = Cell> + '_ {
        self.queued_dests.iter().copied()
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn summary(&self, current: bool) -> JobSummary {
        JobSummary {
            worker: self.worker,
            job: self.id,
            posting: self.posting,
            mix: self.mix,
            item: self.item,
            count: self.count,
            dest: Some(self.dest),
            queued_dests: self.queued_dests.iter().copied().collect(),
            current,
        }
    }

    fn targets(&self) -> Vec<ClaimTarget> {
        let mut targets = vec![ClaimTarget::Item(self.item), ClaimTarget::Cell(self.dest)];
        targets.extend(self.queued_dests.iter().map(|c| ClaimTarget::Cell(*c)));
        targets
    }

    /// Claim the item and every destination cell, all or nothing.
    pub fn start<W: HostWorld + ?Sized>(&self, world: &mut W) -> LogisticsResult<()> {
        claim_all(world, self.worker, self.id, &self.targets())
    }

    /// Run one step. Terminal states release the job's claims.
    pub fn advance<W: HostWorld + ?Sized>(
        &mut self,
        world: &mut W,
        state: &mut LogisticsState,
        deliveries: &[JobSummary],
        rng: &mut dyn RngCore,
    ) -> Tick {
        if self.state.is_terminal() {
            return Tick::Finished(self.state);
        }
        if let Some(reason) = self.fail_condition(world, state) {
            return self.fail(world, reason);
        }

        let tick = match self.state {
            JobState::Init => self.init(world, state),
            JobState::GotoItem => self.goto_item(world),
            JobState::PickUp => self.pick_up(world, state, deliveries, rng),
            JobState::CarryToDestination => self.carry(world),
            JobState::PlaceAtDestination => self.place(world, state),
            JobState::Done | JobState::Incompletable(_) => Tick::Finished(self.state),
        };
        if let Tick::Finished(end) = tick {
            world.release_all(self.worker, self.id);
            tracing::debug!(job = %self.id, worker = %self.worker, state = ?end, "delivery finished");
        }
        tick
    }

    /// End the job from outside (player cancel, worker reassigned).
    ///
    /// Claims are released and haul toggles this job flipped are restored. A
    /// carried stack is set down nearby and stays in its order; when nothing
    /// nearby takes it, it is destroyed.
    pub fn cancel<W: HostWorld + ?Sized>(&mut self, world: &mut W) {
        if self.state.is_terminal() {
            return;
        }
        self.unwind(world);
        self.state = JobState::Incompletable(IncompleteReason::Cancelled);
        tracing::info!(job = %self.id, worker = %self.worker, "delivery cancelled");
    }

    fn fail<W: HostWorld + ?Sized>(&mut self, world: &mut W, reason: IncompleteReason) -> Tick {
        self.unwind(world);
        self.state = JobState::Incompletable(reason);
        tracing::info!(
            job = %self.id,
            worker = %self.worker,
            posting = %self.posting,
            reason = ?reason,
            "delivery failed"
        );
        Tick::Finished(self.state)
    }

    fn unwind<W: HostWorld + ?Sized>(&mut self, world: &mut W) {
        for item in self.toggled.drain(..) {
            if !world.is_gone(item) {
                world.toggle_haul(item);
            }
        }
        if let Some(carried) = self.carried.take().and(world.carried(self.worker)) {
            if !world.place_nearby(self.worker) {
                let err = LogisticsError::last_resort(format!(
                    "worker {} could not set down {carried} after job {}",
                    self.worker, self.id
                ));
                tracing::error!(job = %self.id, error = %err, "destroying carried stack");
                world.destroy_carried(self.worker);
            }
        }
        world.release_all(self.worker, self.id);
    }

    /// Conditions checked before every action.
    fn fail_condition<W: HostWorld + ?Sized>(
        &self,
        world: &W,
        state: &LogisticsState,
    ) -> Option<IncompleteReason> {
        let posting = state.posting(self.region, self.posting);
        if posting.is_none() {
            return Some(IncompleteReason::PostingGone);
        }
        if world.on_fire(self.dest) {
            return Some(IncompleteReason::DestinationOnFire);
        }
        if world.claimant(ClaimTarget::Cell(self.dest)) != Some(self.worker) {
            return Some(IncompleteReason::ClaimLost);
        }
        if self.state.is_carrying() {
            return None;
        }

        let Some(item) = world.item(self.item).filter(|i| !i.destroyed) else {
            return Some(IncompleteReason::TargetGone);
        };
        if item.burning {
            return Some(IncompleteReason::TargetGone);
        }
        if item.forbidden || posting.is_some_and(|p| !p.has_item(self.item)) {
            return Some(IncompleteReason::HaulabilityRevoked);
        }
        if world.claimant(ClaimTarget::Item(self.item)) != Some(self.worker) {
            return Some(IncompleteReason::ClaimLost);
        }
        None
    }

    fn init<W: HostWorld + ?Sized>(&mut self, world: &mut W, state: &LogisticsState) -> Tick {
        let bound = state
            .posting(self.region, self.posting)
            .and_then(|p| p.record_with_item(self.item))
            .is_some_and(|r| *r.mix() == self.mix);
        if !bound {
            return self.fail(world, IncompleteReason::PostingGone);
        }
        self.state = JobState::GotoItem;
        Tick::Continue
    }

    fn goto_item<W: HostWorld + ?Sized>(&mut self, world: &mut W) -> Tick {
        let Some(item) = world.item(self.item) else {
            return self.fail(world, IncompleteReason::TargetGone);
        };
        if !destination_accepts(world, self.dest, &item) {
            return self.fail(world, IncompleteReason::DestinationBlocked);
        }
        let Some(at) = item.cell() else {
            return self.fail(world, IncompleteReason::TargetGone);
        };
        if world.is_adjacent(self.worker, at) {
            self.state = JobState::PickUp;
            Tick::Continue
        } else {
            Tick::MoveTo(at)
        }
    }

    fn pick_up<W: HostWorld + ?Sized>(
        &mut self,
        world: &mut W,
        state: &mut LogisticsState,
        deliveries: &[JobSummary],
        rng: &mut dyn RngCore,
    ) -> Tick {
        let Some(target) = world.item(self.item) else {
            return self.fail(world, IncompleteReason::TargetGone);
        };
        let Some(at) = target.cell() else {
            return self.fail(world, IncompleteReason::TargetGone);
        };
        if !world.is_adjacent(self.worker, at) {
            self.state = JobState::GotoItem;
            return Tick::MoveTo(at);
        }

        let carrying = self
            .carried
            .and_then(|c| world.item(c))
            .map(|c| c.stack_count)
            .unwrap_or(0);
        let wanted = self
            .count
            .saturating_sub(carrying)
            .min(world.available_stack_space(self.worker, &target.mix, target.stack_limit))
            .min(target.stack_count);
        if wanted == 0 {
            if self.carried.is_some() {
                self.state = JobState::CarryToDestination;
                return Tick::Continue;
            }
            return self.fail(world, IncompleteReason::NothingToCarry);
        }

        let Some((carried, taken)) = world.start_carry(self.worker, target.id, wanted) else {
            return self.fail(world, IncompleteReason::NothingToCarry);
        };
        if taken < target.stack_count {
            world.release(self.worker, ClaimTarget::Item(target.id), self.id);
        }
        tracing::debug!(job = %self.id, item = %target.id, carried = %carried, taken, "picked up");

        if let Some(carried_state) = world.item(carried) {
            if is_haulable_set_to_haulable(&*world, &carried_state) {
                world.toggle_haul(carried);
                self.toggled.push(carried);
            }
            if let Some(posting) = state.posting_mut(self.region, self.posting) {
                posting.try_add_item_splinter(&carried_state);
                if carried != target.id && world.is_gone(target.id) {
                    posting.try_remove_item(target.id, RemovalReason::Absorbed);
                }
            }
        }
        self.carried = Some(carried);
        self.item = carried;

        let config = state.config().clone();
        if self.bundling && config.bundling_enabled && self.try_bundle(world, state, deliveries, &config, rng) {
            self.state = JobState::GotoItem;
            return Tick::Continue;
        }
        self.state = JobState::CarryToDestination;
        Tick::Continue
    }

    /// Fold the nearest reachable same-record item within the bundling radius
    /// into this job, claiming extra destination cells if needed.
    fn try_bundle<W: HostWorld + ?Sized>(
        &mut self,
        world: &mut W,
        state: &LogisticsState,
        deliveries: &[JobSummary],
        config: &LogisticsConfig,
        rng: &mut dyn RngCore,
    ) -> bool {
        let Some(posting) = state.posting(self.region, self.posting) else {
            return false;
        };
        let Some(origin) = world.position(self.worker) else {
            return false;
        };
        let Some(prospect) = nearest_bundle_candidate(&*world, posting, self, origin, config) else {
            return false;
        };
        let Some(record) = posting.record_for_mix(&self.mix) else {
            return false;
        };

        let wanted = amount_worker_wants(&*world, self.worker, &prospect, record, deliveries);
        if wanted == 0 {
            return false;
        }
        let Ok(view) =
            DestinationView::build(&*world, posting, &prospect, self.worker, deliveries, config)
        else {
            return false;
        };
        let spare = self.dest_space.saturating_sub(self.count);
        let extra_dests = view.request_space_for_amount(wanted.saturating_sub(spare), rng);
        let Ok(extra_space) = view.free_space_in_cells(&extra_dests) else {
            return false;
        };
        let extra = wanted.min(spare + extra_space);
        if extra == 0 {
            return false;
        }

        let mut targets = vec![ClaimTarget::Item(prospect.id)];
        targets.extend(extra_dests.iter().map(|c| ClaimTarget::Cell(*c)));
        if let Err(err) = claim_all(world, self.worker, self.id, &targets) {
            tracing::debug!(job = %self.id, error = %err, "bundling skipped");
            return false;
        }

        tracing::debug!(
            job = %self.id,
            item = %prospect.id,
            extra,
            cells = extra_dests.len(),
            "bundled a second item into delivery"
        );
        self.item = prospect.id;
        self.queued_dests.extend(extra_dests);
        self.count += extra;
        self.dest_space += extra_space;
        true
    }

    fn carry<W: HostWorld + ?Sized>(&mut self, world: &mut W) -> Tick {
        if world.is_adjacent(self.worker, self.dest) {
            self.state = JobState::PlaceAtDestination;
            Tick::Continue
        } else {
            Tick::MoveTo(self.dest)
        }
    }

    fn place<W: HostWorld + ?Sized>(&mut self, world: &mut W, state: &mut LogisticsState) -> Tick {
        let Some(carried) = world.carried(self.worker) else {
            tracing::error!(job = %self.id, worker = %self.worker, "placing but carrying nothing");
            return self.fail(world, IncompleteReason::NothingToCarry);
        };
        let before = world.item(carried).map(|i| i.stack_count).unwrap_or(0);
        let outcome = world.drop_carried(self.worker, self.dest);
        let mut posting = state.posting_mut(self.region, self.posting);

        if outcome.complete {
            self.count = 0;
            if let Some(posting) = posting {
                posting.record_moved(&self.mix, before);
                posting.try_remove_item(carried, RemovalReason::Delivered);
            }
            self.carried = None;
            self.state = JobState::Done;
            return Tick::Finished(self.state);
        }

        self.count = self.count.saturating_sub(outcome.placed);
        if let Some(p) = &mut posting {
            p.record_moved(&self.mix, outcome.placed);
        }
        if let Some(next) = self.queued_dests.pop_front() {
            self.dest = next;
            self.state = JobState::CarryToDestination;
            return Tick::Continue;
        }

        self.count = 0;
        if world.place_nearby(self.worker) {
            tracing::info!(job = %self.id, item = %carried, "destinations full, set the rest down nearby");
            self.carried = None;
            self.state = JobState::Done;
            return Tick::Finished(self.state);
        }

        let err = LogisticsError::last_resort(format!(
            "worker {} could not put down {carried} near {}",
            self.worker, self.dest
        ));
        tracing::error!(job = %self.id, error = %err, "destroying carried stack");
        world.destroy_carried(self.worker);
        if let Some(posting) = posting {
            posting.try_remove_item(carried, RemovalReason::Destroyed);
        }
        self.carried = None;
        self.state = JobState::Incompletable(IncompleteReason::LastResort);
        Tick::Finished(self.state)
    }
}

fn claim_all<W: HostWorld + ?Sized>(
    world: &mut W,
    worker: WorkerId,
    job: JobId,
    targets: &[ClaimTarget],
) -> LogisticsResult<()> {
    let mut taken = Vec::with_capacity(targets.len());
    for target in targets {
        let already = world.claimant(*target) == Some(worker);
        if !world.claim(worker, *target, job) {
            for t in taken {
                world.release(worker, t, job);
            }
            return Err(LogisticsError::contention(format!("{target:?} is claimed")));
        }
        if !already {
            taken.push(*target);
        }
    }
    Ok(())
}

/// The destination still takes `item`: valid, and empty or holding one
/// compatible stack.
fn destination_accepts<W: HostWorld + ?Sized>(world: &W, dest: Cell, item: &ItemState) -> bool {
    match storable_items_if_valid(world, dest) {
        None => false,
        Some(items) => match items.as_slice() {
            [] => true,
            [single] => single.mix.can_mix_with(&item.mix),
            _ => false,
        },
    }
}

fn nearest_bundle_candidate<W: HostWorld + ?Sized>(
    world: &W,
    posting: &Posting,
    job: &DeliveryJob,
    origin: Cell,
    config: &LogisticsConfig,
) -> Option<ItemState> {
    let record = posting.record_for_mix(&job.mix)?;
    let mut best: Option<(u32, ItemState)> = None;
    for id in record.items() {
        let Some(item) = world.item(*id) else {
            continue;
        };
        let Some(at) = item.cell() else {
            continue;
        };
        if !item.is_spawned() || !can_get_item(world, job.worker, &item, config) {
            continue;
        }
        let distance = at.manhattan(origin);
        if distance < config.bundling_radius && best.as_ref().is_none_or(|(d, _)| distance < *d) {
            best = Some((distance, item));
        }
    }
    best.map(|(_, item)| item)
}
