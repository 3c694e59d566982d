use std::collections::{BTreeMap, BTreeSet};

use haulx_core::{
    AggregateRoot, Haulability, ItemId, ItemState, Items, JobId, JobSummary, LogisticsConfig,
    LogisticsError, LogisticsResult, MixType, MixTypeRegistry, PostingId, RegionId, ZoneId,
};
use haulx_inventory::RemovalReason;

use crate::posting::Posting;
use crate::registry::PostingRegistry;
use crate::snapshot::{LogisticsSnapshot, RegionSnapshot};

/// Top-level logistics state, created at world load and handed to every
/// operation by reference.
///
/// Holds one [`PostingRegistry`] per region, the retaining-zone set and the
/// posting id counter.
#[derive(Debug, Clone)]
pub struct LogisticsState {
    config: LogisticsConfig,
    regions: BTreeMap<RegionId, PostingRegistry>,
    mix_types: MixTypeRegistry,
    retaining_zones: BTreeSet<ZoneId>,
    next_posting_id: u64,
}

impl LogisticsState {
    pub fn new(config: LogisticsConfig) -> Self {
        Self {
            config,
            regions: BTreeMap::new(),
            mix_types: MixTypeRegistry::new(),
            retaining_zones: BTreeSet::new(),
            next_posting_id: 0,
        }
    }

    pub fn config(&self) -> &LogisticsConfig {
        &self.config
    }

    pub fn mix_types(&self) -> &MixTypeRegistry {
        &self.mix_types
    }

    pub fn registry(&self, region: RegionId) -> Option<&PostingRegistry> {
        self.regions.get(&region)
    }

    pub fn registry_mut(&mut self, region: RegionId) -> Option<&mut PostingRegistry> {
        self.regions.get_mut(&region)
    }

    /// The region's registry, created empty on first use.
    pub fn registry_or_create(&mut self, region: RegionId) -> &mut PostingRegistry {
        self.regions
            .entry(region)
            .or_insert_with(|| PostingRegistry::new(region))
    }

    pub fn regions(&self) -> impl Iterator<Item = RegionId> + '_ {
        self.regions.keys().copied()
    }

    /// Drop a region's registry along with every posting in it.
    pub fn remove_region(&mut self, region: RegionId) -> Option<PostingRegistry> {
        let removed = self.regions.remove(&region);
        if let Some(r) = &removed {
            tracing::info!(region = %region, postings = r.len(), "region registry removed");
        }
        removed
    }

    fn issue_posting_id(&mut self) -> PostingId {
        let id = PostingId::new(self.next_posting_id);
        self.next_posting_id += 1;
        id
    }

    /// Build an unregistered posting from the operator's selection.
    pub fn create_posting(&mut self, region: RegionId, selected: &[ItemState]) -> Posting {
        for item in selected {
            self.mix_types.intern(item.mix);
        }
        let id = self.issue_posting_id();
        let posting = Posting::new(id, region, selected);
        tracing::debug!(
            posting = %id,
            region = %region,
            items = posting.items().len(),
            "posting created"
        );
        posting
    }

    /// Register `posting` in its region. Bookkeeping violations are logged and
    /// the registry is left untouched.
    pub fn register_posting<W>(&mut self, posting: Posting, world: &mut W) -> bool
    where
        W: Items + Haulability + ?Sized,
    {
        let id = *posting.id();
        let region = posting.region();
        match self.registry_or_create(region).register(posting, world) {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(posting = %id, region = %region, error = %err, "posting registration refused");
                false
            }
        }
    }

    pub fn posting_owning(&self, region: RegionId, item: ItemId) -> Option<&Posting> {
        self.regions.get(&region)?.posting_with_item(item)
    }

    pub fn posting_owning_mut(&mut self, region: RegionId, item: ItemId) -> Option<&mut Posting> {
        self.regions.get_mut(&region)?.posting_with_item_mut(item)
    }

    pub fn posting(&self, region: RegionId, id: PostingId) -> Option<&Posting> {
        self.regions.get(&region)?.get(id)
    }

    pub fn posting_mut(&mut self, region: RegionId, id: PostingId) -> Option<&mut Posting> {
        self.regions.get_mut(&region)?.get_mut(id)
    }

    /// Whether generic hauling must leave `item` alone.
    pub fn is_part_of_active_order(&self, item: ItemId) -> bool {
        self.regions
            .values()
            .any(|r| r.posting_with_item(item).is_some())
    }

    /// Candidate items for explicit hauling in `region`.
    pub fn haulables(&self, region: RegionId) -> Vec<ItemId> {
        self.regions
            .get(&region)
            .map(|r| r.haulables().collect())
            .unwrap_or_default()
    }

    /// Drop registries of regions that no longer exist, then collect garbage
    /// in the survivors. Returns the collected posting ids.
    pub fn clean_garbage<W: Items + ?Sized>(
        &mut self,
        region_exists: impl Fn(RegionId) -> bool,
        world: &W,
        deliveries: &[JobSummary],
    ) -> Vec<PostingId> {
        let dead: Vec<RegionId> = self
            .regions
            .keys()
            .copied()
            .filter(|r| !region_exists(*r))
            .collect();
        for region in dead {
            self.remove_region(region);
        }
        self.regions
            .values_mut()
            .flat_map(|r| r.clean_garbage(world, deliveries))
            .collect()
    }

    /// Player override of a record's target quantity.
    pub fn set_quantity_to_move(
        &mut self,
        region: RegionId,
        posting: PostingId,
        mix: &MixType,
        value: i64,
    ) -> LogisticsResult<()> {
        self.posting_mut(region, posting)
            .ok_or_else(LogisticsError::not_found)?
            .set_quantity_to_move(mix, value)
    }

    /// Take `item` out of its order at the player's request.
    ///
    /// Returns the jobs currently targeting the item; the caller ends them.
    pub fn cancel_item<W: Items + ?Sized>(
        &mut self,
        region: RegionId,
        item: ItemId,
        world: &W,
        deliveries: &[JobSummary],
    ) -> Vec<JobId> {
        let stack_count = world.item(item).map(|i| i.stack_count).unwrap_or(0);
        let removed = self
            .posting_owning_mut(region, item)
            .is_some_and(|p| p.try_remove_item(item, RemovalReason::PlayerCancelled { stack_count }));
        if removed {
            tracing::info!(item = %item, region = %region, "item cancelled from order");
        }
        deliveries
            .iter()
            .filter(|j| j.item == item)
            .map(|j| j.job)
            .collect()
    }

    /// Every live on-ground item of the order owning `item`.
    pub fn select_all_candidates<W: Items + ?Sized>(
        &self,
        region: RegionId,
        item: ItemId,
        world: &W,
    ) -> Vec<ItemId> {
        self.posting_owning(region, item)
            .map(|p| p.spawned_items(world))
            .unwrap_or_default()
    }

    pub fn set_retaining(&mut self, zone: ZoneId, retaining: bool) {
        if retaining {
            self.retaining_zones.insert(zone);
        } else {
            self.retaining_zones.remove(&zone);
        }
    }

    pub fn is_retaining(&self, zone: ZoneId) -> bool {
        self.retaining_zones.contains(&zone)
    }

    /// Forget retaining flags of zones that no longer exist.
    pub fn prune_retaining_zones(&mut self, zone_exists: impl Fn(ZoneId) -> bool) {
        self.retaining_zones.retain(|z| zone_exists(*z));
    }

    pub fn snapshot(&self) -> LogisticsSnapshot {
        let mut mix_types = self.mix_types.clone();
        let regions = self
            .regions
            .values()
            .map(|r| RegionSnapshot {
                region: r.region(),
                postings: r.postings().map(|p| p.to_state(&mut mix_types)).collect(),
            })
            .collect();
        LogisticsSnapshot {
            mix_types,
            regions,
            retaining_zones: self.retaining_zones.iter().copied().collect(),
            next_posting_id: self.next_posting_id,
        }
    }

    /// Rebuild the state from a snapshot. The id counter is raised above every
    /// restored posting id.
    pub fn restore(snapshot: LogisticsSnapshot, config: LogisticsConfig) -> LogisticsResult<Self> {
        let mut state = Self::new(config);
        state.mix_types = snapshot.mix_types;
        state.retaining_zones = snapshot.retaining_zones.into_iter().collect();
        state.next_posting_id = snapshot.next_posting_id;

        for region in snapshot.regions {
            let registry = state
                .regions
                .entry(region.region)
                .or_insert_with(|| PostingRegistry::new(region.region));
            for posting_state in region.postings {
                let posting = Posting::restore(posting_state, &state.mix_types)?;
                state.next_posting_id = state.next_posting_id.max(posting.id().raw() + 1);
                registry.insert_restored(posting)?;
            }
        }
        tracing::info!(
            regions = state.regions.len(),
            next_posting_id = state.next_posting_id,
            "logistics state restored"
        );
        Ok(state)
    }
}

impl Default for LogisticsState {
    fn default() -> Self {
        Self::new(LogisticsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haulx_core::{Cell, DefId, Point};
    use haulx_sim::SimWorld;

    fn steel() -> MixType {
        MixType::new(DefId::new(1))
    }

    fn select(world: &SimWorld, ids: &[ItemId]) -> Vec<ItemState> {
        ids.iter().filter_map(|i| world.item(*i)).collect()
    }

    #[test]
    fn ids_are_issued_monotonically() {
        let world = SimWorld::new(10, 10);
        let mut state = LogisticsState::default();
        let a = state.create_posting(RegionId::new(0), &select(&world, &[]));
        let b = state.create_posting(RegionId::new(0), &select(&world, &[]));
        assert!(b.id() > a.id());
    }

    #[test]
    fn active_order_predicate_and_haulables() {
        let mut world = SimWorld::new(10, 10);
        let a = world.spawn_item(steel(), 10, 75, Cell::new(1, 1));
        let stray = world.spawn_item(steel(), 10, 75, Cell::new(5, 5));
        let mut state = LogisticsState::default();
        let posting = state.create_posting(RegionId::new(0), &select(&world, &[a]));
        assert!(state.register_posting(posting, &mut world));

        assert!(state.is_part_of_active_order(a));
        assert!(!state.is_part_of_active_order(stray));
        assert_eq!(state.haulables(RegionId::new(0)), vec![a]);
        assert!(state.haulables(RegionId::new(9)).is_empty());
    }

    #[test]
    fn duplicate_registration_degrades_to_false() {
        let mut world = SimWorld::new(10, 10);
        let a = world.spawn_item(steel(), 10, 75, Cell::new(1, 1));
        let mut state = LogisticsState::default();
        let posting = state.create_posting(RegionId::new(0), &select(&world, &[a]));
        assert!(state.register_posting(posting.clone(), &mut world));
        assert!(!state.register_posting(posting, &mut world));
        assert_eq!(state.registry(RegionId::new(0)).unwrap().len(), 1);
    }

    #[test]
    fn removing_a_region_leaves_others_untouched() {
        let mut world = SimWorld::new(10, 10);
        let a = world.spawn_item(steel(), 10, 75, Cell::new(1, 1));
        let b = world.spawn_item(steel(), 10, 75, Cell::new(2, 2));
        let mut state = LogisticsState::default();
        let p = state.create_posting(RegionId::new(1), &select(&world, &[a]));
        state.register_posting(p, &mut world);
        let q = state.create_posting(RegionId::new(2), &select(&world, &[b]));
        state.register_posting(q, &mut world);

        state.clean_garbage(|r| r != RegionId::new(1), &world, &[]);
        assert!(state.registry(RegionId::new(1)).is_none());
        assert!(!state.is_part_of_active_order(a));
        assert!(state.posting_owning(RegionId::new(2), b).is_some());
    }

    #[test]
    fn cancel_item_reports_targeting_jobs() {
        let mut world = SimWorld::new(10, 10);
        let a = world.spawn_item(steel(), 10, 75, Cell::new(1, 1));
        let b = world.spawn_item(steel(), 15, 75, Cell::new(2, 2));
        let mut state = LogisticsState::default();
        let p = state.create_posting(RegionId::new(0), &select(&world, &[a, b]));
        let pid = *p.id();
        state.register_posting(p, &mut world);
        state
            .set_quantity_to_move(RegionId::new(0), pid, &steel(), 25)
            .unwrap();

        let job = JobId::new();
        let deliveries = vec![JobSummary {
            worker: haulx_core::WorkerId::new(1),
            job,
            posting: pid,
            mix: steel(),
            item: a,
            count: 10,
            dest: None,
            queued_dests: vec![],
            current: true,
        }];
        assert_eq!(state.cancel_item(RegionId::new(0), a, &world, &deliveries), vec![job]);
        let record = &state.posting(RegionId::new(0), pid).unwrap().records()[0];
        assert_eq!(record.selected_quantity(), 15);
        assert_eq!(record.quantity_to_move(), 15);
        assert!(!state.is_part_of_active_order(a));
    }

    #[test]
    fn select_all_skips_carried_and_destroyed() {
        let mut world = SimWorld::new(10, 10);
        let a = world.spawn_item(steel(), 10, 75, Cell::new(1, 1));
        let b = world.spawn_item(steel(), 10, 75, Cell::new(2, 2));
        let mut state = LogisticsState::default();
        let p = state.create_posting(RegionId::new(0), &select(&world, &[a, b]));
        state.register_posting(p, &mut world);
        world.destroy_item(b);
        assert_eq!(state.select_all_candidates(RegionId::new(0), a, &world), vec![a]);
    }

    #[test]
    fn retaining_zones_prune_with_their_zones() {
        let mut state = LogisticsState::default();
        state.set_retaining(ZoneId::new(1), true);
        state.set_retaining(ZoneId::new(2), true);
        state.set_retaining(ZoneId::new(2), false);
        state.set_retaining(ZoneId::new(3), true);
        state.prune_retaining_zones(|z| z != ZoneId::new(3));
        assert!(state.is_retaining(ZoneId::new(1)));
        assert!(!state.is_retaining(ZoneId::new(2)));
        assert!(!state.is_retaining(ZoneId::new(3)));
    }

    #[test]
    fn snapshot_round_trip_preserves_postings() {
        let mut world = SimWorld::new(10, 10);
        let a = world.spawn_item(steel(), 30, 75, Cell::new(1, 1));
        let b = world.spawn_item(MixType::new(DefId::new(4)), 5, 10, Cell::new(2, 1));
        let mut state = LogisticsState::default();
        state.set_retaining(ZoneId::new(8), true);
        let mut p = state.create_posting(RegionId::new(3), &select(&world, &[a, b]));
        let pid = *p.id();
        assert!(p.try_make_destinations(&world, Point::new(6.5, 6.5), true, state.config()));
        p.set_quantity_to_move(&steel(), 20).unwrap();
        p.record_moved(&steel(), 4);
        state.register_posting(p, &mut world);

        let json = state.snapshot().to_json().unwrap();
        let restored =
            LogisticsState::restore(LogisticsSnapshot::from_json(&json).unwrap(), LogisticsConfig::default())
                .unwrap();

        let before = state.posting(RegionId::new(3), pid).unwrap();
        let after = restored.posting(RegionId::new(3), pid).unwrap();
        assert_eq!(after.items(), before.items());
        assert_eq!(after.destinations(), before.destinations());
        assert_eq!(after.cursor(), before.cursor());
        assert_eq!(after.records(), before.records());
        assert!(after.is_coherent());
        assert!(restored.is_retaining(ZoneId::new(8)));
    }

    #[test]
    fn restore_raises_id_counter_past_restored_postings() {
        let raw = r#"{"regions":[{"region":0,"postings":[{"id":41,"region":0}]}]}"#;
        let mut state =
            LogisticsState::restore(LogisticsSnapshot::from_json(raw).unwrap(), LogisticsConfig::default())
                .unwrap();
        let next = state.create_posting(RegionId::new(0), &[]);
        assert_eq!(*next.id(), PostingId::new(42));
    }

    #[test]
    fn restore_rejects_unknown_mix_types() {
        let raw = r#"{"regions":[{"region":0,"postings":[{"id":1,"region":0,
            "records":[{"mix":5,"stack_limit":75,"items":[1]}]}]}]}"#;
        let snapshot = LogisticsSnapshot::from_json(raw).unwrap();
        assert!(LogisticsState::restore(snapshot, LogisticsConfig::default()).is_err());
    }
}
