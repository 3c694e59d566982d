use std::collections::BTreeMap;

use haulx_core::{
    AggregateRoot, Haulability, ItemId, Items, JobSummary, LogisticsError, LogisticsResult,
    PostingId, RegionId,
};
use haulx_inventory::RemovalReason;

use crate::haulability::is_haulable_set_to_haulable;
use crate::posting::Posting;

/// Per-region directory of active postings.
#[derive(Debug, Clone, PartialEq)]
pub struct PostingRegistry {
    region: RegionId,
    postings: BTreeMap<PostingId, Posting>,
}

impl PostingRegistry {
    pub fn new(region: RegionId) -> Self {
        Self {
            region,
            postings: BTreeMap::new(),
        }
    }

    pub fn region(&self) -> RegionId {
        self.region
    }

    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub fn get(&self, id: PostingId) -> Option<&Posting> {
        self.postings.get(&id)
    }

    pub fn get_mut(&mut self, id: PostingId) -> Option<&mut Posting> {
        self.postings.get_mut(&id)
    }

    pub fn postings(&self) -> impl Iterator<Item = &Posting> {
        self.postings.values()
    }

    pub fn contains(&self, id: PostingId) -> bool {
        self.postings.contains_key(&id)
    }

    /// The posting `item` belongs to. Linear; postings are few and small.
    pub fn posting_with_item(&self, item: ItemId) -> Option<&Posting> {
        self.postings.values().find(|p| p.has_item(item))
    }

    pub fn posting_with_item_mut(&mut self, item: ItemId) -> Option<&mut Posting> {
        self.postings.values_mut().find(|p| p.has_item(item))
    }

    /// Every item of every posting, in posting order.
    pub fn haulables(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.postings.values().flat_map(|p| p.items().iter().copied())
    }

    /// Take ownership of `posting`'s items and insert it.
    ///
    /// Each item is unforbidden, its haul toggle flipped if generic hauling
    /// would otherwise take it, and it is stripped from any older posting.
    /// A colliding id is refused before anything is touched.
    pub fn register<W>(&mut self, mut posting: Posting, world: &mut W) -> LogisticsResult<()>
    where
        W: Items + Haulability + ?Sized,
    {
        let id = *posting.id();
        if self.postings.contains_key(&id) {
            return Err(LogisticsError::DuplicatePostingId(id));
        }
        if posting.region() != self.region {
            return Err(LogisticsError::consistency(format!(
                "posting {id} belongs to region {} but was registered in {}",
                posting.region(),
                self.region
            )));
        }

        for item in posting.items().to_vec() {
            world.set_forbidden(item, false);
            let set_to_haulable = world
                .item(item)
                .is_some_and(|state| is_haulable_set_to_haulable(&*world, &state));
            if set_to_haulable {
                world.toggle_haul(item);
            }
            for other in self.postings.values_mut() {
                if other.try_remove_item(item, RemovalReason::Reassigned) {
                    tracing::debug!(item = %item, from = %other.id(), to = %id, "item reassigned");
                }
            }
        }

        posting.mark_registered();
        tracing::info!(
            posting = %id,
            region = %self.region,
            items = posting.items().len(),
            records = posting.records().len(),
            "posting registered"
        );
        self.postings.insert(id, posting);
        Ok(())
    }

    pub fn remove_posting(&mut self, id: PostingId) -> Option<Posting> {
        self.postings.remove(&id)
    }

    /// Drop destroyed items from every posting, then drop postings that are
    /// finished and hold no items. Returns the removed posting ids.
    pub fn clean_garbage<W: Items + ?Sized>(
        &mut self,
        world: &W,
        deliveries: &[JobSummary],
    ) -> Vec<PostingId> {
        for posting in self.postings.values_mut() {
            let dropped = posting.clean(world);
            if dropped > 0 {
                tracing::debug!(posting = %posting.id(), dropped, "removed destroyed items");
            }
        }
        let finished: Vec<PostingId> = self
            .postings
            .values()
            .filter(|p| p.is_empty() && p.status(deliveries).is_finished())
            .map(|p| *p.id())
            .collect();
        for id in &finished {
            self.postings.remove(id);
            tracing::info!(posting = %id, region = %self.region, "finished posting collected");
        }
        finished
    }

    pub(crate) fn insert_restored(&mut self, posting: Posting) -> LogisticsResult<()> {
        let id = *posting.id();
        if self.postings.contains_key(&id) {
            return Err(LogisticsError::DuplicatePostingId(id));
        }
        self.postings.insert(id, posting);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haulx_core::{Cell, DefId, ItemState, MixType};
    use haulx_sim::SimWorld;

    fn steel() -> MixType {
        MixType::new(DefId::new(1))
    }

    fn posting(world: &SimWorld, id: u64, items: &[ItemId]) -> Posting {
        let selected: Vec<ItemState> = items.iter().filter_map(|i| world.item(*i)).collect();
        Posting::new(PostingId::new(id), RegionId::new(0), &selected)
    }

    #[test]
    fn register_takes_items_from_older_postings() {
        let mut world = SimWorld::new(10, 10);
        let a = world.spawn_item(steel(), 10, 75, Cell::new(1, 1));
        let b = world.spawn_item(steel(), 20, 75, Cell::new(2, 1));
        let mut registry = PostingRegistry::new(RegionId::new(0));

        let first = posting(&world, 1, &[a, b]);
        registry.register(first, &mut world).unwrap();
        let second = posting(&world, 2, &[b]);
        registry.register(second, &mut world).unwrap();

        assert_eq!(registry.posting_with_item(b).map(|p| *p.id()), Some(PostingId::new(2)));
        assert_eq!(registry.posting_with_item(a).map(|p| *p.id()), Some(PostingId::new(1)));
        assert!(registry.postings().all(|p| p.is_coherent()));
        assert_eq!(registry.haulables().count(), 2);
    }

    #[test]
    fn register_unforbids_and_toggles_haulable_items() {
        let mut world = SimWorld::new(10, 10);
        let a = world.spawn_item(steel(), 10, 75, Cell::new(1, 1));
        world.item_mut(a).unwrap().forbidden = true;
        let mut registry = PostingRegistry::new(RegionId::new(0));
        registry.register(posting(&world, 1, &[a]), &mut world).unwrap();

        assert!(!world.item(a).unwrap().forbidden);
        assert!(world.haul_toggled(a));
        assert!(registry.get(PostingId::new(1)).unwrap().is_registered());
    }

    #[test]
    fn duplicate_id_is_refused_without_side_effects() {
        let mut world = SimWorld::new(10, 10);
        let a = world.spawn_item(steel(), 10, 75, Cell::new(1, 1));
        let b = world.spawn_item(steel(), 10, 75, Cell::new(2, 1));
        let mut registry = PostingRegistry::new(RegionId::new(0));
        registry.register(posting(&world, 1, &[a]), &mut world).unwrap();

        let err = registry
            .register(posting(&world, 1, &[a, b]), &mut world)
            .unwrap_err();
        assert!(err.is_consistency_violation());
        assert!(!world.haul_toggled(b));
        assert_eq!(registry.get(PostingId::new(1)).unwrap().items(), &[a]);
    }

    #[test]
    fn garbage_collection_keeps_skeletons_and_drops_finished() {
        let mut world = SimWorld::new(10, 10);
        let a = world.spawn_item(steel(), 10, 75, Cell::new(1, 1));
        let b = world.spawn_item(steel(), 10, 75, Cell::new(2, 2));
        let mut registry = PostingRegistry::new(RegionId::new(0));
        registry.register(posting(&world, 1, &[a]), &mut world).unwrap();
        registry.register(posting(&world, 2, &[b]), &mut world).unwrap();

        world.destroy_item(a);
        assert!(registry.clean_garbage(&world, &[]).is_empty());
        let stranded = registry.get(PostingId::new(1)).unwrap();
        assert!(stranded.items().is_empty());
        assert_eq!(stranded.records().len(), 1);

        let done = registry.get_mut(PostingId::new(2)).unwrap();
        done.record_moved(&steel(), 10);
        done.try_remove_item(b, RemovalReason::Delivered);
        assert_eq!(registry.clean_garbage(&world, &[]), vec![PostingId::new(2)]);
        assert_eq!(registry.len(), 1);
    }
}
