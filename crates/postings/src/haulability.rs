//! Predicates the host asks instead of having its hauling rules rewritten.
//!
//! The host owns a per-item "haul" toggle that inverts the item definition's
//! default: always-haulable things become unhaulable when toggled and the rest
//! become haulable. An explicit order toggles its items so generic hauling
//! leaves them alone.

use haulx_core::{Haulability, ItemState};

pub fn is_haulable_set_to_haulable<W: Haulability + ?Sized>(world: &W, item: &ItemState) -> bool {
    item.ever_haulable && item.always_haulable != world.haul_toggled(item.id)
}

pub fn is_haulable_set_to_unhaulable<W: Haulability + ?Sized>(
    world: &W,
    item: &ItemState,
) -> bool {
    item.ever_haulable && item.always_haulable == world.haul_toggled(item.id)
}

/// Whether generic hauling should pick the item up, optionally as if its haul
/// toggle were about to flip.
pub fn should_be_haulable<W: Haulability + ?Sized>(
    world: &W,
    item: &ItemState,
    will_toggle: bool,
) -> bool {
    if item.forbidden || item.in_best_storage {
        return false;
    }
    if will_toggle {
        is_haulable_set_to_unhaulable(world, item)
    } else {
        is_haulable_set_to_haulable(world, item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haulx_core::{Cell, DefId, Items, MixType};
    use haulx_sim::SimWorld;

    #[test]
    fn toggle_inverts_the_definition_default() {
        let mut world = SimWorld::new(4, 4);
        let id = world.spawn_item(MixType::new(DefId::new(1)), 5, 10, Cell::new(1, 1));
        let item = world.item(id).unwrap();
        assert!(is_haulable_set_to_haulable(&world, &item));
        world.toggle_haul(id);
        assert!(!is_haulable_set_to_haulable(&world, &item));
        assert!(is_haulable_set_to_unhaulable(&world, &item));
    }

    #[test]
    fn never_haulable_is_neither() {
        let world = SimWorld::new(4, 4);
        let mut item = ItemState {
            id: haulx_core::ItemId::new(9),
            mix: MixType::new(DefId::new(1)),
            stack_count: 1,
            stack_limit: 1,
            location: haulx_core::ItemLocation::Ground(Cell::new(0, 0)),
            destroyed: false,
            burning: false,
            forbidden: false,
            ever_haulable: false,
            always_haulable: true,
            bound_to_bill: false,
            in_best_storage: false,
        };
        assert!(!is_haulable_set_to_haulable(&world, &item));
        assert!(!is_haulable_set_to_unhaulable(&world, &item));
        item.ever_haulable = true;
        item.forbidden = true;
        assert!(!should_be_haulable(&world, &item, false));
    }

    #[test]
    fn should_be_haulable_respects_pending_toggle() {
        let mut world = SimWorld::new(4, 4);
        let id = world.spawn_item(MixType::new(DefId::new(1)), 5, 10, Cell::new(1, 1));
        let item = world.item(id).unwrap();
        assert!(should_be_haulable(&world, &item, false));
        assert!(!should_be_haulable(&world, &item, true));
    }
}
