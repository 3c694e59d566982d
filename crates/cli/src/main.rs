//! Runs one explicit-haul order to completion in the in-memory world and
//! prints the final logistics snapshot.

use anyhow::{Context, bail};
use rand::SeedableRng;
use rand::rngs::StdRng;

use haulx_core::{Cell, DefId, ItemState, Items, LogisticsConfig, MixType, Point, RegionId, WorkerId};
use haulx_delivery::{DeliveryRoster, Tick, WorkProposer};
use haulx_postings::LogisticsState;
use haulx_sim::SimWorld;

const REGION: RegionId = RegionId::new(0);
const MAX_STEPS: usize = 5_000;

fn main() -> anyhow::Result<()> {
    haulx_observability::init();

    let config = LogisticsConfig::from_env();
    let seed = match std::env::var("HAULX_SEED") {
        Ok(raw) => raw.parse().with_context(|| format!("HAULX_SEED={raw}"))?,
        Err(_) => 7,
    };
    let mut rng = StdRng::seed_from_u64(seed);

    let mut world = SimWorld::new(32, 16).with_edge_band(1);
    let steel = MixType::new(DefId::new(1));
    let wood = MixType::new(DefId::new(2));
    let mut selected = Vec::new();
    for (i, mix) in [steel, steel, wood, steel, wood, wood].into_iter().enumerate() {
        let cell = Cell::new(24 + (i as i32 % 3) * 2, 4 + (i as i32 / 3) * 3);
        selected.push(world.spawn_item(mix, 30 + 10 * i as u32, 75, cell));
    }
    // A half-full stack near the drop area that the order can top up.
    world.spawn_item(steel, 40, 75, Cell::new(4, 8));
    let workers: Vec<WorkerId> = (0..3)
        .map(|i| world.add_worker(Cell::new(16, 3 + 4 * i), 75))
        .collect();

    let mut state = LogisticsState::new(config.clone());
    let items: Vec<ItemState> = selected.iter().filter_map(|i| world.item(*i)).collect();
    let mut posting = state.create_posting(REGION, &items);
    if !posting.try_make_destinations(&world, Point::new(4.5, 8.5), false, state.config()) {
        bail!("no destination area for {} selected items", items.len());
    }
    let posting_id = posting.id_typed();
    if !state.register_posting(posting, &mut world) {
        bail!("posting {posting_id} was refused");
    }

    let mut roster = DeliveryRoster::new(WorkProposer::new(config));
    let mut steps = 0;
    while steps < MAX_STEPS {
        for worker in &workers {
            roster.try_assign_work(&mut world, &state, REGION, *worker, &mut rng);
        }
        if roster.is_empty() {
            break;
        }
        for (worker, tick) in roster.step(&mut world, &mut state, &mut rng) {
            match tick {
                Tick::MoveTo(cell) => world.move_worker(worker, cell),
                Tick::Finished(end) => tracing::info!(worker = %worker, state = ?end, "job ended"),
                Tick::Continue => {}
            }
        }
        steps += 1;
    }

    let deliveries = roster.summaries();
    let posting = state
        .posting(REGION, posting_id)
        .context("posting vanished before the run finished")?;
    for record in posting.records() {
        tracing::info!(
            record = %record.label(|m| format!("def-{}", m.def)),
            moved = record.moved_quantity(),
            "record result"
        );
    }
    tracing::info!(posting = %posting_id, steps, status = %posting.status(&deliveries), "run finished");

    println!("{}", state.snapshot().to_json()?);
    let collected = state.clean_garbage(|r| r == REGION, &world, &deliveries);
    tracing::info!(collected = collected.len(), "garbage collected");
    Ok(())
}
