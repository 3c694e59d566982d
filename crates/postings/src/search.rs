//! Nearest-first expansion over possible destination cells.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use haulx_core::host::is_possible_destination;
use haulx_core::{Cell, Grid, Point};

#[derive(Debug, Copy, Clone)]
struct Candidate {
    distance: f32,
    cell: Cell,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    // Reversed so the max-heap pops the nearest cell; ties fall back to the
    // cell order to keep the walk deterministic.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.cell.cmp(&self.cell))
    }
}

/// Yields cells in increasing distance from `cursor` (measured to each cell's
/// center), growing only through cells that pass [`is_possible_destination`].
///
/// The walk starts at the cell containing the cursor; if that cell is not a
/// possible destination nothing is yielded.
pub struct NearestFirst<'w, W: ?Sized> {
    world: &'w W,
    cursor: Point,
    frontier: BinaryHeap<Candidate>,
    seen: HashSet<Cell>,
}

impl<'w, W: Grid + ?Sized> NearestFirst<'w, W> {
    pub fn new(world: &'w W, cursor: Point) -> Self {
        let mut walk = Self {
            world,
            cursor,
            frontier: BinaryHeap::new(),
            seen: HashSet::new(),
        };
        walk.consider(Cell::containing(cursor));
        walk
    }

    fn consider(&mut self, cell: Cell) {
        if !self.seen.insert(cell) {
            return;
        }
        if is_possible_destination(self.world, cell) {
            self.frontier.push(Candidate {
                distance: cell.center().distance(self.cursor),
                cell,
            });
        }
    }
}

impl<W: Grid + ?Sized> Iterator for NearestFirst<'_, W> {
    type Item = Cell;

    fn next(&mut self) -> Option<Cell> {
        let Candidate { cell, .. } = self.frontier.pop()?;
        for n in cell.neighbours() {
            self.consider(n);
        }
        Some(cell)
    }
}
