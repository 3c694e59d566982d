//! Grid geometry: integer cells and continuous points.

use serde::{Deserialize, Serialize};

/// A grid cell. `z` is the second horizontal axis (north is `+z`).
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Cell {
    pub x: i32,
    pub z: i32,
}

impl Cell {
    pub const NORTH: Cell = Cell::new(0, 1);
    pub const SOUTH: Cell = Cell::new(0, -1);
    pub const EAST: Cell = Cell::new(1, 0);
    pub const WEST: Cell = Cell::new(-1, 0);

    /// The four orthogonal neighbour offsets, in expansion order.
    pub const CARDINALS: [Cell; 4] = [Cell::NORTH, Cell::SOUTH, Cell::EAST, Cell::WEST];

    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub fn offset(self, by: Cell) -> Cell {
        Cell::new(self.x + by.x, self.z + by.z)
    }

    pub fn neighbours(self) -> impl Iterator<Item = Cell> {
        Cell::CARDINALS.into_iter().map(move |d| self.offset(d))
    }

    pub fn manhattan(self, other: Cell) -> u32 {
        self.x.abs_diff(other.x) + self.z.abs_diff(other.z)
    }

    /// Whether `other` is this cell or one of its eight neighbours.
    pub fn touches(self, other: Cell) -> bool {
        self.x.abs_diff(other.x) <= 1 && self.z.abs_diff(other.z) <= 1
    }

    /// The point at the middle of the cell.
    pub fn center(self) -> Point {
        Point::new(self.x as f32 + 0.5, self.z as f32 + 0.5)
    }

    /// The cell a point lies in.
    pub fn containing(point: Point) -> Cell {
        Cell::new(point.x.floor() as i32, point.z.floor() as i32)
    }
}

impl core::fmt::Display for Cell {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// A continuous position on the ground plane (cursor, drawn centers).
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub z: f32,
}

impl Point {
    pub const fn new(x: f32, z: f32) -> Self {
        Self { x, z }
    }

    pub fn distance(self, other: Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.z - other.z).powi(2)).sqrt()
    }

    /// Arithmetic mean of cell centers; `None` for an empty set.
    pub fn mean_of(cells: &[Cell]) -> Option<Point> {
        if cells.is_empty() {
            return None;
        }
        let n = cells.len() as f32;
        let (sx, sz) = cells.iter().fold((0.0f32, 0.0f32), |(sx, sz), c| {
            let p = c.center();
            (sx + p.x, sz + p.z)
        });
        Some(Point::new(sx / n, sz / n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containing_floors_negative_coordinates() {
        assert_eq!(Cell::containing(Point::new(2.7, 3.1)), Cell::new(2, 3));
        assert_eq!(Cell::containing(Point::new(-0.5, -1.2)), Cell::new(-1, -2));
    }

    #[test]
    fn manhattan_and_touch() {
        let a = Cell::new(0, 0);
        assert_eq!(a.manhattan(Cell::new(3, -4)), 7);
        assert!(a.touches(Cell::new(1, 1)));
        assert!(!a.touches(Cell::new(2, 0)));
    }

    #[test]
    fn mean_of_cells_is_center_average() {
        let mean = Point::mean_of(&[Cell::new(0, 0), Cell::new(2, 0)]).unwrap();
        assert_eq!(mean, Point::new(1.5, 0.5));
        assert!(Point::mean_of(&[]).is_none());
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: a cell's center always lies back inside the cell.
            #[test]
            fn center_round_trips(x in -10_000i32..10_000, z in -10_000i32..10_000) {
                let cell = Cell::new(x, z);
                prop_assert_eq!(Cell::containing(cell.center()), cell);
            }

            /// Property: Manhattan distance is symmetric.
            #[test]
            fn manhattan_is_symmetric(
                ax in -500i32..500, az in -500i32..500,
                bx in -500i32..500, bz in -500i32..500,
            ) {
                let (a, b) = (Cell::new(ax, az), Cell::new(bx, bz));
                prop_assert_eq!(a.manhattan(b), b.manhattan(a));
            }
        }
    }
}
