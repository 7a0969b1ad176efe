//! Territory allocation.
//!
//! A new nation receives a connected block of grid cells grown outward from a
//! random origin. Growth picks uniformly from the frontier (cells adjacent to
//! the region but not yet in it), so regions come out as irregular blobs
//! rather than squares or lines.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::hash::BuildHasher;
use thiserror::Error;

pub const DEFAULT_TERRITORY_COUNT: usize = 100;
pub const DEFAULT_ORIGIN_WINDOW: i64 = 50;
pub const DEFAULT_ORIGIN_ATTEMPTS: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub x: i64,
    pub y: i64,
}

impl Coord {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Right, left, down, up.
    pub fn neighbors(self) -> [Coord; 4] {
        [
            Coord::new(self.x + 1, self.y),
            Coord::new(self.x - 1, self.y),
            Coord::new(self.x, self.y + 1),
            Coord::new(self.x, self.y - 1),
        ]
    }

    pub fn is_adjacent(self, other: Coord) -> bool {
        (self.x - other.x).abs() + (self.y - other.y).abs() == 1
    }
}

/// One allocated cell, stamped with the nation that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerritoryCell {
    pub owner_id: String,
    pub coord: Coord,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocError {
    /// The frontier emptied before the region reached its size. Nothing is
    /// returned; the signup attempt should be retried.
    #[error("territory growth stalled at {allocated} of {requested} cells")]
    InsufficientFrontier { requested: usize, allocated: usize },

    #[error("no free origin found after {attempts} attempts")]
    OriginUnavailable { attempts: u32 },
}

/// Source of randomness for allocation.
///
/// Every `rand::Rng` implements this, so callers pass `thread_rng()` in
/// production and a seeded generator in tests.
pub trait TerritoryRng {
    /// Uniform integer in `[0, bound)`. `bound` is never zero.
    fn below(&mut self, bound: u64) -> u64;

    /// Uniform index into a non-empty collection of `len` items.
    fn pick_index(&mut self, len: usize) -> usize {
        self.below(len as u64) as usize
    }
}

impl<R: Rng> TerritoryRng for R {
    fn below(&mut self, bound: u64) -> u64 {
        self.gen_range(0..bound)
    }
}

/// Answers whether a cell already belongs to some nation.
pub trait ClaimCheck {
    fn is_claimed(&self, coord: Coord) -> bool;
}

/// An empty world. Allocations made against it may overlap each other.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unclaimed;

impl ClaimCheck for Unclaimed {
    fn is_claimed(&self, _coord: Coord) -> bool {
        false
    }
}

impl<S: BuildHasher> ClaimCheck for HashSet<Coord, S> {
    fn is_claimed(&self, coord: Coord) -> bool {
        self.contains(&coord)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocator {
    /// Origins are drawn from `[0, origin_window)` on both axes. Growth is not
    /// bounded by it.
    pub origin_window: i64,
    pub origin_attempts: u32,
}

impl Default for Allocator {
    fn default() -> Self {
        Self {
            origin_window: DEFAULT_ORIGIN_WINDOW,
            origin_attempts: DEFAULT_ORIGIN_ATTEMPTS,
        }
    }
}

impl Allocator {
    pub fn with_origin_window(mut self, window: i64) -> Self {
        self.origin_window = window;
        self
    }

    /// Grows a connected region of exactly `count` cells for `owner_id`.
    ///
    /// The origin is the first element. `count == 0` yields an empty region.
    pub fn allocate<R, C>(
        &self,
        owner_id: &str,
        count: usize,
        rng: &mut R,
        world: &C,
    ) -> Result<Vec<TerritoryCell>, AllocError>
    where
        R: TerritoryRng + ?Sized,
        C: ClaimCheck + ?Sized,
    {
        let coords = self.allocate_coords(count, rng, world)?;
        Ok(coords
            .into_iter()
            .map(|coord| TerritoryCell {
                owner_id: owner_id.to_string(),
                coord,
            })
            .collect())
    }

    pub fn allocate_coords<R, C>(
        &self,
        count: usize,
        rng: &mut R,
        world: &C,
    ) -> Result<Vec<Coord>, AllocError>
    where
        R: TerritoryRng + ?Sized,
        C: ClaimCheck + ?Sized,
    {
        if count == 0 {
            return Ok(Vec::new());
        }

        let origin = self.pick_origin(rng, world)?;

        let mut cells = Vec::with_capacity(count);
        // Accepted cells plus everything ever placed on the frontier.
        let mut reserved: HashSet<Coord> = HashSet::with_capacity(count * 3);
        let mut frontier: Vec<Coord> = Vec::new();

        reserved.insert(origin);
        cells.push(origin);
        expand(origin, &mut reserved, &mut frontier, world);

        while cells.len() < count && !frontier.is_empty() {
            let idx = rng.pick_index(frontier.len());
            let next = frontier.swap_remove(idx);
            cells.push(next);
            expand(next, &mut reserved, &mut frontier, world);
        }

        if cells.len() < count {
            return Err(AllocError::InsufficientFrontier {
                requested: count,
                allocated: cells.len(),
            });
        }
        Ok(cells)
    }

    fn pick_origin<R, C>(&self, rng: &mut R, world: &C) -> Result<Coord, AllocError>
    where
        R: TerritoryRng + ?Sized,
        C: ClaimCheck + ?Sized,
    {
        let window = self.origin_window.max(1) as u64;
        let attempts = self.origin_attempts.max(1);
        for _ in 0..attempts {
            let x = rng.below(window) as i64;
            let y = rng.below(window) as i64;
            let origin = Coord::new(x, y);
            if !world.is_claimed(origin) {
                return Ok(origin);
            }
        }
        Err(AllocError::OriginUnavailable { attempts })
    }
}

fn expand<C: ClaimCheck + ?Sized>(
    cell: Coord,
    reserved: &mut HashSet<Coord>,
    frontier: &mut Vec<Coord>,
    world: &C,
) {
    for n in cell.neighbors() {
        if !reserved.insert(n) {
            continue;
        }
        if !world.is_claimed(n) {
            frontier.push(n);
        }
    }
}

/// Allocates against an empty world with the default origin window.
pub fn allocate<R: TerritoryRng + ?Sized>(
    owner_id: &str,
    count: usize,
    rng: &mut R,
) -> Result<Vec<TerritoryCell>, AllocError> {
    Allocator::default().allocate(owner_id, count, rng, &Unclaimed)
}

/// Origin window for a world that already holds `claimed_cells` cells.
///
/// Keeps the window at least twice the side of a square holding every claimed
/// cell, so fresh origins keep landing in open ground as the world fills.
pub fn origin_window_for(base: i64, claimed_cells: usize) -> i64 {
    let side = (claimed_cells as f64).sqrt().ceil() as i64;
    base.max(1).max(side.saturating_mul(2))
}

/// True when every cell is reachable from the first one through 4-adjacent
/// cells of the set. Empty input counts as connected.
pub fn is_connected(cells: &[Coord]) -> bool {
    let Some(&start) = cells.first() else {
        return true;
    };
    let members: HashSet<Coord> = cells.iter().copied().collect();
    let mut seen: HashSet<Coord> = HashSet::with_capacity(members.len());
    let mut queue = VecDeque::from([start]);
    seen.insert(start);
    while let Some(c) = queue.pop_front() {
        for n in c.neighbors() {
            if members.contains(&n) && seen.insert(n) {
                queue.push_back(n);
            }
        }
    }
    seen.len() == members.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn coords(cells: &[TerritoryCell]) -> Vec<Coord> {
        cells.iter().map(|c| c.coord).collect()
    }

    #[test]
    fn zero_count_is_empty() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let cells = allocate("c1", 0, &mut rng).unwrap();
        assert!(cells.is_empty());
    }

    #[test]
    fn single_cell_is_origin_in_window() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let cells = allocate("c1", 1, &mut rng).unwrap();
        assert_eq!(cells.len(), 1);
        let origin = cells[0].coord;
        assert!((0..DEFAULT_ORIGIN_WINDOW).contains(&origin.x));
        assert!((0..DEFAULT_ORIGIN_WINDOW).contains(&origin.y));
    }

    #[test]
    fn hundred_cells_distinct_connected_and_stamped() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let cells = allocate("nation-7", 100, &mut rng).unwrap();
        assert_eq!(cells.len(), 100);
        assert!(cells.iter().all(|c| c.owner_id == "nation-7"));

        let cs = coords(&cells);
        let unique: HashSet<Coord> = cs.iter().copied().collect();
        assert_eq!(unique.len(), 100);
        assert!(is_connected(&cs));
        for c in &cs[1..] {
            assert!(c.neighbors().iter().any(|n| unique.contains(n)));
        }
    }

    #[test]
    fn each_cell_touches_an_earlier_cell() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let cs = Allocator::default()
            .allocate_coords(60, &mut rng, &Unclaimed)
            .unwrap();
        for (i, c) in cs.iter().enumerate().skip(1) {
            assert!(cs[..i].iter().any(|p| p.is_adjacent(*c)), "cell {i} floats");
        }
    }

    #[test]
    fn same_seed_same_region() {
        let a = allocate("c", 100, &mut ChaCha8Rng::seed_from_u64(42)).unwrap();
        let b = allocate("c", 100, &mut ChaCha8Rng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn claimed_cells_are_avoided() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let first = Allocator::default()
            .allocate_coords(100, &mut rng, &Unclaimed)
            .unwrap();
        let world: HashSet<Coord> = first.iter().copied().collect();

        let second = Allocator::default()
            .allocate_coords(100, &mut rng, &world)
            .unwrap();
        assert_eq!(second.len(), 100);
        assert!(is_connected(&second));
        assert!(second.iter().all(|c| !world.contains(c)));
    }

    #[test]
    fn unchecked_allocations_can_overlap() {
        // With a one-cell window both origins land on (0, 0).
        let alloc = Allocator::default().with_origin_window(1);
        let a = alloc
            .allocate_coords(100, &mut ChaCha8Rng::seed_from_u64(6), &Unclaimed)
            .unwrap();
        let b = alloc
            .allocate_coords(100, &mut ChaCha8Rng::seed_from_u64(7), &Unclaimed)
            .unwrap();
        assert_eq!(a.len(), 100);
        assert_eq!(b.len(), 100);
        assert_eq!(a[0], Coord::new(0, 0));
        assert_eq!(a[0], b[0]);
    }

    #[test]
    fn boxed_in_origin_reports_insufficient_frontier() {
        let alloc = Allocator::default().with_origin_window(1);
        let world: HashSet<Coord> = Coord::new(0, 0).neighbors().into_iter().collect();
        let err = alloc
            .allocate_coords(2, &mut ChaCha8Rng::seed_from_u64(8), &world)
            .unwrap_err();
        assert_eq!(
            err,
            AllocError::InsufficientFrontier {
                requested: 2,
                allocated: 1
            }
        );

        // A single cell still fits.
        let one = alloc
            .allocate_coords(1, &mut ChaCha8Rng::seed_from_u64(8), &world)
            .unwrap();
        assert_eq!(one, vec![Coord::new(0, 0)]);
    }

    #[test]
    fn full_window_reports_origin_unavailable() {
        let alloc = Allocator {
            origin_window: 1,
            origin_attempts: 5,
        };
        let world: HashSet<Coord> = [Coord::new(0, 0)].into_iter().collect();
        let err = alloc
            .allocate_coords(10, &mut ChaCha8Rng::seed_from_u64(9), &world)
            .unwrap_err();
        assert_eq!(err, AllocError::OriginUnavailable { attempts: 5 });
    }

    #[test]
    fn window_grows_with_claimed_cells() {
        assert_eq!(origin_window_for(50, 0), 50);
        assert_eq!(origin_window_for(50, 100), 50);
        assert_eq!(origin_window_for(50, 10_000), 200);
        assert_eq!(origin_window_for(0, 0), 1);
    }

    #[test]
    fn connectivity_check_rejects_islands() {
        assert!(is_connected(&[]));
        assert!(is_connected(&[Coord::new(3, 3)]));
        assert!(is_connected(&[Coord::new(0, 0), Coord::new(0, 1)]));
        assert!(!is_connected(&[Coord::new(0, 0), Coord::new(1, 1)]));
    }
}
