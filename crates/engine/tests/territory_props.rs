//! Property tests for territory allocation.

use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;

use nationgrid_engine::territory::{allocate, is_connected, Allocator, Coord};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Exactly `count` distinct, connected cells, all owned by the caller.
    #[test]
    fn prop_region_is_exact_distinct_and_connected(seed in any::<u64>(), count in 0usize..400) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let cells = allocate("owner", count, &mut rng).unwrap();

        prop_assert_eq!(cells.len(), count);
        prop_assert!(cells.iter().all(|c| c.owner_id == "owner"));

        let coords: Vec<Coord> = cells.iter().map(|c| c.coord).collect();
        let unique: HashSet<Coord> = coords.iter().copied().collect();
        prop_assert_eq!(unique.len(), count);
        prop_assert!(is_connected(&coords));
    }

    /// Origin lands inside the window; later cells each touch an earlier one.
    #[test]
    fn prop_origin_in_window_and_growth_is_adjacent(
        seed in any::<u64>(),
        window in 1i64..80,
        count in 1usize..150,
    ) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let coords = Allocator::default()
            .with_origin_window(window)
            .allocate_coords(count, &mut rng, &HashSet::<Coord>::new())
            .unwrap();

        let origin = coords[0];
        prop_assert!((0..window).contains(&origin.x));
        prop_assert!((0..window).contains(&origin.y));
        for (i, c) in coords.iter().enumerate().skip(1) {
            prop_assert!(coords[..i].iter().any(|p| p.is_adjacent(*c)));
        }
    }

    #[test]
    fn prop_same_seed_same_region(seed in any::<u64>(), count in 1usize..200) {
        let a = allocate("a", count, &mut ChaCha8Rng::seed_from_u64(seed)).unwrap();
        let b = allocate("a", count, &mut ChaCha8Rng::seed_from_u64(seed)).unwrap();
        let a: Vec<Coord> = a.into_iter().map(|c| c.coord).collect();
        let b: Vec<Coord> = b.into_iter().map(|c| c.coord).collect();
        prop_assert_eq!(a, b);
    }

    /// Successive nations sharing one world never overlap, whatever happens.
    #[test]
    fn prop_nations_never_overlap(seed in any::<u64>(), nations in 1usize..8, count in 1usize..120) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut world: HashSet<Coord> = HashSet::new();
        let allocator = Allocator::default().with_origin_window(6);

        for _ in 0..nations {
            // Failure is allowed in a crowded window; overlap never is.
            if let Ok(coords) = allocator.allocate_coords(count, &mut rng, &world) {
                prop_assert_eq!(coords.len(), count);
                prop_assert!(is_connected(&coords));
                for c in coords {
                    prop_assert!(world.insert(c), "cell {:?} handed out twice", c);
                }
            }
        }
    }
}
