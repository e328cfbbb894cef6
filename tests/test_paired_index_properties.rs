//! Property checks for the paired information index
//! Random insertions must keep every observation next to its backward twin

use path_forge::paired_info::{PairedInfoIndex, Point};
use path_forge::EdgeId;

fn random_index(seed: u64, insertions: usize) -> (PairedInfoIndex, f64) {
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut index = PairedInfoIndex::new();
    let mut inserted_weight = 0.0;
    for _ in 0..insertions {
        let e1 = EdgeId(rng.usize(1..8));
        let e2 = EdgeId(rng.usize(1..8));
        // whole multiples of ten never land in a neighbouring slot
        let sign = if rng.bool() { 1.0 } else { -1.0 };
        let d = sign * 10.0 * rng.i64(1..20) as f64;
        let weight = rng.usize(1..5) as f64;
        index.add_point(e1, e2, Point::new(d, weight, 0.0), true).unwrap();
        inserted_weight += weight;
    }
    (index, inserted_weight)
}

#[test]
fn test_every_point_has_a_backward_twin() {
    for seed in 0..20 {
        let (index, _) = random_index(seed, 200);
        let infos = index.pair_infos();
        assert_eq!(infos.len(), index.size());
        for info in infos {
            let twins = index.edge_pair_info(info.second, info.first);
            assert!(
                twins
                    .iter()
                    .any(|p| p.d == -info.d() && p.weight == info.weight() && p.var == info.var()),
                "seed {seed}: no twin for {info:?}"
            );
        }
    }
}

#[test]
fn test_merging_keeps_total_weight() {
    for seed in 0..20 {
        let (index, inserted) = random_index(seed, 150);
        let stored: f64 = index.pair_infos().iter().map(|info| info.weight()).sum();
        assert_eq!(stored, 2.0 * inserted, "seed {seed}");
    }
}

#[test]
fn test_records_reload_to_same_index() {
    let (index, _) = random_index(42, 100);
    let reloaded = PairedInfoIndex::from_records(&index.to_records(), false).unwrap();
    assert_eq!(reloaded.size(), index.size());
    for info in index.pair_infos() {
        assert_eq!(
            reloaded.edge_pair_info(info.first, info.second),
            index.edge_pair_info(info.first, info.second)
        );
    }
}
