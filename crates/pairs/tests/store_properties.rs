//! Property-style tests for pair stores and subsets.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use verif_pairs::{
    ClimoPntInfo, ObsSummary, PairMode, PairStore, PairsError, PointPair, SetLogic, SingleThresh,
    subset_pairs_cnt_thresh,
};

const T: i64 = 1_700_000_000;

fn random_pair(rng: &mut StdRng) -> PointPair {
    // A small location set so keys collide often.
    let lat = 40.0 + rng.random_range(0..4) as f64 * 0.5;
    let lon = -100.0 + rng.random_range(0..4) as f64 * 0.5;
    PointPair {
        sid: format!("S{}", rng.random_range(0..8)),
        lat,
        lon,
        x: rng.random_range(0.0..10.0),
        y: rng.random_range(0.0..10.0),
        vld: T + rng.random_range(-3..=3) * 60,
        lvl: 850.0,
        elv: 100.0,
        f: rng.random_range(-5.0..5.0),
        o: rng.random_range(-5.0..5.0),
        qc: "0".to_string(),
        climo: ClimoPntInfo::new(0.0, 1.0, 0.0, 1.0),
        wgt: 1.0,
    }
}

fn assert_columns_equal(store: &PairStore) {
    let n = store.n_obs();
    for (i, len) in store.column_lengths().iter().enumerate() {
        assert_eq!(*len, n, "column {i} has length {len}, expected {n}");
    }
}

#[test]
fn columns_stay_aligned_under_random_mutation() {
    let mut rng = StdRng::seed_from_u64(7);
    for summary in [ObsSummary::None, ObsSummary::Nearest, ObsSummary::UwMean, ObsSummary::Perc(75.0)] {
        let mut store = PairStore::new();
        store.set_fcst_ut(T);
        store.set_obs_summary(summary);
        store.set_check_unique(rng.random_bool(0.5));
        for _ in 0..200 {
            match rng.random_range(0..10) {
                0 => store.calc_obs_summary(),
                1 => {
                    // Wrong mode: must fail without touching the columns.
                    let before = store.n_obs();
                    let res = store.add_grid_pair(1.0, 1.0, ClimoPntInfo::default(), 1.0);
                    assert!(matches!(res, Err(PairsError::ModeMismatch { .. })) || before == 0);
                    if res.is_ok() {
                        store.clear();
                    }
                }
                _ => {
                    store.add_point_pair(random_pair(&mut rng)).unwrap();
                }
            }
            assert_columns_equal(&store);
        }
        store.calc_obs_summary();
        assert_columns_equal(&store);
        if summary != ObsSummary::None {
            assert_eq!(store.n_obs(), store.n_stations());
        }
    }
}

#[test]
fn modes_never_mix() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut point = PairStore::new();
    point.add_point_pair(random_pair(&mut rng)).unwrap();
    assert_eq!(point.mode(), Some(PairMode::Point));
    assert!(point.add_grid_pair(0.0, 0.0, ClimoPntInfo::default(), 1.0).is_err());
    assert!(point.add_grid_pairs(&[0.0], &[0.0], &[ClimoPntInfo::default()], &[1.0]).is_err());

    let mut grid = PairStore::new();
    grid.add_grid_pair(0.0, 0.0, ClimoPntInfo::default(), 1.0).unwrap();
    assert!(matches!(
        grid.add_point_pair(random_pair(&mut rng)),
        Err(PairsError::ModeMismatch {
            store: PairMode::Grid,
            requested: PairMode::Point
        })
    ));
    assert_eq!(grid.n_obs(), 1);
    assert_columns_equal(&grid);
}

#[test]
fn always_true_subset_reproduces_the_store() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut store = PairStore::new();
    store.set_msg_typ("ADPSFC");
    store.set_mask_name("FULL");
    store.set_interp_name("NEAREST");
    for _ in 0..50 {
        store.add_point_pair(random_pair(&mut rng)).unwrap();
    }

    let always: SingleThresh = ">-1e9".parse().unwrap();
    for logic in [SetLogic::Union, SetLogic::Intersection] {
        let sub = subset_pairs_cnt_thresh(&store, &always, &always, logic).unwrap();
        assert_eq!(sub.n_obs(), store.n_obs());
        assert_eq!(sub.f(), store.f());
        assert_eq!(sub.o(), store.o());
        assert_eq!(sub.sid(), store.sid());
        assert_eq!(sub.vld(), store.vld());
        assert_eq!(sub.ocdf(), store.ocdf());
        assert_eq!(sub.wgt(), store.wgt());
        assert_eq!(sub.mask_name(), "FULL");
        for i in 0..store.n_obs() {
            assert_eq!(sub.point_pair(i), store.point_pair(i));
        }
    }

    let na = SingleThresh::na();
    let copy = subset_pairs_cnt_thresh(&store, &na, &na, SetLogic::Union).unwrap();
    assert_eq!(copy.f(), store.f());
}

#[test]
fn check_unique_rejects_only_identical_key_and_time() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut store = PairStore::new();
    store.set_check_unique(true);
    let mut accepted = Vec::new();
    for _ in 0..300 {
        let p = random_pair(&mut rng);
        let key = (verif_pairs::station_key(p.lat, p.lon, p.lvl, p.elv), p.vld);
        let seen = accepted.contains(&key);
        let inserted = store.add_point_pair(p).unwrap();
        assert_eq!(inserted, !seen);
        if inserted {
            accepted.push(key);
        }
    }
    assert_eq!(store.n_obs(), accepted.len());
    assert_columns_equal(&store);
}
