//! Property-based tests for the statistical core
//!
//! Covers block aggregation, Holm correction, ROI naming, the truncated-normal
//! generator and permutation p-values. Case counts are kept small so the
//! suite runs in seconds.

use connectome_ksample::aggregate::aggregate;
use connectome_ksample::compare::lookup_roi_name;
use connectome_ksample::config::{DistributionParams, SimulationConfig};
use connectome_ksample::correction::holm;
use connectome_ksample::dataset::{Atlas, Block, HEMISPHERE_SIZE};
use connectome_ksample::ksample::{KSample, TestKind, Workers};
use connectome_ksample::simulation::{prepare_samples, run_sweep, twin_truncnorm};
use ndarray::Array2;
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_aggregate_is_symmetric_and_preserves_mass(
        values in prop::collection::vec(0.0f64..10.0, 36),
        split in 1usize..6,
    ) {
        // Property: block sums are symmetric; on a symmetric graph the
        // upper triangle plus diagonal of the block matrix covers every edge
        let raw = Array2::from_shape_vec((6, 6), values).unwrap();
        let graph = &raw + &raw.t();
        let blocks = vec![Block::new("a", "left", 0, split), Block::new("b", "left", split, 6)];

        let agg = aggregate(&graph, &blocks);
        prop_assert_eq!(&agg, &agg.t());

        let covered = agg[[0, 0]] + agg[[1, 1]] + 2.0 * agg[[0, 1]];
        prop_assert!((covered - graph.sum()).abs() < 1e-9);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_holm_bounds_and_order(pvalues in prop::collection::vec(0.0f64..=1.0, 1..30)) {
        let adjusted = holm(&pvalues);
        prop_assert_eq!(adjusted.len(), pvalues.len());

        for (&p, &a) in pvalues.iter().zip(&adjusted) {
            // Property: adjustment never lowers a p-value and stays in [0, 1]
            prop_assert!(a >= p);
            prop_assert!((0.0..=1.0).contains(&a));
        }

        // Property: adjusted values follow the order of the raw values
        for i in 0..pvalues.len() {
            for j in 0..pvalues.len() {
                if pvalues[i] < pvalues[j] {
                    prop_assert!(adjusted[i] <= adjusted[j]);
                }
            }
        }
    }

    #[test]
    fn prop_holm_passes_nan_through(
        pvalues in prop::collection::vec(0.0f64..=1.0, 1..10),
        nan_at in 0usize..10,
    ) {
        let mut with_nan = pvalues.clone();
        let at = nan_at.min(with_nan.len());
        with_nan.insert(at, f64::NAN);

        let adjusted = holm(&with_nan);
        prop_assert!(adjusted[at].is_nan());

        let mut expected = holm(&pvalues);
        expected.insert(at, f64::NAN);
        for (a, e) in adjusted.iter().zip(&expected) {
            prop_assert!(a.is_nan() == e.is_nan());
            if !a.is_nan() {
                prop_assert!((a - e).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn prop_roi_name_hemisphere(index in 0usize..(2 * HEMISPHERE_SIZE)) {
        let atlas: Atlas = (1..=HEMISPHERE_SIZE)
            .map(|roi| (roi, format!("roi{}", roi)))
            .collect();

        let name = lookup_roi_name(index, &atlas).unwrap();
        let roi = index % HEMISPHERE_SIZE + 1;
        let hemisphere = if index < HEMISPHERE_SIZE { "L" } else { "R" };
        prop_assert_eq!(name, format!("roi{} ({})", roi, hemisphere));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    #[test]
    fn prop_twin_truncnorm_shape_and_bounds(
        n_subjects in 1usize..20,
        n_vertices in 1usize..8,
        mu in -1.0f64..1.0,
        sigma in 0.05f64..1.0,
        seed in any::<u64>(),
    ) {
        let params = DistributionParams::new("p", mu, sigma, -mu, sigma);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let data = twin_truncnorm(&params, n_subjects, n_vertices, (-1.0, 1.0), &mut rng).unwrap();

        prop_assert_eq!(data.samples.dim(), (2 * n_subjects, n_vertices));
        prop_assert!(data.samples.iter().all(|v| (-1.0..=1.0).contains(v)));
        for (row, &label) in data.labels.iter().enumerate() {
            prop_assert_eq!(label, row % 2);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(10))]

    #[test]
    fn prop_permutation_pvalue_range(seed in any::<u64>(), reps in 10usize..50) {
        let params = DistributionParams::new("equal", 0.0, 0.25, 0.0, 0.25);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let data = twin_truncnorm(&params, 6, 3, (-1.0, 1.0), &mut rng).unwrap();
        let groups = prepare_samples(&data, false, false);

        let result = KSample::new(TestKind::Dcorr)
            .with_reps(reps)
            .with_workers(Workers::Fixed(1))
            .with_seed(seed)
            .test(&groups)
            .unwrap();

        // Property: p = (1 + hits) / (1 + reps), so at least 1 / (1 + reps)
        prop_assert!(result.pvalue >= 1.0 / (1 + reps) as f64 - 1e-12);
        prop_assert!(result.pvalue <= 1.0);
        prop_assert_eq!(result.null_distribution.len(), reps);
        let hits = result.pvalue * (1 + reps) as f64 - 1.0;
        prop_assert!((hits - hits.round()).abs() < 1e-9);
    }
}

#[test]
fn test_equal_distributions_keep_nominal_false_positive_rate() {
    let params = DistributionParams::new("equal", 0.0, 0.25, 0.0, 0.25);
    let trials = 40;
    let mut rejections = 0;

    for trial in 0..trials {
        let mut rng = ChaCha8Rng::seed_from_u64(1000 + trial);
        let data = twin_truncnorm(&params, 10, 4, (-1.0, 1.0), &mut rng).unwrap();
        let groups = prepare_samples(&data, false, false);
        let result = KSample::new(TestKind::Dcorr)
            .with_reps(99)
            .with_workers(Workers::Fixed(1))
            .with_seed(trial)
            .test(&groups)
            .unwrap();
        if result.pvalue < 0.05 {
            rejections += 1;
        }
    }

    // Expected 2 of 40; 8 or more would be far outside binomial noise
    assert!(rejections < 8, "{} of {} rejected", rejections, trials);
}

#[test]
fn test_mgc_sweep_on_equal_distributions_rejects_near_alpha() {
    let config = SimulationConfig {
        n_subjects: vec![10],
        iterations: 100,
        reps: 199,
        test: TestKind::Mgc,
        seed: 0,
        distributions: vec![DistributionParams::new("equal", 0.0, 0.25, 0.0, 0.25)],
        ..SimulationConfig::default()
    };

    let rows = run_sweep(&config, true).unwrap();
    assert_eq!(rows.len(), 4 * 100);

    for binarize in [true, false] {
        for average in [true, false] {
            let setting: Vec<_> = rows
                .iter()
                .filter(|r| r.binarize == binarize && r.average == average)
                .collect();
            assert_eq!(setting.len(), 100);
            assert!(setting.iter().all(|r| r.sample_size == 20));

            let rejected = setting.iter().filter(|r| r.pvalue < 0.05).count();
            // Binomial(100, 0.05): 15 or more is a 1e-4 event
            assert!(
                rejected < 15,
                "binarize={} average={}: {} of 100 rejected",
                binarize,
                average,
                rejected
            );
        }
    }
}
