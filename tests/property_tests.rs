//! Property-based tests for the aggregation and sampling invariants.
//!
//! - bias² + variance reproduces MSE for every group, also far from zero
//! - aggregation is a pure function of the record multiset
//! - noiseless samples lie exactly on the ground truth

use bvsim::data::DataGenerator;
use bvsim::domain::{GroundTruth, LambdaKey, ModelKey, SimulationRecord};
use bvsim::sim::BiasVarianceAggregator;
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn keys() -> Vec<ModelKey> {
    vec![
        ModelKey::plain("simple"),
        ModelKey::penalized("lasso", LambdaKey::canonical(0.0)),
        ModelKey::penalized("lasso", LambdaKey::canonical(0.25)),
    ]
}

/// Records for every key at two points, one prediction per run.
fn arb_records() -> impl Strategy<Value = Vec<SimulationRecord>> {
    (1usize..40).prop_flat_map(|runs| {
        proptest::collection::vec(-100.0f64..100.0, runs * keys().len() * 2).prop_map(
            move |preds| {
                let mut out = Vec::with_capacity(preds.len());
                let mut it = preds.into_iter();
                for run in 0..runs {
                    for key in keys() {
                        for point in 0..2 {
                            if let Some(prediction) = it.next() {
                                out.push(SimulationRecord {
                                    run,
                                    key: key.clone(),
                                    point,
                                    prediction,
                                    nonzero_coefs: key.lambda.map(|_| 3),
                                });
                            }
                        }
                    }
                }
                out
            },
        )
    })
}

fn arb_truth() -> impl Strategy<Value = Vec<f64>> {
    proptest::collection::vec(-10.0f64..10.0, 2)
}

/// Predictions and truth sharing a large common offset with a spread of
/// at most 1 around it.
fn arb_offset_study() -> impl Strategy<Value = (Vec<SimulationRecord>, Vec<f64>)> {
    (arb_records(), -1e8f64..1e8, arb_truth()).prop_map(|(records, offset, truth)| {
        let records = records
            .into_iter()
            .map(|r| SimulationRecord {
                prediction: offset + r.prediction / 100.0,
                ..r
            })
            .collect();
        let truth = truth.into_iter().map(|t| offset + t / 10.0).collect();
        (records, truth)
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: MSE = bias² + variance within the relative tolerance
    #[test]
    fn prop_mse_decomposes(records in arb_records(), truth in arb_truth()) {
        let agg = BiasVarianceAggregator::new(truth).aggregate(&records).unwrap();
        prop_assert_eq!(agg.len(), keys().len() * 2);
        for stats in agg.values() {
            let gap = (stats.mse - (stats.bias_sq + stats.variance)).abs();
            prop_assert!(gap <= 1e-9 * stats.mse.max(1.0), "gap {}", gap);
            prop_assert!(stats.variance >= 0.0);
            prop_assert!(stats.mse + 1e-9 >= stats.variance);
        }
    }

    /// Property: a large shared offset neither fails the identity check nor
    /// inflates the spread statistics
    #[test]
    fn prop_offset_does_not_cancel((records, truth) in arb_offset_study()) {
        let agg = BiasVarianceAggregator::new(truth).aggregate(&records);
        prop_assert!(agg.is_ok(), "{:?}", agg.err());
        for stats in agg.unwrap().values() {
            let gap = (stats.mse - (stats.bias_sq + stats.variance)).abs();
            prop_assert!(gap <= 1e-9 * stats.mse.max(1.0), "gap {}", gap);
            prop_assert!(stats.variance <= 1.0 + 1e-6, "variance {}", stats.variance);
            prop_assert!(stats.bias_sq <= 4.0 + 1e-6, "bias² {}", stats.bias_sq);
        }
    }

    /// Property: shuffling the input changes nothing, bit for bit
    #[test]
    fn prop_aggregation_is_order_independent(
        (records, shuffled) in arb_records().prop_flat_map(|r| (Just(r.clone()), Just(r).prop_shuffle())),
        truth in arb_truth(),
    ) {
        let agg = BiasVarianceAggregator::new(truth);
        let a = agg.aggregate(&records).unwrap();
        let b = agg.aggregate(&shuffled).unwrap();
        prop_assert_eq!(a.len(), b.len());
        for (key, sa) in &a {
            let sb = &b[key];
            prop_assert_eq!(sa.mse.to_bits(), sb.mse.to_bits());
            prop_assert_eq!(sa.variance.to_bits(), sb.variance.to_bits());
            prop_assert_eq!(sa.bias_sq.to_bits(), sb.bias_sq.to_bits());
        }
    }

    /// Property: λ canonicalization is idempotent
    #[test]
    fn prop_lambda_key_idempotent(lambda in 0.0f64..10.0) {
        let key = LambdaKey::canonical(lambda);
        prop_assert_eq!(LambdaKey::canonical(key.value()), key);
        prop_assert!((key.value() - lambda).abs() <= 5e-7);
    }

    /// Property: noiseless targets equal the truth at the drawn features
    #[test]
    fn prop_noiseless_samples_follow_truth(seed in any::<u64>(), n in 1usize..80) {
        let generator = DataGenerator::uniform(GroundTruth::quadratic_x1_linear_x2(), 3).unwrap();
        let data = generator.generate(n, 0.0, Some(seed)).unwrap();
        for i in 0..data.n() {
            prop_assert_eq!(data.y[i], generator.truth().eval(&data.row(i)));
        }
    }
}
