use proptest::prelude::*;
use srctag::tagger::score::{competition_ranks, log_exp_variance, min_max, row_weights, similarities, WeightPolicy};

proptest! {
    // Higher raw score never gets a lower rank; ties share a rank
    #[test]
    fn ranks_follow_raw_order(values in prop::collection::vec(-100.0f64..100.0, 1..20)) {
        let ranks = competition_ranks(&values);
        for i in 0..values.len() {
            for j in 0..values.len() {
                if values[i] > values[j] {
                    prop_assert!(ranks[i] > ranks[j]);
                } else if values[i] == values[j] {
                    prop_assert_eq!(ranks[i], ranks[j]);
                }
            }
        }
        prop_assert!(ranks.iter().all(|r| *r >= 1.0 && *r <= values.len() as f64));
    }

    #[test]
    fn normalized_values_stay_in_unit_interval(values in prop::collection::vec(-1.0e3f64..1.0e3, 0..20)) {
        for v in min_max(&values).into_iter().chain(similarities(&values)) {
            prop_assert!((0.0..=1.0).contains(&v));
        }
    }

    // Equal distances never divide by zero
    #[test]
    fn uniform_distances_are_fully_similar(d in 0.0f64..2.0, n in 1usize..10) {
        prop_assert!(similarities(&vec![d; n]).into_iter().all(|s| s == 1.0));
    }

    // Exponents far past exp's range still give weights in [0, 1]
    #[test]
    fn row_weights_are_bounded(
        rows in prop::collection::vec(prop::collection::vec(-2.0e3f64..2.0e3, 0..6), 0..10),
        uniform in any::<bool>(),
    ) {
        let policy = if uniform { WeightPolicy::PenalizeUniform } else { WeightPolicy::PenalizeVarying };
        let log_vars: Vec<f64> = rows.iter().map(|r| log_exp_variance(r)).collect();
        for w in row_weights(&log_vars, policy) {
            prop_assert!((0.0..=1.0).contains(&w));
        }
    }
}
