//! Path-dependent tree SHAP for [`TreeEnsemble`].
//!
//! Attributions are in margin (log-odds) space and satisfy local accuracy:
//! `expected_value + sum(phi) == margin(x)`. The feature schema is narrow, so
//! Shapley values are computed exactly by evaluating every coalition instead of
//! the polynomial path-tracking variant.

use std::sync::Arc;

use crate::ml::ensemble::TreeEnsemble;
use crate::ml::{Explainer, ModelError};

const MAX_EXACT_FEATURES: usize = 16;

pub struct TreeExplainer {
    model: Arc<TreeEnsemble>,
    expected_value: f64,
    /// `weights[k]` = k! (n-k-1)! / n! for a coalition of size k.
    weights: Vec<f64>,
}

impl TreeExplainer {
    pub fn new(model: Arc<TreeEnsemble>) -> Result<Self, ModelError> {
        let n = model.num_features();
        if n == 0 || n > MAX_EXACT_FEATURES {
            return Err(ModelError::Unsupported(format!(
                "exact attribution over {} features",
                n
            )));
        }
        let expected_value = model.trees().iter().map(|t| t.expected_value()).sum();
        Ok(Self {
            weights: shapley_weights(n),
            expected_value,
            model,
        })
    }

    /// Mean margin over the training distribution (cover-weighted).
    pub fn expected_value(&self) -> f64 {
        self.expected_value
    }

    fn coalition_values(&self, x: &[f64]) -> Vec<f64> {
        let n = self.model.num_features();
        (0..1u32 << n)
            .map(|mask| {
                self.model
                    .trees()
                    .iter()
                    .map(|t| t.conditional_expectation(0, x, mask))
                    .sum()
            })
            .collect()
    }
}

impl Explainer for TreeExplainer {
    fn explain(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        self.model.check_input(features)?;
        let n = features.len();
        let values = self.coalition_values(features);

        let mut phi = vec![0.0; n];
        for (i, slot) in phi.iter_mut().enumerate() {
            let bit = 1u32 << i;
            *slot = (0..1u32 << n)
                .filter(|mask| mask & bit == 0)
                .map(|mask| {
                    let size = mask.count_ones() as usize;
                    self.weights[size] * (values[(mask | bit) as usize] - values[mask as usize])
                })
                .sum();
        }

        if phi.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::Numeric("attribution produced a non-finite value".into()));
        }
        Ok(phi)
    }
}

fn shapley_weights(n: usize) -> Vec<f64> {
    let factorial = |k: usize| (1..=k).map(|v| v as f64).product::<f64>();
    let total = factorial(n);
    (0..n)
        .map(|k| factorial(k) * factorial(n - k - 1) / total)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::ensemble::tests::sample;

    fn explainer() -> TreeExplainer {
        TreeExplainer::new(Arc::new(sample())).unwrap()
    }

    #[test]
    fn weights_cover_all_orderings() {
        let w = shapley_weights(5);
        // sum over coalition sizes of C(n-1, k) * w[k] must be 1
        let binom = [1.0, 4.0, 6.0, 4.0, 1.0];
        let total: f64 = w.iter().zip(binom).map(|(a, b)| a * b).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn expected_value_is_cover_weighted() {
        // tree0: 0.7*-1.2 + 0.3*0.9; tree1: 0.4*(25/40*0.3 + 15/40*0.8) + 0.6*-0.4; tree2: 0.05
        let want = (0.7 * -1.2 + 0.3 * 0.9)
            + (0.4 * (0.625 * 0.3 + 0.375 * 0.8) + 0.6 * -0.4)
            + 0.05;
        assert!((explainer().expected_value() - want).abs() < 1e-12);
    }

    #[test]
    fn attributions_are_locally_accurate() {
        let e = explainer();
        let model = sample();
        for x in [
            [80.0, 30.0, 3.0, 4.0, 0.0],
            [20.0, 10.0, 1.0, 0.0, 1.0],
            [55.0, 0.0, 0.0, 2.0, 1.0],
        ] {
            let phi = e.explain(&x).unwrap();
            let total: f64 = phi.iter().sum::<f64>() + e.expected_value();
            assert!((total - model.margin(&x).unwrap()).abs() < 1e-9);
        }
    }

    #[test]
    fn unused_features_get_zero() {
        let phi = explainer().explain(&[80.0, 30.0, 3.0, 4.0, 0.0]).unwrap();
        assert_eq!(phi[1], 0.0);
        assert_eq!(phi[2], 0.0);
    }

    #[test]
    fn single_stump_attribution_matches_closed_form() {
        let phi = explainer().explain(&[80.0, 30.0, 3.0, 4.0, 1.0]).unwrap();
        // url_length only appears in tree0: phi = 0.9 - E[tree0]
        assert!((phi[0] - (0.9 - (0.7 * -1.2 + 0.3 * 0.9))).abs() < 1e-12);
        assert!(phi[0] > 0.0);
    }

    #[test]
    fn rejects_wrong_width() {
        assert!(matches!(
            explainer().explain(&[1.0; 3]),
            Err(ModelError::Shape { expected: 5, actual: 3 })
        ));
    }
}
