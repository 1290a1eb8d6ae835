//! Model specifications: a feature expansion plus a fitting rule.
//!
//! Specs are plain data (serde-friendly, so they can live in TOML study
//! configs) and are immutable once a family is built.

use nalgebra::DMatrix;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::{Dataset, LambdaKey};
use crate::error::SimError;
use crate::math::{Basis, LassoOptions, fit_ols, lasso_path};
use crate::models::model::{Fitted, FittedModel};
use crate::models::tree::{ForestParams, MAX_SAMPLE_RATE, RandomForest, RegressionTree, TreeParams};

fn default_standardize() -> bool {
    true
}

/// How a model turns an expanded design into a fitted predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimator {
    /// Ordinary least squares with an intercept.
    Ols,
    /// L1-penalized least squares, fit over the whole grid in one call.
    Lasso {
        #[serde(default)]
        lambdas: Vec<f64>,
        #[serde(default = "default_standardize")]
        standardize: bool,
    },
    /// Single CART regression tree.
    Tree(TreeParams),
    /// Bagged regression trees.
    Forest(ForestParams),
}

impl Estimator {
    pub fn label(&self) -> &'static str {
        match self {
            Estimator::Ols => "ols",
            Estimator::Lasso { .. } => "lasso",
            Estimator::Tree(_) => "tree",
            Estimator::Forest(_) => "forest",
        }
    }
}

/// A named model variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    pub basis: Basis,
    pub estimator: Estimator,
}

impl ModelSpec {
    pub fn ols(name: impl Into<String>, basis: Basis) -> Self {
        Self {
            name: name.into(),
            basis,
            estimator: Estimator::Ols,
        }
    }

    pub fn lasso(name: impl Into<String>, basis: Basis, lambdas: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            basis,
            estimator: Estimator::Lasso {
                lambdas,
                standardize: true,
            },
        }
    }

    pub fn tree(name: impl Into<String>, basis: Basis, params: TreeParams) -> Self {
        Self {
            name: name.into(),
            basis,
            estimator: Estimator::Tree(params),
        }
    }

    pub fn forest(name: impl Into<String>, basis: Basis, params: ForestParams) -> Self {
        Self {
            name: name.into(),
            basis,
            estimator: Estimator::Forest(params),
        }
    }

    /// Canonical λ keys this spec produces, in grid order (`None` if unpenalized).
    pub fn lambda_keys(&self) -> Option<Vec<LambdaKey>> {
        match &self.estimator {
            Estimator::Lasso { lambdas, .. } => {
                Some(lambdas.iter().map(|&l| LambdaKey::canonical(l)).collect())
            }
            _ => None,
        }
    }

    /// Check the spec against the number of generated features.
    pub fn validate(&self, n_features: usize) -> Result<(), SimError> {
        let context = |msg: String| SimError::invalid(format!("Model '{}': {msg}", self.name));
        if self.name.trim().is_empty() {
            return Err(SimError::invalid("Model names must be non-empty."));
        }
        self.basis
            .validate(n_features)
            .map_err(|e| context(e.to_string()))?;

        match &self.estimator {
            Estimator::Ols => {}
            Estimator::Lasso { lambdas, .. } => {
                if lambdas.is_empty() {
                    return Err(context("lambda grid is empty.".to_string()));
                }
                if let Some(bad) = lambdas.iter().find(|l| !(l.is_finite() && **l >= 0.0)) {
                    return Err(context(format!("lambda must be finite and >= 0, got {bad}.")));
                }
                let mut keys: Vec<LambdaKey> =
                    lambdas.iter().map(|&l| LambdaKey::canonical(l)).collect();
                keys.sort();
                if keys.windows(2).any(|w| w[0] == w[1]) {
                    return Err(context(
                        "lambda grid has values that coincide after rounding.".to_string(),
                    ));
                }
            }
            Estimator::Tree(params) => {
                if params.min_samples_leaf == 0 {
                    return Err(context("min_samples_leaf must be >= 1.".to_string()));
                }
            }
            Estimator::Forest(params) => {
                if params.n_trees == 0 {
                    return Err(context("n_trees must be >= 1.".to_string()));
                }
                if params.min_samples_leaf == 0 {
                    return Err(context("min_samples_leaf must be >= 1.".to_string()));
                }
                if !(params.sample_rate > 0.0 && params.sample_rate <= MAX_SAMPLE_RATE) {
                    return Err(context(format!(
                        "sample_rate must be in (0, {MAX_SAMPLE_RATE}], got {}.",
                        params.sample_rate
                    )));
                }
                if !(params.max_features_ratio > 0.0 && params.max_features_ratio <= 1.0) {
                    return Err(context(format!(
                        "max_features_ratio must be in (0, 1], got {}.",
                        params.max_features_ratio
                    )));
                }
            }
        }
        Ok(())
    }

    /// Fit this spec on one dataset.
    ///
    /// Unpenalized estimators return one entry keyed `None`; a lasso returns
    /// one entry per grid value, in grid order.
    pub fn fit<R: Rng + ?Sized>(
        &self,
        data: &Dataset,
        rng: &mut R,
    ) -> Result<Vec<(Option<LambdaKey>, FittedModel)>, SimError> {
        let expansion = self.basis.expansion();
        if expansion.required_inputs() > data.n_features() {
            return Err(SimError::invalid(format!(
                "Model '{}' needs {} feature(s) but the dataset has {}.",
                self.name,
                expansion.required_inputs(),
                data.n_features()
            )));
        }
        let z: DMatrix<f64> = expansion.design(&data.x);
        let n_inputs = data.n_features();
        let wrap = |fitted: Fitted| FittedModel::new(expansion.clone(), n_inputs, fitted);

        match &self.estimator {
            Estimator::Ols => {
                let (intercept, coefs) = fit_ols(&z, &data.y)
                    .map_err(|e| SimError::degenerate(&self.name, e.to_string()))?;
                Ok(vec![(
                    None,
                    wrap(Fitted::Linear {
                        intercept,
                        coefs,
                        penalized: false,
                    }),
                )])
            }
            Estimator::Lasso {
                lambdas,
                standardize,
            } => {
                let opts = LassoOptions {
                    standardize: *standardize,
                    ..LassoOptions::default()
                };
                let path = lasso_path(&z, &data.y, lambdas, &opts)
                    .map_err(|e| SimError::degenerate(&self.name, e.to_string()))?;
                Ok(path
                    .into_iter()
                    .map(|fit| {
                        (
                            Some(LambdaKey::canonical(fit.lambda)),
                            wrap(Fitted::Linear {
                                intercept: fit.intercept,
                                coefs: fit.coefs,
                                penalized: true,
                            }),
                        )
                    })
                    .collect())
            }
            Estimator::Tree(params) => {
                let tree = RegressionTree::fit(&z, &data.y, params);
                Ok(vec![(None, wrap(Fitted::Tree(tree)))])
            }
            Estimator::Forest(params) => {
                let forest = RandomForest::fit(&z, &data.y, params, rng);
                Ok(vec![(None, wrap(Fitted::Forest(forest)))])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DVector;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn dataset() -> Dataset {
        let x = DMatrix::from_row_slice(
            6,
            2,
            &[0.1, 0.9, 0.4, 0.2, 0.5, 0.7, 0.8, 0.3, 0.2, 0.6, 0.9, 0.1],
        );
        let y = DVector::from_row_slice(&[0.3, 1.1, 0.6, 2.0, 0.2, 2.4]);
        Dataset {
            feature_names: vec!["x1".into(), "x2".into()],
            x,
            y,
        }
    }

    #[test]
    fn lasso_at_zero_matches_ols_predictions() {
        let data = dataset();
        let mut rng = StdRng::seed_from_u64(1);
        let basis = Basis::identity(&[0, 1]);
        let ols = ModelSpec::ols("ols", basis.clone()).fit(&data, &mut rng).unwrap();
        let lasso = ModelSpec::lasso("lasso", basis, vec![0.0])
            .fit(&data, &mut rng)
            .unwrap();
        assert_eq!(lasso[0].0, Some(LambdaKey::canonical(0.0)));
        for point in [[0.0, 0.0], [0.3, 0.8], [1.0, 1.0]] {
            let a = ols[0].1.predict(&point).unwrap();
            let b = lasso[0].1.predict(&point).unwrap();
            assert!((a - b).abs() <= 1e-6 * a.abs().max(1.0), "ols {a} lasso {b}");
        }
    }

    #[test]
    fn ols_with_too_many_terms_is_degenerate() {
        let data = dataset();
        let spec = ModelSpec::ols("wiggly", Basis::poly(&[0, 1], 3));
        let err = spec.fit(&data, &mut StdRng::seed_from_u64(1)).unwrap_err();
        assert!(matches!(err, SimError::DegenerateFit { ref model, .. } if model == "wiggly"));
    }

    #[test]
    fn lasso_grid_yields_one_model_per_lambda() {
        let data = dataset();
        let spec = ModelSpec::lasso("lasso", Basis::poly(&[0, 1], 2), vec![0.1, 0.0, 0.05]);
        let fits = spec.fit(&data, &mut StdRng::seed_from_u64(1)).unwrap();
        let keys: Vec<_> = fits.iter().map(|(k, _)| k.unwrap().value()).collect();
        assert_eq!(keys, vec![0.1, 0.0, 0.05]);
        assert!(fits.iter().all(|(_, m)| m.nonzero_coefs().is_some()));
    }

    #[test]
    fn validate_catches_bad_specs() {
        assert!(ModelSpec::ols("", Basis::identity(&[0])).validate(2).is_err());
        assert!(ModelSpec::lasso("l", Basis::identity(&[0]), vec![]).validate(2).is_err());
        assert!(
            ModelSpec::lasso("l", Basis::identity(&[0]), vec![-0.1])
                .validate(2)
                .is_err()
        );
        assert!(
            ModelSpec::lasso("l", Basis::identity(&[0]), vec![0.1, 0.1000000001])
                .validate(2)
                .is_err()
        );
        let forest = ForestParams {
            max_features_ratio: 0.0,
            ..ForestParams::default()
        };
        assert!(ModelSpec::forest("f", Basis::identity(&[0]), forest).validate(2).is_err());
        assert!(ModelSpec::tree("t", Basis::identity(&[0, 1]), TreeParams::default())
            .validate(2)
            .is_ok());
    }

    #[test]
    fn sample_rate_is_bounded() {
        let with_rate = |sample_rate| {
            let params = ForestParams {
                sample_rate,
                ..ForestParams::default()
            };
            ModelSpec::forest("f", Basis::identity(&[0]), params).validate(2)
        };
        for bad in [0.0, -1.0, 1e30, f64::INFINITY, f64::NAN] {
            assert!(with_rate(bad).is_err(), "{bad}");
        }
        assert!(with_rate(0.5).is_ok());
        assert!(with_rate(MAX_SAMPLE_RATE).is_ok());
    }
}
