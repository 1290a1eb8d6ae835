//! Built-in studies.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::{FeatureDistribution, GroundTruth, LambdaKey};
use crate::math::Basis;
use crate::models::{ForestParams, ModelSpec, TreeParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// Underfit vs correct vs overfit OLS on `y = x1^2 - 1.5*x1`.
    Tradeoff,
    /// Lasso λ sweep over a quadratic basis on `y = x1^2 - 1.5*x2`.
    Lasso,
    /// Full OLS against a regression tree and a random forest.
    Trees,
}

impl Preset {
    pub fn display_name(&self) -> &'static str {
        match self {
            Preset::Tradeoff => "tradeoff",
            Preset::Lasso => "lasso",
            Preset::Trees => "trees",
        }
    }

    pub fn truth(&self) -> GroundTruth {
        match self {
            Preset::Tradeoff | Preset::Trees => GroundTruth::quadratic_x1(),
            Preset::Lasso => GroundTruth::quadratic_x1_linear_x2(),
        }
    }

    pub fn features(&self) -> Vec<FeatureDistribution> {
        vec![FeatureDistribution::default(); 2]
    }

    pub fn models(&self) -> Vec<ModelSpec> {
        match self {
            Preset::Tradeoff => vec![
                ModelSpec::ols("simple", Basis::identity(&[0])),
                ModelSpec::ols("true", Basis::poly(&[0], 2)),
                ModelSpec::ols("full", Basis::poly(&[0, 1], 2)),
            ],
            Preset::Lasso => vec![
                ModelSpec::ols("full", Basis::poly(&[0, 1], 2)),
                ModelSpec::lasso("lasso", Basis::poly(&[0, 1], 2), lasso_sweep()),
            ],
            Preset::Trees => vec![
                ModelSpec::ols("full", Basis::poly(&[0, 1], 2)),
                ModelSpec::tree("tree", Basis::identity(&[0, 1]), TreeParams::default()),
                ModelSpec::forest("forest", Basis::identity(&[0, 1]), ForestParams::default()),
            ],
        }
    }
}

/// λ = 0, 0.01, ..., 0.4.
fn lasso_sweep() -> Vec<f64> {
    (0..=40)
        .map(|i| LambdaKey::canonical(i as f64 / 100.0).value())
        .collect()
}
