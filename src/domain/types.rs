//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory while a study runs
//! - described in TOML study configs
//! - exported to JSON/CSV after aggregation

use std::fmt;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Number of decimal places kept when canonicalizing a penalty strength.
pub const LAMBDA_DECIMALS: u32 = 6;

const LAMBDA_SCALE: f64 = 1e6;

/// Column name used for feature `j` (0-based) in reports and datasets.
pub fn feature_name(j: usize) -> String {
    format!("x{}", j + 1)
}

/// Sampling law for one generated feature column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureDistribution {
    /// Continuous uniform on `[low, high)`.
    Uniform { low: f64, high: f64 },
    /// 0/1 indicator with `P(x = 1) = p`.
    Bernoulli { p: f64 },
}

impl Default for FeatureDistribution {
    fn default() -> Self {
        FeatureDistribution::Uniform { low: 0.0, high: 1.0 }
    }
}

impl fmt::Display for FeatureDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureDistribution::Uniform { low, high } => write!(f, "uniform({low}, {high})"),
            FeatureDistribution::Bernoulli { p } => write!(f, "bernoulli({p})"),
        }
    }
}

/// One monomial `coef * Π x_j^powers[j]` of a ground-truth function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub coef: f64,
    /// Exponent per feature; missing trailing entries are zero.
    pub powers: Vec<u32>,
}

impl Term {
    pub fn new(coef: f64, powers: &[u32]) -> Self {
        Self {
            coef,
            powers: powers.to_vec(),
        }
    }

    fn eval(&self, x: &[f64]) -> f64 {
        self.powers
            .iter()
            .zip(x.iter())
            .filter(|(p, _)| **p > 0)
            .fold(self.coef, |acc, (&p, &xj)| acc * xj.powi(p as i32))
    }
}

/// The known, noiseless data-generating relationship of a study.
///
/// A sum of monomial terms. Fixed for the lifetime of a study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruth {
    pub terms: Vec<Term>,
}

impl GroundTruth {
    /// `y = x1² − 1.5·x1`
    pub fn quadratic_x1() -> Self {
        Self {
            terms: vec![Term::new(1.0, &[2]), Term::new(-1.5, &[1])],
        }
    }

    /// `y = x1² − 1.5·x2`
    pub fn quadratic_x1_linear_x2() -> Self {
        Self {
            terms: vec![Term::new(1.0, &[2, 0]), Term::new(-1.5, &[0, 1])],
        }
    }

    /// Expected target at `x`.
    pub fn eval(&self, x: &[f64]) -> f64 {
        self.terms.iter().map(|t| t.eval(x)).sum()
    }

    /// Number of leading features the function actually depends on.
    pub fn required_features(&self) -> usize {
        self.terms
            .iter()
            .filter_map(|t| t.powers.iter().rposition(|&p| p > 0))
            .map(|j| j + 1)
            .max()
            .unwrap_or(0)
    }
}

impl Default for GroundTruth {
    fn default() -> Self {
        Self::quadratic_x1()
    }
}

impl fmt::Display for GroundTruth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "0");
        }
        for (i, term) in self.terms.iter().enumerate() {
            let mut factors = Vec::new();
            for (j, &p) in term.powers.iter().enumerate() {
                match p {
                    0 => {}
                    1 => factors.push(feature_name(j)),
                    _ => factors.push(format!("{}^{p}", feature_name(j))),
                }
            }
            let magnitude = term.coef.abs();
            let body = match (factors.is_empty(), magnitude == 1.0) {
                (true, _) => format!("{magnitude}"),
                (false, true) => factors.join("*"),
                (false, false) => format!("{magnitude}*{}", factors.join("*")),
            };
            match (i, term.coef < 0.0) {
                (0, true) => write!(f, "-{body}")?,
                (0, false) => write!(f, "{body}")?,
                (_, true) => write!(f, " - {body}")?,
                (_, false) => write!(f, " + {body}")?,
            }
        }
        Ok(())
    }
}

/// A synthetic labeled sample: `n × k` features plus one target per row.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    pub x: DMatrix<f64>,
    pub y: DVector<f64>,
}

impl Dataset {
    pub fn n(&self) -> usize {
        self.y.len()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    pub fn row(&self, i: usize) -> Vec<f64> {
        self.x.row(i).iter().copied().collect()
    }
}

/// Canonical penalty strength, rounded to [`LAMBDA_DECIMALS`] places.
///
/// Grouping by λ must be exact-match; two floats that print the same but
/// differ in the last ulp map to the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LambdaKey(i64);

impl LambdaKey {
    pub fn canonical(lambda: f64) -> Self {
        LambdaKey((lambda * LAMBDA_SCALE).round() as i64)
    }

    pub fn value(self) -> f64 {
        self.0 as f64 / LAMBDA_SCALE
    }
}

impl fmt::Display for LambdaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

impl Serialize for LambdaKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.value())
    }
}

impl<'de> Deserialize<'de> for LambdaKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        f64::deserialize(deserializer).map(LambdaKey::canonical)
    }
}

/// Grouping key for records and aggregates.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModelKey {
    pub model: String,
    pub lambda: Option<LambdaKey>,
}

impl ModelKey {
    pub fn plain(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            lambda: None,
        }
    }

    pub fn penalized(model: impl Into<String>, lambda: LambdaKey) -> Self {
        Self {
            model: model.into(),
            lambda: Some(lambda),
        }
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.lambda {
            Some(l) => write!(f, "{}[lambda={l}]", self.model),
            None => write!(f, "{}", self.model),
        }
    }
}

/// One prediction of one model at one evaluation point in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRecord {
    pub run: usize,
    pub key: ModelKey,
    /// Index into the study's evaluation points.
    pub point: usize,
    pub prediction: f64,
    /// Non-zero coefficient count (penalized regression only).
    pub nonzero_coefs: Option<usize>,
}

/// A model that could not be fit (or predicted non-finite values) in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitFailure {
    pub run: usize,
    pub model: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ground_truth_presets_evaluate() {
        let t = GroundTruth::quadratic_x1();
        assert_eq!(t.eval(&[0.0, 0.7]), 0.0);
        assert!((t.eval(&[1.0, 0.0]) - (-0.5)).abs() < 1e-15);
        assert_eq!(t.required_features(), 1);

        let t2 = GroundTruth::quadratic_x1_linear_x2();
        assert!((t2.eval(&[0.5, 1.0]) - (0.25 - 1.5)).abs() < 1e-15);
        assert_eq!(t2.required_features(), 2);
    }

    #[test]
    fn ground_truth_displays_as_formula() {
        assert_eq!(GroundTruth::quadratic_x1().to_string(), "x1^2 - 1.5*x1");
        assert_eq!(
            GroundTruth::quadratic_x1_linear_x2().to_string(),
            "x1^2 - 1.5*x2"
        );
    }

    #[test]
    fn lambda_key_absorbs_float_noise() {
        let a = LambdaKey::canonical(0.1 + 0.2);
        let b = LambdaKey::canonical(0.3);
        assert_eq!(a, b);
        assert_eq!(a.value(), 0.3);
        assert_ne!(LambdaKey::canonical(0.3), LambdaKey::canonical(0.300001));
    }

    #[test]
    fn model_key_orders_by_name_then_lambda() {
        let mut keys = vec![
            ModelKey::penalized("lasso", LambdaKey::canonical(0.2)),
            ModelKey::plain("full"),
            ModelKey::penalized("lasso", LambdaKey::canonical(0.0)),
        ];
        keys.sort();
        assert_eq!(keys[0], ModelKey::plain("full"));
        assert_eq!(keys[1].lambda, Some(LambdaKey::canonical(0.0)));
    }
}
