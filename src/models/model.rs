//! Fitted models.
//!
//! A [`FittedModel`] pairs learned parameters with the [`Expansion`] it was
//! trained on. Prediction always goes through that expansion:
//!
//! - build the expanded row for the raw feature vector
//! - evaluate the linear predictor / tree / forest on it

use crate::error::SimError;
use crate::math::Expansion;
use crate::models::tree::{RandomForest, RegressionTree};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Fitted {
    Linear {
        intercept: f64,
        coefs: Vec<f64>,
        penalized: bool,
    },
    Tree(RegressionTree),
    Forest(RandomForest),
}

/// The result of fitting one model spec to one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedModel {
    expansion: Expansion,
    n_inputs: usize,
    fitted: Fitted,
}

impl FittedModel {
    pub(crate) fn new(expansion: Expansion, n_inputs: usize, fitted: Fitted) -> Self {
        Self {
            expansion,
            n_inputs,
            fitted,
        }
    }

    /// Predict the target at a raw feature vector.
    ///
    /// `x` must have the same number of features as the training data.
    pub fn predict(&self, x: &[f64]) -> Result<f64, SimError> {
        if x.len() != self.n_inputs {
            return Err(SimError::invalid(format!(
                "Feature vector has {} value(s); the model was fit on {} feature(s).",
                x.len(),
                self.n_inputs
            )));
        }
        let row = self.expansion.expand_row(x);
        Ok(match &self.fitted {
            Fitted::Linear {
                intercept, coefs, ..
            } => intercept + coefs.iter().zip(row.iter()).map(|(w, z)| w * z).sum::<f64>(),
            Fitted::Tree(tree) => tree.predict(&row),
            Fitted::Forest(forest) => forest.predict(&row),
        })
    }

    /// Non-zero coefficient count for penalized linear fits.
    pub fn nonzero_coefs(&self) -> Option<usize> {
        match &self.fitted {
            Fitted::Linear {
                coefs,
                penalized: true,
                ..
            } => Some(coefs.iter().filter(|w| **w != 0.0).count()),
            _ => None,
        }
    }

    /// Intercept and coefficients (in expansion column order) of linear fits.
    pub fn coefficients(&self) -> Option<(f64, &[f64])> {
        match &self.fitted {
            Fitted::Linear {
                intercept, coefs, ..
            } => Some((*intercept, coefs.as_slice())),
            _ => None,
        }
    }

    pub fn term_names(&self) -> Vec<String> {
        self.expansion.term_names()
    }
}
