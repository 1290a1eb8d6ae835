//! The model family: an ordered, named set of specs fit together on each dataset.
//!
//! Given one dataset, `ModelFamily::fit` fits every spec in declaration order
//! and keeps per-model outcomes separate: a degenerate fit of one model never
//! hides the fits of the others.

use std::collections::HashSet;

use rand::Rng;

use crate::domain::{Dataset, LambdaKey, ModelKey};
use crate::error::SimError;
use crate::models::{Estimator, FittedModel, ModelSpec};

/// Ordered mapping from model name to spec. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFamily {
    specs: Vec<ModelSpec>,
}

/// Outcome of fitting one spec on one dataset.
#[derive(Debug)]
pub struct FamilyEntry {
    pub model: String,
    pub outcome: Result<Vec<(Option<LambdaKey>, FittedModel)>, SimError>,
}

/// Outcomes of every spec of a family on one dataset, in family order.
#[derive(Debug)]
pub struct FamilyFit {
    pub entries: Vec<FamilyEntry>,
}

impl FamilyFit {
    /// Look up the fitted model for a key, if that model fit successfully.
    pub fn get(&self, key: &ModelKey) -> Option<&FittedModel> {
        let entry = self.entries.iter().find(|e| e.model == key.model)?;
        let fits = entry.outcome.as_ref().ok()?;
        fits.iter()
            .find(|(lambda, _)| *lambda == key.lambda)
            .map(|(_, m)| m)
    }
}

impl ModelFamily {
    pub fn new(specs: Vec<ModelSpec>) -> Result<Self, SimError> {
        if specs.is_empty() {
            return Err(SimError::invalid("Model family is empty."));
        }
        let mut seen = HashSet::new();
        for spec in &specs {
            if !seen.insert(spec.name.as_str()) {
                return Err(SimError::invalid(format!(
                    "Model name '{}' is used more than once.",
                    spec.name
                )));
            }
        }
        Ok(Self { specs })
    }

    pub fn specs(&self) -> &[ModelSpec] {
        &self.specs
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Check every spec against the number of generated features.
    pub fn validate(&self, n_features: usize) -> Result<(), SimError> {
        self.specs.iter().try_for_each(|s| s.validate(n_features))
    }

    /// Replace the λ grid of every penalized model.
    pub fn with_lambda_grid(mut self, grid: &[f64]) -> Self {
        for spec in &mut self.specs {
            if let Estimator::Lasso { lambdas, .. } = &mut spec.estimator {
                *lambdas = grid.to_vec();
            }
        }
        self
    }

    /// Every key a successful fit of this family produces, in family order.
    pub fn keys(&self) -> Vec<ModelKey> {
        let mut out = Vec::new();
        for spec in &self.specs {
            match spec.lambda_keys() {
                Some(lambdas) => {
                    out.extend(lambdas.into_iter().map(|l| ModelKey::penalized(&spec.name, l)))
                }
                None => out.push(ModelKey::plain(&spec.name)),
            }
        }
        out
    }

    /// Fit every spec on `data`. Specs that draw randomness (forests) consume
    /// `rng` in family order.
    pub fn fit<R: Rng + ?Sized>(&self, data: &Dataset, rng: &mut R) -> FamilyFit {
        let entries = self
            .specs
            .iter()
            .map(|spec| FamilyEntry {
                model: spec.name.clone(),
                outcome: spec.fit(data, rng),
            })
            .collect();
        FamilyFit { entries }
    }
}
