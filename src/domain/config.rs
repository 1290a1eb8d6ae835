//! Study configuration.
//!
//! Every field is optional in TOML; missing fields fall back to the
//! `tradeoff` preset. CLI flags are applied on top by `app`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::data::DataGenerator;
use crate::domain::presets::Preset;
use crate::domain::{FeatureDistribution, GroundTruth};
use crate::error::SimError;
use crate::fit::ModelFamily;
use crate::models::ModelSpec;
use crate::sim::{GeneratorParams, RunOptions};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyConfig {
    /// Sample size per run.
    pub n: usize,
    pub n_runs: usize,
    pub noise_sd: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Replaces the λ grid of every lasso model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lambda_grid: Option<Vec<f64>>,
    pub eval_points: Vec<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_limit_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
    pub truth: GroundTruth,
    pub features: Vec<FeatureDistribution>,
    pub models: Vec<ModelSpec>,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self::from_preset(Preset::Tradeoff)
    }
}

impl StudyConfig {
    pub fn from_preset(preset: Preset) -> Self {
        Self {
            n: 100,
            n_runs: 1000,
            noise_sd: 1.0,
            seed: None,
            lambda_grid: None,
            eval_points: vec![vec![0.0, 0.5]],
            time_limit_secs: None,
            threads: None,
            truth: preset.truth(),
            features: preset.features(),
            models: preset.models(),
        }
    }

    pub fn generator(&self) -> Result<DataGenerator, SimError> {
        DataGenerator::new(self.truth.clone(), self.features.clone())
    }

    /// The model family, with `lambda_grid` applied when set.
    pub fn family(&self) -> Result<ModelFamily, SimError> {
        let family = ModelFamily::new(self.models.clone())?;
        Ok(match &self.lambda_grid {
            Some(grid) => family.with_lambda_grid(grid),
            None => family,
        })
    }

    pub fn params(&self) -> GeneratorParams {
        GeneratorParams {
            n: self.n,
            noise_sd: self.noise_sd,
        }
    }

    pub fn run_options(&self) -> Result<RunOptions, SimError> {
        let time_limit = self
            .time_limit_secs
            .map(|secs| {
                Duration::try_from_secs_f64(secs).map_err(|e| {
                    SimError::invalid(format!(
                        "time_limit_secs must be finite, >= 0 and representable (got {secs}): {e}."
                    ))
                })
            })
            .transpose()?;
        Ok(RunOptions {
            seed: self.seed,
            threads: self.threads,
            time_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_the_tradeoff_study() {
        let c = StudyConfig::default();
        assert_eq!(c.n, 100);
        assert_eq!(c.n_runs, 1000);
        assert_eq!(c.noise_sd, 1.0);
        assert_eq!(c.eval_points, vec![vec![0.0, 0.5]]);
        let names: Vec<_> = c.models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["simple", "true", "full"]);
    }

    #[test]
    fn lambda_grid_override_reaches_family() {
        let c = StudyConfig {
            lambda_grid: Some(vec![0.0, 0.5]),
            ..StudyConfig::from_preset(Preset::Lasso)
        };
        let keys = c.family().unwrap().keys();
        // "full" plus two λ buckets.
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn negative_time_limit_is_rejected() {
        let c = StudyConfig {
            time_limit_secs: Some(-1.0),
            ..StudyConfig::default()
        };
        assert!(c.run_options().is_err());
        let ok = StudyConfig {
            time_limit_secs: Some(1.5),
            ..StudyConfig::default()
        };
        assert_eq!(ok.run_options().unwrap().time_limit, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn unrepresentable_time_limit_is_rejected() {
        for secs in [1e30, f64::INFINITY, f64::NAN] {
            let c = StudyConfig {
                time_limit_secs: Some(secs),
                ..StudyConfig::default()
            };
            let err = c.run_options().unwrap_err();
            assert_eq!(err.exit_code(), 2, "{secs}");
        }
    }
}
