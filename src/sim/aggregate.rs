//! Bias–variance reduction over simulation records.
//!
//! For a model key and evaluation point with retained predictions `p_1..p_R`
//! and ground truth `f`:
//!
//! - `p̄ = mean(p_i)`
//! - `bias² = (p̄ - f)²`
//! - `variance = mean((p_i - p̄)²)`
//! - `MSE = mean((p_i - f)²)`
//!
//! All three are reduced on the deviations `d_i = p_i - f`, so a large common
//! offset in predictions and truth does not cancel away the spread.
//!
//! `MSE = bias² + variance` holds exactly in real arithmetic; every group is
//! checked against it, relative to the magnitude of the values involved.
//! Predictions are summed in run order so the result does not depend on the
//! order records arrive in.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::{FitFailure, ModelKey, SimulationRecord};
use crate::error::SimError;
use crate::sim::runner::{GeneratorParams, StudyOutput};

/// Relative tolerance of the `MSE = bias² + variance` check.
pub const DECOMPOSITION_RTOL: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiasVariance {
    pub mean_prediction: f64,
    pub truth: f64,
    pub bias_sq: f64,
    pub variance: f64,
    pub mse: f64,
    /// Retained runs the statistics were computed over.
    pub runs: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BiasVarianceAggregator {
    truth_at_points: Vec<f64>,
}

impl BiasVarianceAggregator {
    pub fn new(truth_at_points: Vec<f64>) -> Self {
        Self { truth_at_points }
    }

    pub fn truth_at_points(&self) -> &[f64] {
        &self.truth_at_points
    }

    /// Reduce records to one [`BiasVariance`] per (key, point).
    pub fn aggregate(
        &self,
        records: &[SimulationRecord],
    ) -> Result<BTreeMap<(ModelKey, usize), BiasVariance>, SimError> {
        let mut groups: BTreeMap<(ModelKey, usize), Vec<(usize, f64)>> = BTreeMap::new();
        for r in records {
            if r.point >= self.truth_at_points.len() {
                return Err(SimError::AggregationMismatch(format!(
                    "record for {} refers to point #{} but only {} point(s) are known",
                    r.key,
                    r.point,
                    self.truth_at_points.len()
                )));
            }
            if !r.prediction.is_finite() {
                return Err(SimError::AggregationMismatch(format!(
                    "non-finite prediction for {} in run {}",
                    r.key, r.run
                )));
            }
            groups
                .entry((r.key.clone(), r.point))
                .or_default()
                .push((r.run, r.prediction));
        }

        let mut out = BTreeMap::new();
        for ((key, point), mut preds) in groups {
            preds.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));
            if let Some(w) = preds.windows(2).find(|w| w[0].0 == w[1].0) {
                return Err(SimError::AggregationMismatch(format!(
                    "run {} contributes more than one prediction for {key} at point #{point}",
                    w[0].0
                )));
            }
            let stats = reduce(&preds, self.truth_at_points[point]);
            let gap = (stats.mse - (stats.bias_sq + stats.variance)).abs();
            if gap > DECOMPOSITION_RTOL * decomposition_scale(&stats) {
                return Err(SimError::AggregationMismatch(format!(
                    "{key} at point #{point}: MSE {} != bias² {} + variance {}",
                    stats.mse, stats.bias_sq, stats.variance
                )));
            }
            out.insert((key, point), stats);
        }
        Ok(out)
    }
}

fn reduce(preds: &[(usize, f64)], truth: f64) -> BiasVariance {
    let runs = preds.len();
    let n = runs as f64;
    let dev = |p: f64| p - truth;
    let mean_dev = preds.iter().map(|&(_, p)| dev(p)).sum::<f64>() / n;
    let variance = preds
        .iter()
        .map(|&(_, p)| (dev(p) - mean_dev).powi(2))
        .sum::<f64>()
        / n;
    let mse = preds.iter().map(|&(_, p)| dev(p).powi(2)).sum::<f64>() / n;
    BiasVariance {
        mean_prediction: truth + mean_dev,
        truth,
        bias_sq: mean_dev.powi(2),
        variance,
        mse,
        runs,
    }
}

/// Magnitude the identity check is relative to.
fn decomposition_scale(stats: &BiasVariance) -> f64 {
    stats
        .mse
        .max(stats.mean_prediction.powi(2))
        .max(stats.truth.powi(2))
        .max(1.0)
}

/// Statistics of one report row, or the absence of any retained run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Estimate {
    Value(BiasVariance),
    NoData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub key: ModelKey,
    pub point: usize,
    pub retained: usize,
    pub excluded: usize,
    pub estimate: Estimate,
    /// Mean non-zero coefficient count (penalized models only).
    pub mean_nonzero: Option<f64>,
    /// `MSE + noise_sd²`: the error against a fresh noisy label.
    pub expected_test_mse: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyReport {
    pub truth: String,
    pub params: GeneratorParams,
    pub eval_points: Vec<Vec<f64>>,
    pub master_seed: u64,
    pub runs_requested: usize,
    pub runs_completed: usize,
    pub truncated: bool,
    pub rows: Vec<ReportRow>,
    /// Excluded runs per model.
    pub excluded: BTreeMap<String, usize>,
}

impl StudyReport {
    pub fn row(&self, key: &ModelKey, point: usize) -> Option<&ReportRow> {
        self.rows.iter().find(|r| &r.key == key && r.point == point)
    }

    /// Statistics for `key` at `point`; `NoData` when no run was retained.
    pub fn get(&self, key: &ModelKey, point: usize) -> Result<&BiasVariance, SimError> {
        match self.row(key, point).map(|r| &r.estimate) {
            Some(Estimate::Value(stats)) => Ok(stats),
            _ => Err(SimError::NoData {
                model: key.to_string(),
            }),
        }
    }
}

/// Aggregate a study and attach the run accounting for every key and point.
pub fn summarize(output: &StudyOutput) -> Result<StudyReport, SimError> {
    let aggregator = BiasVarianceAggregator::new(output.truth_at_points.clone());
    let stats = aggregator.aggregate(&output.records)?;

    let known: BTreeSet<&ModelKey> = output.keys.iter().collect();
    if let Some(((key, _), _)) = stats.iter().find(|((k, _), _)| !known.contains(k)) {
        return Err(SimError::AggregationMismatch(format!(
            "records reference unknown model key {key}"
        )));
    }

    let excluded = excluded_runs(&output.failures);
    let nonzero = mean_nonzero(&output.records);
    let noise_var = output.params.noise_sd.powi(2);

    let mut retained_by_model: BTreeMap<&str, usize> = BTreeMap::new();
    let mut rows = Vec::with_capacity(output.keys.len() * output.eval_points.len());
    for key in &output.keys {
        let model_excluded = excluded.get(&key.model).copied().unwrap_or(0);
        for point in 0..output.eval_points.len() {
            let group = stats.get(&(key.clone(), point));
            let retained = group.map_or(0, |s| s.runs);

            let expected = *retained_by_model.entry(&key.model).or_insert(retained);
            if retained != expected {
                return Err(SimError::AggregationMismatch(format!(
                    "{key} at point #{point} retained {retained} run(s); other buckets of '{}' retained {expected}",
                    key.model
                )));
            }
            if retained + model_excluded != output.runs_completed {
                return Err(SimError::AggregationMismatch(format!(
                    "{key}: {retained} retained + {model_excluded} excluded != {} completed run(s)",
                    output.runs_completed
                )));
            }

            rows.push(ReportRow {
                key: key.clone(),
                point,
                retained,
                excluded: model_excluded,
                estimate: group.map_or(Estimate::NoData, |s| Estimate::Value(*s)),
                mean_nonzero: nonzero.get(&(key.clone(), point)).copied(),
                expected_test_mse: group.map(|s| s.mse + noise_var),
            });
        }
    }

    Ok(StudyReport {
        truth: output.truth.clone(),
        params: output.params,
        eval_points: output.eval_points.clone(),
        master_seed: output.master_seed,
        runs_requested: output.runs_requested,
        runs_completed: output.runs_completed,
        truncated: output.truncated,
        rows,
        excluded,
    })
}

/// Distinct excluded runs per model.
fn excluded_runs(failures: &[FitFailure]) -> BTreeMap<String, usize> {
    let mut runs: BTreeMap<&str, BTreeSet<usize>> = BTreeMap::new();
    for f in failures {
        runs.entry(&f.model).or_default().insert(f.run);
    }
    runs.into_iter()
        .map(|(model, set)| (model.to_string(), set.len()))
        .collect()
}

fn mean_nonzero(records: &[SimulationRecord]) -> BTreeMap<(ModelKey, usize), f64> {
    let mut sums: BTreeMap<(ModelKey, usize), (usize, usize)> = BTreeMap::new();
    for r in records {
        if let Some(nz) = r.nonzero_coefs {
            let entry = sums.entry((r.key.clone(), r.point)).or_default();
            entry.0 += nz;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(k, (total, count))| (k, total as f64 / count as f64))
        .collect()
}
