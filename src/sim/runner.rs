//! Monte-Carlo driver: repeated sampling, fitting and evaluation.
//!
//! Each run is a pure function of its derived seed:
//!
//! 1) seed a `StdRng` with `run_seed(master, run)`
//! 2) draw a fresh dataset from the generator
//! 3) fit every model of the family (forests keep drawing from the same RNG)
//! 4) predict at every evaluation point
//!
//! Runs execute in parallel and are collected in run order, so the output does
//! not depend on the thread count.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::data::{DataGenerator, run_seed};
use crate::domain::{FitFailure, ModelKey, SimulationRecord};
use crate::error::SimError;
use crate::fit::ModelFamily;

/// Per-run sampling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeneratorParams {
    pub n: usize,
    pub noise_sd: f64,
}

/// Execution knobs that do not change what a run computes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOptions {
    /// Master seed; drawn from entropy (and recorded) when absent.
    pub seed: Option<u64>,
    /// Worker threads; rayon's global pool when absent.
    pub threads: Option<usize>,
    /// Stop scheduling new runs once this much wall time has elapsed.
    pub time_limit: Option<Duration>,
}

/// Everything a study produced, in run order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyOutput {
    pub truth: String,
    pub params: GeneratorParams,
    pub eval_points: Vec<Vec<f64>>,
    /// Ground truth at each evaluation point.
    pub truth_at_points: Vec<f64>,
    /// Every key the family can produce, in family order.
    pub keys: Vec<ModelKey>,
    pub records: Vec<SimulationRecord>,
    pub failures: Vec<FitFailure>,
    pub runs_requested: usize,
    pub runs_completed: usize,
    pub master_seed: u64,
    pub truncated: bool,
}

#[derive(Debug, Default)]
struct RunOutcome {
    records: Vec<SimulationRecord>,
    failures: Vec<FitFailure>,
}

#[derive(Debug, Clone, Default)]
pub struct SimulationRunner {
    options: RunOptions,
}

impl SimulationRunner {
    pub fn new(options: RunOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Run `n_runs` independent repetitions.
    pub fn run(
        &self,
        n_runs: usize,
        generator: &DataGenerator,
        params: GeneratorParams,
        family: &ModelFamily,
        eval_points: &[Vec<f64>],
    ) -> Result<StudyOutput, SimError> {
        validate_inputs(n_runs, generator, params, family, eval_points)?;
        if self.options.threads == Some(0) {
            return Err(SimError::invalid("threads must be >= 1."));
        }

        let master_seed = self.options.seed.unwrap_or_else(rand::random::<u64>);
        let started = Instant::now();
        info!(
            runs = n_runs,
            n = params.n,
            noise_sd = params.noise_sd,
            seed = master_seed,
            models = family.len(),
            points = eval_points.len(),
            "starting study"
        );

        let stop = AtomicBool::new(false);
        let time_limit = self.options.time_limit;

        let execute = || -> Vec<Option<Result<RunOutcome, SimError>>> {
            (0..n_runs)
                .into_par_iter()
                .map(|run| {
                    if let Some(limit) = time_limit {
                        if stop.load(Ordering::Relaxed) || started.elapsed() >= limit {
                            stop.store(true, Ordering::Relaxed);
                            return None;
                        }
                    }
                    Some(simulate_run(
                        run,
                        run_seed(master_seed, run),
                        generator,
                        params,
                        family,
                        eval_points,
                    ))
                })
                .collect()
        };

        let results = match self.options.threads {
            Some(threads) => rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| SimError::invalid(format!("Could not build thread pool: {e}")))?
                .install(execute),
            None => execute(),
        };

        let mut records = Vec::new();
        let mut failures = Vec::new();
        let mut runs_completed = 0usize;
        for outcome in results.into_iter().flatten() {
            let outcome = outcome?;
            runs_completed += 1;
            records.extend(outcome.records);
            failures.extend(outcome.failures);
        }

        let truncated = runs_completed < n_runs;
        if truncated {
            warn!(
                completed = runs_completed,
                requested = n_runs,
                "time limit reached; study truncated"
            );
        }
        if !failures.is_empty() {
            for spec in family.specs() {
                let excluded = failures.iter().filter(|f| f.model == spec.name).count();
                if excluded > 0 {
                    warn!(model = %spec.name, excluded, "runs excluded after failed fits");
                }
            }
        }
        info!(
            completed = runs_completed,
            records = records.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "study finished"
        );

        Ok(StudyOutput {
            truth: generator.truth().to_string(),
            params,
            eval_points: eval_points.to_vec(),
            truth_at_points: eval_points.iter().map(|p| generator.truth().eval(p)).collect(),
            keys: family.keys(),
            records,
            failures,
            runs_requested: n_runs,
            runs_completed,
            master_seed,
            truncated,
        })
    }
}

fn validate_inputs(
    n_runs: usize,
    generator: &DataGenerator,
    params: GeneratorParams,
    family: &ModelFamily,
    eval_points: &[Vec<f64>],
) -> Result<(), SimError> {
    if n_runs == 0 {
        return Err(SimError::invalid("n_runs must be > 0."));
    }
    if params.n == 0 {
        return Err(SimError::invalid("Sample size n must be > 0."));
    }
    if !(params.noise_sd.is_finite() && params.noise_sd >= 0.0) {
        return Err(SimError::invalid(format!(
            "noise_sd must be finite and >= 0 (got {}).",
            params.noise_sd
        )));
    }
    if eval_points.is_empty() {
        return Err(SimError::invalid("At least one evaluation point is required."));
    }
    let k = generator.n_features();
    for (i, point) in eval_points.iter().enumerate() {
        if point.len() != k {
            return Err(SimError::invalid(format!(
                "Evaluation point #{i} has {} value(s); the generator draws {k} feature(s).",
                point.len()
            )));
        }
        if point.iter().any(|v| !v.is_finite()) {
            return Err(SimError::invalid(format!(
                "Evaluation point #{i} contains a non-finite value."
            )));
        }
    }
    family.validate(k)
}

fn simulate_run(
    run: usize,
    seed: u64,
    generator: &DataGenerator,
    params: GeneratorParams,
    family: &ModelFamily,
    eval_points: &[Vec<f64>],
) -> Result<RunOutcome, SimError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let data = generator.generate_with_rng(params.n, params.noise_sd, &mut rng)?;
    let fit = family.fit(&data, &mut rng);

    let mut out = RunOutcome::default();
    for entry in fit.entries {
        let fits = match entry.outcome {
            Ok(fits) => fits,
            Err(SimError::DegenerateFit { reason, .. }) => {
                debug!(run, model = %entry.model, %reason, "fit failed");
                out.failures.push(FitFailure {
                    run,
                    model: entry.model,
                    reason,
                });
                continue;
            }
            Err(other) => return Err(other),
        };

        let mut model_records = Vec::with_capacity(fits.len() * eval_points.len());
        let mut bad_point = None;
        'fits: for (lambda, model) in &fits {
            let key = ModelKey {
                model: entry.model.clone(),
                lambda: *lambda,
            };
            for (point, x) in eval_points.iter().enumerate() {
                let prediction = model.predict(x)?;
                if !prediction.is_finite() {
                    bad_point = Some((key, point));
                    break 'fits;
                }
                model_records.push(SimulationRecord {
                    run,
                    key: key.clone(),
                    point,
                    prediction,
                    nonzero_coefs: model.nonzero_coefs(),
                });
            }
        }

        match bad_point {
            Some((key, point)) => {
                let reason = format!("non-finite prediction for {key} at point #{point}");
                debug!(run, model = %entry.model, %reason, "fit failed");
                out.failures.push(FitFailure {
                    run,
                    model: entry.model,
                    reason,
                });
            }
            None => out.records.extend(model_records),
        }
    }
    Ok(out)
}
