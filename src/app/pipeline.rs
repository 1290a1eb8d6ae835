//! Shared "study pipeline" used by the CLI and by library callers.
//!
//! config -> generator + family -> Monte-Carlo runs -> aggregation -> report

use crate::domain::StudyConfig;
use crate::error::SimError;
use crate::sim::{SimulationRunner, StudyOutput, StudyReport, summarize};

/// All computed outputs of a single study.
#[derive(Debug, Clone)]
pub struct StudyRun {
    pub output: StudyOutput,
    pub report: StudyReport,
}

/// Execute a full study from its configuration.
pub fn run_study(config: &StudyConfig) -> Result<StudyRun, SimError> {
    let generator = config.generator()?;
    let family = config.family()?;
    let runner = SimulationRunner::new(config.run_options()?);

    let output = runner.run(
        config.n_runs,
        &generator,
        config.params(),
        &family,
        &config.eval_points,
    )?;
    let report = summarize(&output)?;

    Ok(StudyRun { output, report })
}
