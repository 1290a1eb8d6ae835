//! Command-line parsing for the bias/variance simulator.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the simulation code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::Preset;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "bvsim", version, about = "Monte-Carlo bias/variance studies")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a study and print the bias/variance report.
    Run(RunArgs),
    /// Print the resolved study configuration as TOML.
    Config(StudyArgs),
}

/// Where the study definition comes from.
#[derive(Debug, Args, Clone)]
pub struct StudyArgs {
    /// Study config file (TOML). Missing keys take their defaults.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Built-in study to start from.
    #[arg(long, value_enum, conflicts_with = "config")]
    pub preset: Option<Preset>,
}

/// Options for `bvsim run`. Every flag overrides the config file.
#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub study: StudyArgs,

    /// Sample size per run.
    #[arg(short = 'n', long)]
    pub n: Option<usize>,

    /// Number of Monte-Carlo runs.
    #[arg(long)]
    pub runs: Option<usize>,

    /// Standard deviation of the label noise.
    #[arg(long)]
    pub noise_sd: Option<f64>,

    /// Master seed (drawn from entropy and reported when omitted).
    #[arg(long)]
    pub seed: Option<u64>,

    /// λ grid for every lasso model: `start:stop:step`, `lin:min:max:steps`,
    /// `log:min:max:steps` or `a,b,c`.
    #[arg(long, value_name = "GRID")]
    pub lambda_grid: Option<String>,

    /// Evaluation point as comma-separated feature values (repeatable).
    #[arg(long = "eval-point", value_name = "X1,X2,...")]
    pub eval_points: Vec<String>,

    /// Worker threads.
    #[arg(long)]
    pub threads: Option<usize>,

    /// Stop scheduling new runs after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub time_limit: Option<f64>,

    /// Export every simulation record to CSV.
    #[arg(long, value_name = "CSV")]
    pub export_records: Option<PathBuf>,

    /// Export the study report to JSON.
    #[arg(long, value_name = "JSON")]
    pub export_summary: Option<PathBuf>,
}

/// Parse `0,0.5` into a feature vector.
pub fn parse_eval_point(text: &str) -> Result<Vec<f64>, String> {
    let values = text
        .split(',')
        .map(|s| {
            s.trim()
                .parse::<f64>()
                .map_err(|e| format!("invalid coordinate '{}' in '{text}': {e}", s.trim()))
        })
        .collect::<Result<Vec<f64>, String>>()?;
    if values.iter().any(|v| !v.is_finite()) {
        return Err(format!("evaluation point '{text}' has a non-finite coordinate"));
    }
    Ok(values)
}
