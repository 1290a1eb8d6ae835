//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - resolves the study configuration (file or preset, then flag overrides)
//! - runs the study and prints the report
//! - writes optional exports

use clap::Parser;

use crate::cli::{Command, RunArgs, StudyArgs, parse_eval_point};
use crate::domain::{Preset, StudyConfig};
use crate::error::SimError;

pub mod pipeline;

/// Entry point for the `bvsim` binary.
pub fn run() -> Result<(), SimError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Config(args) => handle_config(args),
    }
}

fn handle_run(args: RunArgs) -> Result<(), SimError> {
    let config = study_config_from_args(&args)?;
    let study = pipeline::run_study(&config)?;

    println!("{}", crate::report::format_study_report(&study.report));

    if let Some(path) = &args.export_records {
        crate::io::export::write_records_csv(path, &study.output.records)?;
    }
    if let Some(path) = &args.export_summary {
        crate::io::export::write_summary_json(path, &study.report)?;
    }

    Ok(())
}

fn handle_config(args: StudyArgs) -> Result<(), SimError> {
    let config = base_config(&args)?;
    print!("{}", crate::io::config::config_to_toml(&config)?);
    Ok(())
}

fn base_config(args: &StudyArgs) -> Result<StudyConfig, SimError> {
    match (&args.config, args.preset) {
        (Some(path), _) => crate::io::config::load_config(path),
        (None, Some(preset)) => Ok(StudyConfig::from_preset(preset)),
        (None, None) => Ok(StudyConfig::from_preset(Preset::Tradeoff)),
    }
}

/// Resolve the study: config file or preset first, then CLI overrides.
pub fn study_config_from_args(args: &RunArgs) -> Result<StudyConfig, SimError> {
    let mut config = base_config(&args.study)?;

    if let Some(n) = args.n {
        config.n = n;
    }
    if let Some(runs) = args.runs {
        config.n_runs = runs;
    }
    if let Some(sd) = args.noise_sd {
        config.noise_sd = sd;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if let Some(text) = &args.lambda_grid {
        config.lambda_grid = Some(crate::fit::parse_grid(text)?);
    }
    if !args.eval_points.is_empty() {
        config.eval_points = args
            .eval_points
            .iter()
            .map(|p| parse_eval_point(p).map_err(SimError::InvalidParameter))
            .collect::<Result<_, _>>()?;
    }
    if args.threads.is_some() {
        config.threads = args.threads;
    }
    if args.time_limit.is_some() {
        config.time_limit_secs = args.time_limit;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;

    fn run_args(argv: &[&str]) -> RunArgs {
        let mut full = vec!["bvsim", "run"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Command::Run(args) => args,
            Command::Config(_) => panic!("expected run"),
        }
    }

    #[test]
    fn flags_override_preset() {
        let config = study_config_from_args(&run_args(&[
            "--preset",
            "lasso",
            "--runs",
            "10",
            "--seed",
            "9",
            "--lambda-grid",
            "0,0.2",
            "--eval-point",
            "0.5,0.5",
        ]))
        .unwrap();
        assert_eq!(config.n_runs, 10);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.lambda_grid, Some(vec![0.0, 0.2]));
        assert_eq!(config.eval_points, vec![vec![0.5, 0.5]]);
        assert_eq!(config.truth, Preset::Lasso.truth());
    }

    #[test]
    fn bad_overrides_are_invalid_parameters() {
        let err = study_config_from_args(&run_args(&["--lambda-grid", "0:1"])).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        let err = study_config_from_args(&run_args(&["--eval-point", "a,b"])).unwrap_err();
        assert!(matches!(err, SimError::InvalidParameter(_)));
    }

    #[test]
    fn missing_config_file_is_io_error() {
        let err = study_config_from_args(&run_args(&["--config", "/nonexistent/study.toml"]))
            .unwrap_err();
        assert!(matches!(err, SimError::Io { .. }));
    }
}
