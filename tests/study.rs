//! End-to-end studies through the public library API.

use bvsim::app::pipeline::run_study;
use bvsim::data::{DataGenerator, run_seed};
use bvsim::domain::{FeatureDistribution, GroundTruth, ModelKey, Preset, StudyConfig, Term};
use bvsim::error::SimError;
use bvsim::fit::ModelFamily;
use bvsim::math::Basis;
use bvsim::models::ModelSpec;
use bvsim::sim::{BiasVariance, GeneratorParams, RunOptions, SimulationRunner, summarize};

#[test]
fn simple_model_beats_full_model_near_the_edge() {
    let config = StudyConfig {
        seed: Some(2024),
        ..StudyConfig::from_preset(Preset::Tradeoff)
    };
    assert_eq!((config.n, config.n_runs), (100, 1000));
    assert_eq!(config.eval_points, vec![vec![0.0, 0.5]]);

    let study = run_study(&config).unwrap();
    let simple = study.report.get(&ModelKey::plain("simple"), 0).unwrap();
    let full = study.report.get(&ModelKey::plain("full"), 0).unwrap();
    let truth = study.report.get(&ModelKey::plain("true"), 0).unwrap();

    assert_eq!(simple.runs, 1000);
    assert!(simple.variance < full.variance, "{simple:?} vs {full:?}");
    assert!(simple.mse < full.mse, "{simple:?} vs {full:?}");
    // The underfit model carries the bias; the correct one does not.
    assert!(simple.bias_sq > truth.bias_sq);
    assert!(truth.variance < full.variance);
}

/// Monte-Carlo standard errors of the bias² and variance estimates.
fn mc_tolerance(stats: &BiasVariance) -> (f64, f64) {
    let r = stats.runs as f64;
    let bias = stats.bias_sq.sqrt();
    let bias_sq_tol = 2.0 * bias * (stats.variance / r).sqrt() + stats.variance / r;
    let variance_tol = stats.variance * (2.0 / r).sqrt();
    (bias_sq_tol, variance_tol)
}

#[test]
fn lasso_sweep_trades_variance_for_bias() {
    let config = StudyConfig {
        seed: Some(7),
        ..StudyConfig::from_preset(Preset::Lasso)
    };
    let grid = config
        .models
        .iter()
        .find(|m| m.name == "lasso")
        .and_then(|m| m.lambda_keys())
        .unwrap();
    assert_eq!(grid.len(), 41);
    assert_eq!(grid[1].value(), 0.01);

    let study = run_study(&config).unwrap();
    let stats: Vec<_> = grid
        .iter()
        .map(|&l| {
            let key = ModelKey::penalized("lasso", l);
            let row = study.report.row(&key, 0).unwrap();
            assert!(row.retained >= 500);
            *study.report.get(&key, 0).unwrap()
        })
        .collect();

    for (i, w) in stats.windows(2).enumerate() {
        let (b0, v0) = mc_tolerance(&w[0]);
        let (b1, v1) = mc_tolerance(&w[1]);
        let (bias_tol, var_tol) = (b0.max(b1), v0.max(v1));
        assert!(
            w[1].bias_sq + bias_tol >= w[0].bias_sq,
            "bias² dropped beyond {bias_tol:e} between λ={} and λ={}: {w:?}",
            grid[i].value(),
            grid[i + 1].value()
        );
        assert!(
            w[1].variance <= w[0].variance + var_tol,
            "variance grew beyond {var_tol:e} between λ={} and λ={}: {w:?}",
            grid[i].value(),
            grid[i + 1].value()
        );
    }
    let (first, last) = (stats[0], stats[stats.len() - 1]);
    assert!(last.bias_sq > first.bias_sq);
    assert!(last.variance < first.variance);

    // λ = 0 is unpenalized least squares on the same basis.
    let full = study.report.get(&ModelKey::plain("full"), 0).unwrap();
    assert!((full.mean_prediction - first.mean_prediction).abs() < 1e-4);
}

#[test]
fn degenerate_runs_are_excluded_and_counted() {
    let generator = DataGenerator::new(
        GroundTruth::quadratic_x1(),
        vec![
            FeatureDistribution::default(),
            FeatureDistribution::Bernoulli { p: 0.5 },
        ],
    )
    .unwrap();
    let family = ModelFamily::new(vec![
        ModelSpec::ols("simple", Basis::identity(&[0])),
        ModelSpec::ols("both", Basis::identity(&[0, 1])),
    ])
    .unwrap();
    let params = GeneratorParams { n: 5, noise_sd: 1.0 };
    let (master, n_runs) = (99u64, 300usize);

    // A run is degenerate for "both" exactly when its indicator column is constant.
    let k = (0..n_runs)
        .filter(|&run| {
            let data = generator
                .generate(params.n, params.noise_sd, Some(run_seed(master, run)))
                .unwrap();
            let col = data.x.column(1);
            col.iter().all(|v| *v == col[0])
        })
        .count();
    assert!(k > 0);

    let runner = SimulationRunner::new(RunOptions {
        seed: Some(master),
        ..RunOptions::default()
    });
    let output = runner
        .run(n_runs, &generator, params, &family, &[vec![0.5, 1.0]])
        .unwrap();
    let report = summarize(&output).unwrap();

    let both = report.row(&ModelKey::plain("both"), 0).unwrap();
    assert_eq!(both.excluded, k);
    assert_eq!(both.retained, n_runs - k);
    let simple = report.row(&ModelKey::plain("simple"), 0).unwrap();
    assert_eq!((simple.retained, simple.excluded), (n_runs, 0));
}

#[test]
fn model_that_never_fits_reports_no_data() {
    let config = StudyConfig {
        n: 5,
        n_runs: 20,
        seed: Some(1),
        models: vec![
            ModelSpec::ols("simple", Basis::identity(&[0])),
            ModelSpec::ols("wiggly", Basis::poly(&[0, 1], 3)),
        ],
        ..StudyConfig::default()
    };
    let study = run_study(&config).unwrap();
    let err = study.report.get(&ModelKey::plain("wiggly"), 0).unwrap_err();
    assert!(matches!(err, SimError::NoData { .. }));
    assert_eq!(err.exit_code(), 3);
    assert_eq!(study.report.row(&ModelKey::plain("wiggly"), 0).unwrap().excluded, 20);
    assert!(study.report.get(&ModelKey::plain("simple"), 0).is_ok());
}

#[test]
fn large_truth_offset_leaves_the_decomposition_unchanged() {
    let base = StudyConfig {
        n: 50,
        n_runs: 200,
        seed: Some(12),
        ..StudyConfig::default()
    };
    let mut shifted_truth = GroundTruth::quadratic_x1();
    shifted_truth.terms.push(Term::new(1e7, &[]));
    let shifted = StudyConfig {
        truth: shifted_truth,
        ..base.clone()
    };

    let plain = run_study(&base).unwrap();
    let offset = run_study(&shifted).unwrap();
    for name in ["simple", "true", "full"] {
        let key = ModelKey::plain(name);
        let a = plain.report.get(&key, 0).unwrap();
        let b = offset.report.get(&key, 0).unwrap();
        assert!((b.truth - a.truth - 1e7).abs() < 1e-6, "{name}");
        assert!((b.variance - a.variance).abs() <= 1e-4 * a.variance, "{name}: {a:?} vs {b:?}");
        assert!((b.bias_sq - a.bias_sq).abs() <= 1e-4 * a.mse, "{name}: {a:?} vs {b:?}");
    }
}

#[test]
fn output_does_not_depend_on_thread_count() {
    let base = StudyConfig {
        n: 50,
        n_runs: 24,
        seed: Some(31),
        eval_points: vec![vec![0.0, 0.5], vec![0.8, 0.2]],
        ..StudyConfig::from_preset(Preset::Trees)
    };
    let one = run_study(&StudyConfig {
        threads: Some(1),
        ..base.clone()
    })
    .unwrap();
    let many = run_study(&StudyConfig {
        threads: Some(4),
        ..base
    })
    .unwrap();
    assert_eq!(one.output.records, many.output.records);
    assert_eq!(one.report, many.report);
}

#[test]
fn unseeded_study_records_a_replayable_seed() {
    let config = StudyConfig {
        n: 30,
        n_runs: 10,
        ..StudyConfig::default()
    };
    let first = run_study(&config).unwrap();
    let replay = run_study(&StudyConfig {
        seed: Some(first.output.master_seed),
        ..config
    })
    .unwrap();
    assert_eq!(first.output.records, replay.output.records);
}

#[test]
fn exports_write_records_and_summary() {
    let config = StudyConfig {
        n: 30,
        n_runs: 5,
        seed: Some(4),
        ..StudyConfig::from_preset(Preset::Lasso)
    };
    let study = run_study(&config).unwrap();

    let dir = std::env::temp_dir().join(format!("bvsim-export-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let csv = dir.join("records.csv");
    let json = dir.join("summary.json");

    bvsim::io::write_records_csv(&csv, &study.output.records).unwrap();
    let text = std::fs::read_to_string(&csv).unwrap();
    assert_eq!(text.lines().count(), study.output.records.len() + 1);
    assert!(text.starts_with("run,model,lambda,point,prediction,nonzero_coefs\n"));

    bvsim::io::write_summary_json(&json, &study.report).unwrap();
    let back = bvsim::io::read_summary_json(&json).unwrap();
    assert_eq!(back.rows.len(), study.report.rows.len());
    assert_eq!(back.master_seed, 4);
    assert_eq!(back.rows[1].key, study.report.rows[1].key);

    std::fs::remove_dir_all(&dir).unwrap();
}
