//! Formatted terminal output for study reports.
//!
//! We keep formatting code in one place so:
//! - the simulation/aggregation code stays clean and testable
//! - output changes are localized

use crate::sim::{Estimate, ReportRow, StudyReport};

/// Format the full study summary: setup, run accounting and one table per point.
pub fn format_study_report(report: &StudyReport) -> String {
    let mut out = String::new();

    out.push_str("=== bvsim - Bias/Variance Study ===\n");
    out.push_str(&format!("Truth: y = {}\n", report.truth));
    out.push_str(&format!(
        "Sample: n={} | noise_sd={} | seed={}\n",
        report.params.n, report.params.noise_sd, report.master_seed
    ));
    out.push_str(&format!(
        "Runs: {}/{} completed{}\n",
        report.runs_completed,
        report.runs_requested,
        if report.truncated { " (time limit reached)" } else { "" }
    ));

    let excluded: Vec<String> = report
        .excluded
        .iter()
        .filter(|(_, n)| **n > 0)
        .map(|(model, n)| format!("{model}={n}"))
        .collect();
    if !excluded.is_empty() {
        out.push_str(&format!("Excluded runs: {}\n", excluded.join(", ")));
    }

    for (point, x) in report.eval_points.iter().enumerate() {
        out.push('\n');
        out.push_str(&format!("Point #{point} {}:\n", fmt_point(x)));
        let rows: Vec<&ReportRow> = report.rows.iter().filter(|r| r.point == point).collect();
        let best = crate::report::rank_by_mse(report, point)
            .into_iter()
            .next()
            .map(|r| &r.key);
        out.push_str(&format_table(&rows, best));
    }

    out
}

fn format_table(rows: &[&ReportRow], best: Option<&crate::domain::ModelKey>) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "  {:<24} {:>8} {:>8} {:>12} {:>12} {:>12} {:>12} {:>8}",
            "model", "retained", "excluded", "bias^2", "variance", "mse", "test_mse", "nonzero"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "  {:-<24} {:-<8} {:-<8} {:-<12} {:-<12} {:-<12} {:-<12} {:-<8}",
            "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for r in rows {
        let chosen = if Some(&r.key) == best { "*" } else { " " };
        let name = truncate(&r.key.to_string(), 24);
        let line = match &r.estimate {
            Estimate::Value(s) => format!(
                "{chosen} {:<24} {:>8} {:>8} {:>12.6} {:>12.6} {:>12.6} {:>12.6} {:>8}",
                name,
                r.retained,
                r.excluded,
                s.bias_sq,
                s.variance,
                s.mse,
                r.expected_test_mse.unwrap_or(f64::NAN),
                r.mean_nonzero.map(|v| format!("{v:.2}")).unwrap_or_default(),
            ),
            Estimate::NoData => format!(
                "{chosen} {:<24} {:>8} {:>8} {:>12}",
                name, r.retained, r.excluded, "no data"
            ),
        };
        out.push_str(line.trim_end());
        out.push('\n');
    }

    out
}

fn fmt_point(x: &[f64]) -> String {
    let parts: Vec<String> = x
        .iter()
        .enumerate()
        .map(|(j, v)| format!("{}={v}", crate::domain::feature_name(j)))
        .collect();
    format!("({})", parts.join(", "))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
