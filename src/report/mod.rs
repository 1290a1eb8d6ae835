//! Reporting: ranking of report rows and formatted terminal output.

pub mod format;

pub use format::*;

use crate::sim::{Estimate, ReportRow, StudyReport};

/// Rows at `point` with retained runs, lowest MSE first.
///
/// Ties keep family order.
pub fn rank_by_mse(report: &StudyReport, point: usize) -> Vec<&ReportRow> {
    let mut rows: Vec<(&ReportRow, f64)> = report
        .rows
        .iter()
        .filter(|r| r.point == point)
        .filter_map(|r| match &r.estimate {
            Estimate::Value(s) => Some((r, s.mse)),
            Estimate::NoData => None,
        })
        .collect();
    rows.sort_by(|a, b| a.1.total_cmp(&b.1));
    rows.into_iter().map(|(r, _)| r).collect()
}
