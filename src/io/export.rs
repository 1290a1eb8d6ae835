//! Export study results.
//!
//! - per-record CSV, one line per (run, model key, point)
//! - the study report as pretty JSON

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::domain::{LambdaKey, SimulationRecord};
use crate::error::SimError;
use crate::sim::StudyReport;

pub const RECORDS_CSV_HEADER: [&str; 6] =
    ["run", "model", "lambda", "point", "prediction", "nonzero_coefs"];

#[derive(Debug, Serialize)]
struct RecordRow<'a> {
    run: usize,
    model: &'a str,
    lambda: Option<f64>,
    point: usize,
    prediction: f64,
    nonzero_coefs: Option<usize>,
}

pub(crate) fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SimError + '_ {
    move |source| SimError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Write every record to a CSV file.
pub fn write_records_csv(path: &Path, records: &[SimulationRecord]) -> Result<(), SimError> {
    let file = File::create(path).map_err(io_error(path))?;
    write_records(BufWriter::new(file), records).map_err(|e| io_error(path)(e.into()))
}

/// Write the CSV header and rows to any writer. Empty optional columns stay empty.
pub fn write_records<W: Write>(out: W, records: &[SimulationRecord]) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(out);
    wtr.write_record(RECORDS_CSV_HEADER)?;
    for r in records {
        wtr.serialize(RecordRow {
            run: r.run,
            model: &r.key.model,
            lambda: r.key.lambda.map(LambdaKey::value),
            point: r.point,
            prediction: r.prediction,
            nonzero_coefs: r.nonzero_coefs,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write the study report as pretty-printed JSON.
pub fn write_summary_json(path: &Path, report: &StudyReport) -> Result<(), SimError> {
    let file = File::create(path).map_err(io_error(path))?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)
        .map_err(|e| SimError::Config(format!("Failed to write summary JSON '{}': {e}", path.display())))
}

/// Read a report written by [`write_summary_json`].
pub fn read_summary_json(path: &Path) -> Result<StudyReport, SimError> {
    let file = File::open(path).map_err(io_error(path))?;
    serde_json::from_reader(std::io::BufReader::new(file))
        .map_err(|e| SimError::Config(format!("Invalid summary JSON '{}': {e}", path.display())))
}
