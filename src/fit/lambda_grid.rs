//! Penalty (λ) grid generation.
//!
//! Every generator returns values already canonicalized through
//! [`LambdaKey`], so a grid built from `0.1 + 0.2` and one written as `0.3`
//! group into the same aggregate bucket.

use crate::domain::LambdaKey;
use crate::error::SimError;

/// Largest grid any generator will build.
pub const MAX_GRID_POINTS: usize = 100_000;

fn check_size(points: f64) -> Result<usize, SimError> {
    if !(points.is_finite() && points <= MAX_GRID_POINTS as f64) {
        return Err(SimError::invalid(format!(
            "Lambda grid would have {points} points (max {MAX_GRID_POINTS})."
        )));
    }
    Ok(points as usize)
}

fn canonical(values: impl IntoIterator<Item = f64>) -> Vec<f64> {
    values
        .into_iter()
        .map(|v| LambdaKey::canonical(v).value())
        .collect()
}

/// `steps` evenly spaced values from `min` to `max` (inclusive).
pub fn linspace(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, SimError> {
    if !(min.is_finite() && max.is_finite() && min >= 0.0 && max > min) {
        return Err(SimError::invalid(format!(
            "Invalid lambda range: min={min}, max={max} (must be finite, >=0, and max>min)."
        )));
    }
    if steps < 2 {
        return Err(SimError::invalid("Lambda steps must be >= 2."));
    }
    check_size(steps as f64)?;
    let step = (max - min) / (steps as f64 - 1.0);
    Ok(canonical((0..steps).map(|i| min + step * i as f64)))
}

/// `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, SimError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(SimError::invalid(format!(
            "Invalid lambda range: min={min}, max={max} (must be finite, >0, and max>min)."
        )));
    }
    if steps < 2 {
        return Err(SimError::invalid("Lambda steps must be >= 2."));
    }
    check_size(steps as f64)?;

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);
    Ok(canonical((0..steps).map(|i| (ln_min + step * i as f64).exp())))
}

/// `start, start + step, ...` up to and including `stop` (within rounding).
pub fn arange(start: f64, stop: f64, step: f64) -> Result<Vec<f64>, SimError> {
    if !(start.is_finite() && stop.is_finite() && step.is_finite()) {
        return Err(SimError::invalid("Lambda range bounds must be finite."));
    }
    if start < 0.0 || stop < start || step <= 0.0 {
        return Err(SimError::invalid(format!(
            "Invalid lambda range {start}:{stop}:{step} (need 0 <= start <= stop, step > 0)."
        )));
    }
    let count = check_size(((stop - start) / step + 1e-9).floor() + 1.0)?;
    Ok(canonical((0..count).map(|i| start + step * i as f64)))
}

/// Parse a grid description:
///
/// - `start:stop:step` (inclusive arithmetic range)
/// - `lin:min:max:steps` / `log:min:max:steps`
/// - a comma-separated list
pub fn parse_grid(text: &str) -> Result<Vec<f64>, SimError> {
    let parse = |s: &str| {
        s.trim()
            .parse::<f64>()
            .map_err(|e| SimError::invalid(format!("Invalid lambda value '{}': {e}", s.trim())))
    };
    let parse_steps = |s: &str| {
        s.trim()
            .parse::<usize>()
            .map_err(|e| SimError::invalid(format!("Invalid lambda step count '{}': {e}", s.trim())))
    };

    if let Some((kind, rest)) = text.trim().split_once(':') {
        if let "lin" | "log" = kind.trim() {
            let parts: Vec<&str> = rest.split(':').collect();
            let [min, max, steps] = parts.as_slice() else {
                return Err(SimError::invalid(format!(
                    "Lambda grid '{text}' must look like {kind}:min:max:steps."
                )));
            };
            let (min, max, steps) = (parse(*min)?, parse(*max)?, parse_steps(*steps)?);
            return if kind.trim() == "lin" {
                linspace(min, max, steps)
            } else {
                log_space(min, max, steps)
            };
        }
    }

    if text.contains(':') {
        let parts: Vec<&str> = text.split(':').collect();
        let [start, stop, step] = parts.as_slice() else {
            return Err(SimError::invalid(format!(
                "Lambda range '{text}' must look like start:stop:step."
            )));
        };
        return arange(parse(*start)?, parse(*stop)?, parse(*step)?);
    }

    let values = text
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(parse)
        .collect::<Result<Vec<f64>, SimError>>()?;
    if values.is_empty() {
        return Err(SimError::invalid("Lambda grid is empty."));
    }
    Ok(canonical(values))
}
