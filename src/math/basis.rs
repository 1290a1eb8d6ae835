//! Feature expansions.
//!
//! A [`Basis`] is the declarative rule stored in a model spec (and in TOML
//! configs); an [`Expansion`] is the bound form with its monomials resolved.
//! Every fitted model keeps the `Expansion` it was trained with, so the columns
//! it predicts on are built by exactly the same code, in exactly the same
//! order, as the columns it was fit on.
//!
//! Column order for polynomial bases is graded: all degree-1 terms first, then
//! degree 2, and so on. Within a degree, exponents of earlier columns come
//! first (`x1², x1·x2, x2²`).

use std::collections::HashSet;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::domain::feature_name;
use crate::error::SimError;

/// Largest polynomial degree accepted in a spec.
pub const MAX_DEGREE: u32 = 10;

/// Declarative feature-expansion rule. Columns are 0-based feature indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Basis {
    /// Raw columns, in the listed order. An empty list is the intercept-only model.
    Identity { columns: Vec<usize> },
    /// Polynomial terms up to `degree` over the listed columns.
    Polynomial {
        columns: Vec<usize>,
        degree: u32,
        /// Include cross terms such as `x1·x2`.
        #[serde(default = "default_interactions")]
        interactions: bool,
    },
}

fn default_interactions() -> bool {
    true
}

impl Basis {
    pub fn identity(columns: &[usize]) -> Self {
        Basis::Identity {
            columns: columns.to_vec(),
        }
    }

    pub fn poly(columns: &[usize], degree: u32) -> Self {
        Basis::Polynomial {
            columns: columns.to_vec(),
            degree,
            interactions: true,
        }
    }

    fn columns(&self) -> &[usize] {
        match self {
            Basis::Identity { columns } | Basis::Polynomial { columns, .. } => columns,
        }
    }

    /// Check the rule against the number of generated features.
    pub fn validate(&self, n_features: usize) -> Result<(), SimError> {
        let columns = self.columns();
        let mut seen = HashSet::new();
        for &c in columns {
            if c >= n_features {
                return Err(SimError::invalid(format!(
                    "Basis references column {c} ({}) but only {n_features} feature(s) are generated.",
                    feature_name(c)
                )));
            }
            if !seen.insert(c) {
                return Err(SimError::invalid(format!(
                    "Basis lists column {} more than once.",
                    feature_name(c)
                )));
            }
        }
        if let Basis::Polynomial { degree, .. } = self {
            if columns.is_empty() {
                return Err(SimError::invalid("Polynomial basis needs at least one column."));
            }
            if *degree == 0 || *degree > MAX_DEGREE {
                return Err(SimError::invalid(format!(
                    "Polynomial degree must be in 1..={MAX_DEGREE}, got {degree}."
                )));
            }
        }
        Ok(())
    }

    /// Resolve the rule into concrete monomials.
    pub fn expansion(&self) -> Expansion {
        let monomials = match self {
            Basis::Identity { columns } => columns.iter().map(|&c| vec![(c, 1)]).collect(),
            Basis::Polynomial {
                columns,
                degree,
                interactions: true,
            } => {
                let mut out = Vec::new();
                for total in 1..=*degree {
                    for exps in compositions(total, columns.len()) {
                        let mono: Monomial = columns
                            .iter()
                            .zip(exps)
                            .filter(|(_, e)| *e > 0)
                            .map(|(&c, e)| (c, e))
                            .collect();
                        out.push(mono);
                    }
                }
                out
            }
            Basis::Polynomial {
                columns,
                degree,
                interactions: false,
            } => {
                let mut out = Vec::new();
                for total in 1..=*degree {
                    for &c in columns {
                        out.push(vec![(c, total)]);
                    }
                }
                out
            }
        };
        Expansion::new(monomials)
    }
}

/// Product of `x[col]^pow` factors.
type Monomial = Vec<(usize, u32)>;

/// Exponent vectors of length `parts` summing to `total`, earlier parts largest first.
fn compositions(total: u32, parts: usize) -> Vec<Vec<u32>> {
    if parts == 0 {
        return Vec::new();
    }
    if parts == 1 {
        return vec![vec![total]];
    }
    let mut out = Vec::new();
    for first in (0..=total).rev() {
        for mut rest in compositions(total - first, parts - 1) {
            rest.insert(0, first);
            out.push(rest);
        }
    }
    out
}

/// A bound feature expansion (no intercept column).
#[derive(Debug, Clone, PartialEq)]
pub struct Expansion {
    monomials: Vec<Monomial>,
    required_inputs: usize,
}

impl Expansion {
    fn new(monomials: Vec<Monomial>) -> Self {
        let required_inputs = monomials
            .iter()
            .flat_map(|m| m.iter().map(|(c, _)| c + 1))
            .max()
            .unwrap_or(0);
        Self {
            monomials,
            required_inputs,
        }
    }

    /// Number of expanded columns.
    pub fn len(&self) -> usize {
        self.monomials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monomials.is_empty()
    }

    /// Minimum length of an input feature vector.
    pub fn required_inputs(&self) -> usize {
        self.required_inputs
    }

    /// Fill `out` (length [`Expansion::len`]) with the expanded features of `x`.
    ///
    /// # Panics
    /// Panics if `x` is shorter than [`Expansion::required_inputs`] or `out`
    /// has the wrong length. Callers validate inputs first.
    pub fn expand_into(&self, x: &[f64], out: &mut [f64]) {
        for (slot, mono) in out.iter_mut().zip(self.monomials.iter()) {
            *slot = mono
                .iter()
                .fold(1.0, |acc, &(c, p)| acc * x[c].powi(p as i32));
        }
    }

    pub fn expand_row(&self, x: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.len()];
        self.expand_into(x, &mut out);
        out
    }

    /// Expand every row of a raw feature matrix.
    pub fn design(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        let n = x.nrows();
        let mut z = DMatrix::<f64>::zeros(n, self.len());
        let mut raw = vec![0.0; x.ncols()];
        let mut row = vec![0.0; self.len()];
        for i in 0..n {
            for (j, v) in raw.iter_mut().enumerate() {
                *v = x[(i, j)];
            }
            self.expand_into(&raw, &mut row);
            for (j, &v) in row.iter().enumerate() {
                z[(i, j)] = v;
            }
        }
        z
    }

    /// Human-readable column names (`x1`, `x1^2`, `x1*x2`, ...).
    pub fn term_names(&self) -> Vec<String> {
        self.monomials
            .iter()
            .map(|m| {
                m.iter()
                    .map(|&(c, p)| match p {
                        1 => feature_name(c),
                        _ => format!("{}^{p}", feature_name(c)),
                    })
                    .collect::<Vec<_>>()
                    .join("*")
            })
            .collect()
    }
}
