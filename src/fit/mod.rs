//! Model-family fitting.
//!
//! Responsibilities:
//!
//! - build λ grids for penalized models
//! - fit every model of a family on one dataset, keeping failures per model

pub mod family;
pub mod lambda_grid;

pub use family::*;
pub use lambda_grid::*;
