//! Monte-Carlo study execution and bias–variance aggregation.

pub mod aggregate;
pub mod runner;

pub use aggregate::*;
pub use runner::*;
