//! Numerical building blocks: feature expansions, OLS and LASSO solvers.

pub mod basis;
pub mod lasso;
pub mod ols;

pub use basis::*;
pub use lasso::*;
pub use ols::*;
