//! Input/output helpers.
//!
//! - study config TOML read/write (`config`)
//! - record CSV and summary JSON exports (`export`)

pub mod config;
pub mod export;

pub use config::*;
pub use export::*;
