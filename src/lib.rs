//! `bvsim` library crate.
//!
//! The binary (`bvsim`) is a thin wrapper around this library so that:
//!
//! - studies are testable without spawning processes
//! - generators, model families and the aggregator are reusable on their own

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
pub mod sim;
