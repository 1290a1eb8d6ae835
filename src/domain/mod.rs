//! Domain types used throughout the study pipeline.
//!
//! This module defines:
//!
//! - the ground truth and feature distributions (`GroundTruth`, `FeatureDistribution`)
//! - datasets, grouping keys and per-run records (`Dataset`, `ModelKey`, `SimulationRecord`)
//! - study configuration and built-in presets (`StudyConfig`, `Preset`)

pub mod config;
pub mod presets;
pub mod types;

pub use config::*;
pub use presets::*;
pub use types::*;
