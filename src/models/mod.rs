//! Model specifications and fitted models.
//!
//! A spec is plain data; fitting turns it into a [`FittedModel`] that owns
//! everything needed to predict, including its feature expansion.

pub mod model;
pub mod spec;
pub mod tree;

pub use model::*;
pub use spec::*;
pub use tree::*;
