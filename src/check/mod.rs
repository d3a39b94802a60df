//! Domain model for background-check cases.

pub mod package;
pub mod types;
pub mod verdict;

pub use package::{SearchSpec, searches_for};
pub use types::*;
pub use verdict::assess;
