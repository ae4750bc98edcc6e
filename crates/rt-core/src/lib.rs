//! # rt-core
//!
//! Shared error type, result alias, curve-model trait and fit result types
//! used by the roottools crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::CurveModel;
pub use types::FitResult;
