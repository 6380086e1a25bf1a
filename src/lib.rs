pub mod catalog;
pub mod config;
pub mod core;
pub mod error;
pub mod evaluation;
pub mod operators;
pub mod recipe;
pub mod streams;
pub mod utils;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use catalog::{Artifact, Catalog};
pub use error::{EvalError, Result};
pub use evaluation::{Dataset, Evaluation, evaluate};
