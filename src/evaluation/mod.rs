pub mod confidence;
pub mod estimators;
mod evaluate;
pub mod metrics;

pub use evaluate::{ColumnarTable, Dataset, Evaluation, evaluate};
