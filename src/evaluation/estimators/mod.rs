mod estimator;
mod mean;

pub use estimator::Estimator;
pub use mean::{SkipNanMean, StrictMean};
