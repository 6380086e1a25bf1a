mod instance;
mod score;

pub use instance::{Instance, PREDICTION_FIELD, REFERENCES_FIELD, TASK_DATA_FIELD};
pub use score::{ScoreRecord, ScoreValue, Scores};
