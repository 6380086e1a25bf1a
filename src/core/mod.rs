pub mod instances;
pub mod table;

pub use instances::{Instance, ScoreRecord, ScoreValue, Scores};
pub use table::{Cell, Table};
