mod choice;
mod metric_choice;
mod serializer_choice;

pub use choice::Choice;
pub use metric_choice::*;
pub use serializer_choice::*;
