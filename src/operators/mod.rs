mod fields;
mod operator;
pub mod processors;
mod sequential;
mod stream_ops;
pub mod struct_data;

pub use fields::{AddFields, MapInstanceValues, RenameFields};
pub use operator::{ApplyToInstances, FieldApplier, FieldOperator, InstanceOperator, StreamOperator};
pub use processors::Processor;
pub use sequential::{SequentialOperator, Step};
pub use stream_ops::{DeleteSplits, FilterByValues, MergeStreams, RenameSplits, Shuffle, TakeFirst};
