mod linearize;
mod serializers;
mod truncation;

pub use linearize::{ListToKeyValPairs, SerializeKeyValPairs, SerializeTableRow, SerializeTriples};
pub use serializers::{IndexedRowMajor, Markdown, SerializeTable, TableFormat, TableSerializer};
pub use truncation::{TruncateTableCells, TruncateTableRows, truncate_cell};
