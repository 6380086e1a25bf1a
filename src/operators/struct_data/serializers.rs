use crate::core::table::{Cell, Table};
use crate::error::Result;
use crate::operators::FieldOperator;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Flattens a [`Table`] into prompt text.
///
/// `serialize_table` checks the table and stitches together the pieces
/// produced by `process_header` and `process_row` (rows are 1-based).
pub trait TableSerializer: Send + Sync {
    fn serialize_table(&self, table: &Table) -> Result<String>;

    fn process_header(&self, header: &[String]) -> String;

    fn process_row(&self, row: &[Cell], row_index: usize) -> String;
}

/// `col : h1 | h2 row 1 : v1 | v2 row 2 : ...`
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexedRowMajor;

impl TableSerializer for IndexedRowMajor {
    fn serialize_table(&self, table: &Table) -> Result<String> {
        table.ensure_well_formed()?;
        let mut parts = Vec::with_capacity(table.rows.len() + 1);
        parts.push(self.process_header(&table.header));
        for (i, row) in table.rows.iter().enumerate() {
            parts.push(self.process_row(row, i + 1));
        }
        Ok(parts.join(" ").trim().to_string())
    }

    fn process_header(&self, header: &[String]) -> String {
        format!("col : {}", header.join(" | "))
    }

    fn process_row(&self, row: &[Cell], row_index: usize) -> String {
        format!("row {row_index} : {}", join_cells(row, " | "))
    }
}

/// Pipe table: header row, `---` separator row, one row per data row.
#[derive(Debug, Clone, Copy, Default)]
pub struct Markdown;

impl TableSerializer for Markdown {
    fn serialize_table(&self, table: &Table) -> Result<String> {
        table.ensure_well_formed()?;
        let mut out = self.process_header(&table.header);
        for (i, row) in table.rows.iter().enumerate() {
            out.push_str(&self.process_row(row, i + 1));
        }
        Ok(out)
    }

    fn process_header(&self, header: &[String]) -> String {
        let separator = vec!["---"; header.len()].join("|");
        format!("|{}|\n|{separator}|\n", header.join("|"))
    }

    fn process_row(&self, row: &[Cell], _row_index: usize) -> String {
        format!("|{}|\n", join_cells(row, "|"))
    }
}

fn join_cells(row: &[Cell], sep: &str) -> String {
    row.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(sep)
}

/// Serializer selection, tagged by `format`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "format", rename_all = "kebab-case")]
pub enum TableFormat {
    #[default]
    IndexedRowMajor,
    Markdown,
}

impl TableSerializer for TableFormat {
    fn serialize_table(&self, table: &Table) -> Result<String> {
        match self {
            TableFormat::IndexedRowMajor => IndexedRowMajor.serialize_table(table),
            TableFormat::Markdown => Markdown.serialize_table(table),
        }
    }

    fn process_header(&self, header: &[String]) -> String {
        match self {
            TableFormat::IndexedRowMajor => IndexedRowMajor.process_header(header),
            TableFormat::Markdown => Markdown.process_header(header),
        }
    }

    fn process_row(&self, row: &[Cell], row_index: usize) -> String {
        match self {
            TableFormat::IndexedRowMajor => IndexedRowMajor.process_row(row, row_index),
            TableFormat::Markdown => Markdown.process_row(row, row_index),
        }
    }
}

/// Field operator turning a table value into its text form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SerializeTable {
    #[serde(flatten)]
    pub format: TableFormat,
}

impl SerializeTable {
    pub fn new(format: TableFormat) -> Self {
        Self { format }
    }
}

impl FieldOperator for SerializeTable {
    fn process_value(&self, value: Value) -> Result<Value> {
        let table = Table::from_value(&value)?;
        Ok(Value::String(self.format.serialize_table(&table)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;
    use serde_json::json;

    fn table() -> Value {
        json!({
            "header": ["name", "age"],
            "rows": [["Alex", 26], ["Raj", 34], ["Donald", 39.5]]
        })
    }

    #[test]
    fn indexed_row_major_format() {
        let out = SerializeTable::new(TableFormat::IndexedRowMajor)
            .process_value(table())
            .unwrap();
        assert_eq!(
            out,
            json!("col : name | age row 1 : Alex | 26 row 2 : Raj | 34 row 3 : Donald | 39.5")
        );
    }

    #[test]
    fn indexed_rows_are_numbered_once_each() {
        let t = Table::from_value(&table()).unwrap();
        let out = IndexedRowMajor.serialize_table(&t).unwrap();
        assert!(out.starts_with("col : name | age"));
        for n in 1..=3 {
            assert_eq!(out.matches(&format!("row {n} : ")).count(), 1);
        }
        assert!(!out.contains("row 4 : "));
    }

    #[test]
    fn markdown_format() {
        let out = SerializeTable::new(TableFormat::Markdown)
            .process_value(table())
            .unwrap();
        assert_eq!(
            out,
            json!("|name|age|\n|---|---|\n|Alex|26|\n|Raj|34|\n|Donald|39.5|\n")
        );
    }

    #[test]
    fn empty_tables_are_rejected() {
        for format in [TableFormat::IndexedRowMajor, TableFormat::Markdown] {
            let err = SerializeTable::new(format)
                .process_value(json!({"header": ["a"], "rows": []}))
                .unwrap_err();
            assert!(matches!(err, EvalError::Format(ref m) if m.contains("Incorrect input table format")));
        }
    }

    #[test]
    fn format_is_selected_by_tag() {
        let op: SerializeTable = serde_json::from_value(json!({"format": "markdown"})).unwrap();
        assert_eq!(op.format, TableFormat::Markdown);
        let op: SerializeTable = serde_json::from_value(json!({"format": "indexed-row-major"})).unwrap();
        assert_eq!(op.format, TableFormat::IndexedRowMajor);
    }
}
