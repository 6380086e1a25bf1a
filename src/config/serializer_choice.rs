use crate::config::Choice;
use crate::error::{EvalError, Result};
use crate::operators::struct_data::{
    SerializeTable, SerializeTableRow, TableFormat, TruncateTableCells, TruncateTableRows,
};
use crate::operators::{ApplyToInstances, FieldApplier, SequentialOperator, StreamOperator};
use schemars::{JsonSchema, Schema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use strum_macros::{Display, EnumDiscriminants, EnumIter, EnumMessage, EnumString, IntoStaticStr};

const DEFAULT_SEED: u64 = 42;
fn default_seed() -> u64 {
    DEFAULT_SEED
}

fn default_table_field() -> String {
    "table".to_string()
}

fn default_row_field() -> String {
    "row_text".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TableSerializerParameters {
    #[serde(default = "default_table_field")]
    #[schemars(title = "Field", description = "Field holding the table", default = "default_table_field")]
    pub field: String,

    #[serde(default)]
    #[schemars(title = "Target Field", description = "Where the text goes; empty = in place")]
    pub to_field: Option<String>,

    #[serde(default)]
    #[schemars(title = "Max Rows", description = "Randomly drop rows beyond this count")]
    pub max_rows: Option<usize>,

    #[serde(default)]
    #[schemars(title = "Max Cell Length", description = "Truncate longer cells")]
    pub max_cell_length: Option<usize>,

    #[serde(default = "default_seed")]
    #[schemars(title = "Seed", description = "PRNG seed for row truncation", default = "default_seed")]
    pub seed: u64,
}

impl Default for TableSerializerParameters {
    fn default() -> Self {
        Self {
            field: default_table_field(),
            to_field: None,
            max_rows: None,
            max_cell_length: None,
            seed: DEFAULT_SEED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RowSerializerParameters {
    #[schemars(title = "Fields", description = "Row fields to render, in order")]
    pub fields: Vec<String>,

    #[serde(default = "default_row_field")]
    #[schemars(title = "Target Field", default = "default_row_field")]
    pub to_field: String,

    #[serde(default)]
    #[schemars(title = "Max Cell Length", description = "Truncate longer cells")]
    pub max_cell_length: Option<usize>,
}

impl Default for RowSerializerParameters {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            to_field: default_row_field(),
            max_cell_length: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, EnumDiscriminants)]
#[serde(tag = "type", content = "params", rename_all = "kebab-case")]
#[strum_discriminants(name(SerializerKind))]
#[strum_discriminants(derive(EnumIter, EnumString, Display, IntoStaticStr, EnumMessage))]
#[strum_discriminants(strum(serialize_all = "kebab-case"))]
pub enum SerializerChoice {
    #[strum_discriminants(strum(
        message = "Indexed Row Major",
        detailed_message = "col : a | b row 1 : x | y ..."
    ))]
    IndexedRowMajor(TableSerializerParameters),

    #[strum_discriminants(strum(message = "Markdown", detailed_message = "Pipe-delimited markdown table."))]
    Markdown(TableSerializerParameters),

    #[strum_discriminants(strum(message = "Row As Text", detailed_message = "\"name is Alex, age is 31\""))]
    TableRowAsText(RowSerializerParameters),

    #[strum_discriminants(strum(message = "Row As List", detailed_message = "\"name: Alex, age: 31\""))]
    TableRowAsList(RowSerializerParameters),
}

impl Choice for SerializerChoice {
    type Kind = SerializerKind;

    fn schema() -> Schema {
        schema_for!(SerializerChoice)
    }

    fn default_params(kind: Self::Kind) -> anyhow::Result<Value> {
        let params = match kind {
            SerializerKind::IndexedRowMajor | SerializerKind::Markdown => {
                serde_json::to_value(TableSerializerParameters::default())?
            }
            SerializerKind::TableRowAsText | SerializerKind::TableRowAsList => {
                serde_json::to_value(RowSerializerParameters::default())?
            }
        };
        Ok(params)
    }
}

fn table_pipeline(format: TableFormat, p: TableSerializerParameters) -> SequentialOperator {
    let mut steps: Vec<Arc<dyn StreamOperator>> = Vec::new();
    if let Some(max_length) = p.max_cell_length {
        steps.push(Arc::new(ApplyToInstances::new(
            TruncateTableCells::new(p.field.clone()).with_max_length(max_length),
        )));
    }
    if let Some(max_rows) = p.max_rows {
        steps.push(Arc::new(ApplyToInstances::new(FieldApplier::new(
            TruncateTableRows::new(max_rows, p.seed),
            &p.field,
        ))));
    }
    let to_field = p.to_field.as_deref().unwrap_or(&p.field);
    steps.push(Arc::new(ApplyToInstances::new(
        FieldApplier::new(SerializeTable::new(format), &p.field).to_field(to_field),
    )));
    SequentialOperator::new(steps)
}

fn row_operator(row: SerializeTableRow, max_cell_length: Option<usize>) -> SequentialOperator {
    let row = match max_cell_length {
        Some(max) => row.with_max_cell_length(max),
        None => row,
    };
    SequentialOperator::new(vec![Arc::new(ApplyToInstances::new(row))])
}

impl SerializerChoice {
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| EvalError::config(format!("invalid serializer config: {e}")))
    }

    pub fn build(self) -> Result<SequentialOperator> {
        match self {
            SerializerChoice::IndexedRowMajor(p) => Ok(table_pipeline(TableFormat::IndexedRowMajor, p)),
            SerializerChoice::Markdown(p) => Ok(table_pipeline(TableFormat::Markdown, p)),
            SerializerChoice::TableRowAsText(p) | SerializerChoice::TableRowAsList(p) if p.fields.is_empty() => {
                Err(EvalError::config("a row serializer needs at least one field"))
            }
            SerializerChoice::TableRowAsText(p) => {
                Ok(row_operator(SerializeTableRow::as_text(p.fields, p.to_field), p.max_cell_length))
            }
            SerializerChoice::TableRowAsList(p) => {
                Ok(row_operator(SerializeTableRow::as_list(p.fields, p.to_field), p.max_cell_length))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::instances::Instance;
    use crate::streams::MultiStream;
    use serde_json::json;

    fn run(choice: SerializerChoice, instance: Instance) -> Instance {
        let ms = MultiStream::from_iterables([("test", vec![instance])], true);
        let out = choice.build().unwrap().apply(ms).unwrap().materialize().unwrap();
        out["test"][0].clone()
    }

    fn table_instance() -> Instance {
        Instance::new().with(
            "table",
            json!({"header": ["name", "age"], "rows": [["Alex", 26], ["Raj", 34]]}),
        )
    }

    #[test]
    fn markdown_by_tag() {
        let choice = SerializerChoice::from_value(json!({
            "type": "markdown",
            "params": {"to_field": "table_text"}
        }))
        .unwrap();
        let out = run(choice, table_instance());
        assert_eq!(out.get("table_text"), Some(&json!("|name|age|\n|---|---|\n|Alex|26|\n|Raj|34|\n")));
        assert!(out.get("table").unwrap().is_object());
    }

    #[test]
    fn row_limit_applies_before_serializing() {
        let choice = SerializerChoice::IndexedRowMajor(TableSerializerParameters {
            max_rows: Some(1),
            ..Default::default()
        });
        let text = run(choice, table_instance()).get("table").cloned().unwrap();
        let text = text.as_str().unwrap();
        assert!(text.starts_with("col : name | age row 1 : "));
        assert!(!text.contains("row 2 : "));
    }

    #[test]
    fn row_serializers() {
        let instance = Instance::new().with("name", "Alex").with("age", 31);
        let choice = SerializerChoice::from_value(json!({
            "type": "table-row-as-list",
            "params": {"fields": ["name", "age"]}
        }))
        .unwrap();
        assert_eq!(run(choice, instance.clone()).get("row_text"), Some(&json!("name: Alex, age: 31, ")));

        let empty = SerializerChoice::with_defaults(SerializerKind::TableRowAsText).unwrap();
        assert!(matches!(empty.build(), Err(EvalError::Config(_))));
    }
}
