use crate::core::instances::Instance;
use crate::error::{EvalError, Result};
use crate::operators::struct_data::truncate_cell;
use crate::operators::{FieldOperator, InstanceOperator};
use crate::utils::text::value_to_text;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowStyle {
    Text,
    List,
}

/// Renders selected fields of a table row, e.g. `"name is Alex, age is 31, "`
/// (text style) or `"name: Alex, age: 31, "` (list style). Every field is
/// followed by the separator, the last one included.
#[derive(Debug, Clone)]
pub struct SerializeTableRow {
    fields: Vec<String>,
    to_field: String,
    max_cell_length: Option<usize>,
    style: RowStyle,
}

impl SerializeTableRow {
    pub fn as_text<I, S>(fields: I, to_field: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_style(fields, to_field, RowStyle::Text)
    }

    pub fn as_list<I, S>(fields: I, to_field: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_style(fields, to_field, RowStyle::List)
    }

    fn with_style<I, S>(fields: I, to_field: impl Into<String>, style: RowStyle) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            to_field: to_field.into(),
            max_cell_length: None,
            style,
        }
    }

    pub fn with_max_cell_length(mut self, max_cell_length: usize) -> Self {
        self.max_cell_length = Some(max_cell_length);
        self
    }
}

impl InstanceOperator for SerializeTableRow {
    fn process(&self, mut instance: Instance, _stream_name: &str) -> Result<Instance> {
        let mut row = String::new();
        for field in &self.fields {
            let value = instance.require(field)?;
            let text = self
                .max_cell_length
                .and_then(|max| truncate_cell(value, max))
                .unwrap_or_else(|| value_to_text(value));
            match self.style {
                RowStyle::Text => row.push_str(&format!("{field} is {text}, ")),
                RowStyle::List => row.push_str(&format!("{field}: {text}, ")),
            }
        }
        instance.insert(self.to_field.clone(), row);
        Ok(instance)
    }
}

/// `[[s, r, o], ...]` to `"s : r : o | ..."` with lower-cased relations.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerializeTriples;

impl FieldOperator for SerializeTriples {
    fn process_value(&self, value: Value) -> Result<Value> {
        let triples = match value {
            Value::Array(triples) => triples,
            other => {
                return Err(EvalError::format(format!(
                    "triples must be a list of [subject, relation, object], got {other}"
                )));
            }
        };
        let parts = triples
            .iter()
            .map(|triple| match triple.as_array().map(Vec::as_slice) {
                Some([subj, rel, obj]) => Ok(format!(
                    "{} : {} : {}",
                    value_to_text(subj),
                    value_to_text(rel).to_lowercase(),
                    value_to_text(obj)
                )),
                _ => Err(EvalError::format(format!(
                    "a triple must have exactly three items, got {triple}"
                ))),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Value::String(parts.join(" | ")))
    }
}

/// `{"k": v, ...}` to `"k is v, ..."`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerializeKeyValPairs;

impl FieldOperator for SerializeKeyValPairs {
    fn process_value(&self, value: Value) -> Result<Value> {
        let pairs = match value {
            Value::Object(pairs) => pairs,
            other => {
                return Err(EvalError::format(format!(
                    "key-value pairs must be a mapping, got {other}"
                )));
            }
        };
        let text = pairs
            .iter()
            .map(|(k, v)| format!("{k} is {}", value_to_text(v)))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(Value::String(text))
    }
}

/// Zips a list of keys and a list of values into a mapping.
#[derive(Debug, Clone)]
pub struct ListToKeyValPairs {
    keys_field: String,
    values_field: String,
    to_field: String,
}

impl ListToKeyValPairs {
    pub fn new(
        keys_field: impl Into<String>,
        values_field: impl Into<String>,
        to_field: impl Into<String>,
    ) -> Self {
        Self {
            keys_field: keys_field.into(),
            values_field: values_field.into(),
            to_field: to_field.into(),
        }
    }
}

impl InstanceOperator for ListToKeyValPairs {
    fn process(&self, mut instance: Instance, _stream_name: &str) -> Result<Instance> {
        let keys = list_field(&instance, &self.keys_field)?;
        let values = list_field(&instance, &self.values_field)?;
        let pairs: Map<String, Value> = keys
            .iter()
            .map(value_to_text)
            .zip(values.iter().cloned())
            .collect();
        instance.insert(self.to_field.clone(), pairs);
        Ok(instance)
    }
}

fn list_field<'a>(instance: &'a Instance, field: &str) -> Result<&'a Vec<Value>> {
    match instance.require(field)? {
        Value::Array(items) => Ok(items),
        other => Err(EvalError::format(format!(
            "field '{field}' must be a list, got {other}"
        ))),
    }
}
