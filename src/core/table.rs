use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A table cell: text, integer or float.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Int(v) => write!(f, "{v}"),
            Cell::Float(v) => write!(f, "{v:?}"),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

/// Structured table value: `{"header": [...], "rows": [[...], ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    #[serde(default)]
    pub header: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(header: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self { header, rows }
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        Table::deserialize(value)
            .map_err(|e| EvalError::format(format!("malformed table {value}: {e}")))
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Checks that both header and rows are present.
    pub fn ensure_well_formed(&self) -> Result<()> {
        if self.header.is_empty() || self.rows.is_empty() {
            return Err(EvalError::format(format!(
                "Incorrect input table format: header {:?} with {} rows",
                self.header,
                self.rows.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_mixed_cells() {
        let t = Table::from_value(&json!({
            "header": ["name", "age", "height"],
            "rows": [["Alex", 26, 1.75]]
        }))
        .unwrap();
        assert_eq!(t.rows[0][0], Cell::Text("Alex".into()));
        assert_eq!(t.rows[0][1], Cell::Int(26));
        assert_eq!(t.rows[0][2], Cell::Float(1.75));
        assert_eq!(t.rows[0][1].to_string(), "26");
        assert_eq!(Cell::Float(2.0).to_string(), "2.0");
    }

    #[test]
    fn rejects_non_table_values() {
        assert!(matches!(
            Table::from_value(&json!({"rows": "nope"})),
            Err(EvalError::Format(_))
        ));
    }

    #[test]
    fn missing_header_is_not_well_formed() {
        let t = Table::from_value(&json!({"rows": [["a"]]})).unwrap();
        let err = t.ensure_well_formed().unwrap_err();
        assert!(err.to_string().contains("Incorrect input table format"));
    }
}
