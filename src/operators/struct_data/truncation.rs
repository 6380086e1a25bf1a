use crate::core::instances::Instance;
use crate::error::{EvalError, Result};
use crate::operators::{FieldOperator, InstanceOperator};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

/// Truncated form of a cell, or `None` when the cell is left alone: numbers,
/// nulls, blank strings and strings of at most `max_len` characters.
pub fn truncate_cell(cell: &Value, max_len: usize) -> Option<String> {
    let Value::String(text) = cell else {
        return None;
    };
    if text.trim().is_empty() || text.chars().count() <= max_len {
        return None;
    }
    Some(text.chars().take(max_len).collect())
}

/// Shortens long textual cells of a table field, and rewrites matching
/// entries of an answers field the same way so expected answers keep
/// matching the truncated table.
#[derive(Debug, Clone)]
pub struct TruncateTableCells {
    table_field: String,
    answers_field: Option<String>,
    max_length: usize,
}

impl TruncateTableCells {
    pub const DEFAULT_MAX_LENGTH: usize = 15;

    pub fn new(table_field: impl Into<String>) -> Self {
        Self {
            table_field: table_field.into(),
            answers_field: None,
            max_length: Self::DEFAULT_MAX_LENGTH,
        }
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_answers_field(mut self, field: impl Into<String>) -> Self {
        self.answers_field = Some(field.into());
        self
    }

    fn truncate_rows(&self, table: &mut Value) -> Result<HashMap<String, String>> {
        let mut mapping = HashMap::new();
        let rows = match table.get_mut("rows") {
            None => return Ok(mapping),
            Some(Value::Array(rows)) => rows,
            Some(other) => {
                return Err(EvalError::format(format!("table rows must be a list, got {other}")));
            }
        };
        for row in rows.iter_mut() {
            let cells = match row {
                Value::Array(cells) => cells,
                other => {
                    return Err(EvalError::format(format!("table row must be a list, got {other}")));
                }
            };
            for cell in cells.iter_mut() {
                if let Some(short) = truncate_cell(cell, self.max_length) {
                    if let Value::String(original) = cell {
                        mapping.insert(original.clone(), short.clone());
                    }
                    *cell = Value::String(short);
                }
            }
        }
        Ok(mapping)
    }
}

impl InstanceOperator for TruncateTableCells {
    fn process(&self, mut instance: Instance, _stream_name: &str) -> Result<Instance> {
        let mapping = self.truncate_rows(instance.require_mut(&self.table_field)?)?;
        if let Some(field) = &self.answers_field {
            if let Value::Array(answers) = instance.require_mut(field)? {
                for answer in answers.iter_mut() {
                    if let Value::String(text) = answer {
                        if let Some(short) = mapping.get(text.as_str()) {
                            *text = short.clone();
                        }
                    }
                }
            }
        }
        Ok(instance)
    }
}

/// Caps the number of table rows by deleting randomly chosen rows; the
/// remaining rows keep their relative order.
#[derive(Debug)]
pub struct TruncateTableRows {
    rows_to_keep: usize,
    rng: Mutex<StdRng>,
}

impl TruncateTableRows {
    pub const DEFAULT_ROWS_TO_KEEP: usize = 10;

    pub fn new(rows_to_keep: usize, seed: u64) -> Self {
        Self {
            rows_to_keep,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl FieldOperator for TruncateTableRows {
    fn process_value(&self, mut table: Value) -> Result<Value> {
        let num_rows = match table.get("rows") {
            Some(Value::Array(rows)) => rows.len(),
            _ => return Ok(table),
        };
        if num_rows <= self.rows_to_keep {
            return Ok(table);
        }
        let deleted: HashSet<usize> = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            index::sample(&mut *rng, num_rows, num_rows - self.rows_to_keep)
                .into_iter()
                .collect()
        };
        if let Some(Value::Array(rows)) = table.get_mut("rows") {
            let kept: Vec<Value> = std::mem::take(rows)
                .into_iter()
                .enumerate()
                .filter(|(i, _)| !deleted.contains(i))
                .map(|(_, row)| row)
                .collect();
            *rows = kept;
        }
        Ok(table)
    }
}
