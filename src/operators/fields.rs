use crate::core::instances::Instance;
use crate::error::{EvalError, Result};
use crate::operators::InstanceOperator;
use crate::utils::text::value_to_text;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Moves field values to new names.
#[derive(Debug, Clone)]
pub struct RenameFields {
    field_to_field: Vec<(String, String)>,
}

impl RenameFields {
    pub fn new<I, A, B>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        Self {
            field_to_field: pairs
                .into_iter()
                .map(|(a, b)| (a.into(), b.into()))
                .collect(),
        }
    }
}

impl InstanceOperator for RenameFields {
    fn process(&self, mut instance: Instance, _stream_name: &str) -> Result<Instance> {
        for (from, to) in &self.field_to_field {
            let value = instance
                .remove(from)
                .ok_or_else(|| EvalError::MissingField(from.clone()))?;
            instance.insert(to.clone(), value);
        }
        Ok(instance)
    }
}

/// Sets constant fields, overwriting existing values.
#[derive(Debug, Clone)]
pub struct AddFields {
    fields: Map<String, Value>,
}

impl AddFields {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

impl InstanceOperator for AddFields {
    fn process(&self, mut instance: Instance, _stream_name: &str) -> Result<Instance> {
        for (k, v) in &self.fields {
            instance.insert(k.clone(), v.clone());
        }
        Ok(instance)
    }
}

/// Replaces field values through per-field lookup tables keyed by the
/// value's text.
///
/// In strict mode (the default) a value with no entry is a format error;
/// otherwise it is left as is.
#[derive(Debug, Clone)]
pub struct MapInstanceValues {
    mappers: BTreeMap<String, BTreeMap<String, Value>>,
    strict: bool,
    process_every_value: bool,
}

impl MapInstanceValues {
    pub fn new(mappers: BTreeMap<String, BTreeMap<String, Value>>) -> Self {
        Self {
            mappers,
            strict: true,
            process_every_value: false,
        }
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn every_value(mut self, process_every_value: bool) -> Self {
        self.process_every_value = process_every_value;
        self
    }

    fn map_value(&self, field: &str, mapper: &BTreeMap<String, Value>, value: Value) -> Result<Value> {
        let key = value_to_text(&value);
        match mapper.get(&key) {
            Some(mapped) => Ok(mapped.clone()),
            None if self.strict => Err(EvalError::format(format!(
                "value '{key}' in field '{field}' is not found in mapper"
            ))),
            None => Ok(value),
        }
    }
}

impl InstanceOperator for MapInstanceValues {
    fn process(&self, mut instance: Instance, _stream_name: &str) -> Result<Instance> {
        for (field, mapper) in &self.mappers {
            let value = instance.require(field)?.clone();
            let mapped = match value {
                Value::Array(items) if self.process_every_value => Value::Array(
                    items
                        .into_iter()
                        .map(|v| self.map_value(field, mapper, v))
                        .collect::<Result<_>>()?,
                ),
                other => self.map_value(field, mapper, other)?,
            };
            instance.insert(field.clone(), mapped);
        }
        Ok(instance)
    }
}
