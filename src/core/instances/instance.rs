use crate::core::instances::ScoreRecord;
use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const PREDICTION_FIELD: &str = "prediction";
pub const REFERENCES_FIELD: &str = "references";
pub const TASK_DATA_FIELD: &str = "task_data";

/// One example record flowing through a pipeline.
///
/// Fields keep their insertion order. The score record, once a metric has
/// been applied, is kept apart from the plain fields and serialized under
/// the `score` key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    #[serde(flatten)]
    fields: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    score: Option<ScoreRecord>,
}

impl Instance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an instance from a JSON object; anything else is a format error.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(_) => Ok(serde_json::from_value(value)?),
            other => Err(EvalError::format(format!(
                "an instance must be a JSON object, got {other}"
            ))),
        }
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        self.fields.get_mut(field)
    }

    pub fn require(&self, field: &str) -> Result<&Value> {
        self.fields
            .get(field)
            .ok_or_else(|| EvalError::MissingField(field.to_string()))
    }

    pub fn require_mut(&mut self, field: &str) -> Result<&mut Value> {
        self.fields
            .get_mut(field)
            .ok_or_else(|| EvalError::MissingField(field.to_string()))
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.shift_remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    pub fn prediction(&self) -> Result<&Value> {
        self.require(PREDICTION_FIELD)
    }

    /// The acceptable targets of this instance, which must be a list.
    pub fn references(&self) -> Result<&[Value]> {
        match self.require(REFERENCES_FIELD)? {
            Value::Array(items) => Ok(items),
            other => Err(EvalError::format(format!(
                "references must be a list, got {other}"
            ))),
        }
    }

    /// Auxiliary mapping used by grouped metrics; `None` when absent.
    pub fn task_data(&self) -> Result<Option<&Map<String, Value>>> {
        match self.fields.get(TASK_DATA_FIELD) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(other) => Err(EvalError::format(format!(
                "task_data must be a mapping, got {other}"
            ))),
        }
    }

    pub fn score(&self) -> Option<&ScoreRecord> {
        self.score.as_ref()
    }

    pub fn score_mut(&mut self) -> &mut ScoreRecord {
        self.score.get_or_insert_with(ScoreRecord::default)
    }

    pub fn take_score(&mut self) -> Option<ScoreRecord> {
        self.score.take()
    }
}

impl From<Map<String, Value>> for Instance {
    fn from(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            score: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_value_rejects_non_objects() {
        let err = Instance::from_value(json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("[1,2]"));
    }

    #[test]
    fn score_roundtrips_under_score_key() {
        let mut inst = Instance::new().with("prediction", "A").with("references", json!(["A"]));
        inst.score_mut().instance.insert("accuracy", 1.0);

        let v = inst.to_value().unwrap();
        assert_eq!(v["prediction"], json!("A"));
        assert_eq!(v["score"]["instance"]["accuracy"], json!(1.0));

        let back = Instance::from_value(v).unwrap();
        assert_eq!(back, inst);
        assert!(!back.contains("score"));
    }

    #[test]
    fn references_must_be_a_list() {
        let inst = Instance::new().with("references", "A");
        assert!(matches!(inst.references(), Err(EvalError::Format(_))));
        let missing = Instance::new();
        assert!(matches!(missing.references(), Err(EvalError::MissingField(_))));
    }

    #[test]
    fn task_data_is_optional() {
        let inst = Instance::new();
        assert!(inst.task_data().unwrap().is_none());
        let inst = inst.with("task_data", json!({"group_id": 1}));
        assert_eq!(inst.task_data().unwrap().unwrap()["group_id"], json!(1));
    }

    #[test]
    fn remove_keeps_field_order() {
        let mut inst = Instance::new().with("a", 1).with("b", 2).with("c", 3);
        inst.remove("b");
        let keys: Vec<_> = inst.fields().keys().cloned().collect();
        assert_eq!(keys, vec!["a", "c"]);
    }
}
