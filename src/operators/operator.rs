use crate::core::instances::Instance;
use crate::error::{EvalError, Result};
use crate::streams::MultiStream;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Transformation over a whole [`MultiStream`].
///
/// Implementations may filter, reorder, split or merge partitions. They
/// should keep the output lazy: wrap streams rather than iterate them, so
/// that nothing runs until the final consumer pulls instances.
pub trait StreamOperator: Send + Sync {
    fn apply(&self, multi_stream: MultiStream) -> Result<MultiStream>;
}

/// Transformation of one instance, knowing which partition it came from.
pub trait InstanceOperator: Send + Sync {
    fn process(&self, instance: Instance, stream_name: &str) -> Result<Instance>;
}

/// Pure transformation of a single field value.
pub trait FieldOperator: Send + Sync {
    fn process_value(&self, value: Value) -> Result<Value>;
}

/// Lifts an [`InstanceOperator`] to every instance of every partition (or of
/// the selected partitions only).
#[derive(Clone)]
pub struct ApplyToInstances {
    operator: Arc<dyn InstanceOperator>,
    apply_to: Option<BTreeSet<String>>,
}

impl ApplyToInstances {
    pub fn new<O: InstanceOperator + 'static>(operator: O) -> Self {
        Self::from_arc(Arc::new(operator))
    }

    pub fn from_arc(operator: Arc<dyn InstanceOperator>) -> Self {
        Self {
            operator,
            apply_to: None,
        }
    }

    /// Restricts the operator to the named partitions; others pass through.
    pub fn only<I, S>(mut self, streams: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.apply_to = Some(streams.into_iter().map(Into::into).collect());
        self
    }

    fn applies_to(&self, stream_name: &str) -> bool {
        self.apply_to
            .as_ref()
            .is_none_or(|names| names.contains(stream_name))
    }
}

impl StreamOperator for ApplyToInstances {
    fn apply(&self, multi_stream: MultiStream) -> Result<MultiStream> {
        multi_stream.map_streams(|name, stream| {
            if !self.applies_to(name) {
                return Ok(stream);
            }
            let operator = Arc::clone(&self.operator);
            let stream_name = name.to_string();
            Ok(stream.map_instances(move |instance| operator.process(instance, &stream_name)))
        })
    }
}

/// Lifts a [`FieldOperator`] to an [`InstanceOperator`].
///
/// Each `(from, to)` pair reads `from`, transforms it and writes `to` (the
/// same field when processing in place). With `process_every_value` the
/// field must hold a list and the operator runs on each element.
#[derive(Clone)]
pub struct FieldApplier {
    operator: Arc<dyn FieldOperator>,
    field_to_field: Vec<(String, String)>,
    process_every_value: bool,
}

impl FieldApplier {
    /// Applies `operator` in place on `field`.
    pub fn new<O: FieldOperator + 'static>(operator: O, field: &str) -> Self {
        Self::from_arc(Arc::new(operator), field)
    }

    pub fn from_arc(operator: Arc<dyn FieldOperator>, field: &str) -> Self {
        Self {
            operator,
            field_to_field: vec![(field.to_string(), field.to_string())],
            process_every_value: false,
        }
    }

    pub fn with_field_to_field<I, A, B>(operator: Arc<dyn FieldOperator>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        Self {
            operator,
            field_to_field: pairs
                .into_iter()
                .map(|(a, b)| (a.into(), b.into()))
                .collect(),
            process_every_value: false,
        }
    }

    /// Writes the result of the (single) mapping to `to_field`.
    pub fn to_field(mut self, to_field: &str) -> Self {
        for (_, to) in &mut self.field_to_field {
            *to = to_field.to_string();
        }
        self
    }

    pub fn every_value(mut self, process_every_value: bool) -> Self {
        self.process_every_value = process_every_value;
        self
    }

    fn transform(&self, field: &str, value: Value) -> Result<Value> {
        if !self.process_every_value {
            return self.operator.process_value(value);
        }
        match value {
            Value::Array(items) => Ok(Value::Array(
                items
                    .into_iter()
                    .map(|v| self.operator.process_value(v))
                    .collect::<Result<_>>()?,
            )),
            other => Err(EvalError::format(format!(
                "field '{field}' must be a list to process every value, got {other}"
            ))),
        }
    }
}

impl InstanceOperator for FieldApplier {
    fn process(&self, mut instance: Instance, _stream_name: &str) -> Result<Instance> {
        for (from, to) in &self.field_to_field {
            let value = instance.require(from)?.clone();
            let out = self.transform(from, value)?;
            instance.insert(to.clone(), out);
        }
        Ok(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Upper;

    impl FieldOperator for Upper {
        fn process_value(&self, value: Value) -> Result<Value> {
            match value {
                Value::String(s) => Ok(Value::String(s.to_uppercase())),
                other => Err(EvalError::format(format!("not text: {other}"))),
            }
        }
    }

    struct TagWithStream;

    impl InstanceOperator for TagWithStream {
        fn process(&self, instance: Instance, stream_name: &str) -> Result<Instance> {
            Ok(instance.with("origin", stream_name))
        }
    }

    #[test]
    fn field_applier_in_place_and_to_field() {
        let inst = Instance::new().with("a", "x");
        let out = FieldApplier::new(Upper, "a").process(inst.clone(), "test").unwrap();
        assert_eq!(out.get("a"), Some(&json!("X")));

        let out = FieldApplier::new(Upper, "a").to_field("b").process(inst, "test").unwrap();
        assert_eq!(out.get("a"), Some(&json!("x")));
        assert_eq!(out.get("b"), Some(&json!("X")));
    }

    #[test]
    fn field_applier_every_value() {
        let inst = Instance::new().with("refs", json!(["a", "b"]));
        let out = FieldApplier::new(Upper, "refs")
            .every_value(true)
            .process(inst, "test")
            .unwrap();
        assert_eq!(out.get("refs"), Some(&json!(["A", "B"])));

        let not_list = Instance::new().with("refs", "a");
        assert!(
            FieldApplier::new(Upper, "refs")
                .every_value(true)
                .process(not_list, "test")
                .is_err()
        );
    }

    #[test]
    fn missing_field_is_an_error() {
        let err = FieldApplier::new(Upper, "nope")
            .process(Instance::new(), "test")
            .unwrap_err();
        assert!(matches!(err, EvalError::MissingField(f) if f == "nope"));
    }

    #[test]
    fn apply_to_instances_respects_selection() {
        let ms = MultiStream::from_iterables(
            [("train", vec![Instance::new()]), ("test", vec![Instance::new()])],
            true,
        );
        let out = ApplyToInstances::new(TagWithStream)
            .only(["test"])
            .apply(ms)
            .unwrap()
            .materialize()
            .unwrap();
        assert_eq!(out["test"][0].get("origin"), Some(&json!("test")));
        assert!(out["train"][0].get("origin").is_none());
    }
}
