use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::collections::btree_map;

/// A single reported score.
///
/// Numbers may be NaN (serialized as `null`), which marks an undefined
/// result such as an empty label set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged, from = "RawScore")]
pub enum ScoreValue {
    Number(f64),
    Numbers(Vec<f64>),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScore {
    Number(f64),
    Numbers(Vec<Option<f64>>),
    Text(String),
    Null(()),
}

impl From<RawScore> for ScoreValue {
    fn from(raw: RawScore) -> Self {
        match raw {
            RawScore::Number(v) => ScoreValue::Number(v),
            RawScore::Numbers(vs) => {
                ScoreValue::Numbers(vs.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
            }
            RawScore::Text(s) => ScoreValue::Text(s),
            RawScore::Null(()) => ScoreValue::Number(f64::NAN),
        }
    }
}

impl ScoreValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScoreValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScoreValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// JSON view of the score; NaN becomes `null`.
    pub fn to_json(&self) -> Value {
        match self {
            ScoreValue::Number(v) => number_to_json(*v),
            ScoreValue::Numbers(vs) => Value::Array(vs.iter().map(|v| number_to_json(*v)).collect()),
            ScoreValue::Text(s) => Value::String(s.clone()),
        }
    }
}

fn number_to_json(v: f64) -> Value {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

impl From<f64> for ScoreValue {
    fn from(v: f64) -> Self {
        ScoreValue::Number(v)
    }
}

impl From<Vec<f64>> for ScoreValue {
    fn from(vs: Vec<f64>) -> Self {
        ScoreValue::Numbers(vs)
    }
}

impl From<String> for ScoreValue {
    fn from(s: String) -> Self {
        ScoreValue::Text(s)
    }
}

impl From<&str> for ScoreValue {
    fn from(s: &str) -> Self {
        ScoreValue::Text(s.to_string())
    }
}

/// Ordered mapping from score name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scores(BTreeMap<String, ScoreValue>);

impl Scores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ScoreValue>) -> Option<ScoreValue> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&ScoreValue> {
        self.0.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<ScoreValue> {
        self.0.remove(name)
    }

    /// Numeric score by name; `None` when absent or not a number.
    pub fn number(&self, name: &str) -> Option<f64> {
        self.0.get(name).and_then(ScoreValue::as_f64)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(ScoreValue::as_str)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ScoreValue> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntoIterator for Scores {
    type Item = (String, ScoreValue);
    type IntoIter = btree_map::IntoIter<String, ScoreValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Extend<(String, ScoreValue)> for Scores {
    fn extend<T: IntoIterator<Item = (String, ScoreValue)>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl FromIterator<(String, ScoreValue)> for Scores {
    fn from_iter<T: IntoIterator<Item = (String, ScoreValue)>>(iter: T) -> Self {
        Scores(iter.into_iter().collect())
    }
}

/// The `score` entry of an instance: its own scores and the aggregate over
/// the stream it was scored in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    #[serde(default)]
    pub instance: Scores,
    #[serde(default)]
    pub global: Scores,
}
