use crate::core::instances::{PREDICTION_FIELD, REFERENCES_FIELD};
use crate::error::{EvalError, Result};
use crate::operators::{ApplyToInstances, FieldApplier, FieldOperator, SequentialOperator};
use crate::utils::text::value_to_text;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

const NONE_LABEL: &str = "none";

/// Post-processors applied to model predictions and references before
/// scoring. All but `RemoveNoneFromList` render their input as text first.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    JsonSchema,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Processor {
    LowerCase,
    /// Lower-cases and cuts at the first punctuation mark.
    LowerCaseTillPunc,
    TakeFirstNonEmptyLine,
    /// First run of word characters.
    TakeFirstWord,
    /// First word character after leading whitespace, or empty.
    FirstCharacter,
    ToStringStripped,
    /// `"yes"` becomes `"1"`, anything else `"0"`.
    YesNoToInt,
    /// `"yes"` stays, anything else becomes `"none"`.
    ToYesOrNone,
    /// Maps free text to `TRUE`, `FALSE` or `OTHER` by keyword.
    ConvertToBoolean,
    /// `"hate speech"` or `"not hate speech"` when mentioned, else unchanged.
    HateSpeechOrNotHateSpeech,
    ToxicOrNotToxic,
    /// `positive` stances become `PRO`, `negative` and `neutral` become `CON`.
    StanceToProCon,
    /// Drops `"none"` entries from a list-valued prediction or reference.
    RemoveNoneFromList,
}

impl Processor {
    pub fn apply_text(self, text: &str) -> String {
        match self {
            Processor::LowerCase => text.to_lowercase(),
            Processor::LowerCaseTillPunc => {
                let lowered = text.to_lowercase();
                match lowered.find(['.', ',', '!', '?', ';', ':']) {
                    Some(idx) => lowered[..idx].to_string(),
                    None => lowered,
                }
            }
            Processor::TakeFirstNonEmptyLine => text
                .trim()
                .split('\n')
                .next()
                .unwrap_or_default()
                .trim()
                .to_string(),
            Processor::TakeFirstWord => text
                .split(|c: char| !is_word_char(c))
                .find(|w| !w.is_empty())
                .unwrap_or_default()
                .to_string(),
            Processor::FirstCharacter => text
                .trim_start()
                .chars()
                .next()
                .filter(|c| is_word_char(*c))
                .map(String::from)
                .unwrap_or_default(),
            Processor::ToStringStripped => text.trim().to_string(),
            Processor::YesNoToInt => if text == "yes" { "1" } else { "0" }.to_string(),
            Processor::ToYesOrNone => if text == "yes" { "yes" } else { "none" }.to_string(),
            Processor::ConvertToBoolean => {
                let clean = text.trim().to_lowercase();
                if contains_any(&clean, &["no", "not", "wrong", "false"]) {
                    "FALSE".to_string()
                } else if contains_any(&clean, &["yes", "right", "correct", "true"]) {
                    "TRUE".to_string()
                } else {
                    "OTHER".to_string()
                }
            }
            Processor::HateSpeechOrNotHateSpeech => string_or_not_string(text, "hate speech"),
            Processor::ToxicOrNotToxic => string_or_not_string(text, "toxic"),
            Processor::StanceToProCon => {
                let clean = text.trim().to_lowercase();
                if clean.contains("positive") {
                    "PRO".to_string()
                } else if clean == "negative" || clean == "neutral" {
                    "CON".to_string()
                } else {
                    clean
                }
            }
            Processor::RemoveNoneFromList => text.to_string(),
        }
    }

    /// Catalog name, e.g. `processors.lower_case`.
    pub fn catalog_name(self) -> String {
        format!("processors.{self}")
    }

    /// Pipeline applying the processor to the prediction and to every
    /// reference of each instance.
    pub fn as_postprocessing(self) -> SequentialOperator {
        let op: Arc<dyn FieldOperator> = Arc::new(self);
        SequentialOperator::new(vec![
            Arc::new(ApplyToInstances::new(FieldApplier::from_arc(
                Arc::clone(&op),
                PREDICTION_FIELD,
            ))),
            Arc::new(ApplyToInstances::new(
                FieldApplier::from_arc(op, REFERENCES_FIELD).every_value(true),
            )),
        ])
    }
}

fn string_or_not_string(text: &str, string: &str) -> String {
    let lowered = text.to_lowercase();
    let negated = format!("not {string}");
    if lowered.contains(&negated) {
        negated
    } else if lowered.contains(string) {
        string.to_string()
    } else {
        text.to_string()
    }
}

fn contains_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

impl FieldOperator for Processor {
    fn process_value(&self, value: Value) -> Result<Value> {
        match (self, value) {
            (Processor::RemoveNoneFromList, Value::Array(items)) => Ok(Value::Array(
                items
                    .into_iter()
                    .filter(|item| item.as_str() != Some(NONE_LABEL))
                    .collect(),
            )),
            (Processor::RemoveNoneFromList, other) => Err(EvalError::format(format!(
                "remove_none_from_list expects a list, got {other}"
            ))),
            (_, value) => Ok(Value::String(self.apply_text(&value_to_text(&value)))),
        }
    }
}
