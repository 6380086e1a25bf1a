use anyhow::Result;
use schemars::{JsonSchema, Schema};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use strum::{EnumMessage, IntoEnumIterator};

/// Contract for a configuration enum tagged by `type` with its `params`.
pub trait Choice: Sized + Serialize + DeserializeOwned + JsonSchema {
    type Kind: Copy + Into<&'static str> + EnumMessage + IntoEnumIterator;

    /// JSON Schema for the whole tagged enum.
    fn schema() -> Schema;

    /// Default `params` JSON for a given kind.
    fn default_params(kind: Self::Kind) -> Result<Value>;

    /// Every kind tag with its short description.
    fn kinds() -> Vec<(&'static str, &'static str)> {
        Self::Kind::iter()
            .map(|kind| (kind.into(), kind.get_message().unwrap_or_default()))
            .collect()
    }

    /// Build the typed enum from kind + params.
    fn from_parts(kind: Self::Kind, params: Value) -> Result<Self> {
        let key: &'static str = kind.into();
        let v = json!({ "type": key, "params": params });
        Ok(serde_json::from_value(v)?)
    }

    /// Build the typed enum from kind + its default params.
    fn with_defaults(kind: Self::Kind) -> Result<Self> {
        Self::from_parts(kind, Self::default_params(kind)?)
    }
}
