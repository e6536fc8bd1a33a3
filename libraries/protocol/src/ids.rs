//! Identifier fields arrive either as JSON strings or numbers depending on
//! the server generation; both are normalized to `String`.

use serde::{Deserialize, Deserializer, de::Error};
use serde_json::Value;

fn to_id<E: Error>(value: Value) -> Result<Option<String>, E> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(text)),
        Value::Number(number) => Ok(Some(number.to_string())),
        other => Err(E::custom(format!("expected string or number id, got {other}"))),
    }
}

pub(crate) fn required<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    to_id(Value::deserialize(deserializer)?)?.ok_or_else(|| D::Error::custom("missing id"))
}

pub(crate) fn optional<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    to_id(Value::deserialize(deserializer)?)
}
