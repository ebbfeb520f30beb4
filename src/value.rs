//! Structured values and entity conversion

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
pub use serde_json::Value;
use tracing::debug;

/// Parse a raw response body into a structured value
pub fn parse(bytes: &[u8]) -> Result<Value, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Conversion from one element of a parsed payload into an entity.
///
/// Conversion is infallible: an element that does not decode yields the
/// default value.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Self;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Self {
        value.clone()
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Self {
        decode_or_default(value)
    }
}

/// Decode `value` through its `Deserialize` impl, falling back to `T::default()`
pub(crate) fn decode_or_default<T: DeserializeOwned + Default>(value: &Value) -> T {
    match T::deserialize(value) {
        Ok(decoded) => decoded,
        Err(e) => {
            debug!(error = %e, "Element does not decode, using defaults");
            T::default()
        }
    }
}

/// Field deserializer mapping an explicit `null` to the default value
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
