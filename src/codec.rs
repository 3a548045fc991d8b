//! Pluggable codec between the state value tree and the stored string.

use serde_json::Value;

/// Boxed error type codecs report through.
pub type CodecError = Box<dyn std::error::Error + Send + Sync>;

/// Encode/decode between a JSON value tree and the stored representation.
pub trait Codec: Send + Sync {
    /// Serialize `value` into the stored string.
    ///
    /// # Errors
    /// Fails when `value` cannot be represented by this codec.
    fn encode(&self, value: &Value) -> Result<String, CodecError>;

    /// Parse a stored string back into a value tree.
    ///
    /// # Errors
    /// Fails when `raw` is not a valid record for this codec.
    fn decode(&self, raw: &str) -> Result<Value, CodecError>;
}

/// Default codec: compact JSON.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, value: &Value) -> Result<String, CodecError> {
        Ok(serde_json::to_string(value)?)
    }

    fn decode(&self, raw: &str) -> Result<Value, CodecError> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
#[path = "codec_test.rs"]
mod tests;
