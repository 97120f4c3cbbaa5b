use crate::core::error::SimResult;
use serde_json::Value;

/// Payload encoding used by a component's sockets.
///
/// Implementations must be inverse of each other: `deserialize(serialize(x))`
/// yields `x` for every value the codec can represent.
pub trait Codec: Send + Sync {
    fn serialize(&self, payload: &Value) -> SimResult<Vec<u8>>;
    fn deserialize(&self, bytes: &[u8]) -> SimResult<Value>;

    /// Short name used in log lines
    fn name(&self) -> &'static str;
}

/// Default codec: UTF-8 encoded JSON text
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn serialize(&self, payload: &Value) -> SimResult<Vec<u8>> {
        Ok(serde_json::to_vec(payload)?)
    }

    fn deserialize(&self, bytes: &[u8]) -> SimResult<Value> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_round_trip_structured_values() {
        let codec = JsonCodec;
        let values = [
            json!({"x": 1.0}),
            json!([0.5, -2.25, 1e-9]),
            json!({"states": [1, 2, 3], "mode": "gcas", "armed": true, "extra": null}),
            json!("plain string"),
        ];
        for value in values {
            let bytes = codec.serialize(&value).unwrap();
            assert_eq!(codec.deserialize(&bytes).unwrap(), value);
        }
    }

    #[test]
    fn test_json_encoding_is_utf8_text() {
        let bytes = JsonCodec.serialize(&json!({"name": "ünïcode"})).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("ünïcode"));
    }

    #[test]
    fn test_json_rejects_garbage() {
        assert!(JsonCodec.deserialize(b"{not json").is_err());
    }
}
