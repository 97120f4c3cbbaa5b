use crate::core::error::{SimError, SimResult};
use crate::core::messages::codec::Codec;
use serde_json::Value;

/// A payload tagged with the topic it was published under
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub topic: String,
    pub payload: Value,
}

impl Envelope {
    pub fn new(topic: impl Into<String>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }

    /// Wire parts: `[topic, payload]`, or just `[payload]` when untopiced
    pub fn to_parts(&self, codec: &dyn Codec) -> SimResult<Vec<Vec<u8>>> {
        let payload = codec.serialize(&self.payload)?;
        if self.topic.is_empty() {
            Ok(vec![payload])
        } else {
            Ok(vec![self.topic.as_bytes().to_vec(), payload])
        }
    }

    pub fn from_parts(parts: &[Vec<u8>], codec: &dyn Codec) -> SimResult<Self> {
        match parts {
            [payload] => Ok(Self::new("", codec.deserialize(payload)?)),
            [topic, payload] => {
                let topic = std::str::from_utf8(topic)
                    .map_err(|e| SimError::Frame(format!("topic is not utf-8: {}", e)))?;
                Ok(Self::new(topic, codec.deserialize(payload)?))
            }
            _ => Err(SimError::Frame(format!(
                "expected 1 or 2 message parts, got {}",
                parts.len()
            ))),
        }
    }

    /// Whether a subscriber with `subscription` should see this message.
    ///
    /// Matching is exact. An empty subscription receives everything, and
    /// untopiced messages reach only empty subscriptions.
    pub fn matches(&self, subscription: &str) -> bool {
        subscription.is_empty() || self.topic == subscription
    }
}
