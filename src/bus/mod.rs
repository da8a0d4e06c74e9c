//! Cross-module messaging boundary: envelope type, bus trait and topics.

pub mod in_process;
pub mod rpc;
pub mod topics;

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Envelope carried on every topic: a JSON payload plus an optional
/// correlation identifier pairing requests with responses.
#[derive(Debug, Clone)]
pub struct BusMessage {
    /// Topic the message was published on.
    pub topic: String,
    /// Correlation key for request/response exchanges.
    pub correlation_id: Option<Uuid>,
    /// Serialized payload.
    pub payload: serde_json::Value,
}

impl BusMessage {
    /// Wrap a payload for the given topic.
    pub fn new(topic: impl Into<String>, payload: &impl Serialize) -> Result<Self, BusError> {
        let topic = topic.into();
        let payload = serde_json::to_value(payload).map_err(|source| BusError::Encode {
            topic: topic.clone(),
            source,
        })?;
        Ok(Self {
            topic,
            correlation_id: None,
            payload,
        })
    }

    /// Attach a correlation identifier.
    pub fn with_correlation(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Deserialize the payload into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, BusError> {
        serde_json::from_value(self.payload.clone()).map_err(|source| BusError::Decode {
            topic: self.topic.clone(),
            source,
        })
    }
}

/// Failures at the messaging boundary.
#[derive(Debug, Error)]
pub enum BusError {
    /// The payload could not be serialized.
    #[error("failed to encode payload for `{topic}`")]
    Encode {
        /// Topic the payload was meant for.
        topic: String,
        /// Serialization failure.
        #[source]
        source: serde_json::Error,
    },
    /// The payload could not be deserialized into the expected type.
    #[error("failed to decode payload from `{topic}`")]
    Decode {
        /// Topic the message arrived on.
        topic: String,
        /// Deserialization failure.
        #[source]
        source: serde_json::Error,
    },
    /// The transport rejected the publish.
    #[error("failed to publish on `{topic}`: {message}")]
    Publish {
        /// Target topic.
        topic: String,
        /// Transport-specific description.
        message: String,
    },
    /// The subscription channel closed underneath a waiter.
    #[error("subscription to `{topic}` closed")]
    SubscriptionClosed {
        /// Topic the subscription was on.
        topic: String,
    },
}

/// Publish/subscribe boundary the engine talks through.
///
/// Publishing to a topic nobody listens on is not an error; at-least-once
/// delivery and ordering are properties of the underlying transport, not of
/// this trait.
pub trait MessageBus: Send + Sync {
    /// Publish a message to its topic.
    fn publish(&self, message: BusMessage) -> Result<(), BusError>;
    /// Register a subscriber for a topic.
    fn subscribe(&self, topic: &str) -> broadcast::Receiver<BusMessage>;
}
