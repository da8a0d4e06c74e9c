//! Correlated request/response over the message bus.
//!
//! Subscribe first, then publish a request carrying a fresh correlation id,
//! then race the matching response against a deadline. Exactly one of
//! {response, timeout, publish failure} terminates the wait, and dropping
//! the receiver on any path releases the subscription so no waiter leaks.

use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::bus::{BusError, BusMessage, MessageBus};

/// Failures of a single request/response exchange.
#[derive(Debug, Error)]
pub enum RpcError {
    /// No correlated response arrived before the deadline. The remote side
    /// may still process the request; the operation's eventual state is
    /// unknown.
    #[error("timed out waiting for response on `{topic}`")]
    Timeout {
        /// Response topic that stayed silent.
        topic: String,
    },
    /// Transport-level publish or subscription failure.
    #[error(transparent)]
    Bus(#[from] BusError),
    /// The response payload did not match the expected shape.
    #[error("failed to decode response from `{topic}`")]
    Decode {
        /// Response topic.
        topic: String,
        /// Deserialization failure.
        #[source]
        source: serde_json::Error,
    },
    /// The remote side answered with a domain-level error. This is a
    /// failure outcome, not a transport fault.
    #[error("remote reported: {0}")]
    Remote(String),
}

/// Publish `request` and await the response carrying the same correlation
/// id, bounded by `timeout`.
pub async fn request_response<Req, Resp>(
    bus: &dyn MessageBus,
    request_topic: &str,
    response_topic: &str,
    request: &Req,
    timeout: Duration,
) -> Result<Resp, RpcError>
where
    Req: Serialize,
    Resp: DeserializeOwned,
{
    let correlation_id = Uuid::new_v4();

    // Subscribe before publishing so a fast responder cannot race us.
    let mut receiver = bus.subscribe(response_topic);

    let message = BusMessage::new(request_topic, request)?.with_correlation(correlation_id);
    bus.publish(message)?;

    let wait = async {
        loop {
            match receiver.recv().await {
                Ok(message) if message.correlation_id == Some(correlation_id) => {
                    return message.decode::<Resp>().map_err(|err| match err {
                        BusError::Decode { topic, source } => RpcError::Decode { topic, source },
                        other => RpcError::Bus(other),
                    });
                }
                // Someone else's response; keep waiting.
                Ok(_) => continue,
                // Keep draining after a lagged gap; the deadline bounds us.
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => {
                    return Err(RpcError::Bus(BusError::SubscriptionClosed {
                        topic: response_topic.to_owned(),
                    }));
                }
            }
        }
    };

    match tokio::time::timeout(timeout, wait).await {
        Ok(result) => result,
        Err(_) => Err(RpcError::Timeout {
            topic: response_topic.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::in_process::InProcessBus;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Pong {
        value: u32,
    }

    #[tokio::test(start_paused = true)]
    async fn resolves_with_the_matching_correlation_id() {
        let bus = InProcessBus::new(8);
        let mut requests = bus.subscribe("ping.request");

        let payload = json!({});
        let exchange = request_response::<_, Pong>(
            &bus,
            "ping.request",
            "ping.response",
            &payload,
            Duration::from_secs(5),
        );

        let responder = async {
            let request = requests.recv().await.unwrap();
            let correlation_id = request.correlation_id.unwrap();

            // A stray response with a foreign correlation id must be skipped.
            bus.publish(
                BusMessage::new("ping.response", &json!({"value": 1}))
                    .unwrap()
                    .with_correlation(Uuid::new_v4()),
            )
            .unwrap();
            bus.publish(
                BusMessage::new("ping.response", &json!({"value": 2}))
                    .unwrap()
                    .with_correlation(correlation_id),
            )
            .unwrap();
        };

        let (result, ()) = tokio::join!(exchange, responder);
        assert_eq!(result.unwrap().value, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_when_nobody_answers() {
        let bus = InProcessBus::new(8);
        let result = request_response::<_, Pong>(
            &bus,
            "ping.request",
            "ping.response",
            &json!({}),
            Duration::from_secs(5),
        )
        .await;

        assert!(matches!(result, Err(RpcError::Timeout { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_response_is_a_decode_error() {
        let bus = InProcessBus::new(8);
        let mut requests = bus.subscribe("ping.request");

        let payload = json!({});
        let exchange = request_response::<_, Pong>(
            &bus,
            "ping.request",
            "ping.response",
            &payload,
            Duration::from_secs(5),
        );

        let responder = async {
            let request = requests.recv().await.unwrap();
            bus.publish(
                BusMessage::new("ping.response", &json!({"unexpected": true}))
                    .unwrap()
                    .with_correlation(request.correlation_id.unwrap()),
            )
            .unwrap();
        };

        let (result, ()) = tokio::join!(exchange, responder);
        assert!(matches!(result, Err(RpcError::Decode { .. })));
    }
}
