//! Best-effort publishing of domain events.
//!
//! Events are announcements, not commands: a failed publish is logged and
//! never fails the operation that produced it.

use tracing::warn;

use crate::{bus::BusMessage, dto::events::RoundEvent, state::SharedState};

/// Publish a domain event on its topic.
pub fn publish(state: &SharedState, event: &RoundEvent) {
    let topic = event.topic();
    let message = match BusMessage::new(topic, event) {
        Ok(message) => message,
        Err(err) => {
            warn!(topic, error = %err, "failed to encode round event");
            return;
        }
    };
    if let Err(err) = state.bus().publish(message) {
        warn!(topic, error = %err, "failed to publish round event");
    }
}
