//! Bus-facing command and timer handlers.
//!
//! One listener task per topic; every message is handled as an independent
//! unit of work in its own task so a slow or panicking handler never
//! blocks unrelated rounds. Panics are recovered at the task boundary and
//! converted into an infrastructure failure outcome.

use tracing::{error, warn};
use validator::Validate;

use crate::{
    bus::{BusMessage, topics},
    dto::outcome::{OperationFailure, Outcome},
    error::ServiceError,
    import,
    scheduler::ScheduledJob,
    services::{participants, round_lifecycle, scoring},
    state::SharedState,
};

const HANDLED_TOPICS: &[&str] = &[
    topics::ROUND_CREATE,
    topics::ROUND_UPDATE,
    topics::ROUND_JOIN,
    topics::ROUND_SCORE_UPDATE,
    topics::ROUND_FINALIZE,
    topics::ROUND_DELETE,
    topics::ROUND_IMPORT,
    topics::ROUND_EVENT_MESSAGE,
    topics::TIMER_REMINDER_DUE,
    topics::TIMER_START_DUE,
];

/// Subscribe to every command and timer topic and start handling.
pub fn spawn(state: SharedState) {
    for topic in HANDLED_TOPICS {
        tokio::spawn(listen(state.clone(), topic));
    }
}

async fn listen(state: SharedState, topic: &'static str) {
    let mut receiver = state.bus().subscribe(topic);
    loop {
        match receiver.recv().await {
            Ok(message) => {
                let supervisor_state = state.clone();
                tokio::spawn(async move {
                    let handler_state = supervisor_state.clone();
                    let handle =
                        tokio::spawn(async move { dispatch(handler_state, message).await });
                    if let Err(join_err) = handle.await
                        && join_err.is_panic()
                    {
                        error!(topic, "handler panicked; reporting an infrastructure failure");
                        publish_failure(
                            &supervisor_state,
                            topic,
                            OperationFailure {
                                message: "internal error while handling the command".into(),
                                retryable: true,
                                code: None,
                            },
                        );
                    }
                });
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                warn!(topic, missed, "handler lagged behind the bus");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn dispatch(state: SharedState, message: BusMessage) {
    let topic = message.topic.clone();
    let result = match topic.as_str() {
        topics::ROUND_CREATE => match message.decode() {
            Ok(request) => round_lifecycle::create_round(&state, request).await.map(|_| ()),
            Err(err) => Err(err.into()),
        },
        topics::ROUND_UPDATE => match message.decode() {
            Ok(request) => round_lifecycle::update_round(&state, request).await.map(|_| ()),
            Err(err) => Err(err.into()),
        },
        topics::ROUND_JOIN => match message.decode() {
            Ok(request) => participants::join_round(&state, request).await.map(|_| ()),
            Err(err) => Err(err.into()),
        },
        topics::ROUND_SCORE_UPDATE => match message.decode() {
            Ok(request) => scoring::update_score(&state, request).await.map(|_| ()),
            Err(err) => Err(err.into()),
        },
        topics::ROUND_FINALIZE => match message.decode() {
            Ok(request) => scoring::finalize_round(&state, request).await.map(|_| ()),
            Err(err) => Err(err.into()),
        },
        topics::ROUND_DELETE => match message.decode() {
            Ok(request) => round_lifecycle::delete_round(&state, request).await,
            Err(err) => Err(err.into()),
        },
        topics::ROUND_EVENT_MESSAGE => match message.decode() {
            Ok(request) => round_lifecycle::set_event_message(&state, request).await,
            Err(err) => Err(err.into()),
        },
        topics::ROUND_IMPORT => {
            handle_import(&state, message).await;
            return;
        }
        topics::TIMER_REMINDER_DUE => match message.decode::<ScheduledJob>() {
            Ok(job) => round_lifecycle::handle_reminder(&state, &job).await,
            Err(err) => Err(err.into()),
        },
        topics::TIMER_START_DUE => match message.decode::<ScheduledJob>() {
            Ok(job) => round_lifecycle::start_round(&state, &job).await,
            Err(err) => Err(err.into()),
        },
        other => {
            warn!(topic = other, "message on an unhandled topic");
            return;
        }
    };

    if let Err(err) = result {
        warn!(topic = %topic, error = %err, "command failed");
        publish_failure(&state, &topic, OperationFailure::from_error(&err));
    }
}

/// Imports carry stable failure codes; map them onto the failure payload
/// instead of collapsing into a generic service error.
async fn handle_import(state: &SharedState, message: BusMessage) {
    let request = match message.decode::<crate::dto::requests::ImportRequest>() {
        Ok(request) => request,
        Err(err) => {
            let service_err: ServiceError = err.into();
            publish_failure(
                state,
                topics::ROUND_IMPORT,
                OperationFailure::from_error(&service_err),
            );
            return;
        }
    };
    if let Err(err) = request.validate() {
        let service_err: ServiceError = err.into();
        publish_failure(
            state,
            topics::ROUND_IMPORT,
            OperationFailure::from_error(&service_err),
        );
        return;
    }

    if let Err(err) = import::run_import(state, request).await {
        warn!(
            round_id = %err.metadata.round_id,
            code = %err.code,
            error = %err.message,
            "import failed"
        );
        publish_failure(
            state,
            topics::ROUND_IMPORT,
            OperationFailure {
                message: err.message.clone(),
                retryable: err.is_retryable(),
                code: None,
            }
            .with_code(err.code.as_str()),
        );
    }
}

fn publish_failure(state: &SharedState, topic: &str, failure: OperationFailure) {
    let outcome: Outcome<serde_json::Value> = Outcome::Failure { failure };
    let failure_topic = topics::failed(topic);
    match BusMessage::new(failure_topic.clone(), &outcome) {
        Ok(message) => {
            if let Err(err) = state.bus().publish(message) {
                warn!(topic = %failure_topic, error = %err, "failed to publish failure outcome");
            }
        }
        Err(err) => {
            warn!(topic = %failure_topic, error = %err, "failed to encode failure outcome");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;
    use time::OffsetDateTime;

    use crate::{
        bus::{MessageBus, in_process::InProcessBus},
        config::AppConfig,
        dao::memory::{MemoryRoundStore, MemoryUserDirectory},
        dto::format_timestamp,
        scheduler::delay_queue::DelayQueueScheduler,
        state::AppState,
    };

    async fn running_state() -> (SharedState, Arc<InProcessBus>) {
        let bus: Arc<InProcessBus> = Arc::new(InProcessBus::new(32));
        let scheduler = DelayQueueScheduler::spawn(bus.clone());
        let state = AppState::new(AppConfig::default(), bus.clone(), scheduler);
        state
            .install_storage(
                Arc::new(MemoryRoundStore::new()),
                Arc::new(MemoryUserDirectory::new()),
            )
            .await;
        spawn(state.clone());
        // Let the listener tasks subscribe before publishing.
        tokio::task::yield_now().await;
        (state, bus)
    }

    #[tokio::test]
    async fn create_command_produces_a_created_event() {
        let (_state, bus) = running_state().await;
        let mut created_rx = bus.subscribe(topics::ROUND_CREATED);

        let start = format_timestamp(OffsetDateTime::now_utc() + time::Duration::hours(2));
        bus.publish(
            BusMessage::new(
                topics::ROUND_CREATE,
                &json!({
                    "guild_id": "100",
                    "channel_id": "200",
                    "title": "Tuesday league",
                    "location": "Maple Hill",
                    "start_time": start,
                    "created_by": "300",
                }),
            )
            .unwrap(),
        )
        .unwrap();

        let event = created_rx.recv().await.unwrap();
        assert_eq!(event.payload["event"], "created");
        assert_eq!(event.payload["data"]["title"], "Tuesday league");
    }

    #[tokio::test]
    async fn invalid_create_lands_on_the_failure_topic() {
        let (_state, bus) = running_state().await;
        let mut failed_rx = bus.subscribe(&topics::failed(topics::ROUND_CREATE));

        let start = format_timestamp(OffsetDateTime::now_utc() + time::Duration::hours(2));
        bus.publish(
            BusMessage::new(
                topics::ROUND_CREATE,
                &json!({
                    "guild_id": "100",
                    "channel_id": "200",
                    "title": "   ",
                    "location": "Maple Hill",
                    "start_time": start,
                    "created_by": "300",
                }),
            )
            .unwrap(),
        )
        .unwrap();

        let outcome = failed_rx.recv().await.unwrap();
        assert_eq!(outcome.payload["status"], "failure");
        assert_eq!(outcome.payload["failure"]["retryable"], false);
        let message = outcome.payload["failure"]["message"].as_str().unwrap();
        assert!(message.contains("Title is required"));
    }

    #[tokio::test]
    async fn malformed_payloads_are_reported_not_dropped() {
        let (_state, bus) = running_state().await;
        let mut failed_rx = bus.subscribe(&topics::failed(topics::ROUND_JOIN));

        bus.publish(BusMessage::new(topics::ROUND_JOIN, &json!({"nope": true})).unwrap())
            .unwrap();

        let outcome = failed_rx.recv().await.unwrap();
        assert_eq!(outcome.payload["status"], "failure");
    }
}
