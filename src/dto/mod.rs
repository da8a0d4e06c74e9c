//! Wire-facing data shapes: command requests, outcome envelopes and events.

use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub mod events;
pub mod outcome;
pub mod requests;
pub mod rpc;
pub mod validation;

/// RFC 3339 rendering used on every outbound timestamp.
pub fn format_timestamp(value: OffsetDateTime) -> String {
    value
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
