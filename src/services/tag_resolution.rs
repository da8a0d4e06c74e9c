//! Correlated lookups against the leaderboard and user modules.

use tracing::warn;

use crate::{
    bus::{
        rpc::{self, RpcError},
        topics,
    },
    dto::rpc::{RoleCheckRequest, RoleCheckResponse, TagNumberRequest, TagNumberResponse},
    error::ServiceError,
    state::SharedState,
};

/// Ask the leaderboard module for a user's current tag number.
///
/// Tags decorate rosters; they never gate a join. A timeout or a
/// remote-side failure therefore resolves to `None` with a warning, and
/// only a transport fault on our side surfaces as an error.
pub async fn resolve_tag_number(
    state: &SharedState,
    guild_id: &str,
    user_id: &str,
) -> Result<Option<u32>, ServiceError> {
    let request = TagNumberRequest {
        guild_id: guild_id.to_owned(),
        user_id: user_id.to_owned(),
    };

    let response = rpc::request_response::<_, TagNumberResponse>(
        state.bus().as_ref(),
        topics::TAG_NUMBER_REQUEST,
        topics::TAG_NUMBER_RESPONSE,
        &request,
        state.config().rpc_timeout,
    )
    .await;

    match response {
        Ok(TagNumberResponse {
            error: Some(message),
            ..
        }) => {
            warn!(guild_id, user_id, error = %message, "tag lookup failed remotely");
            Ok(None)
        }
        Ok(response) => Ok(response.tag_number),
        Err(RpcError::Timeout { topic }) => {
            warn!(guild_id, user_id, topic, "tag lookup timed out");
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

/// Ask the user module whether `user_id` holds any of `roles`.
///
/// Authorization fails closed: a timeout or a remote-side failure answers
/// `false` rather than granting access on silence.
pub async fn check_role(
    state: &SharedState,
    guild_id: &str,
    user_id: &str,
    roles: &[String],
) -> Result<bool, ServiceError> {
    let request = RoleCheckRequest {
        guild_id: guild_id.to_owned(),
        user_id: user_id.to_owned(),
        roles: roles.to_vec(),
    };

    let response = rpc::request_response::<_, RoleCheckResponse>(
        state.bus().as_ref(),
        topics::ROLE_CHECK_REQUEST,
        topics::ROLE_CHECK_RESPONSE,
        &request,
        state.config().rpc_timeout,
    )
    .await;

    match response {
        Ok(RoleCheckResponse {
            error: Some(message),
            ..
        }) => {
            warn!(guild_id, user_id, error = %message, "role check failed remotely");
            Ok(false)
        }
        Ok(response) => Ok(response.authorized),
        Err(RpcError::Timeout { topic }) => {
            warn!(guild_id, user_id, topic, "role check timed out; denying");
            Ok(false)
        }
        Err(err) => Err(err.into()),
    }
}
