//! Request/response payloads for cross-module RPC over the bus.

use serde::{Deserialize, Serialize};

/// Ask the leaderboard module for a user's current tag number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagNumberRequest {
    /// Guild the lookup is scoped to.
    pub guild_id: String,
    /// User to look up.
    pub user_id: String,
}

/// Leaderboard module's answer to a tag lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagNumberResponse {
    /// User the answer is for.
    pub user_id: String,
    /// Current tag number; `None` when the user holds no tag.
    #[serde(default)]
    pub tag_number: Option<u32>,
    /// Set when the remote module failed to answer.
    #[serde(default)]
    pub error: Option<String>,
}

/// Ask the user module whether a user holds any of the given roles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleCheckRequest {
    /// Guild the check is scoped to.
    pub guild_id: String,
    /// User being checked.
    pub user_id: String,
    /// Role names that satisfy the check.
    pub roles: Vec<String>,
}

/// User module's answer to a role check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleCheckResponse {
    /// User the answer is for.
    pub user_id: String,
    /// Whether the user holds at least one of the requested roles.
    pub authorized: bool,
    /// Set when the remote module failed to answer.
    #[serde(default)]
    pub error: Option<String>,
}
