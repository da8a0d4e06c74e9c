use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::dao::storage::StorageResult;

/// Identity record resolved from a scorecard name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    /// Internal user id (Discord snowflake).
    pub user_id: String,
    /// Account username.
    pub username: String,
    /// Guild-specific display name, when set.
    pub display_name: Option<String>,
}

/// Canonical form used for every name comparison: trimmed, lowercased,
/// inner whitespace collapsed to single spaces.
pub fn canonicalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Lookup boundary for resolving external display names to user identities.
///
/// All queries take an already canonicalized name (trimmed, lowercased,
/// inner whitespace collapsed). `find_by_partial_name` may return several
/// candidates; the exactly-one rule is applied by the caller, never here.
pub trait UserDirectory: Send + Sync {
    /// Exact match on the canonicalized username.
    fn find_by_normalized_username(
        &self,
        guild_id: &str,
        name: &str,
    ) -> BoxFuture<'static, StorageResult<Option<UserRecord>>>;
    /// Exact match on the canonicalized guild display name.
    fn find_by_normalized_display_name(
        &self,
        guild_id: &str,
        name: &str,
    ) -> BoxFuture<'static, StorageResult<Option<UserRecord>>>;
    /// Loose match returning every plausible candidate.
    fn find_by_partial_name(
        &self,
        guild_id: &str,
        name: &str,
    ) -> BoxFuture<'static, StorageResult<Vec<UserRecord>>>;
}
