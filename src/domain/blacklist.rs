use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// An active blacklist case. At most one exists per (community, user) pair;
/// the case id survives the row in `blacklist_history`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub case_id: String,
    pub community_id: String,
    pub user_id: String,
    pub reason: String,
    /// Literal category name at the time it was assigned. The entry keeps
    /// this string even if the category row is later removed.
    pub category: String,
    pub requested_by: Option<String>,
    pub accepted_by: String,
    /// Role ids held before the sentinel role replaced them, in order.
    pub roles: Vec<String>,
    pub nickname: Option<String>,
    pub evidence: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Created,
    Edited,
    Removed,
}

impl HistoryAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Edited => "edited",
            Self::Removed => "removed",
        }
    }
}

/// Immutable audit record appended with every create/edit/remove, in the
/// same transaction as the entry mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub case_id: String,
    pub community_id: String,
    pub action: HistoryAction,
    pub moderator_id: String,
    pub old_reason: Option<String>,
    pub new_reason: Option<String>,
    pub old_category: Option<String>,
    pub new_category: Option<String>,
    pub note: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlacklistStats {
    pub total: i64,
    pub temporary: i64,
    pub permanent: i64,
    pub by_category: Vec<CategoryCount>,
    pub appeals_pending: i64,
    pub appeals_accepted: i64,
    pub appeals_denied: i64,
}
