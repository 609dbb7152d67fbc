use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One punitive mark. Immutable once created except for deletion by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strike {
    pub id: i64,
    pub community_id: String,
    pub user_id: String,
    pub reason: String,
    pub moderator_id: String,
    pub case_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
