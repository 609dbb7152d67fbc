use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppealStatus {
    Pending,
    Accepted,
    Denied,
}

impl AppealStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Denied => "denied",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "denied" => Some(Self::Denied),
            _ => None,
        }
    }
}

/// One appeal submission. Transitions pending -> accepted or pending ->
/// denied exactly once; a denial stamps `denied_at`, which starts the
/// resubmission cooldown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appeal {
    pub id: i64,
    pub community_id: String,
    pub user_id: String,
    pub reason: String,
    pub status: AppealStatus,
    pub decided_by: Option<String>,
    pub decision_reason: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub denied_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
