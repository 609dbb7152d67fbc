use serde::{Deserialize, Serialize};

/// Per-community configuration. A missing row behaves as all-defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommunitySettings {
    pub community_id: String,
    pub log_channel: Option<String>,
    pub staff_role: Option<String>,
    /// 0 disables strike escalation.
    pub strike_threshold: i64,
}
