use serde::{Deserialize, Serialize};

/// Role ids and nickname captured by the gateway immediately before it
/// strips a member. The engine stores it verbatim and hands it back on
/// removal; it never inspects the platform's membership objects itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSnapshot {
    pub roles: Vec<String>,
    pub nickname: Option<String>,
}

/// One side-effect intent for the gateway to carry out, in order. The
/// engine's store mutation has already committed by the time these are
/// returned; a failed effect degrades to a status the gateway surfaces to
/// the moderator and never rolls anything back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SideEffect {
    /// Replace the member's roles with the single sentinel role the
    /// gateway maintains (ensureSentinelRole is the gateway's operation).
    ApplySentinelRole { user_id: String },
    /// Rename the member with the fixed prefix.
    RenameWithPrefix { user_id: String, prefix: String },
    /// Restore the stored snapshot. The gateway filters out role ids no
    /// longer valid in the community and the sentinel role itself.
    RestoreRoles { user_id: String, roles: Vec<String> },
    /// Restore the prior nickname; None clears it.
    RestoreNickname {
        user_id: String,
        nickname: Option<String>,
    },
    /// Best-effort DM. Delivery failure is non-fatal; the gateway reports
    /// it as a flag, never as an error.
    DirectMessage { user_id: String, body: String },
    /// Public case summary in the invoking channel.
    PostSummary { community_id: String, body: String },
    /// Mirror to the configured log channel. Omitted entirely when no log
    /// channel is set.
    LogEvent {
        community_id: String,
        channel_id: String,
        body: String,
    },
}

/// Nickname prefix applied to blacklisted members.
pub const SENTINEL_PREFIX: &str = "[BLACKLISTED]";
