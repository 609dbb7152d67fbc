use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Label used to classify blacklist reasons. Built-ins have a NULL
/// community id and are shared across all communities; they cannot be
/// removed, though their color may be corrected at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub community_id: Option<String>,
    pub name: String,
    pub color: String,
    pub is_default: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Entries with this category cannot be appealed.
pub const NON_APPEALABLE: &str = "Non-Appealable";

/// Reserved category for strike-threshold auto-blacklists.
pub const ESCALATION: &str = "Escalation";

/// Built-in categories seeded at store open. Colors are re-asserted on
/// every open so a bad row self-heals.
pub const BUILTIN_CATEGORIES: &[(&str, &str)] = &[
    ("Appealable", "#faa61a"),
    (NON_APPEALABLE, "#e84142"),
    ("Temporary", "#5e80eb"),
    ("Scam", "#e74c3c"),
    ("Harassment", "#e67e22"),
    ("Raid", "#9b59b6"),
    ("NSFW", "#e91e63"),
    (ESCALATION, "#992d22"),
];
