use sqlx::Row;

use crate::app::error::EngineResult;
use crate::domain::settings::CommunitySettings;
use crate::infra::db::Db;

/// Per-community settings row; absent rows read as defaults.
#[derive(Clone)]
pub struct SettingsService {
    db: Db,
}

impl SettingsService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get(&self, community_id: &str) -> EngineResult<CommunitySettings> {
        let row = sqlx::query(
            "SELECT community_id, log_channel, staff_role, strike_threshold \
             FROM settings WHERE community_id = ?",
        )
        .bind(community_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(match row {
            Some(row) => CommunitySettings {
                community_id: row.get("community_id"),
                log_channel: row.get("log_channel"),
                staff_role: row.get("staff_role"),
                strike_threshold: row.get("strike_threshold"),
            },
            None => CommunitySettings {
                community_id: community_id.to_owned(),
                ..CommunitySettings::default()
            },
        })
    }

    pub async fn set_log_channel(&self, community_id: &str, channel_id: &str) -> EngineResult<()> {
        sqlx::query(
            "INSERT INTO settings (community_id, log_channel) VALUES (?, ?) \
             ON CONFLICT(community_id) DO UPDATE SET log_channel = excluded.log_channel",
        )
        .bind(community_id)
        .bind(channel_id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    pub async fn set_staff_role(&self, community_id: &str, role_id: &str) -> EngineResult<()> {
        sqlx::query(
            "INSERT INTO settings (community_id, staff_role) VALUES (?, ?) \
             ON CONFLICT(community_id) DO UPDATE SET staff_role = excluded.staff_role",
        )
        .bind(community_id)
        .bind(role_id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// 0 disables escalation.
    pub async fn set_strike_threshold(
        &self,
        community_id: &str,
        threshold: i64,
    ) -> EngineResult<()> {
        sqlx::query(
            "INSERT INTO settings (community_id, strike_threshold) VALUES (?, ?) \
             ON CONFLICT(community_id) DO UPDATE SET strike_threshold = excluded.strike_threshold",
        )
        .bind(community_id)
        .bind(threshold)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }
}
