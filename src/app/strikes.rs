use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use time::OffsetDateTime;

use crate::app::error::{EngineError, EngineResult};
use crate::app::lifecycle::LifecycleEngine;
use crate::app::settings::SettingsService;
use crate::domain::blacklist::BlacklistEntry;
use crate::domain::category::ESCALATION;
use crate::domain::effect::SideEffect;
use crate::domain::strike::Strike;
use crate::infra::db::Db;

/// Result of recording a strike: the row, the new total, and whatever the
/// escalation policy decided to do about it.
pub struct StrikeOutcome {
    pub strike: Strike,
    pub count: i64,
    pub escalated: Option<BlacklistEntry>,
    pub effects: Vec<SideEffect>,
}

#[derive(Clone)]
pub struct StrikeService {
    db: Db,
    settings: SettingsService,
}

impl StrikeService {
    pub fn new(db: Db) -> Self {
        Self {
            settings: SettingsService::new(db.clone()),
            db,
        }
    }

    /// Record a strike, then run the escalation check: when the community
    /// threshold is set and the new count reaches it, auto-blacklist
    /// through the same engine path manual adds use. The duplicate-entry
    /// conflict makes re-evaluation harmless.
    pub async fn add(
        &self,
        engine: &LifecycleEngine,
        community_id: &str,
        user_id: &str,
        reason: &str,
        moderator_id: &str,
    ) -> EngineResult<StrikeOutcome> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(EngineError::validation("reason is required"));
        }

        let now = OffsetDateTime::now_utc();
        let id = sqlx::query(
            "INSERT INTO strikes (community_id, user_id, reason, moderator_id, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(community_id)
        .bind(user_id)
        .bind(reason)
        .bind(moderator_id)
        .bind(now)
        .execute(self.db.pool())
        .await?
        .last_insert_rowid();

        let count = self.count(community_id, user_id).await?;

        let mut effects = vec![SideEffect::DirectMessage {
            user_id: user_id.to_owned(),
            body: format!(
                "You have received a strike.\nReason: {reason}\nTotal strikes: {count}"
            ),
        }];
        if let Some(channel_id) = self.settings.get(community_id).await?.log_channel {
            effects.push(SideEffect::LogEvent {
                community_id: community_id.to_owned(),
                channel_id,
                body: format!(
                    "Strike #{id} issued to {user_id} by {moderator_id}: {reason} (total {count})"
                ),
            });
        }

        let escalated = self
            .check_escalation(engine, community_id, user_id, count, &mut effects)
            .await?;

        Ok(StrikeOutcome {
            strike: Strike {
                id,
                community_id: community_id.to_owned(),
                user_id: user_id.to_owned(),
                reason: reason.to_owned(),
                moderator_id: moderator_id.to_owned(),
                case_id: None,
                created_at: now,
            },
            count,
            escalated,
            effects,
        })
    }

    async fn check_escalation(
        &self,
        engine: &LifecycleEngine,
        community_id: &str,
        user_id: &str,
        count: i64,
        effects: &mut Vec<SideEffect>,
    ) -> EngineResult<Option<BlacklistEntry>> {
        let threshold = self.settings.get(community_id).await?.strike_threshold;
        if threshold <= 0 || count < threshold {
            return Ok(None);
        }

        let reason = format!("auto-blacklisted: {count} strikes >= threshold {threshold}");
        match engine
            .system_add(community_id, user_id, reason, ESCALATION.to_owned())
            .await
        {
            Ok((entry, add_effects)) => {
                // Back-link the triggering strikes to the new case.
                sqlx::query(
                    "UPDATE strikes SET case_id = ? \
                     WHERE community_id = ? AND user_id = ? AND case_id IS NULL",
                )
                .bind(&entry.case_id)
                .bind(community_id)
                .bind(user_id)
                .execute(self.db.pool())
                .await?;

                effects.extend(add_effects);
                Ok(Some(entry))
            }
            // An entry appeared since the strike landed; escalation is
            // already satisfied.
            Err(EngineError::Conflict(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn remove(&self, community_id: &str, id: i64) -> EngineResult<()> {
        let result = sqlx::query("DELETE FROM strikes WHERE id = ? AND community_id = ?")
            .bind(id)
            .bind(community_id)
            .execute(self.db.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(EngineError::not_found(format!("no such strike: #{id}")));
        }
        Ok(())
    }

    pub async fn list(&self, community_id: &str, user_id: &str) -> EngineResult<Vec<Strike>> {
        let rows = sqlx::query(
            "SELECT id, community_id, user_id, reason, moderator_id, case_id, created_at \
             FROM strikes WHERE community_id = ? AND user_id = ? \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(community_id)
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(strike_from_row).collect())
    }

    pub async fn count(&self, community_id: &str, user_id: &str) -> EngineResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM strikes WHERE community_id = ? AND user_id = ?",
        )
        .bind(community_id)
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(count)
    }
}

fn strike_from_row(row: SqliteRow) -> Strike {
    Strike {
        id: row.get("id"),
        community_id: row.get("community_id"),
        user_id: row.get("user_id"),
        reason: row.get("reason"),
        moderator_id: row.get("moderator_id"),
        case_id: row.get("case_id"),
        created_at: row.get("created_at"),
    }
}
