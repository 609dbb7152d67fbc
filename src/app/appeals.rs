use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use time::{Duration, OffsetDateTime};

use crate::app::blacklist::BlacklistService;
use crate::app::error::{EngineError, EngineResult};
use crate::app::lifecycle::{LifecycleEngine, RemovalKind};
use crate::app::settings::SettingsService;
use crate::domain::appeal::{Appeal, AppealStatus};
use crate::domain::category::NON_APPEALABLE;
use crate::domain::effect::SideEffect;
use crate::infra::db::Db;

const APPEAL_COLUMNS: &str =
    "id, community_id, user_id, reason, status, decided_by, decision_reason, denied_at, created_at";

/// Appeal workflow: pending -> accepted | denied, each exactly once. A
/// denial starts the resubmission cooldown.
#[derive(Clone)]
pub struct AppealService {
    db: Db,
    store: BlacklistService,
    settings: SettingsService,
    cooldown: Duration,
}

impl AppealService {
    pub fn new(db: Db, cooldown_days: i64) -> Self {
        Self {
            store: BlacklistService::new(db.clone()),
            settings: SettingsService::new(db.clone()),
            db,
            cooldown: Duration::days(cooldown_days),
        }
    }

    /// Submission preconditions, in order, short-circuiting on the first
    /// failure: an active entry exists; its category is appealable; no
    /// pending appeal; the post-denial cooldown has elapsed.
    pub async fn submit(
        &self,
        community_id: &str,
        user_id: &str,
        reason: &str,
    ) -> EngineResult<(Appeal, Vec<SideEffect>)> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(EngineError::validation("reason is required"));
        }

        let entry = self
            .store
            .find_one(community_id, user_id)
            .await?
            .ok_or_else(|| EngineError::not_found("you are not blacklisted"))?;

        if entry.category == NON_APPEALABLE {
            return Err(EngineError::validation(
                "this blacklist is non-appealable and cannot be appealed",
            ));
        }

        if self.find_pending(community_id, user_id).await?.is_some() {
            return Err(EngineError::conflict(
                "you already have a pending appeal awaiting review",
            ));
        }

        let now = OffsetDateTime::now_utc();
        if let Some(denied) = self.find_last_denied(community_id, user_id).await? {
            if let Some(denied_at) = denied.denied_at {
                let cooldown_end = denied_at + self.cooldown;
                if now < cooldown_end {
                    return Err(EngineError::conflict(format!(
                        "your last appeal was denied; you can appeal again in {}",
                        format_remaining(cooldown_end - now)
                    )));
                }
            }
        }

        let id = sqlx::query(
            "INSERT INTO appeals (community_id, user_id, reason, status, created_at) \
             VALUES (?, ?, ?, 'pending', ?)",
        )
        .bind(community_id)
        .bind(user_id)
        .bind(reason)
        .bind(now)
        .execute(self.db.pool())
        .await?
        .last_insert_rowid();

        let mut effects = Vec::new();
        if let Some(channel_id) = self.settings.get(community_id).await?.log_channel {
            effects.push(SideEffect::LogEvent {
                community_id: community_id.to_owned(),
                channel_id,
                body: format!(
                    "New appeal #{id} from {user_id}: {reason} \
                     (blacklist reason: {}, category: {})",
                    entry.reason, entry.category
                ),
            });
        }

        Ok((
            Appeal {
                id,
                community_id: community_id.to_owned(),
                user_id: user_id.to_owned(),
                reason: reason.to_owned(),
                status: AppealStatus::Pending,
                decided_by: None,
                decision_reason: None,
                denied_at: None,
                created_at: now,
            },
            effects,
        ))
    }

    /// Accept a pending appeal and lift the blacklist through the shared
    /// removal path. A vanished entry (already removed some other way) is
    /// tolerated; the appeal is still resolved.
    pub async fn accept(
        &self,
        engine: &LifecycleEngine,
        community_id: &str,
        appeal_id: i64,
        decider_id: &str,
        reason: &str,
    ) -> EngineResult<(Appeal, Vec<SideEffect>)> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(EngineError::validation("reason is required"));
        }

        let appeal = self.require_pending(community_id, appeal_id).await?;

        // Guarded update: a concurrent resolution that won the race leaves
        // zero rows, and the loser reports the conflict.
        let updated = sqlx::query(
            "UPDATE appeals SET status = 'accepted', decided_by = ?, decision_reason = ? \
             WHERE id = ? AND status = 'pending'",
        )
        .bind(decider_id)
        .bind(reason)
        .bind(appeal_id)
        .execute(self.db.pool())
        .await?
        .rows_affected();
        if updated == 0 {
            return Err(EngineError::conflict(format!(
                "appeal #{appeal_id} is already resolved"
            )));
        }

        let removal_reason = format!("appeal #{appeal_id} accepted: {reason}");
        let mut effects = Vec::new();
        if let Some((_, removal_effects)) = engine
            .remove(
                community_id,
                &appeal.user_id,
                decider_id,
                &removal_reason,
                RemovalKind::AppealAccepted { appeal_id },
            )
            .await?
        {
            effects.extend(removal_effects);
        }

        Ok((
            Appeal {
                status: AppealStatus::Accepted,
                decided_by: Some(decider_id.to_owned()),
                decision_reason: Some(reason.to_owned()),
                ..appeal
            },
            effects,
        ))
    }

    /// Deny a pending appeal. Stamps `denied_at`, starting the cooldown;
    /// the blacklist entry is untouched.
    pub async fn deny(
        &self,
        community_id: &str,
        appeal_id: i64,
        decider_id: &str,
        reason: &str,
    ) -> EngineResult<(Appeal, Vec<SideEffect>)> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(EngineError::validation("reason is required"));
        }

        let appeal = self.require_pending(community_id, appeal_id).await?;

        let now = OffsetDateTime::now_utc();
        let updated = sqlx::query(
            "UPDATE appeals SET status = 'denied', decided_by = ?, decision_reason = ?, \
             denied_at = ? WHERE id = ? AND status = 'pending'",
        )
        .bind(decider_id)
        .bind(reason)
        .bind(now)
        .bind(appeal_id)
        .execute(self.db.pool())
        .await?
        .rows_affected();
        if updated == 0 {
            return Err(EngineError::conflict(format!(
                "appeal #{appeal_id} is already resolved"
            )));
        }

        let mut effects = vec![SideEffect::DirectMessage {
            user_id: appeal.user_id.clone(),
            body: format!(
                "Your blacklist appeal has been denied.\nReason: {reason}\n\
                 You may appeal again in {} days.",
                self.cooldown.whole_days()
            ),
        }];
        if let Some(channel_id) = self.settings.get(community_id).await?.log_channel {
            effects.push(SideEffect::LogEvent {
                community_id: community_id.to_owned(),
                channel_id,
                body: format!(
                    "Appeal #{appeal_id} from {} denied by {decider_id}: {reason}",
                    appeal.user_id
                ),
            });
        }

        Ok((
            Appeal {
                status: AppealStatus::Denied,
                decided_by: Some(decider_id.to_owned()),
                decision_reason: Some(reason.to_owned()),
                denied_at: Some(now),
                ..appeal
            },
            effects,
        ))
    }

    pub async fn find_by_id(
        &self,
        community_id: &str,
        appeal_id: i64,
    ) -> EngineResult<Option<Appeal>> {
        let row = sqlx::query(&format!(
            "SELECT {APPEAL_COLUMNS} FROM appeals WHERE id = ? AND community_id = ?"
        ))
        .bind(appeal_id)
        .bind(community_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(appeal_from_row).transpose()
    }

    async fn require_pending(&self, community_id: &str, appeal_id: i64) -> EngineResult<Appeal> {
        let appeal = self
            .find_by_id(community_id, appeal_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("no such appeal: #{appeal_id}")))?;

        if appeal.status != AppealStatus::Pending {
            return Err(EngineError::conflict(format!(
                "appeal #{appeal_id} is already {}",
                appeal.status.as_str()
            )));
        }
        Ok(appeal)
    }

    async fn find_pending(
        &self,
        community_id: &str,
        user_id: &str,
    ) -> EngineResult<Option<Appeal>> {
        let row = sqlx::query(&format!(
            "SELECT {APPEAL_COLUMNS} FROM appeals \
             WHERE community_id = ? AND user_id = ? AND status = 'pending'"
        ))
        .bind(community_id)
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(appeal_from_row).transpose()
    }

    async fn find_last_denied(
        &self,
        community_id: &str,
        user_id: &str,
    ) -> EngineResult<Option<Appeal>> {
        let row = sqlx::query(&format!(
            "SELECT {APPEAL_COLUMNS} FROM appeals \
             WHERE community_id = ? AND user_id = ? AND status = 'denied' \
             ORDER BY denied_at DESC LIMIT 1"
        ))
        .bind(community_id)
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(appeal_from_row).transpose()
    }
}

fn appeal_from_row(row: SqliteRow) -> EngineResult<Appeal> {
    let status: String = row.get("status");
    let status = AppealStatus::parse(&status)
        .ok_or_else(|| EngineError::Other(anyhow::anyhow!("unknown appeal status: {status}")))?;

    Ok(Appeal {
        id: row.get("id"),
        community_id: row.get("community_id"),
        user_id: row.get("user_id"),
        reason: row.get("reason"),
        status,
        decided_by: row.get("decided_by"),
        decision_reason: row.get("decision_reason"),
        denied_at: row.get("denied_at"),
        created_at: row.get("created_at"),
    })
}

/// Coarse remaining-time string for cooldown rejections, e.g. "6d 23h"
/// or "45m".
fn format_remaining(remaining: Duration) -> String {
    let total_minutes = (remaining.whole_seconds() + 59) / 60;
    let days = total_minutes / (24 * 60);
    let hours = (total_minutes % (24 * 60)) / 60;
    let minutes = total_minutes % 60;

    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{}m", minutes.max(1))
    }
}
