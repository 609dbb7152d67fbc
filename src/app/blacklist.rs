use anyhow::anyhow;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use time::OffsetDateTime;
use ulid::Ulid;

use crate::app::error::{EngineError, EngineResult};
use crate::domain::blacklist::{
    BlacklistEntry, BlacklistStats, CategoryCount, HistoryAction, HistoryRecord,
};
use crate::infra::db::Db;

const ENTRY_COLUMNS: &str = "case_id, community_id, user_id, reason, category, requested_by, \
     accepted_by, roles, nickname, evidence, expires_at, created_at";

/// Inputs for a new entry. The role/nickname snapshot is whatever the
/// gateway captured immediately before stripping the member.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub community_id: String,
    pub user_id: String,
    pub reason: String,
    pub category: String,
    pub requested_by: Option<String>,
    pub accepted_by: String,
    pub roles: Vec<String>,
    pub nickname: Option<String>,
    pub evidence: Option<String>,
    pub expires_at: Option<OffsetDateTime>,
}

/// Durable case store for blacklist entries and their history. Every
/// mutation commits together with its history append or not at all.
#[derive(Clone)]
pub struct BlacklistService {
    db: Db,
}

impl BlacklistService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create(&self, new: NewEntry) -> EngineResult<BlacklistEntry> {
        let case_id = format!("BL-{}", Ulid::new());
        let now = OffsetDateTime::now_utc();
        let roles_json =
            serde_json::to_string(&new.roles).map_err(|err| EngineError::Other(err.into()))?;

        let mut tx = self.db.pool().begin().await?;
        sqlx::query(
            "INSERT INTO blacklists \
             (case_id, community_id, user_id, reason, category, requested_by, accepted_by, \
              roles, nickname, evidence, expires_at, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&case_id)
        .bind(&new.community_id)
        .bind(&new.user_id)
        .bind(&new.reason)
        .bind(&new.category)
        .bind(&new.requested_by)
        .bind(&new.accepted_by)
        .bind(&roles_json)
        .bind(&new.nickname)
        .bind(&new.evidence)
        .bind(new.expires_at)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                EngineError::conflict("user is already blacklisted")
            }
            other => EngineError::Store(other),
        })?;

        sqlx::query(
            "INSERT INTO blacklist_history \
             (case_id, community_id, action, moderator_id, new_reason, new_category, created_at) \
             VALUES (?, ?, 'created', ?, ?, ?, ?)",
        )
        .bind(&case_id)
        .bind(&new.community_id)
        .bind(&new.accepted_by)
        .bind(&new.reason)
        .bind(&new.category)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(BlacklistEntry {
            case_id,
            community_id: new.community_id,
            user_id: new.user_id,
            reason: new.reason,
            category: new.category,
            requested_by: new.requested_by,
            accepted_by: new.accepted_by,
            roles: new.roles,
            nickname: new.nickname,
            evidence: new.evidence,
            expires_at: new.expires_at,
            created_at: now,
        })
    }

    /// A missing pair is an ordinary `None`, never an error.
    pub async fn find_one(
        &self,
        community_id: &str,
        user_id: &str,
    ) -> EngineResult<Option<BlacklistEntry>> {
        let row = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM blacklists WHERE community_id = ? AND user_id = ?"
        ))
        .bind(community_id)
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(entry_from_row).transpose()
    }

    pub async fn find_by_case(&self, case_id: &str) -> EngineResult<Option<BlacklistEntry>> {
        let row = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM blacklists WHERE case_id = ?"
        ))
        .bind(case_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(entry_from_row).transpose()
    }

    /// Overwrite reason and/or category; omitted fields keep their prior
    /// value. The edited history record captures old and new values for
    /// both fields even when only one changed.
    pub async fn update(
        &self,
        community_id: &str,
        user_id: &str,
        moderator_id: &str,
        reason: Option<&str>,
        category: Option<&str>,
    ) -> EngineResult<BlacklistEntry> {
        let now = OffsetDateTime::now_utc();
        let mut tx = self.db.pool().begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM blacklists WHERE community_id = ? AND user_id = ?"
        ))
        .bind(community_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        let prior = row
            .map(entry_from_row)
            .transpose()?
            .ok_or_else(|| EngineError::not_found("no blacklist entry for that user"))?;

        let new_reason = reason.unwrap_or(&prior.reason).to_owned();
        let new_category = category.unwrap_or(&prior.category).to_owned();

        sqlx::query(
            "UPDATE blacklists SET reason = ?, category = ? \
             WHERE community_id = ? AND user_id = ?",
        )
        .bind(&new_reason)
        .bind(&new_category)
        .bind(community_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO blacklist_history \
             (case_id, community_id, action, moderator_id, old_reason, new_reason, \
              old_category, new_category, created_at) \
             VALUES (?, ?, 'edited', ?, ?, ?, ?, ?, ?)",
        )
        .bind(&prior.case_id)
        .bind(community_id)
        .bind(moderator_id)
        .bind(&prior.reason)
        .bind(&new_reason)
        .bind(&prior.category)
        .bind(&new_category)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(BlacklistEntry {
            reason: new_reason,
            category: new_category,
            ..prior
        })
    }

    /// Delete the entry and append its removed record. Returns the entry
    /// as it was, or `None` when nothing existed (already removed).
    pub async fn delete(
        &self,
        community_id: &str,
        user_id: &str,
        moderator_id: &str,
        note: &str,
    ) -> EngineResult<Option<BlacklistEntry>> {
        let now = OffsetDateTime::now_utc();
        let mut tx = self.db.pool().begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM blacklists WHERE community_id = ? AND user_id = ?"
        ))
        .bind(community_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(entry) = row.map(entry_from_row).transpose()? else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            "INSERT INTO blacklist_history \
             (case_id, community_id, action, moderator_id, note, created_at) \
             VALUES (?, ?, 'removed', ?, ?, ?)",
        )
        .bind(&entry.case_id)
        .bind(community_id)
        .bind(moderator_id)
        .bind(note)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM blacklists WHERE community_id = ? AND user_id = ?")
            .bind(community_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(entry))
    }

    /// Newest-first page for display pagination.
    pub async fn list(
        &self,
        community_id: &str,
        page: i64,
        page_size: i64,
    ) -> EngineResult<Vec<BlacklistEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM blacklists WHERE community_id = ? \
             ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?"
        ))
        .bind(community_id)
        .bind(page_size)
        .bind(page * page_size)
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter().map(entry_from_row).collect()
    }

    pub async fn list_all(&self, community_id: &str) -> EngineResult<Vec<BlacklistEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM blacklists WHERE community_id = ? \
             ORDER BY created_at DESC, rowid DESC"
        ))
        .bind(community_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter().map(entry_from_row).collect()
    }

    /// Case-insensitive substring match on reason, newest-first.
    pub async fn search(
        &self,
        community_id: &str,
        keyword: &str,
    ) -> EngineResult<Vec<BlacklistEntry>> {
        let pattern = format!("%{}%", escape_like(keyword));
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM blacklists \
             WHERE community_id = ? AND reason LIKE ? ESCAPE '\\' \
             ORDER BY created_at DESC, rowid DESC"
        ))
        .bind(community_id)
        .bind(&pattern)
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter().map(entry_from_row).collect()
    }

    pub async fn count(&self, community_id: &str) -> EngineResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM blacklists WHERE community_id = ?")
            .bind(community_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    /// All entries whose expiry is set and has passed.
    pub async fn get_expired(&self, now: OffsetDateTime) -> EngineResult<Vec<BlacklistEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM blacklists \
             WHERE expires_at IS NOT NULL AND expires_at <= ?"
        ))
        .bind(now)
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter().map(entry_from_row).collect()
    }

    pub async fn stats(&self, community_id: &str) -> EngineResult<BlacklistStats> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM blacklists WHERE community_id = ?")
            .bind(community_id)
            .fetch_one(self.db.pool())
            .await?;
        let temporary: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM blacklists WHERE community_id = ? AND expires_at IS NOT NULL",
        )
        .bind(community_id)
        .fetch_one(self.db.pool())
        .await?;

        let category_rows = sqlx::query(
            "SELECT category, COUNT(*) AS count FROM blacklists \
             WHERE community_id = ? GROUP BY category ORDER BY count DESC",
        )
        .bind(community_id)
        .fetch_all(self.db.pool())
        .await?;
        let by_category = category_rows
            .into_iter()
            .map(|row| CategoryCount {
                category: row.get("category"),
                count: row.get("count"),
            })
            .collect();

        let mut appeal_counts = [0i64; 3];
        let appeal_rows = sqlx::query(
            "SELECT status, COUNT(*) AS count FROM appeals WHERE community_id = ? GROUP BY status",
        )
        .bind(community_id)
        .fetch_all(self.db.pool())
        .await?;
        for row in appeal_rows {
            let status: String = row.get("status");
            let count: i64 = row.get("count");
            match status.as_str() {
                "pending" => appeal_counts[0] = count,
                "accepted" => appeal_counts[1] = count,
                "denied" => appeal_counts[2] = count,
                _ => {}
            }
        }

        Ok(BlacklistStats {
            total,
            temporary,
            permanent: total - temporary,
            by_category,
            appeals_pending: appeal_counts[0],
            appeals_accepted: appeal_counts[1],
            appeals_denied: appeal_counts[2],
        })
    }

    /// Full audit trail for a case, oldest first. Works for removed cases
    /// too since history outlives the entry.
    pub async fn history(&self, case_id: &str) -> EngineResult<Vec<HistoryRecord>> {
        let rows = sqlx::query(
            "SELECT id, case_id, community_id, action, moderator_id, old_reason, new_reason, \
                    old_category, new_category, note, created_at \
             FROM blacklist_history WHERE case_id = ? ORDER BY id ASC",
        )
        .bind(case_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter().map(history_from_row).collect()
    }
}

fn entry_from_row(row: SqliteRow) -> EngineResult<BlacklistEntry> {
    let roles_json: String = row.get("roles");
    let roles: Vec<String> = serde_json::from_str(&roles_json)
        .map_err(|err| EngineError::Other(anyhow!("corrupt roles snapshot: {err}")))?;

    Ok(BlacklistEntry {
        case_id: row.get("case_id"),
        community_id: row.get("community_id"),
        user_id: row.get("user_id"),
        reason: row.get("reason"),
        category: row.get("category"),
        requested_by: row.get("requested_by"),
        accepted_by: row.get("accepted_by"),
        roles,
        nickname: row.get("nickname"),
        evidence: row.get("evidence"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    })
}

fn history_from_row(row: SqliteRow) -> EngineResult<HistoryRecord> {
    let action: String = row.get("action");
    let action = match action.as_str() {
        "created" => HistoryAction::Created,
        "edited" => HistoryAction::Edited,
        "removed" => HistoryAction::Removed,
        other => {
            return Err(EngineError::Other(anyhow!(
                "unknown history action: {other}"
            )))
        }
    };

    Ok(HistoryRecord {
        id: row.get("id"),
        case_id: row.get("case_id"),
        community_id: row.get("community_id"),
        action,
        moderator_id: row.get("moderator_id"),
        old_reason: row.get("old_reason"),
        new_reason: row.get("new_reason"),
        old_category: row.get("old_category"),
        new_category: row.get("new_category"),
        note: row.get("note"),
        created_at: row.get("created_at"),
    })
}

fn escape_like(keyword: &str) -> String {
    keyword
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn like_escaping() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("plain"), "plain");
    }
}
