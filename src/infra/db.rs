use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use time::OffsetDateTime;

use crate::domain::category::BUILTIN_CATEGORIES;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS blacklists (
    case_id      TEXT NOT NULL UNIQUE,
    community_id TEXT NOT NULL,
    user_id      TEXT NOT NULL,
    reason       TEXT NOT NULL,
    category     TEXT NOT NULL,
    requested_by TEXT,
    accepted_by  TEXT NOT NULL,
    roles        TEXT NOT NULL DEFAULT '[]',
    nickname     TEXT,
    evidence     TEXT,
    expires_at   TEXT,
    created_at   TEXT NOT NULL,
    PRIMARY KEY (community_id, user_id)
);

CREATE TABLE IF NOT EXISTS blacklist_history (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    case_id      TEXT NOT NULL,
    community_id TEXT NOT NULL,
    action       TEXT NOT NULL,
    moderator_id TEXT NOT NULL,
    old_reason   TEXT,
    new_reason   TEXT,
    old_category TEXT,
    new_category TEXT,
    note         TEXT,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS strikes (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    community_id TEXT NOT NULL,
    user_id      TEXT NOT NULL,
    reason       TEXT NOT NULL,
    moderator_id TEXT NOT NULL,
    case_id      TEXT,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS appeals (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    community_id    TEXT NOT NULL,
    user_id         TEXT NOT NULL,
    reason          TEXT NOT NULL,
    status          TEXT NOT NULL DEFAULT 'pending',
    decided_by      TEXT,
    decision_reason TEXT,
    denied_at       TEXT,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS categories (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    community_id TEXT,
    name         TEXT NOT NULL,
    color        TEXT NOT NULL DEFAULT '#e84142',
    is_default   INTEGER NOT NULL DEFAULT 0,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS settings (
    community_id     TEXT PRIMARY KEY,
    log_channel      TEXT,
    staff_role       TEXT,
    strike_threshold INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_history_case ON blacklist_history (case_id);
CREATE INDEX IF NOT EXISTS idx_strikes_pair ON strikes (community_id, user_id);
CREATE INDEX IF NOT EXISTS idx_appeals_pair ON appeals (community_id, user_id);
";

/// Handle to the case store. Applies the schema idempotently and seeds the
/// built-in categories at open; `close` drains the pool so tests get an
/// explicit lifecycle instead of a process-wide singleton.
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    pub async fn open(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Isolated in-memory store for tests. A single connection keeps the
    /// database alive for the pool's lifetime.
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        self.seed_categories().await?;
        Ok(())
    }

    /// Seed built-in categories, re-assert their colors, and collapse any
    /// duplicate rows an earlier version left behind (lowest id wins).
    async fn seed_categories(&self) -> Result<()> {
        let now = OffsetDateTime::now_utc();
        for (name, color) in BUILTIN_CATEGORIES {
            let updated =
                sqlx::query("UPDATE categories SET color = ? WHERE name = ? AND is_default = 1")
                    .bind(color)
                    .bind(name)
                    .execute(&self.pool)
                    .await?;

            if updated.rows_affected() == 0 {
                sqlx::query(
                    "INSERT INTO categories (community_id, name, color, is_default, created_at) \
                     VALUES (NULL, ?, ?, 1, ?)",
                )
                .bind(name)
                .bind(color)
                .bind(now)
                .execute(&self.pool)
                .await?;
            }
        }

        sqlx::query(
            "DELETE FROM categories WHERE id NOT IN ( \
                 SELECT MIN(id) FROM categories \
                 GROUP BY name, COALESCE(community_id, '') \
             )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
