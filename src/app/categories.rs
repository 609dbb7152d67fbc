use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use time::OffsetDateTime;

use crate::app::error::{EngineError, EngineResult};
use crate::domain::category::Category;
use crate::infra::db::Db;

const DEFAULT_COLOR: &str = "#e84142";

/// Registry of blacklist categories: immutable built-ins shared by every
/// community plus per-community custom labels.
#[derive(Clone)]
pub struct CategoryService {
    db: Db,
}

impl CategoryService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Built-ins first, then the community's own, each alphabetical.
    pub async fn list(&self, community_id: &str) -> EngineResult<Vec<Category>> {
        let rows = sqlx::query(
            "SELECT id, community_id, name, color, is_default, created_at FROM categories \
             WHERE is_default = 1 OR community_id = ? \
             ORDER BY is_default DESC, name ASC",
        )
        .bind(community_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(category_from_row).collect())
    }

    pub async fn add(
        &self,
        community_id: &str,
        name: &str,
        color: Option<&str>,
    ) -> EngineResult<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::validation("category name is required"));
        }
        if self.exists(community_id, name).await? {
            return Err(EngineError::conflict(format!(
                "category already exists: {name}"
            )));
        }

        let color = color.unwrap_or(DEFAULT_COLOR);
        let now = OffsetDateTime::now_utc();
        let id = sqlx::query(
            "INSERT INTO categories (community_id, name, color, is_default, created_at) \
             VALUES (?, ?, ?, 0, ?)",
        )
        .bind(community_id)
        .bind(name)
        .bind(color)
        .bind(now)
        .execute(self.db.pool())
        .await?
        .last_insert_rowid();

        Ok(Category {
            id,
            community_id: Some(community_id.to_owned()),
            name: name.to_owned(),
            color: color.to_owned(),
            is_default: false,
            created_at: now,
        })
    }

    /// Only community-scoped, non-default categories can be removed.
    /// Entries already carrying the name keep their literal string.
    pub async fn remove(&self, community_id: &str, name: &str) -> EngineResult<()> {
        let is_default: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM categories WHERE is_default = 1 AND name = ? LIMIT 1",
        )
        .bind(name)
        .fetch_optional(self.db.pool())
        .await?;
        if is_default.is_some() {
            return Err(EngineError::validation(
                "built-in categories cannot be removed",
            ));
        }

        let result = sqlx::query(
            "DELETE FROM categories WHERE community_id = ? AND name = ? AND is_default = 0",
        )
        .bind(community_id)
        .bind(name)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(EngineError::not_found(format!("no such category: {name}")));
        }
        Ok(())
    }

    pub async fn exists(&self, community_id: &str, name: &str) -> EngineResult<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM categories \
             WHERE (is_default = 1 OR community_id = ?) AND name = ? LIMIT 1",
        )
        .bind(community_id)
        .bind(name)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(found.is_some())
    }
}

fn category_from_row(row: SqliteRow) -> Category {
    Category {
        id: row.get("id"),
        community_id: row.get("community_id"),
        name: row.get("name"),
        color: row.get("color"),
        is_default: row.get::<i64, _>("is_default") != 0,
        created_at: row.get("created_at"),
    }
}
