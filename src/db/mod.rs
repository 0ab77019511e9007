//! SQLite database operations for captionist.

mod schema;

pub use schema::{
    init_db, save_intensity, EngagementMetricRecord, MetricStatus, ProfileRow,
};

use std::path::Path;
use std::sync::Arc;

use rusqlite::{Connection, OptionalExtension};
use tokio::sync::Mutex;

use crate::error::Error;

/// Database handle shared across tasks. Never held across a generation call.
pub type SharedDatabase = Arc<Mutex<Database>>;

/// Aggregation scope for metric queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricScope<'a> {
    Store(&'a str),
    Category(&'a str),
    Group(&'a str),
}

impl MetricScope<'_> {
    fn column(&self) -> &'static str {
        match self {
            MetricScope::Store(_) => "store_id",
            MetricScope::Category(_) => "category",
            MetricScope::Group(_) => "category_group",
        }
    }

    fn value(&self) -> &str {
        match self {
            MetricScope::Store(v) | MetricScope::Category(v) | MetricScope::Group(v) => v,
        }
    }
}

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at path.
    pub fn open(path: &Path) -> Result<Self, Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        init_db(&conn)?;
        Ok(Self { conn })
    }

    /// Open in-memory database for testing.
    pub fn open_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()?;
        init_db(&conn)?;
        Ok(Self { conn })
    }

    pub fn into_shared(self) -> SharedDatabase {
        Arc::new(Mutex::new(self))
    }

    // ========== Engagement metrics ==========

    /// Insert a new metric record.
    pub fn insert_metric(&self, record: &EngagementMetricRecord) -> Result<(), Error> {
        self.conn.execute(
            r#"
            INSERT INTO engagement_metrics (
                id, store_id, category, category_group, post_id,
                caption_text, hashtags, post_length, emoji_count,
                likes_count, saves_count, comments_count, reach, reach_estimated,
                engagement_rate, save_intensity, fingerprint,
                post_hour, day_of_week, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)
            "#,
            rusqlite::params![
                record.id,
                record.store_id,
                record.category,
                record.category_group,
                record.post_id,
                record.caption_text,
                serde_json::to_string(&record.hashtags)?,
                record.post_length as i64,
                record.emoji_count as i64,
                record.likes_count as i64,
                record.saves_count as i64,
                record.comments_count as i64,
                record.reach.map(|r| r as i64),
                record.reach_estimated,
                record.engagement_rate,
                record.save_intensity,
                serde_json::to_string(&record.fingerprint)?,
                record.post_hour,
                record.day_of_week,
                record.status.as_str(),
                record.created_at,
                record.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Overwrite every mutable field of an existing record, keyed by id.
    pub fn update_metric(&self, record: &EngagementMetricRecord) -> Result<(), Error> {
        self.conn.execute(
            r#"
            UPDATE engagement_metrics SET
                category = ?2, category_group = ?3, caption_text = ?4, hashtags = ?5,
                post_length = ?6, emoji_count = ?7, likes_count = ?8, saves_count = ?9,
                comments_count = ?10, reach = ?11, reach_estimated = ?12,
                engagement_rate = ?13, save_intensity = ?14, fingerprint = ?15,
                post_hour = ?16, day_of_week = ?17, status = ?18, updated_at = ?19
            WHERE id = ?1
            "#,
            rusqlite::params![
                record.id,
                record.category,
                record.category_group,
                record.caption_text,
                serde_json::to_string(&record.hashtags)?,
                record.post_length as i64,
                record.emoji_count as i64,
                record.likes_count as i64,
                record.saves_count as i64,
                record.comments_count as i64,
                record.reach.map(|r| r as i64),
                record.reach_estimated,
                record.engagement_rate,
                record.save_intensity,
                serde_json::to_string(&record.fingerprint)?,
                record.post_hour,
                record.day_of_week,
                record.status.as_str(),
                record.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Find a store's record for a given post.
    pub fn find_metric_by_post(
        &self,
        store_id: &str,
        post_id: &str,
    ) -> Result<Option<EngagementMetricRecord>, Error> {
        let record = self
            .conn
            .query_row(
                "SELECT * FROM engagement_metrics WHERE store_id = ?1 AND post_id = ?2 LIMIT 1",
                [store_id, post_id],
                EngagementMetricRecord::from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Reported records in scope, best save intensity first.
    pub fn reported_metrics(
        &self,
        scope: MetricScope<'_>,
        limit: usize,
    ) -> Result<Vec<EngagementMetricRecord>, Error> {
        let sql = format!(
            r#"
            SELECT * FROM engagement_metrics
            WHERE {} = ?1 AND status = 'reported'
            ORDER BY save_intensity DESC, updated_at DESC
            LIMIT ?2
            "#,
            scope.column()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            rusqlite::params![scope.value(), limit as i64],
            EngagementMetricRecord::from_row,
        )?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Most recently updated reported records of a category, across all stores.
    pub fn recent_category_metrics(
        &self,
        category: &str,
        limit: usize,
    ) -> Result<Vec<EngagementMetricRecord>, Error> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT * FROM engagement_metrics
            WHERE category = ?1 AND status = 'reported'
            ORDER BY updated_at DESC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt.query_map(
            rusqlite::params![category, limit as i64],
            EngagementMetricRecord::from_row,
        )?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Distinct categories that have at least one reported record.
    pub fn reported_categories(&self) -> Result<Vec<String>, Error> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT category FROM engagement_metrics WHERE status = 'reported' ORDER BY category",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut categories = Vec::new();
        for row in rows {
            categories.push(row?);
        }
        Ok(categories)
    }

    /// Delete all metric rows of a store. Returns the number removed.
    pub fn delete_store_metrics(&self, store_id: &str) -> Result<usize, Error> {
        let removed = self
            .conn
            .execute("DELETE FROM engagement_metrics WHERE store_id = ?1", [store_id])?;
        Ok(removed)
    }

    // ========== Learning profiles ==========

    pub fn get_profile(&self, store_id: &str) -> Result<Option<ProfileRow>, Error> {
        let row = self
            .conn
            .query_row(
                "SELECT * FROM learning_profiles WHERE store_id = ?1",
                [store_id],
                ProfileRow::from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Insert a first revision. Returns false if a row already exists.
    pub fn insert_profile(&self, store_id: &str, profile_data: &str) -> Result<bool, Error> {
        let now = chrono::Utc::now().to_rfc3339();
        let inserted = self.conn.execute(
            r#"
            INSERT OR IGNORE INTO learning_profiles (store_id, profile_data, revision, updated_at)
            VALUES (?1, ?2, 1, ?3)
            "#,
            rusqlite::params![store_id, profile_data, now],
        )?;
        Ok(inserted == 1)
    }

    /// Compare-and-swap on revision. Returns false if the row moved on.
    pub fn update_profile_if_revision(
        &self,
        store_id: &str,
        profile_data: &str,
        expected_revision: i64,
    ) -> Result<bool, Error> {
        let now = chrono::Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            r#"
            UPDATE learning_profiles
            SET profile_data = ?1, revision = revision + 1, updated_at = ?2
            WHERE store_id = ?3 AND revision = ?4
            "#,
            rusqlite::params![profile_data, now, store_id, expected_revision],
        )?;
        Ok(updated == 1)
    }

    pub fn delete_profile(&self, store_id: &str) -> Result<bool, Error> {
        let removed = self
            .conn
            .execute("DELETE FROM learning_profiles WHERE store_id = ?1", [store_id])?;
        Ok(removed > 0)
    }
}
