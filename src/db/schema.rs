//! Database schema definitions for captionist.

use chrono::Utc;
use rusqlite::{types::Type, Connection, Result, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::category;
use crate::error::Error;
use crate::structure::{self, StructuralFingerprint};

/// Initialize database with all tables.
pub fn init_db(conn: &Connection) -> Result<(), Error> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS engagement_metrics (
            id                      TEXT PRIMARY KEY,
            store_id                TEXT NOT NULL,
            category                TEXT NOT NULL,
            category_group          TEXT NOT NULL,
            post_id                 TEXT,
            caption_text            TEXT NOT NULL,
            hashtags                TEXT NOT NULL DEFAULT '[]',
            post_length             INTEGER NOT NULL DEFAULT 0,
            emoji_count             INTEGER NOT NULL DEFAULT 0,
            likes_count             INTEGER NOT NULL DEFAULT 0,
            saves_count             INTEGER NOT NULL DEFAULT 0,
            comments_count          INTEGER NOT NULL DEFAULT 0,
            reach                   INTEGER,
            reach_estimated         INTEGER NOT NULL DEFAULT 0,
            engagement_rate         REAL NOT NULL DEFAULT 0.0,
            save_intensity          REAL NOT NULL DEFAULT 0.0,
            fingerprint             TEXT NOT NULL,
            post_hour               INTEGER,
            day_of_week             INTEGER,
            status                  TEXT NOT NULL DEFAULT 'unreported',
            created_at              TEXT NOT NULL,
            updated_at              TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_metrics_store ON engagement_metrics(store_id, status);
        CREATE INDEX IF NOT EXISTS idx_metrics_category ON engagement_metrics(category, status);
        CREATE INDEX IF NOT EXISTS idx_metrics_group ON engagement_metrics(category_group, status);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_metrics_post ON engagement_metrics(store_id, post_id)
            WHERE post_id IS NOT NULL;
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS learning_profiles (
            store_id      TEXT PRIMARY KEY,
            profile_data  TEXT NOT NULL,
            revision      INTEGER NOT NULL DEFAULT 1,
            updated_at    TEXT NOT NULL
        );
        "#,
    )?;

    Ok(())
}

/// Whether a metric row carries real numbers yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricStatus {
    Reported,
    Unreported,
}

impl MetricStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricStatus::Reported => "reported",
            MetricStatus::Unreported => "unreported",
        }
    }

    pub fn for_counts(likes: u64, saves: u64) -> Self {
        if likes > 0 || saves > 0 {
            MetricStatus::Reported
        } else {
            MetricStatus::Unreported
        }
    }
}

/// Saves per like, rounded to 4 decimals. Zero when there are no likes.
pub fn save_intensity(likes: u64, saves: u64) -> f64 {
    if likes == 0 {
        return 0.0;
    }
    (saves as f64 / likes as f64 * 10_000.0).round() / 10_000.0
}

/// One reported (or pending) outcome for one caption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementMetricRecord {
    pub id: String,
    pub store_id: String,
    pub category: String,
    pub category_group: String,
    pub post_id: Option<String>,
    pub caption_text: String,
    pub hashtags: Vec<String>,
    pub post_length: usize,
    pub emoji_count: usize,
    pub likes_count: u64,
    pub saves_count: u64,
    pub comments_count: u64,
    pub reach: Option<u64>,
    /// Reach was estimated rather than reported.
    pub reach_estimated: bool,
    pub engagement_rate: f64,
    pub save_intensity: f64,
    pub fingerprint: StructuralFingerprint,
    pub post_hour: Option<u32>,
    pub day_of_week: Option<u32>,
    pub status: MetricStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl EngagementMetricRecord {
    /// Zeroed, unreported record with caption-derived fields filled in.
    pub fn new(store_id: &str, category_label: &str, caption_text: &str) -> Self {
        let category = category::normalize(category_label);
        let category_group = category::group_of(&category).to_string();
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            store_id: store_id.to_string(),
            category,
            category_group,
            post_id: None,
            caption_text: caption_text.to_string(),
            hashtags: structure::extract_hashtags(caption_text),
            post_length: structure::char_len(caption_text),
            emoji_count: structure::count_emoji(caption_text),
            likes_count: 0,
            saves_count: 0,
            comments_count: 0,
            reach: None,
            reach_estimated: false,
            engagement_rate: 0.0,
            save_intensity: 0.0,
            fingerprint: structure::analyze(caption_text),
            post_hour: None,
            day_of_week: None,
            status: MetricStatus::Unreported,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn is_reported(&self) -> bool {
        self.status == MetricStatus::Reported
    }

    /// Set raw counts and everything derived from them.
    pub fn apply_counts(&mut self, likes: u64, saves: u64, comments: u64) {
        self.likes_count = likes;
        self.saves_count = saves;
        self.comments_count = comments;
        self.save_intensity = save_intensity(likes, saves);
        self.status = MetricStatus::for_counts(likes, saves);
    }

    /// Whether reach is real (reported, nonzero) rather than derived.
    pub fn has_real_reach(&self) -> bool {
        matches!(self.reach, Some(r) if r > 0) && !self.reach_estimated
    }

    pub fn from_row(row: &Row<'_>) -> Result<Self> {
        let hashtags: String = row.get("hashtags")?;
        let fingerprint: String = row.get("fingerprint")?;
        let status: String = row.get("status")?;
        Ok(Self {
            id: row.get("id")?,
            store_id: row.get("store_id")?,
            category: row.get("category")?,
            category_group: row.get("category_group")?,
            post_id: row.get("post_id")?,
            caption_text: row.get("caption_text")?,
            hashtags: parse_json_column(&hashtags, "hashtags")?,
            post_length: row.get::<_, i64>("post_length")? as usize,
            emoji_count: row.get::<_, i64>("emoji_count")? as usize,
            likes_count: row.get::<_, i64>("likes_count")? as u64,
            saves_count: row.get::<_, i64>("saves_count")? as u64,
            comments_count: row.get::<_, i64>("comments_count")? as u64,
            reach: row.get::<_, Option<i64>>("reach")?.map(|r| r as u64),
            reach_estimated: row.get::<_, i32>("reach_estimated")? != 0,
            engagement_rate: row.get("engagement_rate")?,
            save_intensity: row.get("save_intensity")?,
            fingerprint: parse_json_column(&fingerprint, "fingerprint")?,
            post_hour: row.get("post_hour")?,
            day_of_week: row.get("day_of_week")?,
            status: if status == "reported" {
                MetricStatus::Reported
            } else {
                MetricStatus::Unreported
            },
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

fn parse_json_column<T: serde::de::DeserializeOwned>(raw: &str, column: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            Type::Text,
            format!("invalid {column} column: {e}").into(),
        )
    })
}

/// Stored learning profile blob (profile_data) with its revision.
#[derive(Debug, Clone)]
pub struct ProfileRow {
    pub profile_data: String,
    pub revision: i64,
}

impl ProfileRow {
    pub fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            profile_data: row.get("profile_data")?,
            revision: row.get("revision")?,
        })
    }
}
