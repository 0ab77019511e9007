//! Insight aggregation across three cohorts: own store, category, category group.
//!
//! Reads always exclude unreported rows and take the best records by save
//! intensity before truncating to the cohort limit, so every statistic is over
//! the limited candidate set. Writes go through [`InsightAggregator::record_outcome`],
//! which validates and screens for outliers before anything is persisted.

mod compute;
mod prompt;
mod record;

pub use compute::{compute_insights, CohortInsights, HashtagInsight};
pub use prompt::render_insight_prompt;
pub use record::{OutcomeReport, OutcomeResult, Rejection, OUTLIER_HISTORY};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::category;
use crate::db::{EngagementMetricRecord, MetricScope, SharedDatabase};
use crate::error::Error;
use crate::validator::BoundsTable;

pub const OWN_STORE_LIMIT: usize = 100;
pub const CATEGORY_LIMIT: usize = 100;
pub const GROUP_LIMIT: usize = 200;

/// Advisory weights for the prompt builder. Never applied numerically here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlendRatio {
    pub own: u32,
    pub category: u32,
    pub group: u32,
}

impl Default for BlendRatio {
    fn default() -> Self {
        Self {
            own: 50,
            category: 30,
            group: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlendedInsights {
    pub own: CohortInsights,
    pub category: CohortInsights,
    pub group: CohortInsights,
    pub category_label: String,
    pub category_group: String,
    pub blend_ratio: BlendRatio,
}

pub struct InsightAggregator {
    db: SharedDatabase,
    bounds: BoundsTable,
}

impl InsightAggregator {
    pub fn new(db: SharedDatabase, bounds: BoundsTable) -> Self {
        Self { db, bounds }
    }

    async fn cohort(&self, scope: MetricScope<'_>, limit: usize) -> Result<CohortInsights, Error> {
        let records = self.db.lock().await.reported_metrics(scope, limit)?;
        Ok(compute_insights(&records))
    }

    pub async fn own_store_insights(&self, store_id: &str) -> Result<CohortInsights, Error> {
        self.cohort(MetricScope::Store(store_id), OWN_STORE_LIMIT).await
    }

    /// `category` may be any label; it is normalized first.
    pub async fn category_insights(
        &self,
        category: &str,
        limit: usize,
    ) -> Result<CohortInsights, Error> {
        let category = category::normalize(category);
        self.cohort(MetricScope::Category(&category), limit).await
    }

    pub async fn group_insights(
        &self,
        category_group: &str,
        limit: usize,
    ) -> Result<CohortInsights, Error> {
        self.cohort(MetricScope::Group(category_group), limit).await
    }

    /// All three cohorts side by side, with the advisory weighting.
    pub async fn blended_insights(
        &self,
        store_id: &str,
        category: &str,
    ) -> Result<BlendedInsights, Error> {
        let category_label = category::normalize(category);
        let category_group = category::group_of(&category_label).to_string();

        Ok(BlendedInsights {
            own: self.own_store_insights(store_id).await?,
            category: self.category_insights(&category_label, CATEGORY_LIMIT).await?,
            group: self.group_insights(&category_group, GROUP_LIMIT).await?,
            category_label,
            category_group,
            blend_ratio: BlendRatio::default(),
        })
    }

    /// Validate, screen and upsert one reported outcome.
    ///
    /// Rejections are returned as values and leave the store untouched.
    pub async fn record_outcome(&self, report: &OutcomeReport) -> Result<OutcomeResult, Error> {
        let db = self.db.lock().await;

        let existing = match &report.post_id {
            Some(post_id) => db.find_metric_by_post(&report.store_id, post_id)?,
            None => None,
        };
        let updated = existing.is_some();
        let corrected = existing.as_ref().is_some_and(EngagementMetricRecord::is_reported);
        let metric = record::build_record(existing, report);

        let bounds = self.bounds.for_category(&metric.category);
        if let Some(rejection) = record::validate_record(&metric, report, &bounds) {
            info!(store_id = %report.store_id, %rejection, "Rejected outcome report");
            return Ok(OutcomeResult::Rejected(rejection));
        }

        if metric.is_reported() {
            let history = db.recent_category_metrics(&metric.category, OUTLIER_HISTORY)?;
            if let Some(rejection) = record::screen_outliers(&metric, &history) {
                info!(store_id = %report.store_id, %rejection, "Rejected outcome report");
                return Ok(OutcomeResult::Rejected(rejection));
            }
        }

        if updated {
            db.update_metric(&metric)?;
        } else {
            db.insert_metric(&metric)?;
        }
        debug!(
            store_id = %metric.store_id,
            id = %metric.id,
            updated,
            corrected,
            save_intensity = metric.save_intensity,
            "Recorded outcome"
        );
        Ok(OutcomeResult::Recorded {
            id: metric.id,
            updated,
            corrected,
        })
    }

    /// Insert a zeroed, unreported row at caption time. Failures are logged only.
    ///
    /// A post that already has a row keeps it; its id is returned instead.
    pub async fn seed_unreported(
        &self,
        store_id: &str,
        category: &str,
        caption_text: &str,
        post_id: Option<&str>,
    ) -> Option<String> {
        let db = self.db.lock().await;
        let seeded = match post_id {
            Some(post_id) => db.find_metric_by_post(store_id, post_id),
            None => Ok(None),
        }
        .and_then(|existing| match existing {
            Some(existing) => Ok(existing.id),
            None => {
                let mut record = EngagementMetricRecord::new(store_id, category, caption_text);
                record.post_id = post_id.map(str::to_string);
                db.insert_metric(&record).map(|()| record.id)
            }
        });

        match seeded {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(store_id, error = %e, "Failed to seed unreported metric");
                None
            }
        }
    }

    /// Remove every metric row of a store.
    pub async fn delete_store_metrics(&self, store_id: &str) -> Result<usize, Error> {
        self.db.lock().await.delete_store_metrics(store_id)
    }

    /// Categories with reported data, for scheduled digests.
    pub async fn reported_categories(&self) -> Result<Vec<String>, Error> {
        self.db.lock().await.reported_categories()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn aggregator() -> InsightAggregator {
        let db = Database::open_memory().unwrap().into_shared();
        InsightAggregator::new(db, BoundsTable::default())
    }

    fn report(store: &str, category: &str, likes: u64, saves: u64) -> OutcomeReport {
        OutcomeReport {
            store_id: store.to_string(),
            category: category.to_string(),
            caption_text: "新作のタルトが入荷しました🍓 #カフェ #スイーツ".to_string(),
            likes,
            saves,
            ..Default::default()
        }
    }

    fn recorded_id(result: OutcomeResult) -> String {
        match result {
            OutcomeResult::Recorded { id, .. } => id,
            other => panic!("expected recorded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fresh_database_returns_defaults() {
        let agg = aggregator();
        let blended = agg.blended_insights("s", "喫茶店").await.unwrap();
        assert_eq!(blended.own, CohortInsights::default());
        assert_eq!(blended.category_label, "カフェ");
        assert_eq!(blended.category_group, "飲食");
        assert_eq!(blended.blend_ratio, BlendRatio::default());
        assert_eq!(render_insight_prompt(&blended), "");
    }

    #[tokio::test]
    async fn test_record_and_aggregate_across_cohorts() {
        let agg = aggregator();
        agg.record_outcome(&report("a", "cafe", 100, 10)).await.unwrap();
        agg.record_outcome(&report("b", "カフェ", 100, 30)).await.unwrap();
        agg.record_outcome(&report("c", "居酒屋", 100, 20)).await.unwrap();

        let own = agg.own_store_insights("a").await.unwrap();
        assert_eq!(own.sample_size, 1);
        assert_eq!(own.avg_save_intensity, 0.1);

        let category = agg.category_insights("Cafe", CATEGORY_LIMIT).await.unwrap();
        assert_eq!(category.sample_size, 2);
        assert_eq!(category.avg_save_intensity, 0.2);

        let blended = agg.blended_insights("a", "cafe").await.unwrap();
        assert_eq!(blended.group.sample_size, 3);
        assert!(render_insight_prompt(&blended).contains("【このお店の傾向（参考度50%・1件）】"));
    }

    #[tokio::test]
    async fn test_unreported_rows_are_never_aggregated() {
        let agg = aggregator();
        let seeded = agg
            .seed_unreported("a", "カフェ", "新作のタルトが入荷しました #カフェ", Some("p1"))
            .await;
        assert!(seeded.is_some());
        agg.record_outcome(&report("a", "カフェ", 0, 0)).await.unwrap();

        assert_eq!(agg.own_store_insights("a").await.unwrap().sample_size, 0);
        assert!(agg.reported_categories().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_report_updates_seeded_row() {
        let agg = aggregator();
        let seeded = agg
            .seed_unreported("a", "カフェ", "新作のタルトが入荷しました #カフェ", Some("p1"))
            .await
            .unwrap();

        let mut r = report("a", "カフェ", 120, 24);
        r.post_id = Some("p1".to_string());
        let result = agg.record_outcome(&r).await.unwrap();
        assert_eq!(
            result,
            OutcomeResult::Recorded {
                id: seeded,
                updated: true,
                corrected: false
            }
        );

        let own = agg.own_store_insights("a").await.unwrap();
        assert_eq!(own.sample_size, 1);
        assert_eq!(own.avg_save_intensity, 0.2);
    }

    #[tokio::test]
    async fn test_second_report_for_post_is_a_correction() {
        let agg = aggregator();
        let mut r = report("a", "カフェ", 100, 10);
        r.post_id = Some("p1".to_string());
        let id = recorded_id(agg.record_outcome(&r).await.unwrap());

        r.saves = 20;
        let result = agg.record_outcome(&r).await.unwrap();
        assert_eq!(
            result,
            OutcomeResult::Recorded {
                id,
                updated: true,
                corrected: true
            }
        );
        let own = agg.own_store_insights("a").await.unwrap();
        assert_eq!(own.sample_size, 1);
        assert_eq!(own.avg_save_intensity, 0.2);
    }

    #[tokio::test]
    async fn test_seeding_same_post_twice_keeps_one_row() {
        let agg = aggregator();
        let caption = "新作のタルトが入荷しました #カフェ";
        let first = agg.seed_unreported("a", "カフェ", caption, Some("p1")).await.unwrap();
        let second = agg.seed_unreported("a", "カフェ", caption, Some("p1")).await.unwrap();
        assert_eq!(first, second);

        let other = agg.seed_unreported("b", "カフェ", caption, Some("p1")).await.unwrap();
        assert_ne!(first, other);
        assert!(agg.seed_unreported("a", "カフェ", caption, None).await.is_some());
        assert!(agg.seed_unreported("a", "カフェ", caption, None).await.is_some());

        let mut r = report("a", "カフェ", 120, 24);
        r.post_id = Some("p1".to_string());
        agg.record_outcome(&r).await.unwrap();
        assert_eq!(agg.own_store_insights("a").await.unwrap().sample_size, 1);
    }

    #[tokio::test]
    async fn test_invalid_report_is_not_persisted() {
        let agg = aggregator();
        let result = agg.record_outcome(&report("a", "カフェ", 99_999, 100)).await.unwrap();
        assert!(matches!(
            result,
            OutcomeResult::Rejected(Rejection::Validation { .. })
        ));
        assert_eq!(agg.own_store_insights("a").await.unwrap().sample_size, 0);
    }

    #[tokio::test]
    async fn test_outlier_report_is_not_persisted() {
        let agg = aggregator();
        for (store, likes) in [("a", 100), ("b", 110), ("c", 95), ("d", 105)] {
            recorded_id(agg.record_outcome(&report(store, "カフェ", likes, 10)).await.unwrap());
        }
        let result = agg.record_outcome(&report("e", "カフェ", 500, 10)).await.unwrap();
        assert!(matches!(
            result,
            OutcomeResult::Rejected(Rejection::Outlier { .. })
        ));
        let category = agg.category_insights("カフェ", CATEGORY_LIMIT).await.unwrap();
        assert_eq!(category.sample_size, 4);
    }

    #[tokio::test]
    async fn test_delete_store_metrics() {
        let agg = aggregator();
        agg.record_outcome(&report("a", "カフェ", 100, 10)).await.unwrap();
        agg.record_outcome(&report("b", "カフェ", 100, 10)).await.unwrap();
        assert_eq!(agg.delete_store_metrics("a").await.unwrap(), 1);
        assert_eq!(agg.own_store_insights("a").await.unwrap().sample_size, 0);
        assert_eq!(agg.own_store_insights("b").await.unwrap().sample_size, 1);
    }
}
