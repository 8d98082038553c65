//! # Query façade
//!
//! Composes the event store, the cache, and the distinct counter. Every read
//! query follows the same path: build a deterministic key, probe the cache,
//! and on a miss compute exactly once, store the result with a TTL, and
//! return it. Every photo mutation invalidates the derived-query prefixes
//! before the request reports success; inserts additionally record the
//! contributor into the course and global counter scopes.
//!
//! Cache and counter failures never fail a request — analytics here are
//! eventually consistent by design, bounded by the TTL window.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::cache::{build_key, Cache};
use crate::counter::DistinctCounter;
use crate::error::AppError;
use crate::models::{
    CourseStatsRow, Photo, PhotoInput, TopContributorRow, UniqueContributorsResponse,
};
use crate::store::{PhotoFilter, SortDirection, Store};

/// Prefixes whose results could include any mutated photo. Broad on purpose:
/// a single upload affects an unbounded set of filter/pagination
/// combinations, so precision is not attempted.
const INVALIDATED_PREFIXES: [&str; 3] =
    ["search:", "analytics:byCourse:", "analytics:topContributors:"];

#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub course_id: String,
    pub instructor_id: Option<String>,
    pub term: Option<String>,
    pub direction: SortDirection,
    pub skip: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CourseStatsQuery {
    pub term: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub skip: usize,
    pub limit: usize,
}

pub struct Analytics {
    store: Arc<Store>,
    cache: Arc<dyn Cache>,
    counter: Arc<DistinctCounter>,
    search_ttl: Duration,
    analytics_ttl: Duration,
}

impl Analytics {
    pub fn new(
        store: Arc<Store>,
        cache: Arc<dyn Cache>,
        counter: Arc<DistinctCounter>,
        search_ttl: Duration,
        analytics_ttl: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            counter,
            search_ttl,
            analytics_ttl,
        }
    }

    // ---------- read queries ----------

    pub async fn search_photos(&self, query: &SearchQuery) -> Result<Vec<Photo>, AppError> {
        let mut params: Vec<(&str, String)> = vec![
            ("course_id", query.course_id.clone()),
            ("order_by", "uploaded_at".to_string()),
            ("direction", query.direction.as_str().to_string()),
            ("skip", query.skip.to_string()),
            ("limit", query.limit.to_string()),
        ];
        if let Some(instructor_id) = &query.instructor_id {
            params.push(("instructor_id", instructor_id.clone()));
        }
        if let Some(term) = &query.term {
            params.push(("term", term.clone()));
        }
        let key = build_key("search", &params);

        if let Some(photos) = self.probe::<Vec<Photo>>(&key).await {
            return Ok(photos);
        }

        let filter = PhotoFilter {
            course_id: Some(query.course_id.clone()),
            instructor_id: query.instructor_id.clone(),
            term: query.term.clone(),
            ..Default::default()
        };
        let photos = self
            .store
            .search(&filter, query.direction, query.skip, query.limit)?;

        self.store_result(&key, &photos, self.search_ttl).await;
        Ok(photos)
    }

    /// Per-course totals. The boolean reports whether the rows came from the
    /// cache.
    pub async fn course_stats(
        &self,
        query: &CourseStatsQuery,
    ) -> Result<(bool, Vec<CourseStatsRow>), AppError> {
        let mut params: Vec<(&str, String)> = vec![
            ("skip", query.skip.to_string()),
            ("limit", query.limit.to_string()),
        ];
        if let Some(term) = &query.term {
            params.push(("term", term.clone()));
        }
        if let Some(start) = &query.start {
            params.push(("start", start.to_rfc3339()));
        }
        if let Some(end) = &query.end {
            params.push(("end", end.to_rfc3339()));
        }
        let key = build_key("analytics:byCourse", &params);

        if let Some(rows) = self.probe::<Vec<CourseStatsRow>>(&key).await {
            return Ok((true, rows));
        }

        let filter = PhotoFilter {
            term: query.term.clone(),
            uploaded_from: query.start,
            uploaded_until: query.end,
            ..Default::default()
        };
        let rows = self.store.course_stats(&filter, query.skip, query.limit)?;

        self.store_result(&key, &rows, self.analytics_ttl).await;
        Ok((false, rows))
    }

    pub async fn top_contributors(
        &self,
        limit: usize,
    ) -> Result<(bool, Vec<TopContributorRow>), AppError> {
        let key = build_key("analytics:topContributors", &[("limit", limit.to_string())]);

        if let Some(rows) = self.probe::<Vec<TopContributorRow>>(&key).await {
            return Ok((true, rows));
        }

        let rows = self.store.top_contributors(limit)?;
        self.store_result(&key, &rows, self.analytics_ttl).await;
        Ok((false, rows))
    }

    /// Answered purely from the counter, never the store. `None` means the
    /// scope has never seen an upload (or the counter is unavailable).
    pub fn unique_contributors(&self, course_id: Option<&str>) -> UniqueContributorsResponse {
        let scope = match course_id {
            Some(course_id) => DistinctCounter::course_scope(course_id),
            None => DistinctCounter::GLOBAL_SCOPE.to_string(),
        };
        let estimate = self.counter.estimate(&scope);

        UniqueContributorsResponse {
            estimator: DistinctCounter::ESTIMATOR,
            scope,
            estimate,
        }
    }

    // ---------- mutations ----------

    /// Persist an upload, record its contributor into the course and global
    /// scopes, and invalidate derived queries — all before the created
    /// record is handed back.
    pub async fn create_photo(&self, input: PhotoInput) -> Result<Photo, AppError> {
        let photo = self.store.insert_photo(input)?;

        self.counter.record(
            &DistinctCounter::course_scope(&photo.course_id),
            &photo.contributor_id,
        );
        self.counter
            .record(DistinctCounter::GLOBAL_SCOPE, &photo.contributor_id);

        self.invalidate_derived().await;
        Ok(photo)
    }

    pub async fn update_photo(
        &self,
        id: &str,
        input: PhotoInput,
    ) -> Result<Option<Photo>, AppError> {
        let updated = self.store.update_photo(id, input)?;
        if updated.is_some() {
            self.invalidate_derived().await;
        }
        Ok(updated)
    }

    pub async fn delete_photo(&self, id: &str) -> Result<bool, AppError> {
        let deleted = self.store.delete_photo(id)?;
        if deleted {
            self.invalidate_derived().await;
        }
        Ok(deleted)
    }

    async fn invalidate_derived(&self) {
        for prefix in INVALIDATED_PREFIXES {
            self.cache.invalidate_prefix(prefix).await;
        }
    }

    async fn probe<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let hit = self.cache.get(key).await?;
        match serde_json::from_str(&hit) {
            Ok(value) => {
                debug!("cache hit for {key}");
                Some(value)
            }
            Err(e) => {
                // Undecodable entries are treated as misses and recomputed.
                warn!("discarding cache entry {key}: {e}");
                None
            }
        }
    }

    async fn store_result<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        match serde_json::to_string(value) {
            Ok(body) => self.cache.set(key, &body, ttl).await,
            Err(e) => warn!("failed to serialize result for {key}: {e}"),
        }
    }
}
