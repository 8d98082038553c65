use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::analytics::{CourseStatsQuery, SearchQuery};
use crate::error::AppError;
use crate::models::{
    CachedResponse, Contributor, ContributorInput, Course, CourseInput, CourseStatsRow,
    Instructor, InstructorInput, Photo, PhotoInput, TopContributorRow,
    UniqueContributorsResponse,
};
use crate::state::AppState;
use crate::store::SortDirection;

const DEFAULT_SEARCH_LIMIT: usize = 20;
const DEFAULT_STATS_LIMIT: usize = 10;
const DEFAULT_CONTRIBUTORS_LIMIT: usize = 5;

/// RFC 3339 (trailing `Z` or offset), or a naive datetime taken as UTC.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, AppError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    raw.parse::<NaiveDateTime>()
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| AppError::Validation(format!("invalid timestamp: {raw}")))
}

// ---------- photos ----------

pub async fn create_photo(
    State(state): State<Arc<AppState>>,
    Json(input): Json<PhotoInput>,
) -> Result<Json<Photo>, AppError> {
    Ok(Json(state.analytics.create_photo(input).await?))
}

pub async fn get_photo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Photo>, AppError> {
    state
        .store
        .photo_by_id(&id)?
        .map(Json)
        .ok_or(AppError::NotFound("photo"))
}

pub async fn update_photo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(input): Json<PhotoInput>,
) -> Result<Json<Photo>, AppError> {
    state
        .analytics
        .update_photo(&id, input)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("photo"))
}

pub async fn delete_photo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    if !state.analytics.delete_photo(&id).await? {
        return Err(AppError::NotFound("photo"));
    }
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct SearchParams {
    course_id: String,
    instructor_id: Option<String>,
    term: Option<String>,
    order_by: Option<String>,
    direction: Option<String>,
    skip: Option<usize>,
    limit: Option<usize>,
}

pub async fn search_photos(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Photo>>, AppError> {
    if let Some(order_by) = params.order_by.as_deref() {
        if order_by != "uploaded_at" {
            return Err(AppError::Validation(format!(
                "order_by must be uploaded_at, got {order_by}"
            )));
        }
    }
    let direction = match params.direction.as_deref() {
        Some(raw) => SortDirection::parse(raw)?,
        None => SortDirection::Desc,
    };

    let query = SearchQuery {
        course_id: params.course_id,
        instructor_id: params.instructor_id,
        term: params.term,
        direction,
        skip: params.skip.unwrap_or(0),
        limit: params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
    };
    Ok(Json(state.analytics.search_photos(&query).await?))
}

// ---------- analytics ----------

#[derive(Deserialize)]
pub struct CourseStatsParams {
    term: Option<String>,
    start: Option<String>,
    end: Option<String>,
    skip: Option<usize>,
    limit: Option<usize>,
}

pub async fn course_stats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CourseStatsParams>,
) -> Result<Json<CachedResponse<Vec<CourseStatsRow>>>, AppError> {
    let start = params.start.as_deref().map(parse_timestamp).transpose()?;
    let end = params.end.as_deref().map(parse_timestamp).transpose()?;
    if let (Some(start), Some(end)) = (&start, &end) {
        if start > end {
            return Err(AppError::Validation(
                "start must not be after end".to_string(),
            ));
        }
    }

    let query = CourseStatsQuery {
        term: params.term,
        start,
        end,
        skip: params.skip.unwrap_or(0),
        limit: params.limit.unwrap_or(DEFAULT_STATS_LIMIT),
    };
    let (from_cache, data) = state.analytics.course_stats(&query).await?;
    Ok(Json(CachedResponse { from_cache, data }))
}

#[derive(Deserialize)]
pub struct TopContributorsParams {
    limit: Option<usize>,
}

pub async fn top_contributors(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TopContributorsParams>,
) -> Result<Json<CachedResponse<Vec<TopContributorRow>>>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_CONTRIBUTORS_LIMIT);
    let (from_cache, data) = state.analytics.top_contributors(limit).await?;
    Ok(Json(CachedResponse { from_cache, data }))
}

#[derive(Deserialize)]
pub struct UniqueContributorsParams {
    course_id: Option<String>,
}

pub async fn unique_contributors(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UniqueContributorsParams>,
) -> Json<UniqueContributorsResponse> {
    Json(
        state
            .analytics
            .unique_contributors(params.course_id.as_deref()),
    )
}

// ---------- reference records ----------

pub async fn create_contributor(
    State(state): State<Arc<AppState>>,
    Json(input): Json<ContributorInput>,
) -> Result<Json<Contributor>, AppError> {
    Ok(Json(state.store.insert_contributor(input)?))
}

pub async fn list_contributors(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Contributor>>, AppError> {
    Ok(Json(state.store.list_contributors()?))
}

pub async fn update_contributor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(input): Json<ContributorInput>,
) -> Result<Json<Contributor>, AppError> {
    state
        .store
        .update_contributor(&id, input)?
        .map(Json)
        .ok_or(AppError::NotFound("contributor"))
}

pub async fn create_instructor(
    State(state): State<Arc<AppState>>,
    Json(input): Json<InstructorInput>,
) -> Result<Json<Instructor>, AppError> {
    Ok(Json(state.store.insert_instructor(input)?))
}

pub async fn list_instructors(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Instructor>>, AppError> {
    Ok(Json(state.store.list_instructors()?))
}

pub async fn update_instructor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(input): Json<InstructorInput>,
) -> Result<Json<Instructor>, AppError> {
    state
        .store
        .update_instructor(&id, input)?
        .map(Json)
        .ok_or(AppError::NotFound("instructor"))
}

pub async fn create_course(
    State(state): State<Arc<AppState>>,
    Json(input): Json<CourseInput>,
) -> Result<Json<Course>, AppError> {
    if state.store.instructor_by_id(&input.instructor_id)?.is_none() {
        return Err(AppError::NotFound("instructor"));
    }
    Ok(Json(state.store.insert_course(input)?))
}

pub async fn list_courses(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Course>>, AppError> {
    Ok(Json(state.store.list_courses()?))
}

pub async fn update_course(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(input): Json<CourseInput>,
) -> Result<Json<Course>, AppError> {
    state
        .store
        .update_course(&id, input)?
        .map(Json)
        .ok_or(AppError::NotFound("course"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_utc_and_offset_timestamps() {
        let expected = Utc.with_ymd_and_hms(2025, 7, 28, 10, 30, 0).unwrap();

        assert_eq!(parse_timestamp("2025-07-28T10:30:00Z").unwrap(), expected);
        assert_eq!(
            parse_timestamp("2025-07-28T07:30:00-03:00").unwrap(),
            expected
        );
        assert_eq!(parse_timestamp("2025-07-28T10:30:00").unwrap(), expected);
    }

    #[test]
    fn rejects_malformed_timestamps() {
        assert!(parse_timestamp("2025-07-28").is_err());
        assert!(parse_timestamp("yesterday").is_err());
        assert!(parse_timestamp("").is_err());
    }
}
