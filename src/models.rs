use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One photo of classroom material, as stored and as returned on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: String,
    pub contributor_id: String,
    pub course_id: String,
    pub instructor_id: String,
    pub term: String,
    pub photo_url: String,
    #[serde(default)]
    pub description: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

/// Submission payload for a photo. `uploaded_at` defaults to the submission
/// time when absent.
#[derive(Debug, Clone, Deserialize)]
pub struct PhotoInput {
    pub contributor_id: String,
    pub course_id: String,
    pub instructor_id: String,
    pub term: String,
    pub photo_url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub uploaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContributorInput {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instructor {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstructorInput {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub name: String,
    pub term: String,
    pub instructor_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CourseInput {
    pub name: String,
    pub term: String,
    pub instructor_id: String,
}

/// One row of the per-course upload statistics, joined to the course and
/// instructor names. `total_fotos` is the wire name the frontend already
/// consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseStatsRow {
    pub course_id: String,
    pub course_name: String,
    pub instructor_id: String,
    pub instructor_name: String,
    pub term: String,
    pub total_fotos: u64,
    pub last_upload: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopContributorRow {
    pub contributor_id: String,
    pub contributor_name: String,
    pub total_fotos: u64,
}

/// Analytics responses carry whether they were served from the cache.
#[derive(Debug, Clone, Serialize)]
pub struct CachedResponse<T> {
    pub from_cache: bool,
    pub data: T,
}

#[derive(Debug, Clone, Serialize)]
pub struct UniqueContributorsResponse {
    pub estimator: &'static str,
    pub scope: String,
    pub estimate: Option<u64>,
}
