//! # Event store adapter
//!
//! Typed access to the upload-event collection and the reference collections
//! it joins against (contributors, instructors, courses). Backed by an
//! in-process concurrent store; every operation returns `Result` so a remote
//! backend slotted in here can surface `StoreUnavailable` without changing
//! callers.
//!
//! Ordering rules: scans sort by `uploaded_at` with ties broken by insertion
//! order (stable), grouped stats sort by total descending with ties broken by
//! most recent upload. Pagination is applied after sorting and before joins,
//! so joins only touch the page actually returned. Joins are inner: a row
//! whose referenced course/instructor/contributor no longer exists is
//! dropped, not nulled.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    Contributor, ContributorInput, Course, CourseInput, CourseStatsRow, Instructor,
    InstructorInput, Photo, PhotoInput, TopContributorRow,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(AppError::Validation(format!(
                "direction must be asc or desc, got {other}"
            ))),
        }
    }
}

/// Conjunction of equality constraints plus an inclusive timestamp range.
#[derive(Debug, Clone, Default)]
pub struct PhotoFilter {
    pub course_id: Option<String>,
    pub instructor_id: Option<String>,
    pub term: Option<String>,
    pub uploaded_from: Option<DateTime<Utc>>,
    pub uploaded_until: Option<DateTime<Utc>>,
}

impl PhotoFilter {
    fn matches(&self, photo: &Photo) -> bool {
        if let Some(course_id) = &self.course_id {
            if photo.course_id != *course_id {
                return false;
            }
        }
        if let Some(instructor_id) = &self.instructor_id {
            if photo.instructor_id != *instructor_id {
                return false;
            }
        }
        if let Some(term) = &self.term {
            if photo.term != *term {
                return false;
            }
        }
        if let Some(from) = &self.uploaded_from {
            if photo.uploaded_at < *from {
                return false;
            }
        }
        if let Some(until) = &self.uploaded_until {
            if photo.uploaded_at > *until {
                return false;
            }
        }
        true
    }
}

struct GroupedStat<K> {
    key: K,
    total: u64,
    last_upload: DateTime<Utc>,
}

/// Count and most-recent-upload per distinct group key, sorted by total
/// descending then recency descending.
fn grouped_stats<K, F>(photos: &[Photo], filter: &PhotoFilter, key_of: F) -> Vec<GroupedStat<K>>
where
    K: PartialEq,
    F: Fn(&Photo) -> K,
{
    let mut groups: Vec<GroupedStat<K>> = Vec::new();

    for photo in photos.iter().filter(|p| filter.matches(p)) {
        let key = key_of(photo);
        match groups.iter_mut().find(|g| g.key == key) {
            Some(group) => {
                group.total += 1;
                if photo.uploaded_at > group.last_upload {
                    group.last_upload = photo.uploaded_at;
                }
            }
            None => groups.push(GroupedStat {
                key,
                total: 1,
                last_upload: photo.uploaded_at,
            }),
        }
    }

    groups.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then(b.last_upload.cmp(&a.last_upload))
    });
    groups
}

#[derive(Default)]
pub struct Store {
    photos: RwLock<Vec<Photo>>,
    contributors: RwLock<Vec<Contributor>>,
    instructors: RwLock<Vec<Instructor>>,
    courses: RwLock<Vec<Course>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    // ---------- photos ----------

    pub fn insert_photo(&self, input: PhotoInput) -> Result<Photo, AppError> {
        let photo = Photo {
            id: Uuid::new_v4().to_string(),
            contributor_id: input.contributor_id,
            course_id: input.course_id,
            instructor_id: input.instructor_id,
            term: input.term,
            photo_url: input.photo_url,
            description: input.description,
            uploaded_at: input.uploaded_at.unwrap_or_else(Utc::now),
        };

        self.photos.write().push(photo.clone());
        Ok(photo)
    }

    pub fn photo_by_id(&self, id: &str) -> Result<Option<Photo>, AppError> {
        Ok(self.photos.read().iter().find(|p| p.id == id).cloned())
    }

    /// Full-field replace: the caller supplies every mutable field, only the
    /// id survives from the stored record.
    pub fn update_photo(&self, id: &str, input: PhotoInput) -> Result<Option<Photo>, AppError> {
        let mut photos = self.photos.write();
        match photos.iter_mut().find(|p| p.id == id) {
            Some(slot) => {
                let updated = Photo {
                    id: slot.id.clone(),
                    contributor_id: input.contributor_id,
                    course_id: input.course_id,
                    instructor_id: input.instructor_id,
                    term: input.term,
                    photo_url: input.photo_url,
                    description: input.description,
                    uploaded_at: input.uploaded_at.unwrap_or_else(Utc::now),
                };
                *slot = updated.clone();
                Ok(Some(updated))
            }
            None => Ok(None),
        }
    }

    /// Returns true iff a record existed.
    pub fn delete_photo(&self, id: &str) -> Result<bool, AppError> {
        let mut photos = self.photos.write();
        let before = photos.len();
        photos.retain(|p| p.id != id);
        Ok(photos.len() != before)
    }

    /// Filtered, sorted, paginated scan over photos.
    pub fn search(
        &self,
        filter: &PhotoFilter,
        direction: SortDirection,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Photo>, AppError> {
        let photos = self.photos.read();
        let mut hits: Vec<&Photo> = photos.iter().filter(|p| filter.matches(p)).collect();

        // Vec::sort_by is stable, so equal timestamps keep insertion order
        // in both directions.
        hits.sort_by(|a, b| match direction {
            SortDirection::Asc => a.uploaded_at.cmp(&b.uploaded_at),
            SortDirection::Desc => b.uploaded_at.cmp(&a.uploaded_at),
        });

        Ok(hits.into_iter().skip(skip).take(limit).cloned().collect())
    }

    /// Per (course, instructor, term) totals, joined to course and
    /// instructor names.
    pub fn course_stats(
        &self,
        filter: &PhotoFilter,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<CourseStatsRow>, AppError> {
        let photos = self.photos.read();
        let groups = grouped_stats(&photos, filter, |p| {
            (p.course_id.clone(), p.instructor_id.clone(), p.term.clone())
        });
        drop(photos);

        let courses = self.courses.read();
        let instructors = self.instructors.read();

        Ok(groups
            .into_iter()
            .skip(skip)
            .take(limit)
            .filter_map(|group| {
                let (course_id, instructor_id, term) = group.key;
                let course = courses.iter().find(|c| c.id == course_id)?;
                let instructor = instructors.iter().find(|i| i.id == instructor_id)?;
                Some(CourseStatsRow {
                    course_id,
                    course_name: course.name.clone(),
                    instructor_id,
                    instructor_name: instructor.name.clone(),
                    term,
                    total_fotos: group.total,
                    last_upload: group.last_upload,
                })
            })
            .collect())
    }

    /// Per-contributor totals, joined to the contributor name.
    pub fn top_contributors(&self, limit: usize) -> Result<Vec<TopContributorRow>, AppError> {
        let photos = self.photos.read();
        let groups = grouped_stats(&photos, &PhotoFilter::default(), |p| p.contributor_id.clone());
        drop(photos);

        let contributors = self.contributors.read();

        Ok(groups
            .into_iter()
            .take(limit)
            .filter_map(|group| {
                let contributor = contributors.iter().find(|c| c.id == group.key)?;
                Some(TopContributorRow {
                    contributor_id: group.key.clone(),
                    contributor_name: contributor.name.clone(),
                    total_fotos: group.total,
                })
            })
            .collect())
    }

    // ---------- reference collections ----------

    pub fn insert_contributor(&self, input: ContributorInput) -> Result<Contributor, AppError> {
        self.insert_contributor_with_id(Uuid::new_v4().to_string(), input)
    }

    pub(crate) fn insert_contributor_with_id(
        &self,
        id: String,
        input: ContributorInput,
    ) -> Result<Contributor, AppError> {
        let record = Contributor {
            id,
            name: input.name,
            email: input.email,
        };
        self.contributors.write().push(record.clone());
        Ok(record)
    }

    pub fn list_contributors(&self) -> Result<Vec<Contributor>, AppError> {
        Ok(self.contributors.read().clone())
    }

    pub fn update_contributor(
        &self,
        id: &str,
        input: ContributorInput,
    ) -> Result<Option<Contributor>, AppError> {
        let mut contributors = self.contributors.write();
        match contributors.iter_mut().find(|c| c.id == id) {
            Some(slot) => {
                slot.name = input.name;
                slot.email = input.email;
                Ok(Some(slot.clone()))
            }
            None => Ok(None),
        }
    }

    pub fn insert_instructor(&self, input: InstructorInput) -> Result<Instructor, AppError> {
        self.insert_instructor_with_id(Uuid::new_v4().to_string(), input)
    }

    pub(crate) fn insert_instructor_with_id(
        &self,
        id: String,
        input: InstructorInput,
    ) -> Result<Instructor, AppError> {
        let record = Instructor {
            id,
            name: input.name,
        };
        self.instructors.write().push(record.clone());
        Ok(record)
    }

    pub fn instructor_by_id(&self, id: &str) -> Result<Option<Instructor>, AppError> {
        Ok(self.instructors.read().iter().find(|i| i.id == id).cloned())
    }

    pub fn list_instructors(&self) -> Result<Vec<Instructor>, AppError> {
        Ok(self.instructors.read().clone())
    }

    pub fn update_instructor(
        &self,
        id: &str,
        input: InstructorInput,
    ) -> Result<Option<Instructor>, AppError> {
        let mut instructors = self.instructors.write();
        match instructors.iter_mut().find(|i| i.id == id) {
            Some(slot) => {
                slot.name = input.name;
                Ok(Some(slot.clone()))
            }
            None => Ok(None),
        }
    }

    pub fn insert_course(&self, input: CourseInput) -> Result<Course, AppError> {
        self.insert_course_with_id(Uuid::new_v4().to_string(), input)
    }

    pub(crate) fn insert_course_with_id(
        &self,
        id: String,
        input: CourseInput,
    ) -> Result<Course, AppError> {
        let record = Course {
            id,
            name: input.name,
            term: input.term,
            instructor_id: input.instructor_id,
        };
        self.courses.write().push(record.clone());
        Ok(record)
    }

    pub fn list_courses(&self) -> Result<Vec<Course>, AppError> {
        Ok(self.courses.read().clone())
    }

    pub fn update_course(&self, id: &str, input: CourseInput) -> Result<Option<Course>, AppError> {
        let mut courses = self.courses.write();
        match courses.iter_mut().find(|c| c.id == id) {
            Some(slot) => {
                slot.name = input.name;
                slot.term = input.term;
                slot.instructor_id = input.instructor_id;
                Ok(Some(slot.clone()))
            }
            None => Ok(None),
        }
    }

    #[cfg(test)]
    fn delete_course(&self, id: &str) -> Result<bool, AppError> {
        let mut courses = self.courses.write();
        let before = courses.len();
        courses.retain(|c| c.id != id);
        Ok(courses.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, day, hour, 0, 0).unwrap()
    }

    fn photo(contributor: &str, course: &str, instructor: &str, term: &str, uploaded_at: DateTime<Utc>) -> PhotoInput {
        PhotoInput {
            contributor_id: contributor.to_string(),
            course_id: course.to_string(),
            instructor_id: instructor.to_string(),
            term: term.to_string(),
            photo_url: format!("https://example.com/{course}.jpg"),
            description: None,
            uploaded_at: Some(uploaded_at),
        }
    }

    fn store_with_refs() -> Store {
        let store = Store::new();
        store
            .insert_instructor_with_id(
                "p001".into(),
                InstructorInput {
                    name: "Prof. João Silva".into(),
                },
            )
            .unwrap();
        store
            .insert_instructor_with_id(
                "p002".into(),
                InstructorInput {
                    name: "Profa. Marina Alves".into(),
                },
            )
            .unwrap();
        store
            .insert_course_with_id(
                "d001".into(),
                CourseInput {
                    name: "Algoritmos".into(),
                    term: "1º".into(),
                    instructor_id: "p001".into(),
                },
            )
            .unwrap();
        store
            .insert_course_with_id(
                "d002".into(),
                CourseInput {
                    name: "Banco de Dados".into(),
                    term: "3º".into(),
                    instructor_id: "p002".into(),
                },
            )
            .unwrap();
        store
            .insert_contributor_with_id(
                "u001".into(),
                ContributorInput {
                    name: "Ana Costa".into(),
                    email: "ana@email.com".into(),
                },
            )
            .unwrap();
        store
    }

    #[test]
    fn insert_assigns_id_and_default_timestamp() {
        let store = Store::new();
        let mut input = photo("u001", "d001", "p001", "1º", at(28, 10));
        input.uploaded_at = None;

        let before = Utc::now();
        let created = store.insert_photo(input).unwrap();

        assert!(!created.id.is_empty());
        assert!(created.uploaded_at >= before);
        assert_eq!(
            store.photo_by_id(&created.id).unwrap().unwrap(),
            created
        );
    }

    #[test]
    fn update_replaces_all_mutable_fields() {
        let store = Store::new();
        let created = store
            .insert_photo(photo("u001", "d001", "p001", "1º", at(28, 10)))
            .unwrap();

        let updated = store
            .update_photo(&created.id, photo("u002", "d002", "p002", "3º", at(29, 9)))
            .unwrap()
            .unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.contributor_id, "u002");
        assert_eq!(updated.course_id, "d002");
        assert_eq!(updated.uploaded_at, at(29, 9));

        assert!(store.update_photo("missing", photo("u", "d", "p", "1º", at(28, 10))).unwrap().is_none());
    }

    #[test]
    fn delete_reports_whether_record_existed() {
        let store = Store::new();
        let created = store
            .insert_photo(photo("u001", "d001", "p001", "1º", at(28, 10)))
            .unwrap();

        assert!(store.delete_photo(&created.id).unwrap());
        assert!(!store.delete_photo(&created.id).unwrap());
        assert!(store.photo_by_id(&created.id).unwrap().is_none());
    }

    #[test]
    fn search_filters_are_conjunctive() {
        let store = Store::new();
        store.insert_photo(photo("u001", "d001", "p001", "1º", at(28, 10))).unwrap();
        store.insert_photo(photo("u002", "d001", "p002", "2º", at(28, 11))).unwrap();
        store.insert_photo(photo("u003", "d002", "p001", "1º", at(28, 12))).unwrap();

        let filter = PhotoFilter {
            course_id: Some("d001".into()),
            term: Some("1º".into()),
            ..Default::default()
        };
        let hits = store.search(&filter, SortDirection::Desc, 0, 20).unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].contributor_id, "u001");
    }

    #[test]
    fn search_timestamp_range_is_inclusive() {
        let store = Store::new();
        store.insert_photo(photo("u001", "d001", "p001", "1º", at(27, 10))).unwrap();
        store.insert_photo(photo("u002", "d001", "p001", "1º", at(28, 10))).unwrap();
        store.insert_photo(photo("u003", "d001", "p001", "1º", at(29, 10))).unwrap();

        let filter = PhotoFilter {
            uploaded_from: Some(at(28, 10)),
            uploaded_until: Some(at(29, 10)),
            ..Default::default()
        };
        let hits = store.search(&filter, SortDirection::Asc, 0, 20).unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].contributor_id, "u002");
        assert_eq!(hits[1].contributor_id, "u003");
    }

    #[test]
    fn search_breaks_timestamp_ties_by_insertion_order() {
        let store = Store::new();
        let first = store.insert_photo(photo("u001", "d001", "p001", "1º", at(28, 10))).unwrap();
        let second = store.insert_photo(photo("u002", "d001", "p001", "1º", at(28, 10))).unwrap();

        let desc = store.search(&PhotoFilter::default(), SortDirection::Desc, 0, 20).unwrap();
        assert_eq!(desc[0].id, first.id);
        assert_eq!(desc[1].id, second.id);

        let asc = store.search(&PhotoFilter::default(), SortDirection::Asc, 0, 20).unwrap();
        assert_eq!(asc[0].id, first.id);
        assert_eq!(asc[1].id, second.id);
    }

    #[test]
    fn pagination_law_holds() {
        let store = Store::new();
        for hour in 0..10 {
            store.insert_photo(photo("u001", "d001", "p001", "1º", at(20, hour))).unwrap();
        }

        let full = store.search(&PhotoFilter::default(), SortDirection::Desc, 0, 7).unwrap();
        let page = store.search(&PhotoFilter::default(), SortDirection::Desc, 3, 4).unwrap();

        assert_eq!(&full[3..], &page[..]);
    }

    #[test]
    fn course_stats_counts_and_joins() {
        let store = store_with_refs();
        store.insert_photo(photo("u001", "d001", "p001", "1º", at(28, 10))).unwrap();
        store.insert_photo(photo("u002", "d001", "p001", "1º", at(28, 14))).unwrap();
        store.insert_photo(photo("u003", "d002", "p002", "3º", at(29, 9))).unwrap();

        let rows = store.course_stats(&PhotoFilter::default(), 0, 10).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].course_id, "d001");
        assert_eq!(rows[0].total_fotos, 2);
        assert_eq!(rows[0].course_name, "Algoritmos");
        assert_eq!(rows[0].instructor_name, "Prof. João Silva");
        assert_eq!(rows[0].last_upload, at(28, 14));
        assert_eq!(rows[1].course_id, "d002");
        assert_eq!(rows[1].total_fotos, 1);
    }

    #[test]
    fn course_stats_ties_break_by_recency() {
        let store = store_with_refs();
        store.insert_photo(photo("u001", "d001", "p001", "1º", at(28, 10))).unwrap();
        store.insert_photo(photo("u002", "d002", "p002", "3º", at(29, 9))).unwrap();

        let rows = store.course_stats(&PhotoFilter::default(), 0, 10).unwrap();

        assert_eq!(rows[0].course_id, "d002");
        assert_eq!(rows[1].course_id, "d001");
    }

    #[test]
    fn course_stats_paginates_before_joining() {
        let store = store_with_refs();
        store.insert_photo(photo("u001", "d001", "p001", "1º", at(28, 10))).unwrap();
        store.insert_photo(photo("u001", "d001", "p001", "1º", at(28, 11))).unwrap();
        store.insert_photo(photo("u002", "d002", "p002", "3º", at(29, 9))).unwrap();

        let rows = store.course_stats(&PhotoFilter::default(), 1, 10).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].course_id, "d002");
    }

    #[test]
    fn course_stats_drops_rows_with_missing_references() {
        let store = store_with_refs();
        store.insert_photo(photo("u001", "d001", "p001", "1º", at(28, 10))).unwrap();
        store.insert_photo(photo("u002", "d002", "p002", "3º", at(29, 9))).unwrap();

        store.delete_course("d002").unwrap();
        let rows = store.course_stats(&PhotoFilter::default(), 0, 10).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].course_id, "d001");
    }

    #[test]
    fn top_contributors_sorts_and_limits() {
        let store = store_with_refs();
        store
            .insert_contributor_with_id(
                "u002".into(),
                ContributorInput {
                    name: "Bruno Lima".into(),
                    email: "bruno@email.com".into(),
                },
            )
            .unwrap();
        store.insert_photo(photo("u001", "d001", "p001", "1º", at(28, 10))).unwrap();
        store.insert_photo(photo("u001", "d002", "p002", "3º", at(28, 11))).unwrap();
        store.insert_photo(photo("u002", "d001", "p001", "1º", at(28, 12))).unwrap();

        let rows = store.top_contributors(5).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].contributor_id, "u001");
        assert_eq!(rows[0].contributor_name, "Ana Costa");
        assert_eq!(rows[0].total_fotos, 2);

        let capped = store.top_contributors(1).unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[test]
    fn top_contributors_drops_unknown_contributors() {
        let store = store_with_refs();
        store.insert_photo(photo("u999", "d001", "p001", "1º", at(28, 10))).unwrap();
        store.insert_photo(photo("u001", "d001", "p001", "1º", at(28, 11))).unwrap();

        let rows = store.top_contributors(5).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].contributor_id, "u001");
    }
}
