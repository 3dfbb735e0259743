//! Staff-triggered recompute of a student's stored CGPA.

use std::collections::BTreeMap;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::GradePointEngine;
use crate::models::{AllSemesterRecords, ProfileStanding, Student, StudentProfile};
use crate::rounding::{to_persisted, RoundingError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence operations the recompute flow depends on.
#[async_trait]
pub trait RecordStore {
    async fn find_student(&self, student_id: Uuid) -> Result<Option<Student>, StoreError>;

    /// Graded semesters only; semesters without graded units are omitted.
    async fn graded_semesters(&self, student_id: Uuid) -> Result<AllSemesterRecords, StoreError>;

    /// Writes the standing, creating the profile when the student has none.
    async fn save_standing(
        &self,
        student: &Student,
        standing: ProfileStanding,
    ) -> Result<StudentProfile, StoreError>;
}

#[derive(Debug, Error)]
pub enum RecomputeError {
    #[error("student {0} not found")]
    StudentNotFound(Uuid),
    #[error("target user is staff; cannot compute")]
    StaffTarget,
    #[error("no graded units found for this student")]
    NoGradedUnits,
    #[error("error rounding CGPA for storage: {0}")]
    Rounding(#[from] RoundingError),
    #[error("error saving CGPA: {0}")]
    Store(#[from] StoreError),
}

impl RecomputeError {
    pub fn status_code(&self) -> u16 {
        match self {
            RecomputeError::StudentNotFound(_) => 404,
            RecomputeError::StaffTarget | RecomputeError::NoGradedUnits => 400,
            RecomputeError::Rounding(_) | RecomputeError::Store(_) => 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecomputeOutcome {
    pub profile: StudentProfile,
    pub gpa_results: BTreeMap<String, f64>,
}

pub fn standing_for(cgpa: f64, total_credits: f64) -> Result<ProfileStanding, RoundingError> {
    Ok(ProfileStanding {
        cgpa: to_persisted(cgpa)?,
        total_credits: to_persisted(total_credits)?,
    })
}

pub async fn recompute_student<S>(
    store: &S,
    engine: &GradePointEngine,
    student_id: Uuid,
) -> Result<RecomputeOutcome, RecomputeError>
where
    S: RecordStore + Sync,
{
    let student = store
        .find_student(student_id)
        .await?
        .ok_or(RecomputeError::StudentNotFound(student_id))?;
    if student.is_staff {
        warn!(student = %student_id, "refusing to recompute CGPA for staff user");
        return Err(RecomputeError::StaffTarget);
    }

    let records = store.graded_semesters(student_id).await?;
    if records.is_empty() {
        return Err(RecomputeError::NoGradedUnits);
    }

    let result = engine.calculate_cgpa(&records);
    if result.used_fallback() {
        warn!(
            student = %student_id,
            fallbacks = ?result.fallbacks,
            "CGPA computed with fallback values"
        );
    }

    let standing = standing_for(result.cgpa, result.total_credits)?;
    let profile = store.save_standing(&student, standing).await?;
    info!(
        student = %student_id,
        username = %student.username,
        roll_number = %profile.roll_number,
        cgpa = %standing.cgpa,
        total_credits = %standing.total_credits,
        "stored recomputed CGPA"
    );

    Ok(RecomputeOutcome {
        profile,
        gpa_results: result.gpa_results,
    })
}

/// JSON payload returned to the staff caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RecomputeResponse {
    Success {
        success: bool,
        cgpa: Option<f64>,
        total_credits: Option<f64>,
        gpa_results: BTreeMap<String, f64>,
    },
    Failure {
        success: bool,
        error: String,
        #[serde(skip)]
        status: u16,
    },
}

impl RecomputeResponse {
    pub fn status_code(&self) -> u16 {
        match self {
            RecomputeResponse::Success { .. } => 200,
            RecomputeResponse::Failure { status, .. } => *status,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RecomputeResponse::Success { .. })
    }
}

impl From<Result<RecomputeOutcome, RecomputeError>> for RecomputeResponse {
    fn from(result: Result<RecomputeOutcome, RecomputeError>) -> Self {
        match result {
            Ok(outcome) => RecomputeResponse::Success {
                success: true,
                cgpa: outcome.profile.cgpa.and_then(|value| value.to_f64()),
                total_credits: outcome.profile.total_credits.and_then(|value| value.to_f64()),
                gpa_results: outcome.gpa_results,
            },
            Err(err) => RecomputeResponse::Failure {
                success: false,
                status: err.status_code(),
                error: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::str::FromStr;
    use std::sync::Mutex;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::*;
    use crate::models::{generated_roll_number, CourseUnitRecord};

    #[derive(Default)]
    struct MemoryStore {
        students: HashMap<Uuid, Student>,
        records: HashMap<Uuid, AllSemesterRecords>,
        profiles: Mutex<HashMap<Uuid, StudentProfile>>,
        fail_saves: bool,
    }

    impl MemoryStore {
        fn with_student(mut self, is_staff: bool, records: AllSemesterRecords) -> (Self, Uuid) {
            let id = Uuid::new_v4();
            self.students.insert(
                id,
                Student {
                    id,
                    username: "avery".to_string(),
                    full_name: "Avery Lee".to_string(),
                    is_staff,
                },
            );
            self.records.insert(id, records);
            (self, id)
        }

        fn profile(&self, student_id: Uuid) -> Option<StudentProfile> {
            self.profiles.lock().unwrap().get(&student_id).cloned()
        }
    }

    #[async_trait]
    impl RecordStore for MemoryStore {
        async fn find_student(&self, student_id: Uuid) -> Result<Option<Student>, StoreError> {
            Ok(self.students.get(&student_id).cloned())
        }

        async fn graded_semesters(
            &self,
            student_id: Uuid,
        ) -> Result<AllSemesterRecords, StoreError> {
            Ok(self.records.get(&student_id).cloned().unwrap_or_default())
        }

        async fn save_standing(
            &self,
            student: &Student,
            standing: ProfileStanding,
        ) -> Result<StudentProfile, StoreError> {
            if self.fail_saves {
                return Err(StoreError::Unavailable("disk full".to_string()));
            }
            let mut profiles = self.profiles.lock().unwrap();
            let profile = profiles.entry(student.id).or_insert_with(|| StudentProfile {
                id: Uuid::new_v4(),
                student_id: student.id,
                roll_number: generated_roll_number(student.id),
                is_student: true,
                cgpa: None,
                total_credits: None,
                updated_at: Utc::now(),
            });
            profile.cgpa = Some(standing.cgpa);
            profile.total_credits = Some(standing.total_credits);
            profile.updated_at = Utc::now();
            Ok(profile.clone())
        }
    }

    fn graded_records() -> AllSemesterRecords {
        let mut records = AllSemesterRecords::new();
        records.insert_unit("Sem1", Some(1), CourseUnitRecord::new("Calculus", "A", 3.0));
        records.insert_unit("Sem1", Some(1), CourseUnitRecord::new("Chemistry", "B", 3.0));
        records.insert_unit("Sem2", Some(2), CourseUnitRecord::new("Statistics", "C", 4.0));
        records
    }

    #[tokio::test]
    async fn recompute_creates_profile_and_stores_rounded_values() {
        let (store, id) = MemoryStore::default().with_student(false, graded_records());
        let engine = GradePointEngine::default();

        let outcome = recompute_student(&store, &engine, id).await.unwrap();
        assert_eq!(outcome.profile.cgpa, Some(Decimal::from_str("3.90").unwrap()));
        assert_eq!(outcome.profile.total_credits.unwrap().to_string(), "10.00");
        assert_eq!(outcome.profile.roll_number, generated_roll_number(id));
        assert!(outcome.profile.is_student);
        assert_eq!(outcome.gpa_results.len(), 2);

        let stored = store.profile(id).unwrap();
        assert_eq!(stored.cgpa, outcome.profile.cgpa);
    }

    #[tokio::test]
    async fn recompute_updates_existing_profile() {
        let (store, id) = MemoryStore::default().with_student(false, graded_records());
        let engine = GradePointEngine::default();

        let first = recompute_student(&store, &engine, id).await.unwrap();
        let second = recompute_student(&store, &engine, id).await.unwrap();
        assert_eq!(first.profile.id, second.profile.id);
        assert_eq!(first.profile.cgpa, second.profile.cgpa);
    }

    #[tokio::test]
    async fn staff_targets_are_rejected_without_writes() {
        let (store, id) = MemoryStore::default().with_student(true, graded_records());
        let err = recompute_student(&store, &GradePointEngine::default(), id)
            .await
            .unwrap_err();
        assert!(matches!(err, RecomputeError::StaffTarget));
        assert_eq!(err.status_code(), 400);
        assert!(store.profile(id).is_none());
    }

    #[tokio::test]
    async fn students_without_grades_are_rejected() {
        let (store, id) = MemoryStore::default().with_student(false, AllSemesterRecords::new());
        let err = recompute_student(&store, &GradePointEngine::default(), id)
            .await
            .unwrap_err();
        assert!(matches!(err, RecomputeError::NoGradedUnits));
        assert!(store.profile(id).is_none());
    }

    #[tokio::test]
    async fn unknown_student_is_not_found() {
        let store = MemoryStore::default();
        let err = recompute_student(&store, &GradePointEngine::default(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn store_failures_become_server_errors() {
        let (mut store, id) = MemoryStore::default().with_student(false, graded_records());
        store.fail_saves = true;
        let result = recompute_student(&store, &GradePointEngine::default(), id).await;
        let response = RecomputeResponse::from(result);
        assert_eq!(response.status_code(), 500);
        assert!(!response.is_success());

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(
            json["error"],
            "error saving CGPA: record store unavailable: disk full"
        );
        assert!(json.get("status").is_none());
    }

    #[tokio::test]
    async fn success_response_reports_stored_values() {
        let (store, id) = MemoryStore::default().with_student(false, graded_records());
        let result = recompute_student(&store, &GradePointEngine::default(), id).await;
        let response = RecomputeResponse::from(result);
        assert_eq!(response.status_code(), 200);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["cgpa"], 3.9);
        assert_eq!(json["total_credits"], 10.0);
        assert_eq!(json["gpa_results"]["Sem1"], 4.5);
        assert_eq!(json["gpa_results"]["Sem2"], 3.0);
    }

    #[test]
    fn standing_rounds_half_up() {
        let standing = standing_for(3.905, 17.5).unwrap();
        assert_eq!(standing.cgpa.to_string(), "3.91");
        assert_eq!(standing.total_credits.to_string(), "17.50");
    }
}
