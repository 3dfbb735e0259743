use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseUnitRecord {
    pub subject: String,
    pub grade: String,
    pub credits: f64,
}

impl CourseUnitRecord {
    pub fn new(subject: impl Into<String>, grade: impl Into<String>, credits: f64) -> Self {
        Self {
            subject: subject.into(),
            grade: grade.into(),
            credits,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemesterRecordSet {
    pub key: String,
    /// Chronological position of the semester; higher is later.
    pub sequence: i32,
    pub units: Vec<CourseUnitRecord>,
}

/// Graded semesters for one student, in insertion order with unique keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllSemesterRecords {
    semesters: Vec<SemesterRecordSet>,
}

impl AllSemesterRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any set already stored under the same key.
    pub fn push_semester(&mut self, set: SemesterRecordSet) {
        match self.semesters.iter_mut().find(|s| s.key == set.key) {
            Some(existing) => *existing = set,
            None => self.semesters.push(set),
        }
    }

    pub fn insert_unit(&mut self, key: &str, sequence: Option<i32>, unit: CourseUnitRecord) {
        if let Some(existing) = self.semesters.iter_mut().find(|s| s.key == key) {
            existing.units.push(unit);
            return;
        }
        let sequence = sequence.unwrap_or_else(|| {
            self.semesters
                .iter()
                .map(|s| s.sequence)
                .max()
                .map_or(1, |latest| latest + 1)
        });
        self.semesters.push(SemesterRecordSet {
            key: key.to_string(),
            sequence,
            units: vec![unit],
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &SemesterRecordSet> {
        self.semesters.iter()
    }

    pub fn get(&self, key: &str) -> Option<&SemesterRecordSet> {
        self.semesters.iter().find(|s| s.key == key)
    }

    pub fn len(&self) -> usize {
        self.semesters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.semesters.is_empty()
    }

    pub fn unit_count(&self) -> usize {
        self.semesters.iter().map(|s| s.units.len()).sum()
    }

    /// The latest semester by `sequence`; the last inserted wins ties.
    pub fn latest(&self) -> Option<&SemesterRecordSet> {
        self.semesters
            .iter()
            .enumerate()
            .max_by_key(|(index, s)| (s.sequence, *index))
            .map(|(_, s)| s)
    }
}

impl FromIterator<SemesterRecordSet> for AllSemesterRecords {
    fn from_iter<T: IntoIterator<Item = SemesterRecordSet>>(iter: T) -> Self {
        let mut records = Self::new();
        for set in iter {
            records.push_semester(set);
        }
        records
    }
}

/// Condition under which a reported number came from a fallback rather than
/// a real computation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fallback {
    ZeroCredits,
    UnrecognizedGrade { subject: String, grade: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CgpaResult {
    pub gpa_results: BTreeMap<String, f64>,
    pub total_gpa_points: f64,
    pub total_credits: f64,
    pub cgpa: f64,
    pub current_gpa: Option<f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fallbacks: BTreeMap<String, Vec<Fallback>>,
}

impl CgpaResult {
    pub fn used_fallback(&self) -> bool {
        !self.fallbacks.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Student {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub is_staff: bool,
}

/// CGPA and credits as stored on a profile, two fractional digits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileStanding {
    pub cgpa: Decimal,
    pub total_credits: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentProfile {
    pub id: Uuid,
    pub student_id: Uuid,
    pub roll_number: String,
    pub is_student: bool,
    pub cgpa: Option<Decimal>,
    pub total_credits: Option<Decimal>,
    pub updated_at: DateTime<Utc>,
}

/// Roll number assigned to profiles created during a recompute.
pub fn generated_roll_number(student_id: Uuid) -> String {
    let hex = student_id.simple().to_string();
    format!("STU{}", hex[..8].to_uppercase())
}
