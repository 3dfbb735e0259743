//! Course-unit rows read from CSV exports.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::models::{AllSemesterRecords, CourseUnitRecord};

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("failed to read transcript csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: credits must be a non-negative number, got {credits}")]
    InvalidCredits { row: usize, credits: f64 },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TranscriptRow {
    pub username: String,
    pub full_name: String,
    pub semester: String,
    pub sequence: Option<i32>,
    pub unit_name: String,
    pub grade: Option<String>,
    pub credits: f64,
    pub source_key: Option<String>,
}

impl TranscriptRow {
    /// Trimmed grade, `None` when the unit has not been graded yet.
    pub fn graded(&self) -> Option<&str> {
        self.grade
            .as_deref()
            .map(str::trim)
            .filter(|grade| !grade.is_empty())
    }
}

pub fn read_rows<R: Read>(reader: R) -> Result<Vec<TranscriptRow>, TranscriptError> {
    collect_rows(csv::Reader::from_reader(reader))
}

pub fn read_path(path: &Path) -> Result<Vec<TranscriptRow>, TranscriptError> {
    collect_rows(csv::Reader::from_path(path)?)
}

fn collect_rows<R: Read>(mut reader: csv::Reader<R>) -> Result<Vec<TranscriptRow>, TranscriptError> {
    let mut rows = Vec::new();
    for (index, result) in reader.deserialize::<TranscriptRow>().enumerate() {
        let row = result?;
        if !row.credits.is_finite() || row.credits < 0.0 {
            return Err(TranscriptError::InvalidCredits {
                row: index + 1,
                credits: row.credits,
            });
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Distinct usernames in first-seen order.
pub fn usernames(rows: &[TranscriptRow]) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for row in rows {
        if !names.contains(&row.username.as_str()) {
            names.push(&row.username);
        }
    }
    names
}

/// Graded semesters for one student. Ungraded units are dropped, and so is
/// any semester left without graded units.
pub fn records_for(rows: &[TranscriptRow], username: &str) -> AllSemesterRecords {
    let mut records = AllSemesterRecords::new();
    for row in rows.iter().filter(|row| row.username == username) {
        if let Some(grade) = row.graded() {
            records.insert_unit(
                &row.semester,
                row.sequence,
                CourseUnitRecord::new(row.unit_name.clone(), grade, row.credits),
            );
        }
    }
    records
}
