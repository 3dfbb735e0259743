//! Grade symbol to quality-point scale.
//!
//! One [`GradeScale`] instance is shared by the computation engine and by the
//! display layer. Lookups return [`GradeLookup`] so each caller picks its own
//! fallback for symbols the scale does not know.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

const CANONICAL: &[(&str, f64)] = &[
    ("E-", 1.0),
    ("E+", 1.5),
    ("D", 2.0),
    ("D+", 2.5),
    ("C", 3.0),
    ("C+", 3.5),
    ("B", 4.0),
    ("B+", 4.5),
    ("A", 5.0),
    ("A+", 5.0),
    ("F", 0.0),
];

#[derive(Debug, Error)]
pub enum ScaleError {
    #[error("grade symbol is empty")]
    EmptySymbol,
    #[error("grade '{grade}' has invalid quality points {points}")]
    InvalidPoints { grade: String, points: f64 },
    #[error("failed to read grade scale: {0}")]
    Csv(#[from] csv::Error),
}

/// Result of looking a symbol up in a [`GradeScale`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GradeLookup {
    Points(f64),
    Unrecognized,
}

impl GradeLookup {
    pub fn points(self) -> Option<f64> {
        match self {
            GradeLookup::Points(points) => Some(points),
            GradeLookup::Unrecognized => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradeScale {
    points: HashMap<String, f64>,
}

fn normalize(grade: &str) -> String {
    grade.trim().to_uppercase()
}

impl GradeScale {
    pub fn canonical() -> Self {
        let points = CANONICAL
            .iter()
            .map(|(grade, points)| (grade.to_string(), *points))
            .collect();
        Self { points }
    }

    pub fn from_entries<I, S>(entries: I) -> Result<Self, ScaleError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut points = HashMap::new();
        for (grade, value) in entries {
            let grade = normalize(grade.as_ref());
            if grade.is_empty() {
                return Err(ScaleError::EmptySymbol);
            }
            if !value.is_finite() || value < 0.0 {
                return Err(ScaleError::InvalidPoints {
                    grade,
                    points: value,
                });
            }
            points.insert(grade, value);
        }
        Ok(Self { points })
    }

    /// Reads a `grade,points` CSV.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, ScaleError> {
        Self::from_csv(csv::Reader::from_reader(reader))
    }

    pub fn from_csv_path(path: &Path) -> Result<Self, ScaleError> {
        Self::from_csv(csv::Reader::from_path(path)?)
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Self, ScaleError> {
        #[derive(Deserialize)]
        struct ScaleRow {
            grade: String,
            points: f64,
        }

        let mut entries = Vec::new();
        for row in reader.deserialize::<ScaleRow>() {
            let row = row?;
            entries.push((row.grade, row.points));
        }
        Self::from_entries(entries)
    }

    pub fn lookup(&self, grade: &str) -> GradeLookup {
        match self.points.get(&normalize(grade)) {
            Some(points) => GradeLookup::Points(*points),
            None => GradeLookup::Unrecognized,
        }
    }

    /// Quality points used in GPA math. Unknown symbols count as zero.
    pub fn quality_points(&self, grade: &str) -> f64 {
        self.lookup(grade).points().unwrap_or(0.0)
    }

    /// Quality points as shown on the dashboard; unknown symbols render `N/A`.
    pub fn display_points(&self, grade: &str) -> String {
        match self.lookup(grade) {
            GradeLookup::Points(points) => format!("{points:.2}"),
            GradeLookup::Unrecognized => "N/A".to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }
}

impl Default for GradeScale {
    fn default() -> Self {
        Self::canonical()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_scale_matches_table() {
        let scale = GradeScale::canonical();
        let expected = [
            ("E-", 1.0),
            ("E+", 1.5),
            ("D", 2.0),
            ("D+", 2.5),
            ("C", 3.0),
            ("C+", 3.5),
            ("B", 4.0),
            ("B+", 4.5),
            ("A", 5.0),
            ("A+", 5.0),
            ("F", 0.0),
        ];
        for (grade, points) in expected {
            assert_eq!(scale.quality_points(grade), points, "grade {grade}");
        }
        assert_eq!(scale.len(), 11);
    }

    #[test]
    fn lookup_ignores_case_and_whitespace() {
        let scale = GradeScale::canonical();
        assert_eq!(scale.quality_points(" a+ "), 5.0);
        assert_eq!(scale.quality_points("A+"), 5.0);
        assert_eq!(scale.quality_points("\tb+\n"), 4.5);
        assert_eq!(scale.lookup("c"), GradeLookup::Points(3.0));
    }

    #[test]
    fn unknown_grades_fall_back_per_caller() {
        let scale = GradeScale::canonical();
        assert_eq!(scale.quality_points("Z"), 0.0);
        assert_eq!(scale.quality_points(""), 0.0);
        assert_eq!(scale.lookup("Z"), GradeLookup::Unrecognized);
        assert_eq!(scale.display_points("Z"), "N/A");
        assert_eq!(scale.display_points("b"), "4.00");
    }

    #[test]
    fn failing_grade_is_recognized_with_zero_points() {
        let scale = GradeScale::canonical();
        assert_eq!(scale.lookup("f"), GradeLookup::Points(0.0));
        assert_eq!(scale.display_points("F"), "0.00");
    }

    #[test]
    fn custom_scale_loads_from_csv() {
        let data = "grade,points\nhd,7.0\n d ,5.0\nP,4\n";
        let scale = GradeScale::from_csv_reader(data.as_bytes()).unwrap();
        assert_eq!(scale.len(), 3);
        assert_eq!(scale.quality_points("HD"), 7.0);
        assert_eq!(scale.quality_points("d"), 5.0);
        assert_eq!(scale.lookup("A"), GradeLookup::Unrecognized);
    }

    #[test]
    fn display_keeps_custom_point_precision() {
        let scale = GradeScale::from_entries([("B+", 3.75), ("A", 4.0)]).unwrap();
        assert_eq!(scale.display_points("b+"), "3.75");
        assert_eq!(scale.display_points("A"), "4.00");
    }

    #[test]
    fn rejects_negative_points() {
        let err = GradeScale::from_entries([("A", -1.0)]).unwrap_err();
        assert!(matches!(err, ScaleError::InvalidPoints { .. }));
        let err = GradeScale::from_entries([("  ", 1.0)]).unwrap_err();
        assert!(matches!(err, ScaleError::EmptySymbol));
    }
}
