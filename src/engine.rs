use std::collections::BTreeMap;

use tracing::debug;

use crate::grade::{GradeLookup, GradeScale};
use crate::models::{AllSemesterRecords, CgpaResult, CourseUnitRecord, Fallback, SemesterRecordSet};
use crate::rounding::round_cgpa;

/// Key used in [`CgpaResult::fallbacks`] for conditions of the aggregate.
pub const OVERALL_KEY: &str = "*";

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SemesterTotals {
    pub points: f64,
    pub credits: f64,
}

impl SemesterTotals {
    pub fn gpa(&self) -> f64 {
        if self.credits > 0.0 {
            self.points / self.credits
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SemesterEvaluation {
    pub gpa: f64,
    pub totals: SemesterTotals,
    pub fallbacks: Vec<Fallback>,
}

/// Computes semester GPAs and the cumulative CGPA against one grade scale.
#[derive(Debug, Clone, Default)]
pub struct GradePointEngine {
    scale: GradeScale,
}

impl GradePointEngine {
    pub fn new(scale: GradeScale) -> Self {
        Self { scale }
    }

    pub fn scale(&self) -> &GradeScale {
        &self.scale
    }

    pub fn quality_points(&self, grade: &str) -> f64 {
        self.scale.quality_points(grade)
    }

    pub fn semester_totals(&self, units: &[CourseUnitRecord]) -> SemesterTotals {
        units.iter().fold(SemesterTotals::default(), |acc, unit| SemesterTotals {
            points: acc.points + self.quality_points(&unit.grade) * unit.credits,
            credits: acc.credits + unit.credits,
        })
    }

    /// Credit-weighted GPA; zero when the semester carries no credits.
    pub fn semester_gpa(&self, units: &[CourseUnitRecord]) -> f64 {
        self.semester_totals(units).gpa()
    }

    pub fn evaluate_semester(&self, set: &SemesterRecordSet) -> SemesterEvaluation {
        let totals = self.semester_totals(&set.units);
        let mut fallbacks: Vec<Fallback> = set
            .units
            .iter()
            .filter(|unit| self.scale.lookup(&unit.grade) == GradeLookup::Unrecognized)
            .map(|unit| Fallback::UnrecognizedGrade {
                subject: unit.subject.clone(),
                grade: unit.grade.clone(),
            })
            .collect();
        if totals.credits <= 0.0 {
            fallbacks.push(Fallback::ZeroCredits);
        }

        debug!(
            semester = %set.key,
            sequence = set.sequence,
            units = set.units.len(),
            points = totals.points,
            credits = totals.credits,
            fallbacks = fallbacks.len(),
            "evaluated semester"
        );

        SemesterEvaluation {
            gpa: totals.gpa(),
            totals,
            fallbacks,
        }
    }

    pub fn calculate_cgpa(&self, semesters: &AllSemesterRecords) -> CgpaResult {
        let mut gpa_results = BTreeMap::new();
        let mut fallbacks = BTreeMap::new();
        let mut overall = SemesterTotals::default();

        for set in semesters.iter() {
            let evaluation = self.evaluate_semester(set);
            overall.points += evaluation.totals.points;
            overall.credits += evaluation.totals.credits;
            gpa_results.insert(set.key.clone(), evaluation.gpa);
            if !evaluation.fallbacks.is_empty() {
                fallbacks.insert(set.key.clone(), evaluation.fallbacks);
            }
        }

        if overall.credits <= 0.0 {
            fallbacks
                .entry(OVERALL_KEY.to_string())
                .or_default()
                .push(Fallback::ZeroCredits);
        }

        let current_gpa = semesters
            .latest()
            .and_then(|set| gpa_results.get(&set.key).copied());
        let cgpa = round_cgpa(overall.gpa());

        debug!(
            semesters = semesters.len(),
            total_points = overall.points,
            total_credits = overall.credits,
            cgpa,
            "calculated cgpa"
        );

        CgpaResult {
            gpa_results,
            total_gpa_points: overall.points,
            total_credits: overall.credits,
            cgpa,
            current_gpa,
            fallbacks,
        }
    }
}
