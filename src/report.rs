use std::fmt::Write;

use crate::grade::GradeScale;
use crate::models::{AllSemesterRecords, CgpaResult, Fallback};

fn describe_fallback(fallback: &Fallback) -> String {
    match fallback {
        Fallback::ZeroCredits => "no credit hours, GPA reported as 0.00".to_string(),
        Fallback::UnrecognizedGrade { subject, grade } => {
            format!("unrecognized grade '{grade}' in {subject} counted as 0 points")
        }
    }
}

/// Markdown dashboard for one student.
pub fn build_dashboard(
    student_name: &str,
    records: &AllSemesterRecords,
    result: &CgpaResult,
    scale: &GradeScale,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Academic Standing: {}", student_name);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "- CGPA: {:.2}", result.cgpa);
    match result.current_gpa {
        Some(gpa) => {
            let _ = writeln!(output, "- Current GPA: {:.2}", gpa);
        }
        None => {
            let _ = writeln!(output, "- Current GPA: N/A");
        }
    }
    let _ = writeln!(output, "- Total credits: {:.2}", result.total_credits);
    let _ = writeln!(output, "- Quality points: {:.2}", result.total_gpa_points);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Semesters");

    if records.is_empty() {
        let _ = writeln!(output, "No graded course units recorded.");
    }

    let mut semesters: Vec<_> = records.iter().collect();
    semesters.sort_by_key(|set| set.sequence);
    for set in semesters {
        let gpa = result.gpa_results.get(&set.key).copied().unwrap_or(0.0);
        let _ = writeln!(output);
        let _ = writeln!(output, "### {} (GPA {:.2})", set.key, gpa);
        let _ = writeln!(output, "| Unit | Grade | Points | Credits |");
        let _ = writeln!(output, "|---|---|---|---|");
        for unit in set.units.iter() {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {:.2} |",
                unit.subject,
                unit.grade,
                scale.display_points(&unit.grade),
                unit.credits
            );
        }
    }

    if result.used_fallback() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Data Warnings");
        for (key, fallbacks) in result.fallbacks.iter() {
            for fallback in fallbacks {
                let _ = writeln!(output, "- {}: {}", key, describe_fallback(fallback));
            }
        }
    }

    output
}
