//! Semester GPA and cumulative CGPA computation for Group Scholar student
//! records, with the Postgres storage and reporting around it.

pub mod config;
pub mod db;
pub mod engine;
pub mod grade;
pub mod models;
pub mod recompute;
pub mod report;
pub mod rounding;
pub mod transcript;
