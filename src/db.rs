use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{
    generated_roll_number, AllSemesterRecords, CourseUnitRecord, ProfileStanding, Student,
    StudentProfile,
};
use crate::recompute::{RecordStore, StoreError};
use crate::transcript::TranscriptRow;

const PROFILE_COLUMNS: &str =
    "id, student_id, roll_number, is_student, cgpa, total_credits, updated_at";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let students = vec![
        (
            Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?,
            "avery.lee",
            "Avery Lee",
            false,
        ),
        (
            Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?,
            "jules.moreno",
            "Jules Moreno",
            false,
        ),
        (
            Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?,
            "kiara.patel",
            "Kiara Patel",
            true,
        ),
    ];

    for (id, username, full_name, is_staff) in students {
        upsert_student(pool, id, username, full_name, is_staff).await?;
    }

    let units = vec![
        ("seed-001", "avery.lee", "Year 1 Semester 1", 1, "Calculus I", Some("A"), "3.00"),
        ("seed-002", "avery.lee", "Year 1 Semester 1", 1, "General Chemistry", Some("B"), "3.00"),
        ("seed-003", "avery.lee", "Year 1 Semester 2", 2, "Statistics", Some("C"), "4.00"),
        ("seed-004", "avery.lee", "Year 2 Semester 1", 3, "Research Methods", None, "3.00"),
        ("seed-005", "jules.moreno", "Year 1 Semester 1", 1, "Academic Writing", Some("B+"), "2.00"),
        ("seed-006", "jules.moreno", "Year 1 Semester 1", 1, "Linear Algebra", Some("A+"), "3.50"),
    ];

    for (source_key, username, semester, sequence, unit_name, grade, credits) in units {
        let student_id: Uuid =
            sqlx::query("SELECT id FROM grade_points.students WHERE username = $1")
                .bind(username)
                .fetch_one(pool)
                .await?
                .get("id");
        let semester_id = upsert_semester(pool, student_id, semester, sequence).await?;
        insert_unit(
            pool,
            semester_id,
            unit_name,
            grade,
            credits.parse::<Decimal>()?,
            source_key,
        )
        .await?;
    }

    Ok(())
}

async fn upsert_student(
    pool: &PgPool,
    id: Uuid,
    username: &str,
    full_name: &str,
    is_staff: bool,
) -> Result<Uuid, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO grade_points.students (id, username, full_name, is_staff)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (username) DO UPDATE
        SET full_name = EXCLUDED.full_name
        RETURNING id
        "#,
    )
    .bind(id)
    .bind(username)
    .bind(full_name)
    .bind(is_staff)
    .fetch_one(pool)
    .await?;
    Ok(row.get("id"))
}

async fn upsert_semester(
    pool: &PgPool,
    student_id: Uuid,
    name: &str,
    sequence: i32,
) -> Result<Uuid, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO grade_points.semesters (id, student_id, name, sequence)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (student_id, name) DO UPDATE
        SET sequence = EXCLUDED.sequence
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(student_id)
    .bind(name)
    .bind(sequence)
    .fetch_one(pool)
    .await?;
    Ok(row.get("id"))
}

async fn insert_unit(
    pool: &PgPool,
    semester_id: Uuid,
    unit_name: &str,
    grade: Option<&str>,
    credits: Decimal,
    source_key: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO grade_points.course_units
        (id, semester_id, unit_name, grade, credits, source_key)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(semester_id)
    .bind(unit_name)
    .bind(grade)
    .bind(credits)
    .bind(source_key)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn import_csv(pool: &PgPool, rows: &[TranscriptRow]) -> anyhow::Result<usize> {
    let mut inserted = 0usize;

    for (index, row) in rows.iter().enumerate() {
        let student_id =
            upsert_student(pool, Uuid::new_v4(), &row.username, &row.full_name, false).await?;
        let sequence = match row.sequence {
            Some(sequence) => sequence,
            None => next_sequence(pool, student_id, &row.semester).await?,
        };
        let semester_id = upsert_semester(pool, student_id, &row.semester, sequence).await?;

        let source_key = row
            .source_key
            .clone()
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));
        let credits = Decimal::try_from(row.credits)
            .map_err(|err| anyhow::anyhow!("row {}: invalid credits: {err}", index + 1))?;

        if insert_unit(pool, semester_id, &row.unit_name, row.graded(), credits, &source_key).await? {
            inserted += 1;
        } else {
            debug!(source_key = %source_key, "course unit already imported");
        }
    }

    Ok(inserted)
}

/// Keeps the stored sequence of an existing semester, otherwise places the
/// new semester after the student's latest one.
async fn next_sequence(pool: &PgPool, student_id: Uuid, name: &str) -> Result<i32, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT COALESCE(
            (SELECT sequence FROM grade_points.semesters WHERE student_id = $1 AND name = $2),
            (SELECT COALESCE(MAX(sequence), 0) + 1 FROM grade_points.semesters WHERE student_id = $1)
        ) AS sequence
        "#,
    )
    .bind(student_id)
    .bind(name)
    .fetch_one(pool)
    .await?;
    Ok(row.get("sequence"))
}

fn student_from_row(row: &sqlx::postgres::PgRow) -> Student {
    Student {
        id: row.get("id"),
        username: row.get("username"),
        full_name: row.get("full_name"),
        is_staff: row.get("is_staff"),
    }
}

fn profile_from_row(row: &sqlx::postgres::PgRow) -> StudentProfile {
    StudentProfile {
        id: row.get("id"),
        student_id: row.get("student_id"),
        roll_number: row.get("roll_number"),
        is_student: row.get("is_student"),
        cgpa: row.get("cgpa"),
        total_credits: row.get("total_credits"),
        updated_at: row.get("updated_at"),
    }
}

pub async fn fetch_student(pool: &PgPool, student_id: Uuid) -> Result<Option<Student>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT id, username, full_name, is_staff FROM grade_points.students WHERE id = $1",
    )
    .bind(student_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.as_ref().map(student_from_row))
}

pub async fn find_student_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<Student>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT id, username, full_name, is_staff FROM grade_points.students WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;
    Ok(row.as_ref().map(student_from_row))
}

pub async fn fetch_profile(
    pool: &PgPool,
    student_id: Uuid,
) -> Result<Option<StudentProfile>, sqlx::Error> {
    let query = format!(
        "SELECT {PROFILE_COLUMNS} FROM grade_points.student_profiles WHERE student_id = $1"
    );
    let row = sqlx::query(&query)
        .bind(student_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(profile_from_row))
}

/// Graded units grouped by semester, in semester order.
pub async fn fetch_graded_semesters(
    pool: &PgPool,
    student_id: Uuid,
) -> Result<AllSemesterRecords, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT s.name, s.sequence, u.unit_name, u.grade, u.credits \
         FROM grade_points.semesters s \
         JOIN grade_points.course_units u ON u.semester_id = s.id \
         WHERE s.student_id = $1 AND u.grade IS NOT NULL AND btrim(u.grade) <> '' \
         ORDER BY s.sequence, s.created_at, u.created_at",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    let mut records = AllSemesterRecords::new();
    for row in rows {
        let name: String = row.get("name");
        let credits: Decimal = row.get("credits");
        let unit = CourseUnitRecord::new(
            row.get::<String, _>("unit_name"),
            row.get::<String, _>("grade").trim(),
            credits.to_f64().unwrap_or_default(),
        );
        records.insert_unit(&name, Some(row.get("sequence")), unit);
    }

    Ok(records)
}

/// Last writer wins when two recomputes race on the same student.
pub async fn save_standing(
    pool: &PgPool,
    student_id: Uuid,
    standing: ProfileStanding,
) -> Result<StudentProfile, sqlx::Error> {
    let query = format!(
        r#"
        INSERT INTO grade_points.student_profiles
        (id, student_id, roll_number, is_student, cgpa, total_credits, updated_at)
        VALUES ($1, $2, $3, TRUE, $4, $5, now())
        ON CONFLICT (student_id) DO UPDATE
        SET cgpa = EXCLUDED.cgpa,
            total_credits = EXCLUDED.total_credits,
            updated_at = EXCLUDED.updated_at
        RETURNING {PROFILE_COLUMNS}
        "#
    );
    let row = sqlx::query(&query)
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(generated_roll_number(student_id))
        .bind(standing.cgpa)
        .bind(standing.total_credits)
        .fetch_one(pool)
        .await?;
    let profile = profile_from_row(&row);
    info!(student = %student_id, profile = %profile.id, "saved student standing");
    Ok(profile)
}

/// [`RecordStore`] backed by Postgres.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn find_student(&self, student_id: Uuid) -> Result<Option<Student>, StoreError> {
        Ok(fetch_student(&self.pool, student_id).await?)
    }

    async fn graded_semesters(&self, student_id: Uuid) -> Result<AllSemesterRecords, StoreError> {
        Ok(fetch_graded_semesters(&self.pool, student_id).await?)
    }

    async fn save_standing(
        &self,
        student: &Student,
        standing: ProfileStanding,
    ) -> Result<StudentProfile, StoreError> {
        Ok(save_standing(&self.pool, student.id, standing).await?)
    }
}
