use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use groupscholar_grade_points::config::Config;
use groupscholar_grade_points::engine::GradePointEngine;
use groupscholar_grade_points::{db, recompute, report, transcript};

#[derive(Parser)]
#[command(name = "grade-points")]
#[command(about = "GPA and CGPA calculator for Group Scholar student records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import course units from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Compute GPA/CGPA straight from a CSV file without a database
    Calculate {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        username: Option<String>,
        /// Print the full result as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Write a markdown dashboard for a student
    Dashboard {
        #[arg(long)]
        username: String,
        #[arg(long, default_value = "dashboard.md")]
        out: PathBuf,
    },
    /// Recompute and store a student's CGPA, printing the JSON response
    Recompute {
        #[arg(long)]
        student_id: Uuid,
    },
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    let database_url = config.require_database_url()?;
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let engine = GradePointEngine::new(config.grade_scale()?);
    info!(grades = engine.scale().len(), "grade scale loaded");

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&config).await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let rows = transcript::read_path(&csv)
                .with_context(|| format!("failed to read {}", csv.display()))?;
            let pool = connect(&config).await?;
            let inserted = db::import_csv(&pool, &rows).await?;
            println!("Inserted {inserted} course units from {}.", csv.display());
        }
        Commands::Calculate {
            csv,
            username,
            json,
        } => {
            let rows = transcript::read_path(&csv)
                .with_context(|| format!("failed to read {}", csv.display()))?;
            let usernames: Vec<String> = match username {
                Some(username) => vec![username],
                None => transcript::usernames(&rows)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            };

            if usernames.is_empty() {
                println!("No course units found in {}.", csv.display());
                return Ok(());
            }

            for username in usernames {
                let records = transcript::records_for(&rows, &username);
                let result = engine.calculate_cgpa(&records);
                if json {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                    continue;
                }
                println!(
                    "- {} CGPA {:.2} over {:.2} credits across {} semesters",
                    username,
                    result.cgpa,
                    result.total_credits,
                    result.gpa_results.len()
                );
                for (semester, gpa) in result.gpa_results.iter() {
                    println!("    {semester}: GPA {gpa:.2}");
                }
            }
        }
        Commands::Dashboard { username, out } => {
            let pool = connect(&config).await?;
            let student = db::find_student_by_username(&pool, &username)
                .await?
                .with_context(|| format!("no student with username {username}"))?;
            let records = db::fetch_graded_semesters(&pool, student.id).await?;
            let result = engine.calculate_cgpa(&records);
            let mut dashboard =
                report::build_dashboard(&student.full_name, &records, &result, engine.scale());
            if let Some(profile) = db::fetch_profile(&pool, student.id).await? {
                dashboard.push_str(&format!(
                    "\nRoll number {}; stored CGPA {} as of {}.\n",
                    profile.roll_number,
                    profile
                        .cgpa
                        .map(|cgpa| cgpa.to_string())
                        .unwrap_or_else(|| "not computed".to_string()),
                    profile.updated_at.format("%Y-%m-%d")
                ));
            }
            std::fs::write(&out, dashboard)?;
            println!("Dashboard written to {}.", out.display());
        }
        Commands::Recompute { student_id } => {
            let pool = connect(&config).await?;
            let store = db::PgStore::new(pool);
            let result = recompute::recompute_student(&store, &engine, student_id).await;
            let response = recompute::RecomputeResponse::from(result);
            println!("{}", serde_json::to_string_pretty(&response)?);
            if !response.is_success() {
                anyhow::bail!("recompute failed with status {}", response.status_code());
            }
        }
    }

    Ok(())
}
