use std::path::PathBuf;

use thiserror::Error;

use crate::grade::{GradeScale, ScaleError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("DATABASE_URL must be set to a production Postgres instance")]
    MissingDatabaseUrl,
    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },
    #[error("failed to load grade scale from {path}: {source}")]
    Scale {
        path: PathBuf,
        #[source]
        source: ScaleError,
    },
}

/// Settings read from the environment (and `.env`, when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub grade_scale_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").filter(|value| !value.trim().is_empty());

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(value) => value
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|count| *count > 0)
                .ok_or(ConfigError::InvalidNumber {
                    name: "DATABASE_MAX_CONNECTIONS",
                    value,
                })?,
            None => 5,
        };

        let grade_scale_path = lookup("GRADE_SCALE_PATH")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            database_url,
            max_connections,
            grade_scale_path,
        })
    }

    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::MissingDatabaseUrl)
    }

    /// The configured scale, or the canonical one when none is set.
    pub fn grade_scale(&self) -> Result<GradeScale, ConfigError> {
        match &self.grade_scale_path {
            Some(path) => GradeScale::from_csv_path(path).map_err(|source| ConfigError::Scale {
                path: path.clone(),
                source,
            }),
            None => Ok(GradeScale::canonical()),
        }
    }
}
