use serde::{Deserialize, Serialize};
use sqlrun_engine::{EngineOptions, OutcomeClassifier};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub migrations: MigrationsConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub log_level: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            migrations: MigrationsConfig::default(),
            engine: EngineConfig::default(),
            log_level: Some("info".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file. Falls back to `<config_dir>/data/sqlrun.db`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationsConfig {
    #[serde(default = "default_migrations_dir")]
    pub dir: PathBuf,

    /// Apply the destructive-keyword gate to migration files as well.
    #[serde(default)]
    pub enforce_safety_gate: bool,

    #[serde(default = "default_true")]
    pub list_tables: bool,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            dir: default_migrations_dir(),
            enforce_safety_gate: false,
            list_tables: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,

    /// Error message fragments that mark a statement as already applied.
    #[serde(default = "default_idempotent_patterns")]
    pub idempotent_patterns: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            preview_chars: default_preview_chars(),
            idempotent_patterns: default_idempotent_patterns(),
        }
    }
}

impl EngineConfig {
    pub fn to_options(&self) -> EngineOptions {
        EngineOptions {
            preview_chars: self.preview_chars,
            idempotent_patterns: self.idempotent_patterns.clone(),
        }
    }
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_true() -> bool {
    true
}

fn default_preview_chars() -> usize {
    EngineOptions::default().preview_chars
}

fn default_idempotent_patterns() -> Vec<String> {
    OutcomeClassifier::DEFAULT_PATTERNS
        .iter()
        .map(|p| p.to_string())
        .collect()
}
