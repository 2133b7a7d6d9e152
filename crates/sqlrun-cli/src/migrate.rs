use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sqlrun_config::{AppConfig, ConfigLoader};
use sqlrun_db::{MigrationFile, SqliteExecutor, discover_migrations, load_migration};
use sqlrun_engine::{EngineOptions, GatePolicy, NamedScript, SafetyGate, SqlRunner, TableLister};
use tracing::info;

use crate::output;

pub struct MigrateArgs {
    pub dir: Option<PathBuf>,
    pub file: Option<PathBuf>,
    pub db: Option<PathBuf>,
    pub dry_run: bool,
    pub allow_dangerous: bool,
    pub json: bool,
}

pub async fn run_migrate(
    loader: &ConfigLoader,
    config: &AppConfig,
    options: EngineOptions,
    args: MigrateArgs,
) -> Result<()> {
    let files = collect_migrations(config, &args)?;
    if files.is_empty() {
        println!("No migrations found.");
        return Ok(());
    }

    if args.dry_run {
        print_plan(&files);
        return Ok(());
    }

    let db = open_database(loader, config, args.db.as_deref())?;
    let runner = SqlRunner::with_options(&db, options);
    let policy = if config.migrations.enforce_safety_gate {
        GatePolicy::Enforce {
            allow_dangerous: args.allow_dangerous,
        }
    } else {
        GatePolicy::Exempt
    };
    let lister: Option<&dyn TableLister> = if config.migrations.list_tables {
        Some(&db)
    } else {
        None
    };

    let scripts: Vec<NamedScript> = files.iter().map(MigrationFile::to_script).collect();
    info!("applying {} migration file(s)", scripts.len());
    let outcome = runner.run_migrations(&scripts, lister, policy).await;

    output::finish(&outcome, args.json)
}

fn collect_migrations(config: &AppConfig, args: &MigrateArgs) -> Result<Vec<MigrationFile>> {
    if let Some(file) = &args.file {
        let migration = load_migration(file)
            .with_context(|| format!("failed to read migration {}", file.display()))?;
        return Ok(vec![migration]);
    }

    let dir = args.dir.as_ref().unwrap_or(&config.migrations.dir);
    discover_migrations(dir)
        .with_context(|| format!("failed to read migrations from {}", dir.display()))
}

/// Open `explicit`, or the configured database under the config directory.
pub fn open_database(
    loader: &ConfigLoader,
    config: &AppConfig,
    explicit: Option<&Path>,
) -> Result<SqliteExecutor> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            loader.ensure_dirs()?;
            loader.database_path(config)
        }
    };

    SqliteExecutor::open(&path)
        .with_context(|| format!("failed to open database {}", path.display()))
}

fn print_plan(files: &[MigrationFile]) {
    println!("Migration plan (dry run)");
    println!("─────────────────────────");
    for file in files {
        let segmented = SqlRunner::plan(&file.sql);
        println!("  {}: {} statement(s)", file.name, segmented.statements.len());
        if let Some(rest) = &segmented.unterminated {
            println!("    ! {rest}");
        }
        let keywords = SafetyGate::scan(&file.sql);
        if !keywords.is_empty() {
            let names: Vec<&str> = keywords.iter().map(|k| k.as_str()).collect();
            println!("    ! contains {}", names.join(", "));
        }
    }
}
