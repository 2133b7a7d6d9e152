mod exec;
mod migrate;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use sqlrun_config::ConfigLoader;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "sqlrun",
    version,
    about = "sqlrun - apply multi-statement SQL scripts one statement at a time"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Directory holding config.yml / config.toml
    #[arg(long, global = true, env = "SQLRUN_CONFIG_DIR")]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply migration files in order
    Migrate {
        /// Directory of *.sql migration files (defaults to migrations.dir)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Apply a single migration file instead of a directory
        #[arg(long, conflicts_with = "dir")]
        file: Option<PathBuf>,

        /// SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,

        /// Show the statements that would run without touching the database
        #[arg(long)]
        dry_run: bool,

        /// Confirm destructive statements when migrations.enforce_safety_gate is on
        #[arg(long)]
        allow_dangerous: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run an ad-hoc SQL script
    Exec {
        /// Script file, or `-` for stdin
        script: String,

        /// SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,

        /// Confirm DROP / TRUNCATE / DELETE FROM statements
        #[arg(long)]
        allow_dangerous: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the statements a script splits into
    Split {
        /// Script file, or `-` for stdin
        script: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_loader = match &cli.config_dir {
        Some(dir) => ConfigLoader::with_dir(dir),
        None => ConfigLoader::new()?,
    };
    let config = config_loader.load()?;

    let level = cli
        .log_level
        .clone()
        .or_else(|| config.log_level.clone())
        .unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let options = config.engine.to_options();

    match cli.command {
        Commands::Migrate {
            dir,
            file,
            db,
            dry_run,
            allow_dangerous,
            json,
        } => {
            let args = migrate::MigrateArgs {
                dir,
                file,
                db,
                dry_run,
                allow_dangerous,
                json,
            };
            migrate::run_migrate(&config_loader, &config, options, args).await?;
        }
        Commands::Exec {
            script,
            db,
            allow_dangerous,
            json,
        } => {
            let sql = exec::read_script(&script)?;
            let db = migrate::open_database(&config_loader, &config, db.as_deref())?;
            exec::run_exec(&db, options, &sql, allow_dangerous, json).await?;
        }
        Commands::Split { script } => {
            let sql = exec::read_script(&script)?;
            output::print_statements(&sql);
        }
    }

    Ok(())
}
