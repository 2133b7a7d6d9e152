use std::io::Read;

use anyhow::{Context, Result};
use sqlrun_db::SqliteExecutor;
use sqlrun_engine::{EngineOptions, SqlRunner};

use crate::output;

/// Read a script from a file path, or from stdin when `source` is `-`.
pub fn read_script(source: &str) -> Result<String> {
    if source == "-" {
        let mut sql = String::new();
        std::io::stdin()
            .read_to_string(&mut sql)
            .context("failed to read script from stdin")?;
        return Ok(sql);
    }

    std::fs::read_to_string(source).with_context(|| format!("failed to read script {source}"))
}

pub async fn run_exec(
    db: &SqliteExecutor,
    options: EngineOptions,
    sql: &str,
    allow_dangerous: bool,
    json: bool,
) -> Result<()> {
    let runner = SqlRunner::with_options(db, options);
    let outcome = runner.run_script(sql, allow_dangerous).await;
    output::finish(&outcome, json)
}
