use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use tracing::warn;

use crate::executor::TableLister;

/// What happened to a single statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Success { rows_affected: u64 },
    /// The backend reported the statement's target state as already present.
    SkippedIdempotent { reason: String },
    Failed { error: String },
}

impl ExecutionOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn rows_affected(&self) -> Option<u64> {
        match self {
            Self::Success { rows_affected } => Some(*rows_affected),
            _ => None,
        }
    }
}

/// One report line: which statement, where it came from, and its outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementResult {
    pub index: usize,
    pub statement_preview: String,
    /// Migration file the statement was read from, if any.
    pub source: Option<String>,
    /// False when the statement was rejected before reaching the executor.
    pub executed: bool,
    pub outcome: ExecutionOutcome,
}

impl Serialize for StatementResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("StatementResult", 6)?;
        state.serialize_field("statement_preview", &self.statement_preview)?;
        match &self.outcome {
            ExecutionOutcome::Success { rows_affected } => {
                state.serialize_field("success", &true)?;
                state.skip_field("skipped")?;
                state.serialize_field("rows_affected", rows_affected)?;
                state.skip_field("error")?;
            }
            ExecutionOutcome::SkippedIdempotent { reason } => {
                state.serialize_field("success", &true)?;
                state.serialize_field("skipped", &true)?;
                state.skip_field("rows_affected")?;
                state.serialize_field("error", reason)?;
            }
            ExecutionOutcome::Failed { error } => {
                state.serialize_field("success", &false)?;
                state.skip_field("skipped")?;
                state.skip_field("rows_affected")?;
                state.serialize_field("error", error)?;
            }
        }
        match &self.source {
            Some(source) => state.serialize_field("source", source)?,
            None => state.skip_field("source")?,
        }
        state.end()
    }
}

/// Immutable summary of one engine run.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    results: Vec<StatementResult>,
    tables: Option<Vec<String>>,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
}

impl ExecutionReport {
    pub fn results(&self) -> &[StatementResult] {
        &self.results
    }

    /// Tables present after a migration run, when listing succeeded.
    pub fn tables(&self) -> Option<&[String]> {
        self.tables.as_deref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, ExecutionOutcome::Success { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ExecutionOutcome::SkippedIdempotent { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(ExecutionOutcome::is_failed)
    }

    /// Statements actually submitted to the executor.
    pub fn statements_executed(&self) -> usize {
        self.results.iter().filter(|r| r.executed).count()
    }

    pub fn rows_affected_total(&self) -> u64 {
        self.results
            .iter()
            .filter_map(|r| r.outcome.rows_affected())
            .sum()
    }

    pub fn success(&self) -> bool {
        self.failed() == 0
    }

    /// Some statements failed while others applied or were skipped.
    pub fn partial(&self) -> bool {
        self.failed() > 0 && self.succeeded() + self.skipped() > 0
    }

    fn count(&self, pred: impl Fn(&ExecutionOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }
}

impl Serialize for ExecutionReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ExecutionReport", 12)?;
        state.serialize_field("success", &self.success())?;
        state.serialize_field("partial", &self.partial())?;
        state.serialize_field("statements_executed", &self.statements_executed())?;
        state.serialize_field("succeeded", &self.succeeded())?;
        state.serialize_field("skipped", &self.skipped())?;
        state.serialize_field("failed", &self.failed())?;
        state.serialize_field("rows_affected_total", &self.rows_affected_total())?;
        state.serialize_field("results", &self.results)?;
        match &self.tables {
            Some(tables) => state.serialize_field("tables", tables)?,
            None => state.skip_field("tables")?,
        }
        state.serialize_field("started_at", &self.started_at)?;
        state.serialize_field("finished_at", &self.finished_at)?;
        state.end()
    }
}

impl fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.success() {
            "ok"
        } else if self.partial() {
            "partial"
        } else {
            "failed"
        };
        writeln!(f, "SQL Execution Report ({status})")?;
        writeln!(f, "─────────────────────────")?;
        writeln!(
            f,
            "  Statements:    {} executed, {} succeeded, {} skipped, {} failed",
            self.statements_executed(),
            self.succeeded(),
            self.skipped(),
            self.failed()
        )?;
        writeln!(f, "  Rows affected: {}", self.rows_affected_total())?;

        let problems: Vec<&StatementResult> = self
            .results
            .iter()
            .filter(|r| !matches!(r.outcome, ExecutionOutcome::Success { .. }))
            .collect();
        if !problems.is_empty() {
            writeln!(f, "  Not applied ({}):", problems.len())?;
            for r in problems {
                let (tag, detail) = match &r.outcome {
                    ExecutionOutcome::SkippedIdempotent { reason } => ("skip", reason),
                    ExecutionOutcome::Failed { error } => ("fail", error),
                    ExecutionOutcome::Success { .. } => continue,
                };
                match &r.source {
                    Some(source) => writeln!(f, "    - [{tag}] {source}#{}: {detail}", r.index)?,
                    None => writeln!(f, "    - [{tag}] #{}: {detail}", r.index)?,
                }
                writeln!(f, "        {}", r.statement_preview)?;
            }
        }

        if let Some(tables) = &self.tables {
            writeln!(f, "  Tables ({}): {}", tables.len(), tables.join(", "))?;
        }
        Ok(())
    }
}

/// Accumulates statement results during a run.
#[derive(Debug)]
pub struct ReportBuilder {
    preview_chars: usize,
    results: Vec<StatementResult>,
    started_at: DateTime<Utc>,
}

impl ReportBuilder {
    pub fn new(preview_chars: usize) -> Self {
        Self {
            preview_chars,
            results: Vec::new(),
            started_at: Utc::now(),
        }
    }

    pub fn record(&mut self, source: Option<&str>, statement: &str, outcome: ExecutionOutcome) {
        self.push(source, statement, true, outcome);
    }

    /// Record a fragment that was refused without being executed.
    pub fn record_rejected(&mut self, source: Option<&str>, fragment: &str, error: String) {
        self.push(source, fragment, false, ExecutionOutcome::Failed { error });
    }

    pub fn finish(self, tables: Option<Vec<String>>) -> ExecutionReport {
        ExecutionReport {
            results: self.results,
            tables,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }

    fn push(
        &mut self,
        source: Option<&str>,
        statement: &str,
        executed: bool,
        outcome: ExecutionOutcome,
    ) {
        self.results.push(StatementResult {
            index: self.results.len(),
            statement_preview: preview(statement, self.preview_chars),
            source: source.map(str::to_string),
            executed,
            outcome,
        });
    }
}

/// Ask `lister` for the current tables, swallowing any failure.
pub async fn collect_tables(lister: &dyn TableLister) -> Option<Vec<String>> {
    match lister.list_tables().await {
        Ok(tables) => Some(tables),
        Err(e) => {
            warn!("failed to list tables after migration: {e}");
            None
        }
    }
}

/// First `max_chars` characters of `statement`, with `...` when cut.
pub fn preview(statement: &str, max_chars: usize) -> String {
    match statement.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &statement[..cut]),
        None => statement.to_string(),
    }
}
