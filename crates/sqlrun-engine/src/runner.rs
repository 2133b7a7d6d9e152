use serde::{Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::comments::strip_line_comments;
use crate::executor::{OutcomeClassifier, StatementExecutor, TableLister, execute_sequentially};
use crate::report::{ExecutionReport, ReportBuilder, collect_tables};
use crate::safety::{DangerousOperationBlocked, SafetyGate};
use crate::segmenter::{Segmented, split_statements};

const DEFAULT_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Characters of each statement kept in the report.
    pub preview_chars: usize,
    /// Error fragments that mark a statement as already applied.
    pub idempotent_patterns: Vec<String>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            preview_chars: DEFAULT_PREVIEW_CHARS,
            idempotent_patterns: OutcomeClassifier::DEFAULT_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

/// A script with a name for the report, usually a migration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedScript {
    pub name: String,
    pub sql: String,
}

impl NamedScript {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
        }
    }
}

/// Whether migrations go through the destructive-keyword gate.
///
/// Migration files are trusted by default and skip the gate entirely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GatePolicy {
    #[default]
    Exempt,
    Enforce { allow_dangerous: bool },
}

impl GatePolicy {
    fn check(&self, sql: &str) -> Result<(), DangerousOperationBlocked> {
        match self {
            Self::Exempt => Ok(()),
            Self::Enforce { allow_dangerous } => SafetyGate::check(sql, *allow_dangerous),
        }
    }
}

/// Result of a gated run: either a full report or a refusal.
#[derive(Debug)]
pub enum RunOutcome {
    Completed(ExecutionReport),
    Blocked(DangerousOperationBlocked),
}

impl RunOutcome {
    pub fn report(&self) -> Option<&ExecutionReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Blocked(_) => None,
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked(_))
    }

    pub fn success(&self) -> bool {
        self.report().is_some_and(ExecutionReport::success)
    }
}

impl Serialize for RunOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Completed(report) => report.serialize(serializer),
            Self::Blocked(blocked) => blocked.serialize(serializer),
        }
    }
}

/// Applies SQL scripts one statement at a time through a borrowed executor.
///
/// The runner keeps no state between calls; re-running a script relies only
/// on the backend reporting already-applied statements.
pub struct SqlRunner<'a> {
    executor: &'a dyn StatementExecutor,
    classifier: OutcomeClassifier,
    preview_chars: usize,
}

impl<'a> SqlRunner<'a> {
    pub fn new(executor: &'a dyn StatementExecutor) -> Self {
        Self::with_options(executor, EngineOptions::default())
    }

    pub fn with_options(executor: &'a dyn StatementExecutor, options: EngineOptions) -> Self {
        Self {
            executor,
            classifier: OutcomeClassifier::new(&options.idempotent_patterns),
            preview_chars: options.preview_chars,
        }
    }

    /// Strip comments and segment `script` without executing anything.
    pub fn plan(script: &str) -> Segmented {
        split_statements(&strip_line_comments(script))
    }

    /// Ad-hoc variant: refuse destructive scripts unless `allow_dangerous`.
    pub async fn run_script(&self, script: &str, allow_dangerous: bool) -> RunOutcome {
        if let Err(blocked) = SafetyGate::check(script, allow_dangerous) {
            warn!("refusing script: {blocked}");
            return RunOutcome::Blocked(blocked);
        }

        let mut builder = ReportBuilder::new(self.preview_chars);
        self.apply(&mut builder, None, script).await;
        let report = builder.finish(None);
        log_finished(&report);
        RunOutcome::Completed(report)
    }

    /// Migration variant: no gate, optional best-effort table listing.
    pub async fn run_migration(
        &self,
        script: &str,
        tables: Option<&dyn TableLister>,
    ) -> ExecutionReport {
        let mut builder = ReportBuilder::new(self.preview_chars);
        self.apply(&mut builder, None, script).await;
        self.finish_migration(builder, tables).await
    }

    /// Apply several migration scripts in order into one report.
    ///
    /// With [`GatePolicy::Enforce`], every script is checked before the first
    /// statement runs, so one refused file blocks the whole batch.
    pub async fn run_migrations(
        &self,
        scripts: &[NamedScript],
        tables: Option<&dyn TableLister>,
        policy: GatePolicy,
    ) -> RunOutcome {
        let mut keywords = Vec::new();
        for script in scripts {
            if let Err(blocked) = policy.check(&script.sql) {
                warn!(migration = %script.name, "migration refused: {blocked}");
                keywords.extend(blocked.keywords);
            }
        }
        if !keywords.is_empty() {
            keywords.sort();
            keywords.dedup();
            return RunOutcome::Blocked(DangerousOperationBlocked { keywords });
        }

        let mut builder = ReportBuilder::new(self.preview_chars);
        for script in scripts {
            info!(migration = %script.name, "applying migration");
            self.apply(&mut builder, Some(&script.name), &script.sql).await;
        }
        RunOutcome::Completed(self.finish_migration(builder, tables).await)
    }

    async fn apply(&self, builder: &mut ReportBuilder, source: Option<&str>, script: &str) {
        let Segmented {
            statements,
            unterminated,
        } = Self::plan(script);
        debug!(statements = statements.len(), "segmented script");

        let outcomes = execute_sequentially(self.executor, &self.classifier, &statements).await;
        for (statement, outcome) in statements.iter().zip(outcomes) {
            builder.record(source, statement, outcome);
        }

        if let Some(rest) = unterminated {
            warn!("not executing trailing fragment: {rest}");
            builder.record_rejected(source, rest.fragment(), rest.to_string());
        }
    }

    async fn finish_migration(
        &self,
        builder: ReportBuilder,
        tables: Option<&dyn TableLister>,
    ) -> ExecutionReport {
        let listed = match tables {
            Some(lister) => collect_tables(lister).await,
            None => None,
        };
        let report = builder.finish(listed);
        log_finished(&report);
        report
    }
}

fn log_finished(report: &ExecutionReport) {
    info!(
        executed = report.statements_executed(),
        succeeded = report.succeeded(),
        skipped = report.skipped(),
        failed = report.failed(),
        rows = report.rows_affected_total(),
        "script run finished"
    );
}
