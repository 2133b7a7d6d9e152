use async_trait::async_trait;
use sqlrun_common::{Error, Result};
use tracing::{debug, warn};

use crate::report::ExecutionOutcome;

/// Runs exactly one SQL statement against a backend.
///
/// Implementations own the connection; the engine only borrows them for the
/// duration of a run and never submits more than one statement per call.
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    /// Execute `sql` and return the number of rows it changed.
    async fn execute(&self, sql: &str) -> Result<u64>;
}

/// Lists the tables present after a migration run. Best-effort only.
#[async_trait]
pub trait TableLister: Send + Sync {
    async fn list_tables(&self) -> Result<Vec<String>>;
}

/// Sorts executor results into success, idempotent skip or failure.
#[derive(Debug, Clone)]
pub struct OutcomeClassifier {
    patterns: Vec<String>,
}

impl OutcomeClassifier {
    /// Error message fragments that mean "this was already applied".
    pub const DEFAULT_PATTERNS: &'static [&'static str] = &[
        "already exists",
        "already exist",
        "duplicate",
        "UNIQUE constraint",
    ];

    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn is_idempotent(&self, message: &str) -> bool {
        let lower = message.to_lowercase();
        self.patterns.iter().any(|p| lower.contains(p.as_str()))
    }

    pub fn classify(&self, result: Result<u64>) -> ExecutionOutcome {
        match result {
            Ok(rows_affected) => ExecutionOutcome::Success { rows_affected },
            Err(err) => {
                let message = error_message(&err);
                if self.is_idempotent(&message) {
                    ExecutionOutcome::SkippedIdempotent { reason: message }
                } else {
                    ExecutionOutcome::Failed { error: message }
                }
            }
        }
    }
}

impl Default for OutcomeClassifier {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PATTERNS)
    }
}

/// Submit `statements` strictly in order, awaiting each before the next.
///
/// Failures never abort the sequence; every statement runs exactly once.
pub async fn execute_sequentially(
    executor: &dyn StatementExecutor,
    classifier: &OutcomeClassifier,
    statements: &[String],
) -> Vec<ExecutionOutcome> {
    let mut outcomes = Vec::with_capacity(statements.len());

    for (index, statement) in statements.iter().enumerate() {
        let outcome = classifier.classify(executor.execute(statement).await);
        match &outcome {
            ExecutionOutcome::Success { rows_affected } => {
                debug!(index, rows_affected, "statement applied");
            }
            ExecutionOutcome::SkippedIdempotent { reason } => {
                warn!(index, "statement already applied, skipping: {reason}");
            }
            ExecutionOutcome::Failed { error } => {
                warn!(index, "statement failed: {error}");
            }
        }
        outcomes.push(outcome);
    }

    outcomes
}

// Backend messages are reported without the crate-level error prefix.
fn error_message(err: &Error) -> String {
    match err {
        Error::Database(msg) | Error::Other(msg) => msg.clone(),
        other => other.to_string(),
    }
}
