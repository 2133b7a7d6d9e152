//! Splits multi-statement SQL scripts into standalone statements and applies
//! them one at a time through a caller-supplied executor.
//!
//! The pipeline is: comment stripping, segmentation, an optional safety gate
//! for destructive keywords, sequential execution with idempotent-skip
//! classification, and an [`ExecutionReport`] describing every statement.

pub mod comments;
pub mod executor;
pub mod report;
pub mod runner;
pub mod safety;
pub mod segmenter;

pub use comments::strip_line_comments;
pub use executor::{OutcomeClassifier, StatementExecutor, TableLister};
pub use report::{ExecutionOutcome, ExecutionReport, ReportBuilder, StatementResult};
pub use runner::{EngineOptions, GatePolicy, NamedScript, RunOutcome, SqlRunner};
pub use safety::{DangerousKeyword, DangerousOperationBlocked, SafetyGate};
pub use segmenter::{Segmented, Unterminated, split_statements};
