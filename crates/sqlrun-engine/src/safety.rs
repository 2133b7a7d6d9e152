use serde::{Deserialize, Serialize};
use std::fmt;

/// Destructive operations that require explicit confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DangerousKeyword {
    Drop,
    Truncate,
    DeleteFrom,
}

impl DangerousKeyword {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drop => "DROP",
            Self::Truncate => "TRUNCATE",
            Self::DeleteFrom => "DELETE FROM",
        }
    }
}

impl fmt::Display for DangerousKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned instead of a report when a script was refused before execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DangerousOperationBlocked {
    pub keywords: Vec<DangerousKeyword>,
}

impl DangerousOperationBlocked {
    /// Always true: the caller may re-run with `allow_dangerous` set.
    pub fn requires_confirmation(&self) -> bool {
        true
    }

    pub fn message(&self) -> String {
        let names: Vec<&str> = self.keywords.iter().map(|k| k.as_str()).collect();
        format!(
            "script contains dangerous operations ({}); explicit confirmation is required",
            names.join(", ")
        )
    }
}

impl fmt::Display for DangerousOperationBlocked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl Serialize for DangerousOperationBlocked {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("DangerousOperationBlocked", 5)?;
        state.serialize_field("success", &false)?;
        state.serialize_field("blocked", &true)?;
        state.serialize_field("requires_confirmation", &self.requires_confirmation())?;
        state.serialize_field("keywords", &self.keywords)?;
        state.serialize_field("message", &self.message())?;
        state.end()
    }
}

/// Keyword scan over raw SQL text.
///
/// Matching is a plain case-insensitive substring search, so `DROP` inside an
/// identifier or string literal is also reported. That errs towards asking
/// for confirmation.
pub struct SafetyGate;

impl SafetyGate {
    /// All dangerous keywords present in `sql`, in declaration order.
    pub fn scan(sql: &str) -> Vec<DangerousKeyword> {
        let upper = sql.to_uppercase();
        let mut found = Vec::new();

        if upper.contains("DROP") {
            found.push(DangerousKeyword::Drop);
        }
        if upper.contains("TRUNCATE") {
            found.push(DangerousKeyword::Truncate);
        }
        if contains_delete_from(&upper) {
            found.push(DangerousKeyword::DeleteFrom);
        }

        found
    }

    /// Refuse `sql` unless it is free of dangerous keywords or the caller
    /// confirmed them.
    pub fn check(sql: &str, allow_dangerous: bool) -> Result<(), DangerousOperationBlocked> {
        if allow_dangerous {
            return Ok(());
        }

        let keywords = Self::scan(sql);
        if keywords.is_empty() {
            Ok(())
        } else {
            Err(DangerousOperationBlocked { keywords })
        }
    }
}

// `DELETE` followed by any run of whitespace and `FROM`.
fn contains_delete_from(upper: &str) -> bool {
    upper.match_indices("DELETE").any(|(idx, word)| {
        let rest = &upper[idx + word.len()..];
        let after_ws = rest.trim_start();
        after_ws.len() < rest.len() && after_ws.starts_with("FROM")
    })
}
