use anyhow::{Result, bail};
use colored::Colorize;
use sqlrun_engine::{RunOutcome, SafetyGate, SqlRunner};

/// Print `outcome` and turn a blocked or failed run into an error exit.
pub fn finish(outcome: &RunOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    } else {
        match outcome {
            RunOutcome::Completed(report) => print!("{report}"),
            RunOutcome::Blocked(blocked) => {
                println!("{} {}", "Blocked:".red().bold(), blocked.message());
                println!("  Re-run with --allow-dangerous to confirm.");
            }
        }
    }

    match outcome {
        RunOutcome::Blocked(_) => bail!("run blocked by the safety gate"),
        RunOutcome::Completed(report) if !report.success() => {
            bail!("{} statement(s) failed", report.failed())
        }
        RunOutcome::Completed(_) => Ok(()),
    }
}

/// Render the segmented statements of `sql`, one block per statement.
pub fn render_statements(sql: &str) -> String {
    let segmented = SqlRunner::plan(sql);
    let mut out = String::new();

    for (i, statement) in segmented.statements.iter().enumerate() {
        out.push_str(&format!("-- [{}]\n{}\n\n", i + 1, statement));
    }
    if let Some(rest) = &segmented.unterminated {
        out.push_str(&format!("-- [unterminated] {rest}\n{}\n\n", rest.fragment()));
    }

    let keywords = SafetyGate::scan(sql);
    if !keywords.is_empty() {
        let names: Vec<&str> = keywords.iter().map(|k| k.as_str()).collect();
        out.push_str(&format!("-- dangerous: {}\n", names.join(", ")));
    }
    out
}

pub fn print_statements(sql: &str) {
    print!("{}", render_statements(sql));
}
