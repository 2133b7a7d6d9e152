/// Remove full-line `--` comments and blank lines from a script.
///
/// Lines that carry code are kept verbatim, including a trailing inline
/// comment; the segmenter skips those on its own.
pub fn strip_line_comments(script: &str) -> String {
    script
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with("--")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
