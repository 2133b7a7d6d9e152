//! Discovery of migration scripts on disk.
//!
//! A migration is a single `.sql` file. Files apply in the order given by the
//! numeric prefix of their name (`001_init.sql`, `2_indexes.sql`), then by
//! name; files without a prefix run last.

use sqlrun_common::{Error, Result};
use sqlrun_engine::NamedScript;
use std::cmp::Ordering;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// File name including extension, used as the report source.
    pub name: String,
    pub order: MigrationOrder,
    pub sql: String,
}

impl MigrationFile {
    pub fn to_script(&self) -> NamedScript {
        NamedScript::new(self.name.clone(), self.sql.clone())
    }
}

/// Numeric file-name prefix, kept as digits so any length compares correctly.
///
/// Unnumbered files order after every numbered one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOrder {
    Numbered(String),
    Unnumbered,
}

impl MigrationOrder {
    fn from_name(name: &str) -> Self {
        let digits: String = name.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return Self::Unnumbered;
        }
        let significant = digits.trim_start_matches('0');
        Self::Numbered(significant.to_string())
    }
}

impl Ord for MigrationOrder {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Numbered(a), Self::Numbered(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Self::Numbered(_), Self::Unnumbered) => Ordering::Less,
            (Self::Unnumbered, Self::Numbered(_)) => Ordering::Greater,
            (Self::Unnumbered, Self::Unnumbered) => Ordering::Equal,
        }
    }
}

impl PartialOrd for MigrationOrder {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Load every `.sql` file directly inside `dir`, in apply order.
pub fn discover_migrations(dir: &Path) -> Result<Vec<MigrationFile>> {
    if !dir.is_dir() {
        return Err(Error::NotFound(format!(
            "migrations directory {}",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || !is_sql_file(&path) {
            continue;
        }
        files.push(load_migration(&path)?);
    }

    files.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));
    info!("found {} migration(s) in {}", files.len(), dir.display());
    Ok(files)
}

/// Read a single migration file.
pub fn load_migration(path: &Path) -> Result<MigrationFile> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::Other(format!("invalid migration file name: {}", path.display())))?
        .to_string();
    let sql = std::fs::read_to_string(path)?;
    let order = MigrationOrder::from_name(&name);
    debug!(migration = %name, ?order, "loaded migration");

    Ok(MigrationFile {
        name,
        order,
        sql,
    })
}

fn is_sql_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("sql"))
}
