pub mod migrations;
pub mod sqlite;

pub use migrations::{MigrationFile, MigrationOrder, discover_migrations, load_migration};
pub use sqlite::SqliteExecutor;
