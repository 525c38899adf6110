use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags, TransactionBehavior};
use tracing::info;

use crate::errors::{AppError, AppResult};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct DatabaseContext {
    pub connection: Connection,
    pub path: PathBuf,
}

pub fn bootstrap<P: AsRef<Path>>(data_dir: P, database_file: &str) -> AppResult<DatabaseContext> {
    let data_dir = data_dir.as_ref();
    std::fs::create_dir_all(data_dir)?;
    if database_file.trim().is_empty() {
        return Err(AppError::Path("database file name is empty".into()));
    }
    let db_path = data_dir.join(database_file);
    let connection = open_connection(&db_path)?;
    run_migrations(&connection)?;
    info!(
        target: "database_bootstrap",
        path = %db_path.display(),
        "database context established"
    );
    Ok(DatabaseContext {
        connection,
        path: db_path,
    })
}

/// Opens an additional connection to an already bootstrapped database file.
pub fn open_connection(db_path: &Path) -> AppResult<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
    let connection = Connection::open_with_flags(db_path, flags)?;
    connection.busy_timeout(BUSY_TIMEOUT)?;
    connection.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA foreign_keys = ON;
        "#,
    )?;
    Ok(connection)
}

/// Runs `work` inside a `BEGIN IMMEDIATE` transaction so the write lock is
/// taken before the first read of a get-or-create.
pub fn with_immediate_tx<T, F>(connection: &mut Connection, work: F) -> AppResult<T>
where
    F: FnOnce(&Connection) -> AppResult<T>,
{
    let tx = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let value = work(&*tx)?;
    tx.commit()?;
    Ok(value)
}

fn run_migrations(connection: &Connection) -> AppResult<()> {
    connection.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS search_terms (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            term TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL DEFAULT (DATETIME('now'))
        );

        CREATE TABLE IF NOT EXISTS places (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            business TEXT NOT NULL UNIQUE,
            location TEXT NOT NULL,
            rating REAL,
            search_term_id INTEGER NOT NULL,
            discovered_at TEXT NOT NULL DEFAULT (DATETIME('now')),
            FOREIGN KEY (search_term_id) REFERENCES search_terms(id)
        );

        CREATE TABLE IF NOT EXISTS reviews (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            place_name TEXT NOT NULL,
            rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
            price INTEGER NOT NULL CHECK (price BETWEEN 1 AND 5),
            comments TEXT,
            created_at TEXT NOT NULL DEFAULT (DATETIME('now'))
        );

        CREATE TABLE IF NOT EXISTS saved_places (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            place_name TEXT NOT NULL UNIQUE,
            added_at TEXT NOT NULL DEFAULT (DATETIME('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_places_search_term ON places(search_term_id);
        "#,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn runs_migrations_and_creates_tables() {
        let dir = tempdir().unwrap();
        let ctx = bootstrap(dir.path(), "test.db").unwrap();

        let mut stmt = ctx
            .connection
            .prepare(
                "SELECT name FROM sqlite_master WHERE type='table' AND name IN ('search_terms','places','reviews','saved_places')",
            )
            .unwrap();
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .unwrap()
            .count();
        assert_eq!(rows, 4);
        assert!(ctx.path.ends_with("test.db"));
    }

    #[test]
    fn bootstrap_is_repeatable() {
        let dir = tempdir().unwrap();
        let first = bootstrap(dir.path(), "again.db").unwrap();
        first
            .connection
            .execute("INSERT INTO search_terms (term) VALUES ('ramen')", [])
            .unwrap();
        drop(first);

        let second = bootstrap(dir.path(), "again.db").unwrap();
        let count: i64 = second
            .connection
            .query_row("SELECT COUNT(*) FROM search_terms", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn rejects_empty_file_name() {
        let dir = tempdir().unwrap();
        assert!(matches!(bootstrap(dir.path(), "  "), Err(AppError::Path(_))));
    }

    #[test]
    fn immediate_tx_rolls_back_on_error() {
        let dir = tempdir().unwrap();
        let mut conn = bootstrap(dir.path(), "tx.db").unwrap().connection;
        let result: AppResult<()> = with_immediate_tx(&mut conn, |tx| {
            tx.execute("INSERT INTO search_terms (term) VALUES ('tacos')", [])?;
            Err(AppError::Validation("abort".into()))
        });
        assert!(result.is_err());
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM search_terms", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
