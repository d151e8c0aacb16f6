//! Storage layer
//!
//! Owns access to the library's SQLite file. File-backed storage opens a
//! fresh connection for every operation so no file handle stays pinned
//! across threads; in-memory storage keeps its single connection behind a
//! mutex since it would vanish once closed.
//!
//! Row-level access lives in the submodules:
//!
//! - `schema` - table layout and migrations
//! - `entries` - entries, fields and value types
//! - `preferences` - library-scoped JSON settings

pub mod entries;
pub mod preferences;
pub mod schema;

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{Connection, Transaction};

use crate::error::{LibraryError, LibraryResult};

pub use schema::{create_tables, migrate, needs_init, SCHEMA_VERSION};

/// Handle to the library database
pub enum Storage {
    /// Database file; connection per operation
    File(PathBuf),
    /// Private in-memory database
    Memory(Mutex<Connection>),
}

impl Storage {
    /// Use the database file at `path`, creating it if missing
    pub fn open_file(path: impl Into<PathBuf>) -> LibraryResult<Self> {
        let storage = Storage::File(path.into());
        // Fail early when the file is unreachable
        storage.with_connection(|_| Ok(()))?;
        Ok(storage)
    }

    pub fn open_in_memory() -> LibraryResult<Self> {
        let conn = Connection::open_in_memory()?;
        configure(&conn)?;
        Ok(Storage::Memory(Mutex::new(conn)))
    }

    /// Path of the database file, `None` for in-memory storage
    pub fn path(&self) -> Option<&Path> {
        match self {
            Storage::File(path) => Some(path),
            Storage::Memory(_) => None,
        }
    }

    /// Run `f` against a connection that lives only for this call
    pub fn with_connection<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> LibraryResult<T>,
    ) -> LibraryResult<T> {
        match self {
            Storage::File(path) => {
                let mut conn = Connection::open(path).map_err(|e| match e {
                    rusqlite::Error::SqliteFailure(_, _) => LibraryError::from_io(
                        std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
                        path.clone(),
                    ),
                    other => other.into(),
                })?;
                configure(&conn)?;
                f(&mut conn)
            }
            Storage::Memory(conn) => {
                let mut guard = conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                f(&mut guard)
            }
        }
    }

    /// Run `f` inside one transaction; commit on `Ok`, roll back on `Err`
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> LibraryResult<T>,
    ) -> LibraryResult<T> {
        self.with_connection(|conn| {
            let tx = conn.transaction()?;
            let value = f(&tx)?;
            tx.commit()?;
            Ok(value)
        })
    }
}

fn configure(conn: &Connection) -> LibraryResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(())
}

/// `?, ?, ?` with `n` placeholders
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern
pub(crate) fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .with_connection(|conn| {
                conn.execute_batch("CREATE TABLE t (name TEXT UNIQUE);")?;
                Ok(())
            })
            .unwrap();

        let result: LibraryResult<()> = storage.transaction(|tx| {
            tx.execute("INSERT INTO t VALUES ('a')", [])?;
            tx.execute("INSERT INTO t VALUES ('a')", [])?;
            Ok(())
        });
        assert!(result.unwrap_err().is_conflict());

        let count: i64 = storage
            .with_connection(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_file_storage_persists_between_connections() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::open_file(temp_dir.path().join("lib.sqlite")).unwrap();

        storage
            .transaction(|tx| {
                tx.execute_batch("CREATE TABLE t (v INTEGER); INSERT INTO t VALUES (7);")?;
                Ok(())
            })
            .unwrap();

        let v: i64 = storage
            .with_connection(|conn| Ok(conn.query_row("SELECT v FROM t", [], |row| row.get(0))?))
            .unwrap();
        assert_eq!(v, 7);
        assert!(storage.path().is_some());
    }

    #[test]
    fn test_reads_in_a_transaction_share_one_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("lib.sqlite");
        let storage = Storage::open_file(&path).unwrap();
        storage
            .transaction(|tx| {
                tx.execute_batch("CREATE TABLE t (v INTEGER); INSERT INTO t VALUES (1);")?;
                Ok(())
            })
            .unwrap();

        let (before, writer_blocked, after) = storage
            .transaction(|tx| {
                let count = |tx: &Transaction<'_>| -> LibraryResult<i64> {
                    Ok(tx.query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))?)
                };
                let before = count(tx)?;

                let writer = Connection::open(&path)?;
                writer.busy_timeout(Duration::ZERO)?;
                let writer_blocked = writer.execute("INSERT INTO t VALUES (2)", []).is_err();

                Ok((before, writer_blocked, count(tx)?))
            })
            .unwrap();

        assert!(writer_blocked);
        assert_eq!(before, after);
    }

    #[test]
    fn test_unreachable_file_is_io_failure() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing").join("lib.sqlite");

        let err = Storage::open_file(path).err().unwrap();
        assert!(matches!(err, LibraryError::Io { .. }));
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(placeholders(3), "?, ?, ?");
    }
}
