//! Preferences table: one JSON value per key

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{LibraryError, LibraryResult};

/// Insert a preference; `Conflict` if the key already exists
pub fn insert(conn: &Connection, key: &str, value: &serde_json::Value) -> LibraryResult<()> {
    conn.execute(
        "INSERT INTO preferences (key, value) VALUES (?, ?)",
        params![key, serde_json::to_string(value)?],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, key: &str) -> LibraryResult<serde_json::Value> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM preferences WHERE key = ?",
            [key],
            |row| row.get(0),
        )
        .optional()?;

    match raw {
        Some(raw) => Ok(serde_json::from_str(&raw)?),
        None => Err(LibraryError::not_found(format!("preference '{}'", key))),
    }
}

/// Update an existing preference in place
pub fn set(conn: &Connection, key: &str, value: &serde_json::Value) -> LibraryResult<()> {
    let changed = conn.execute(
        "UPDATE preferences SET value = ? WHERE key = ?",
        params![serde_json::to_string(value)?, key],
    )?;
    if changed == 0 {
        return Err(LibraryError::not_found(format!("preference '{}'", key)));
    }
    Ok(())
}

pub fn all(conn: &Connection) -> LibraryResult<Vec<(String, serde_json::Value)>> {
    let mut stmt = conn.prepare("SELECT key, value FROM preferences ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

    let mut prefs = Vec::new();
    for row in rows {
        let (key, raw) = row?;
        prefs.push((key, serde_json::from_str(&raw)?));
    }
    Ok(prefs)
}
