//! SQLite schema for the library storage file
//!
//! Two ways to bring a database to the current layout: `create_tables`
//! applies every migration in one batch, `migrate` applies only the
//! pending ones step by step. Both stamp `schema_info.version`.

use rusqlite::{Connection, Result};

/// Current schema version (number of migrations)
pub const SCHEMA_VERSION: i32 = 2;

/// Ordered migrations; index + 1 is the version each one produces
pub const MIGRATIONS: &[&str] = &[
    // 1: base tables
    r#"
    CREATE TABLE IF NOT EXISTS folders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        path TEXT NOT NULL UNIQUE,
        uuid TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS entries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        folder_id INTEGER NOT NULL,
        path TEXT NOT NULL UNIQUE,
        suffix TEXT NOT NULL DEFAULT '',
        FOREIGN KEY (folder_id) REFERENCES folders(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS tags (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        shorthand TEXT,
        color INTEGER NOT NULL DEFAULT 1,
        icon TEXT
    );

    CREATE TABLE IF NOT EXISTS tag_aliases (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        tag_id INTEGER NOT NULL,
        FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
    );

    -- Subtag edges; cycles are not prevented here
    CREATE TABLE IF NOT EXISTS tag_subtags (
        parent_id INTEGER NOT NULL,
        child_id INTEGER NOT NULL,
        PRIMARY KEY (parent_id, child_id),
        FOREIGN KEY (parent_id) REFERENCES tags(id) ON DELETE CASCADE,
        FOREIGN KEY (child_id) REFERENCES tags(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS value_types (
        key TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        kind TEXT NOT NULL,
        position INTEGER NOT NULL,
        is_default INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS text_fields (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        entry_id INTEGER NOT NULL,
        type_key TEXT NOT NULL,
        position INTEGER NOT NULL DEFAULT 0,
        value TEXT,
        FOREIGN KEY (entry_id) REFERENCES entries(id) ON DELETE CASCADE,
        FOREIGN KEY (type_key) REFERENCES value_types(key)
    );

    CREATE TABLE IF NOT EXISTS datetime_fields (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        entry_id INTEGER NOT NULL,
        type_key TEXT NOT NULL,
        position INTEGER NOT NULL DEFAULT 0,
        value TEXT,
        FOREIGN KEY (entry_id) REFERENCES entries(id) ON DELETE CASCADE,
        FOREIGN KEY (type_key) REFERENCES value_types(key)
    );

    CREATE TABLE IF NOT EXISTS boolean_fields (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        entry_id INTEGER NOT NULL,
        type_key TEXT NOT NULL,
        position INTEGER NOT NULL DEFAULT 0,
        value INTEGER NOT NULL DEFAULT 0,
        FOREIGN KEY (entry_id) REFERENCES entries(id) ON DELETE CASCADE,
        FOREIGN KEY (type_key) REFERENCES value_types(key)
    );

    -- One tag box per (entry, key)
    CREATE TABLE IF NOT EXISTS tag_box_fields (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        entry_id INTEGER NOT NULL,
        type_key TEXT NOT NULL,
        position INTEGER NOT NULL DEFAULT 0,
        UNIQUE (entry_id, type_key),
        FOREIGN KEY (entry_id) REFERENCES entries(id) ON DELETE CASCADE,
        FOREIGN KEY (type_key) REFERENCES value_types(key)
    );

    CREATE TABLE IF NOT EXISTS tag_fields (
        field_id INTEGER NOT NULL,
        tag_id INTEGER NOT NULL,
        PRIMARY KEY (field_id, tag_id),
        FOREIGN KEY (field_id) REFERENCES tag_box_fields(id) ON DELETE CASCADE,
        FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS preferences (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
    "#,
    // 2: indexes for search joins
    r#"
    CREATE INDEX IF NOT EXISTS idx_entries_folder_id ON entries(folder_id);
    CREATE INDEX IF NOT EXISTS idx_entries_suffix ON entries(suffix);
    CREATE INDEX IF NOT EXISTS idx_tag_aliases_tag_id ON tag_aliases(tag_id);
    CREATE INDEX IF NOT EXISTS idx_tag_subtags_child_id ON tag_subtags(child_id);
    CREATE INDEX IF NOT EXISTS idx_tag_fields_tag_id ON tag_fields(tag_id);
    CREATE INDEX IF NOT EXISTS idx_text_fields_entry_id ON text_fields(entry_id);
    CREATE INDEX IF NOT EXISTS idx_datetime_fields_entry_id ON datetime_fields(entry_id);
    CREATE INDEX IF NOT EXISTS idx_boolean_fields_entry_id ON boolean_fields(entry_id);
    "#,
];

fn ensure_schema_info(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?)",
        [version.to_string()],
    )?;
    Ok(())
}

/// Create every table directly and stamp the head version
pub fn create_tables(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    ensure_schema_info(&tx)?;
    for migration in MIGRATIONS {
        tx.execute_batch(migration)?;
    }
    set_schema_version(&tx, SCHEMA_VERSION)?;
    tx.commit()
}

/// Apply pending migrations in order, one transaction each
///
/// Returns the number of migrations applied.
pub fn migrate(conn: &mut Connection) -> Result<usize> {
    ensure_schema_info(conn)?;
    let current = get_schema_version(conn)?.unwrap_or(0).max(0) as usize;

    let mut applied = 0;
    for (index, migration) in MIGRATIONS.iter().enumerate().skip(current) {
        let tx = conn.transaction()?;
        tx.execute_batch(migration)?;
        set_schema_version(&tx, index as i32 + 1)?;
        tx.commit()?;
        applied += 1;
    }
    Ok(applied)
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<Option<i32>> {
    let table_exists = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_info'")?
        .exists([])?;
    if !table_exists {
        return Ok(None);
    }

    let mut stmt = conn.prepare("SELECT value FROM schema_info WHERE key = 'version'")?;
    let result: Result<String> = stmt.query_row([], |row| row.get(0));

    match result {
        Ok(version_str) => Ok(version_str.parse().ok()),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Check if schema needs initialization or migration
pub fn needs_init(conn: &Connection) -> bool {
    match get_schema_version(conn) {
        Ok(Some(v)) => v < SCHEMA_VERSION,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect()
    }

    #[test]
    fn test_create_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        create_tables(&mut conn).unwrap();

        let tables = table_names(&conn);
        for name in [
            "entries",
            "folders",
            "tags",
            "tag_aliases",
            "tag_subtags",
            "value_types",
            "text_fields",
            "datetime_fields",
            "boolean_fields",
            "tag_box_fields",
            "tag_fields",
            "preferences",
        ] {
            assert!(tables.contains(&name.to_string()), "missing {}", name);
        }
    }

    #[test]
    fn test_schema_version() {
        let mut conn = Connection::open_in_memory().unwrap();

        assert!(needs_init(&conn));
        assert_eq!(get_schema_version(&conn).unwrap(), None);

        create_tables(&mut conn).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), Some(SCHEMA_VERSION));
        assert!(!needs_init(&conn));
    }

    #[test]
    fn test_migrate_applies_only_pending() {
        let mut conn = Connection::open_in_memory().unwrap();

        assert_eq!(migrate(&mut conn).unwrap(), MIGRATIONS.len());
        assert_eq!(get_schema_version(&conn).unwrap(), Some(SCHEMA_VERSION));

        // Already at head
        assert_eq!(migrate(&mut conn).unwrap(), 0);
    }

    #[test]
    fn test_migrate_from_partial_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        ensure_schema_info(&conn).unwrap();
        conn.execute_batch(MIGRATIONS[0]).unwrap();
        set_schema_version(&conn, 1).unwrap();

        assert_eq!(migrate(&mut conn).unwrap(), 1);

        let indexes: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='index' AND name LIKE 'idx_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();
        assert!(indexes.contains(&"idx_entries_suffix".to_string()));
    }
}
