//! Row access for folders, entries, fields and value types
//!
//! Every function takes a borrowed connection (usually a transaction) and
//! returns plain values; nothing here keeps state between calls.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::error::{LibraryError, LibraryResult};
use crate::fields::{
    BooleanField, DatetimeField, Field, FieldKind, NewField, NewFieldValue, TagBoxField,
    TextField, ValueType,
};
use crate::models::{path_suffix, Entry, EntryDraft, Folder, Tag};
use crate::storage::placeholders;
use crate::tags;

/// Largest id list bound into one `IN (...)` clause
const ID_CHUNK: usize = 500;

/// Field table holding rows of the given kind
pub fn table_for(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::TextLine | FieldKind::TextBox => "text_fields",
        FieldKind::Tags => "tag_box_fields",
        FieldKind::Datetime => "datetime_fields",
        FieldKind::Boolean => "boolean_fields",
    }
}

// --- Value types ---

fn value_type_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(ValueType, String)> {
    let kind: String = row.get(2)?;
    Ok((
        ValueType {
            key: row.get(0)?,
            name: row.get(1)?,
            // Replaced below once the kind string is validated
            kind: FieldKind::TextLine,
            position: row.get(3)?,
            is_default: row.get(4)?,
        },
        kind,
    ))
}

fn finish_value_type((mut vt, kind): (ValueType, String)) -> LibraryResult<ValueType> {
    vt.kind = kind.parse()?;
    Ok(vt)
}

pub fn insert_value_type(conn: &Connection, value_type: &ValueType) -> LibraryResult<()> {
    conn.execute(
        "INSERT INTO value_types (key, name, kind, position, is_default) VALUES (?, ?, ?, ?, ?)",
        params![
            value_type.key,
            value_type.name,
            value_type.kind.as_str(),
            value_type.position,
            value_type.is_default
        ],
    )?;
    Ok(())
}

/// All value types ordered by position
pub fn load_value_types(conn: &Connection) -> LibraryResult<Vec<ValueType>> {
    let mut stmt = conn.prepare(
        "SELECT key, name, kind, position, is_default FROM value_types ORDER BY position, key",
    )?;
    let rows = stmt
        .query_map([], value_type_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(finish_value_type).collect()
}

pub fn load_value_type(conn: &Connection, key: &str) -> LibraryResult<ValueType> {
    let row = conn
        .query_row(
            "SELECT key, name, kind, position, is_default FROM value_types WHERE key = ?",
            [key],
            value_type_from_row,
        )
        .optional()?;

    match row {
        Some(row) => finish_value_type(row),
        None => Err(LibraryError::not_found(format!("value type '{}'", key))),
    }
}

// --- Folders ---

fn folder_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Folder> {
    Ok(Folder {
        id: row.get(0)?,
        path: row.get(1)?,
        uuid: row.get(2)?,
    })
}

pub fn insert_folder(conn: &Connection, path: &str, uuid: &str) -> LibraryResult<Folder> {
    conn.execute(
        "INSERT INTO folders (path, uuid) VALUES (?, ?)",
        params![path, uuid],
    )?;
    Ok(Folder {
        id: conn.last_insert_rowid(),
        path: path.to_string(),
        uuid: uuid.to_string(),
    })
}

pub fn load_folder(conn: &Connection, folder_id: i64) -> LibraryResult<Option<Folder>> {
    Ok(conn
        .query_row(
            "SELECT id, path, uuid FROM folders WHERE id = ?",
            [folder_id],
            folder_from_row,
        )
        .optional()?)
}

pub fn load_folders(conn: &Connection) -> LibraryResult<Vec<Folder>> {
    let mut stmt = conn.prepare("SELECT id, path, uuid FROM folders ORDER BY id")?;
    let folders = stmt
        .query_map([], folder_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(folders)
}

/// Delete a folder; its entries and their fields go with it
pub fn delete_folder(conn: &Connection, folder_id: i64) -> LibraryResult<()> {
    let removed = conn.execute("DELETE FROM folders WHERE id = ?", [folder_id])?;
    if removed == 0 {
        return Err(LibraryError::not_found(format!("folder {}", folder_id)));
    }
    Ok(())
}

// --- Entries ---

pub fn insert_entry(conn: &Connection, draft: &EntryDraft) -> LibraryResult<i64> {
    conn.execute(
        "INSERT INTO entries (folder_id, path, suffix) VALUES (?, ?, ?)",
        params![draft.folder_id, draft.path, path_suffix(&draft.path)],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn entry_exists(conn: &Connection, entry_id: i64) -> LibraryResult<bool> {
    Ok(conn
        .prepare("SELECT 1 FROM entries WHERE id = ?")?
        .exists([entry_id])?)
}

pub fn entry_id_by_path(conn: &Connection, path: &str) -> LibraryResult<Option<i64>> {
    Ok(conn
        .query_row("SELECT id FROM entries WHERE path = ?", [path], |row| row.get(0))
        .optional()?)
}

pub fn entry_paths(conn: &Connection) -> LibraryResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT path FROM entries ORDER BY id")?;
    let paths = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(paths)
}

pub fn entry_count(conn: &Connection) -> LibraryResult<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
    Ok(count as usize)
}

/// Up to `limit` entry ids greater than `after`, ascending
pub fn entry_ids_after(conn: &Connection, after: i64, limit: usize) -> LibraryResult<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM entries WHERE id > ? ORDER BY id LIMIT ?")?;
    let ids = stmt
        .query_map(params![after, limit as i64], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(ids)
}

pub fn update_entry_path(conn: &Connection, entry_id: i64, path: &str) -> LibraryResult<()> {
    let changed = conn.execute(
        "UPDATE entries SET path = ?, suffix = ? WHERE id = ?",
        params![path, path_suffix(path), entry_id],
    )?;
    if changed == 0 {
        return Err(LibraryError::not_found(format!("entry {}", entry_id)));
    }
    Ok(())
}

/// Delete entries by id, returning how many existed
pub fn delete_entries(conn: &Connection, entry_ids: &[i64]) -> LibraryResult<usize> {
    let mut removed = 0;
    for chunk in entry_ids.chunks(ID_CHUNK) {
        removed += conn.execute(
            &format!("DELETE FROM entries WHERE id IN ({})", placeholders(chunk.len())),
            params_from_iter(chunk.iter()),
        )?;
    }
    Ok(removed)
}

pub fn load_entry(conn: &Connection, entry_id: i64) -> LibraryResult<Option<Entry>> {
    Ok(load_entries(conn, &[entry_id], true)?.into_iter().next())
}

/// Load entries ordered by id; unknown ids are skipped
pub fn load_entries(
    conn: &Connection,
    entry_ids: &[i64],
    with_fields: bool,
) -> LibraryResult<Vec<Entry>> {
    let mut entries = Vec::with_capacity(entry_ids.len());

    for chunk in entry_ids.chunks(ID_CHUNK) {
        let mut stmt = conn.prepare(&format!(
            "SELECT id, folder_id, path, suffix FROM entries WHERE id IN ({}) ORDER BY id",
            placeholders(chunk.len())
        ))?;
        let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
            Ok(Entry {
                id: row.get(0)?,
                folder_id: row.get(1)?,
                path: row.get(2)?,
                suffix: row.get(3)?,
                fields: Vec::new(),
            })
        })?;
        for entry in rows {
            entries.push(entry?);
        }
    }
    entries.sort_by_key(|e| e.id);

    if with_fields && !entries.is_empty() {
        let ids: Vec<i64> = entries.iter().map(|e| e.id).collect();
        let mut fields = load_fields(conn, &ids)?;
        for entry in &mut entries {
            entry.fields = fields.remove(&entry.id).unwrap_or_default();
        }
    }
    Ok(entries)
}

// --- Fields ---

/// Sort key: value type position, field position, field id
type FieldOrder = (i64, i64, i64);

/// Every field of the given entries, grouped by entry id and in display order
pub fn load_fields(conn: &Connection, entry_ids: &[i64]) -> LibraryResult<BTreeMap<i64, Vec<Field>>> {
    let mut collected: Vec<(FieldOrder, Field)> = Vec::new();

    for chunk in entry_ids.chunks(ID_CHUNK) {
        let in_list = placeholders(chunk.len());
        load_text_fields(conn, chunk, &in_list, &mut collected)?;
        load_datetime_fields(conn, chunk, &in_list, &mut collected)?;
        load_boolean_fields(conn, chunk, &in_list, &mut collected)?;
        load_tag_box_fields(conn, chunk, &in_list, &mut collected)?;
    }

    collected.sort_by_key(|(order, _)| *order);

    let mut grouped: BTreeMap<i64, Vec<Field>> = BTreeMap::new();
    for (_, field) in collected {
        grouped.entry(field.entry_id()).or_default().push(field);
    }
    Ok(grouped)
}

fn load_text_fields(
    conn: &Connection,
    ids: &[i64],
    in_list: &str,
    out: &mut Vec<(FieldOrder, Field)>,
) -> LibraryResult<()> {
    let mut stmt = conn.prepare(&format!(
        "SELECT f.id, f.entry_id, f.type_key, f.position, f.value, vt.kind, vt.position
         FROM text_fields f JOIN value_types vt ON vt.key = f.type_key
         WHERE f.entry_id IN ({})",
        in_list
    ))?;
    let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
        let kind: String = row.get(5)?;
        let field = TextField {
            id: row.get(0)?,
            entry_id: row.get(1)?,
            type_key: row.get(2)?,
            position: row.get(3)?,
            multiline: kind == FieldKind::TextBox.as_str(),
            value: row.get(4)?,
        };
        Ok(((row.get::<_, i64>(6)?, field.position, field.id), Field::Text(field)))
    })?;
    for row in rows {
        out.push(row?);
    }
    Ok(())
}

fn load_datetime_fields(
    conn: &Connection,
    ids: &[i64],
    in_list: &str,
    out: &mut Vec<(FieldOrder, Field)>,
) -> LibraryResult<()> {
    let mut stmt = conn.prepare(&format!(
        "SELECT f.id, f.entry_id, f.type_key, f.position, f.value, vt.position
         FROM datetime_fields f JOIN value_types vt ON vt.key = f.type_key
         WHERE f.entry_id IN ({})",
        in_list
    ))?;
    let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
        let raw: Option<String> = row.get(4)?;
        let field = DatetimeField {
            id: row.get(0)?,
            entry_id: row.get(1)?,
            type_key: row.get(2)?,
            position: row.get(3)?,
            value: raw.as_deref().map(|r| parse_datetime(4, r)).transpose()?,
        };
        Ok(((row.get::<_, i64>(5)?, field.position, field.id), Field::Datetime(field)))
    })?;
    for row in rows {
        out.push(row?);
    }
    Ok(())
}

fn load_boolean_fields(
    conn: &Connection,
    ids: &[i64],
    in_list: &str,
    out: &mut Vec<(FieldOrder, Field)>,
) -> LibraryResult<()> {
    let mut stmt = conn.prepare(&format!(
        "SELECT f.id, f.entry_id, f.type_key, f.position, f.value, vt.position
         FROM boolean_fields f JOIN value_types vt ON vt.key = f.type_key
         WHERE f.entry_id IN ({})",
        in_list
    ))?;
    let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
        let field = BooleanField {
            id: row.get(0)?,
            entry_id: row.get(1)?,
            type_key: row.get(2)?,
            position: row.get(3)?,
            value: row.get(4)?,
        };
        Ok(((row.get::<_, i64>(5)?, field.position, field.id), Field::Boolean(field)))
    })?;
    for row in rows {
        out.push(row?);
    }
    Ok(())
}

fn load_tag_box_fields(
    conn: &Connection,
    ids: &[i64],
    in_list: &str,
    out: &mut Vec<(FieldOrder, Field)>,
) -> LibraryResult<()> {
    let mut boxes: Vec<(FieldOrder, TagBoxField)> = Vec::new();
    {
        let mut stmt = conn.prepare(&format!(
            "SELECT f.id, f.entry_id, f.type_key, f.position, vt.position
             FROM tag_box_fields f JOIN value_types vt ON vt.key = f.type_key
             WHERE f.entry_id IN ({})",
            in_list
        ))?;
        let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
            let field = TagBoxField {
                id: row.get(0)?,
                entry_id: row.get(1)?,
                type_key: row.get(2)?,
                position: row.get(3)?,
                tags: Vec::new(),
            };
            Ok(((row.get::<_, i64>(4)?, field.position, field.id), field))
        })?;
        for row in rows {
            boxes.push(row?);
        }
    }
    if boxes.is_empty() {
        return Ok(());
    }

    let box_ids: Vec<i64> = boxes.iter().map(|(_, f)| f.id).collect();
    let mut links: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
    let mut all_tag_ids = BTreeSet::new();
    {
        let mut stmt = conn.prepare(&format!(
            "SELECT field_id, tag_id FROM tag_fields WHERE field_id IN ({}) ORDER BY tag_id",
            placeholders(box_ids.len())
        ))?;
        let rows = stmt.query_map(params_from_iter(box_ids.iter()), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (field_id, tag_id) = row?;
            links.entry(field_id).or_default().push(tag_id);
            all_tag_ids.insert(tag_id);
        }
    }

    let tag_ids: Vec<i64> = all_tag_ids.into_iter().collect();
    let by_id: BTreeMap<i64, Tag> = tags::load_tags(conn, &tag_ids)?
        .into_iter()
        .map(|t| (t.id, t))
        .collect();

    for (order, mut field) in boxes {
        field.tags = links
            .remove(&field.id)
            .unwrap_or_default()
            .iter()
            .filter_map(|id| by_id.get(id).cloned())
            .collect();
        out.push((order, Field::TagBox(field)));
    }
    Ok(())
}

/// Stored datetimes are RFC 3339; anything else is a corrupt row
fn parse_datetime(column: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

fn next_position(conn: &Connection, table: &str, entry_id: i64, type_key: &str) -> LibraryResult<i64> {
    let next: i64 = conn.query_row(
        &format!(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM {} WHERE entry_id = ? AND type_key = ?",
            table
        ),
        params![entry_id, type_key],
        |row| row.get(0),
    )?;
    Ok(next)
}

/// Attach a field to an entry and return the new field id
///
/// Tag names in a tag-box value are resolved to existing tags or created.
pub fn insert_field(conn: &Connection, entry_id: i64, field: &NewField) -> LibraryResult<i64> {
    let table = table_for(field.kind);
    let position = next_position(conn, table, entry_id, &field.type_key)?;

    match &field.value {
        NewFieldValue::Text(value) => {
            conn.execute(
                "INSERT INTO text_fields (entry_id, type_key, position, value) VALUES (?, ?, ?, ?)",
                params![entry_id, field.type_key, position, value],
            )?;
        }
        NewFieldValue::Datetime(value) => {
            conn.execute(
                "INSERT INTO datetime_fields (entry_id, type_key, position, value) VALUES (?, ?, ?, ?)",
                params![entry_id, field.type_key, position, value.map(|d| d.to_rfc3339())],
            )?;
        }
        NewFieldValue::Boolean(value) => {
            conn.execute(
                "INSERT INTO boolean_fields (entry_id, type_key, position, value) VALUES (?, ?, ?, ?)",
                params![entry_id, field.type_key, position, value],
            )?;
        }
        NewFieldValue::Tags { names, ids } => {
            conn.execute(
                "INSERT INTO tag_box_fields (entry_id, type_key, position) VALUES (?, ?, ?)",
                params![entry_id, field.type_key, position],
            )?;
            let field_id = conn.last_insert_rowid();
            for tag_id in resolve_tag_ids(conn, names, ids)? {
                link_tag(conn, field_id, tag_id)?;
            }
            return Ok(field_id);
        }
    }
    Ok(conn.last_insert_rowid())
}

/// Merge explicit ids with names, creating tags for unknown names
pub fn resolve_tag_ids(conn: &Connection, names: &[String], ids: &[i64]) -> LibraryResult<BTreeSet<i64>> {
    let mut resolved: BTreeSet<i64> = ids.iter().copied().collect();
    for name in names {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        resolved.insert(tags::get_or_create_by_name(conn, name)?);
    }
    Ok(resolved)
}

/// Overwrite the value of a non-tag field row
pub fn update_field_value(
    conn: &Connection,
    table: &str,
    field_id: i64,
    value: &NewFieldValue,
) -> LibraryResult<()> {
    let sql = format!("UPDATE {} SET value = ? WHERE id = ?", table);
    match value {
        NewFieldValue::Text(v) => conn.execute(&sql, params![v, field_id])?,
        NewFieldValue::Datetime(v) => {
            conn.execute(&sql, params![v.map(|d| d.to_rfc3339()), field_id])?
        }
        NewFieldValue::Boolean(v) => conn.execute(&sql, params![v, field_id])?,
        NewFieldValue::Tags { .. } => {
            return Err(LibraryError::invalid("tag boxes are updated through their links"))
        }
    };
    Ok(())
}

/// Ids of fields at (`type_key`, `position`) on each of `entry_ids`
pub fn fields_at(
    conn: &Connection,
    table: &str,
    entry_ids: &[i64],
    type_key: &str,
    position: i64,
) -> LibraryResult<Vec<i64>> {
    let mut found = Vec::new();
    for chunk in entry_ids.chunks(ID_CHUNK) {
        let mut stmt = conn.prepare(&format!(
            "SELECT id FROM {} WHERE type_key = ? AND position = ? AND entry_id IN ({}) ORDER BY id",
            table,
            placeholders(chunk.len())
        ))?;
        let mut values: Vec<rusqlite::types::Value> =
            vec![type_key.to_string().into(), position.into()];
        values.extend(chunk.iter().map(|id| rusqlite::types::Value::from(*id)));
        let ids = stmt
            .query_map(params_from_iter(values.iter()), |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        found.extend(ids);
    }
    Ok(found)
}

/// Delete fields at (`type_key`, `position`) across `entry_ids`
pub fn delete_fields_at(
    conn: &Connection,
    table: &str,
    entry_ids: &[i64],
    type_key: &str,
    position: i64,
) -> LibraryResult<usize> {
    let ids = fields_at(conn, table, entry_ids, type_key, position)?;
    let mut removed = 0;
    for chunk in ids.chunks(ID_CHUNK) {
        removed += conn.execute(
            &format!("DELETE FROM {} WHERE id IN ({})", table, placeholders(chunk.len())),
            params_from_iter(chunk.iter()),
        )?;
    }
    Ok(removed)
}

/// Renumber positions of one (entry, key) densely from 0 in id order
pub fn renumber_positions(
    conn: &Connection,
    table: &str,
    entry_id: i64,
    type_key: &str,
) -> LibraryResult<()> {
    let ids: Vec<i64> = {
        let mut stmt = conn.prepare(&format!(
            "SELECT id FROM {} WHERE entry_id = ? AND type_key = ? ORDER BY id",
            table
        ))?;
        let rows = stmt.query_map(params![entry_id, type_key], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<Vec<i64>>>()?
    };

    let mut stmt = conn.prepare(&format!("UPDATE {} SET position = ? WHERE id = ?", table))?;
    for (position, id) in ids.iter().enumerate() {
        stmt.execute(params![position as i64, id])?;
    }
    Ok(())
}

/// Keys of every field currently on an entry
pub fn field_keys(conn: &Connection, entry_id: i64) -> LibraryResult<BTreeSet<String>> {
    let mut stmt = conn.prepare(
        "SELECT type_key FROM text_fields WHERE entry_id = ?1
         UNION SELECT type_key FROM datetime_fields WHERE entry_id = ?1
         UNION SELECT type_key FROM boolean_fields WHERE entry_id = ?1
         UNION SELECT type_key FROM tag_box_fields WHERE entry_id = ?1",
    )?;
    let keys = stmt
        .query_map([entry_id], |row| row.get(0))?
        .collect::<rusqlite::Result<BTreeSet<String>>>()?;
    Ok(keys)
}

// --- Tag box links ---

pub fn tag_box_id(conn: &Connection, entry_id: i64, type_key: &str) -> LibraryResult<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT id FROM tag_box_fields WHERE entry_id = ? AND type_key = ?",
            params![entry_id, type_key],
            |row| row.get(0),
        )
        .optional()?)
}

/// Link a tag to a tag box; `Conflict` when already linked
pub fn link_tag(conn: &Connection, field_id: i64, tag_id: i64) -> LibraryResult<()> {
    conn.execute(
        "INSERT INTO tag_fields (field_id, tag_id) VALUES (?, ?)",
        params![field_id, tag_id],
    )?;
    Ok(())
}

/// Remove a link, returning whether it existed
pub fn unlink_tag(conn: &Connection, field_id: i64, tag_id: i64) -> LibraryResult<bool> {
    let removed = conn.execute(
        "DELETE FROM tag_fields WHERE field_id = ? AND tag_id = ?",
        params![field_id, tag_id],
    )?;
    Ok(removed > 0)
}

pub fn linked_tag_ids(conn: &Connection, field_id: i64) -> LibraryResult<BTreeSet<i64>> {
    let mut stmt = conn.prepare("SELECT tag_id FROM tag_fields WHERE field_id = ?")?;
    let ids = stmt
        .query_map([field_id], |row| row.get(0))?
        .collect::<rusqlite::Result<BTreeSet<i64>>>()?;
    Ok(ids)
}

/// Make a tag box hold exactly `desired`, touching only changed links
pub fn reconcile_links(conn: &Connection, field_id: i64, desired: &BTreeSet<i64>) -> LibraryResult<()> {
    let current = linked_tag_ids(conn, field_id)?;
    for stale in current.difference(desired) {
        unlink_tag(conn, field_id, *stale)?;
    }
    for missing in desired.difference(&current) {
        link_tag(conn, field_id, *missing)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{instantiate_field, FieldId, FieldInput};
    use crate::storage::schema::create_tables;

    fn setup() -> (Connection, i64) {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        create_tables(&mut conn).unwrap();
        for field in FieldId::ALL {
            insert_value_type(&conn, &field.value_type()).unwrap();
        }
        let folder = insert_folder(&conn, "/library", "uuid-1").unwrap();
        (conn, folder.id)
    }

    fn add_field(conn: &Connection, entry_id: i64, key: FieldId, input: FieldInput) -> i64 {
        let field = instantiate_field(&key.value_type(), input).unwrap();
        insert_field(conn, entry_id, &field).unwrap()
    }

    #[test]
    fn test_insert_entry_records_suffix() {
        let (conn, folder_id) = setup();
        let id = insert_entry(&conn, &EntryDraft::new(folder_id, "photos/Cat.JPG")).unwrap();

        let entry = load_entry(&conn, id).unwrap().unwrap();
        assert_eq!(entry.path, "photos/Cat.JPG");
        assert_eq!(entry.suffix, "jpg");
        assert_eq!(entry.filename(), "Cat.JPG");

        let dup = insert_entry(&conn, &EntryDraft::new(folder_id, "photos/Cat.JPG"));
        assert!(dup.unwrap_err().is_conflict());
    }

    #[test]
    fn test_fields_load_in_display_order() {
        let (conn, folder_id) = setup();
        let id = insert_entry(&conn, &EntryDraft::new(folder_id, "a.txt")).unwrap();

        add_field(&conn, id, FieldId::Favorite, FieldInput::Boolean(true));
        add_field(&conn, id, FieldId::Notes, FieldInput::Text("long".into()));
        add_field(&conn, id, FieldId::Title, FieldInput::Text("second".into()));
        add_field(&conn, id, FieldId::Title, FieldInput::Text("first".into()));
        add_field(&conn, id, FieldId::Tags, FieldInput::TagNames(vec!["b".into(), "a".into()]));

        let entry = load_entry(&conn, id).unwrap().unwrap();
        let keys: Vec<&str> = entry.fields.iter().map(|f| f.type_key()).collect();
        assert_eq!(keys, vec!["TITLE", "TITLE", "NOTES", "TAGS", "FAVORITE"]);

        match &entry.fields[2] {
            Field::Text(f) => assert!(f.multiline),
            other => panic!("unexpected {:?}", other),
        }
        let names: Vec<&str> = entry.fields[3]
            .as_tag_box()
            .unwrap()
            .tags
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_tag_box_unique_per_entry_and_key() {
        let (conn, folder_id) = setup();
        let id = insert_entry(&conn, &EntryDraft::new(folder_id, "a.txt")).unwrap();
        add_field(&conn, id, FieldId::Tags, FieldInput::None);

        let again = instantiate_field(&FieldId::Tags.value_type(), FieldInput::None).unwrap();
        let err = insert_field(&conn, id, &again).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_renumber_and_delete_at_position() {
        let (conn, folder_id) = setup();
        let id = insert_entry(&conn, &EntryDraft::new(folder_id, "a.txt")).unwrap();
        for text in ["x", "y", "z"] {
            add_field(&conn, id, FieldId::Author, FieldInput::Text(text.into()));
        }

        assert_eq!(delete_fields_at(&conn, "text_fields", &[id], "AUTHOR", 1).unwrap(), 1);
        renumber_positions(&conn, "text_fields", id, "AUTHOR").unwrap();

        let entry = load_entry(&conn, id).unwrap().unwrap();
        let positions: Vec<i64> = entry.fields.iter().map(|f| f.position()).collect();
        assert_eq!(positions, vec![0, 1]);
    }

    #[test]
    fn test_reconcile_links() {
        let (conn, folder_id) = setup();
        let id = insert_entry(&conn, &EntryDraft::new(folder_id, "a.txt")).unwrap();
        let field_id = add_field(
            &conn,
            id,
            FieldId::Tags,
            FieldInput::TagNames(vec!["one".into(), "two".into()]),
        );
        let three = tags::get_or_create_by_name(&conn, "three").unwrap();
        let one = tags::get_or_create_by_name(&conn, "one").unwrap();

        reconcile_links(&conn, field_id, &BTreeSet::from([one, three])).unwrap();
        assert_eq!(linked_tag_ids(&conn, field_id).unwrap(), BTreeSet::from([one, three]));
    }

    #[test]
    fn test_delete_folder_cascades() {
        let (conn, folder_id) = setup();
        let id = insert_entry(&conn, &EntryDraft::new(folder_id, "a.txt")).unwrap();
        add_field(&conn, id, FieldId::Tags, FieldInput::TagNames(vec!["t".into()]));

        delete_folder(&conn, folder_id).unwrap();

        assert_eq!(entry_count(&conn).unwrap(), 0);
        let links: i64 = conn
            .query_row("SELECT COUNT(*) FROM tag_fields", [], |row| row.get(0))
            .unwrap();
        assert_eq!(links, 0);
        assert!(delete_folder(&conn, folder_id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_corrupt_datetime_is_reported() {
        let (conn, folder_id) = setup();
        let id = insert_entry(&conn, &EntryDraft::new(folder_id, "a.txt")).unwrap();
        let field_id = add_field(&conn, id, FieldId::Date, FieldInput::None);
        conn.execute(
            "UPDATE datetime_fields SET value = 'last tuesday' WHERE id = ?",
            [field_id],
        )
        .unwrap();

        let err = load_entry(&conn, id).unwrap_err();
        assert!(matches!(err, LibraryError::Database(_)));
    }

    #[test]
    fn test_value_type_lookup() {
        let (conn, _) = setup();
        assert_eq!(load_value_types(&conn).unwrap().len(), FieldId::ALL.len());
        assert_eq!(load_value_type(&conn, "NOTES").unwrap().kind, FieldKind::TextBox);
        assert!(load_value_type(&conn, "NOPE").unwrap_err().is_not_found());
    }
}
