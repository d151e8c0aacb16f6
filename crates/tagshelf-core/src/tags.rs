//! Tag graph
//!
//! Tags form a directed graph through `tag_subtags (parent_id, child_id)`.
//! Nothing stops a cycle from being written, so every traversal carries a
//! visited set and never expands a node twice.
//!
//! Updates to a tag's subtags and aliases are reconciled as a minimal diff:
//! rows that should go are deleted, missing rows are inserted, and rows
//! that already match are left alone.

use std::collections::{BTreeMap, BTreeSet};

use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::error::{LibraryError, LibraryResult};
use crate::models::{AliasUpdate, NewTag, Tag, TagAlias, TagColor};
use crate::storage::{escape_like, placeholders};

const TAG_COLUMNS: &str = "id, name, shorthand, color, icon";

fn tag_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
        shorthand: row.get(2)?,
        color: TagColor::from_i64(row.get(3)?),
        icon: row.get(4)?,
        aliases: Vec::new(),
        subtag_ids: BTreeSet::new(),
    })
}

/// Insert a tag row and return its id
pub fn insert_tag(conn: &Connection, tag: &NewTag) -> LibraryResult<i64> {
    conn.execute(
        "INSERT INTO tags (name, shorthand, color, icon) VALUES (?, ?, ?, ?)",
        params![tag.name, tag.shorthand, tag.color.as_i64(), tag.icon],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Insert a tag row under a caller-chosen id (reserved built-ins)
pub(crate) fn insert_tag_with_id(conn: &Connection, id: i64, tag: &NewTag) -> LibraryResult<()> {
    conn.execute(
        "INSERT INTO tags (id, name, shorthand, color, icon) VALUES (?, ?, ?, ?, ?)",
        params![id, tag.name, tag.shorthand, tag.color.as_i64(), tag.icon],
    )?;
    Ok(())
}

/// Rewrite name, shorthand, color and icon of an existing tag
pub fn update_tag_row(conn: &Connection, tag: &Tag) -> LibraryResult<()> {
    let changed = conn.execute(
        "UPDATE tags SET name = ?, shorthand = ?, color = ?, icon = ? WHERE id = ?",
        params![tag.name, tag.shorthand, tag.color.as_i64(), tag.icon, tag.id],
    )?;
    if changed == 0 {
        return Err(LibraryError::not_found(format!("tag {}", tag.id)));
    }
    Ok(())
}

/// Load a tag with its aliases and direct subtag ids
pub fn load_tag(conn: &Connection, tag_id: i64) -> LibraryResult<Option<Tag>> {
    Ok(load_tags(conn, &[tag_id])?.into_iter().next())
}

/// Load the given tags, ordered by id; unknown ids are skipped
pub fn load_tags(conn: &Connection, ids: &[i64]) -> LibraryResult<Vec<Tag>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "SELECT {} FROM tags WHERE id IN ({}) ORDER BY id",
        TAG_COLUMNS,
        placeholders(ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let tags = stmt
        .query_map(params_from_iter(ids.iter()), tag_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    hydrate(conn, tags)
}

pub fn load_all_tags(conn: &Connection) -> LibraryResult<Vec<Tag>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM tags ORDER BY id", TAG_COLUMNS))?;
    let tags = stmt
        .query_map([], tag_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    hydrate(conn, tags)
}

/// Attach aliases and subtag ids to bare tag rows
fn hydrate(conn: &Connection, mut tags: Vec<Tag>) -> LibraryResult<Vec<Tag>> {
    if tags.is_empty() {
        return Ok(tags);
    }

    let ids: Vec<i64> = tags.iter().map(|t| t.id).collect();
    let in_list = placeholders(ids.len());

    let mut aliases: BTreeMap<i64, Vec<TagAlias>> = BTreeMap::new();
    let mut stmt = conn.prepare(&format!(
        "SELECT id, name, tag_id FROM tag_aliases WHERE tag_id IN ({}) ORDER BY id",
        in_list
    ))?;
    let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
        Ok(TagAlias {
            id: row.get(0)?,
            name: row.get(1)?,
            tag_id: row.get(2)?,
        })
    })?;
    for alias in rows {
        let alias = alias?;
        aliases.entry(alias.tag_id).or_default().push(alias);
    }

    let mut children: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
    let mut stmt = conn.prepare(&format!(
        "SELECT parent_id, child_id FROM tag_subtags WHERE parent_id IN ({})",
        in_list
    ))?;
    let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
    })?;
    for edge in rows {
        let (parent, child) = edge?;
        children.entry(parent).or_default().insert(child);
    }

    for tag in &mut tags {
        tag.aliases = aliases.remove(&tag.id).unwrap_or_default();
        tag.subtag_ids = children.remove(&tag.id).unwrap_or_default();
    }
    Ok(tags)
}

pub fn get_alias(conn: &Connection, tag_id: i64, alias_id: i64) -> LibraryResult<Option<TagAlias>> {
    Ok(conn
        .query_row(
            "SELECT id, name, tag_id FROM tag_aliases WHERE id = ? AND tag_id = ?",
            params![alias_id, tag_id],
            |row| {
                Ok(TagAlias {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    tag_id: row.get(2)?,
                })
            },
        )
        .optional()?)
}

fn tag_exists(conn: &Connection, tag_id: i64) -> LibraryResult<bool> {
    Ok(conn
        .prepare("SELECT 1 FROM tags WHERE id = ?")?
        .exists([tag_id])?)
}

/// Insert the edge `parent -> child`
///
/// Returns `Ok(false)` without touching storage when both ids are equal.
/// An existing edge is a `Conflict`.
pub fn add_subtag(conn: &Connection, parent_id: i64, child_id: i64) -> LibraryResult<bool> {
    if parent_id == child_id {
        return Ok(false);
    }

    conn.execute(
        "INSERT INTO tag_subtags (parent_id, child_id) VALUES (?, ?)",
        params![parent_id, child_id],
    )?;
    Ok(true)
}

/// Delete the exact edge `parent -> child`
pub fn remove_subtag(conn: &Connection, parent_id: i64, child_id: i64) -> LibraryResult<()> {
    let removed = conn.execute(
        "DELETE FROM tag_subtags WHERE parent_id = ? AND child_id = ?",
        params![parent_id, child_id],
    )?;
    if removed == 0 {
        return Err(LibraryError::not_found(format!(
            "subtag edge {} -> {}",
            parent_id, child_id
        )));
    }
    Ok(())
}

pub fn child_ids(conn: &Connection, parent_id: i64) -> LibraryResult<Vec<i64>> {
    let mut stmt =
        conn.prepare_cached("SELECT child_id FROM tag_subtags WHERE parent_id = ? ORDER BY child_id")?;
    let ids = stmt
        .query_map([parent_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(ids)
}

/// All tags reachable from `tag_id` through child edges, including itself
///
/// A dangling `tag_id` is `NotFound`.
pub fn descendant_ids(conn: &Connection, tag_id: i64) -> LibraryResult<BTreeSet<i64>> {
    if !tag_exists(conn, tag_id)? {
        return Err(LibraryError::not_found(format!("tag {}", tag_id)));
    }
    descendants_of(conn, &[tag_id])
}

/// Union of the descendant sets of `roots`, roots included
pub(crate) fn descendants_of(conn: &Connection, roots: &[i64]) -> LibraryResult<BTreeSet<i64>> {
    let mut visited = BTreeSet::new();
    let mut pending: Vec<i64> = roots.to_vec();

    while let Some(id) = pending.pop() {
        // Already expanded: this is what stops cycles
        if !visited.insert(id) {
            continue;
        }
        for child in child_ids(conn, id)? {
            if !visited.contains(&child) {
                pending.push(child);
            }
        }
    }
    Ok(visited)
}

/// Reconcile the subtags of `tag_id` against `desired`
pub fn update_subtags(conn: &Connection, tag_id: i64, desired: &BTreeSet<i64>) -> LibraryResult<()> {
    let mut remaining = desired.clone();
    remaining.remove(&tag_id);

    for child in child_ids(conn, tag_id)? {
        if remaining.remove(&child) {
            continue;
        }
        conn.execute(
            "DELETE FROM tag_subtags WHERE parent_id = ? AND child_id = ?",
            params![tag_id, child],
        )?;
    }

    for child in remaining {
        conn.execute(
            "INSERT INTO tag_subtags (parent_id, child_id) VALUES (?, ?)",
            params![tag_id, child],
        )?;
    }
    Ok(())
}

/// Reconcile the aliases of `tag_id` against `update`
pub fn update_aliases(conn: &Connection, tag_id: i64, update: &AliasUpdate) -> LibraryResult<()> {
    let mut ids = update.ids.clone();
    let mut names = update.names.clone();

    let previous: Vec<(i64, String)> = {
        let mut stmt = conn.prepare("SELECT id, name FROM tag_aliases WHERE tag_id = ?")?;
        let rows = stmt.query_map([tag_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };

    for (alias_id, alias_name) in previous {
        if ids.contains(&alias_id) && names.contains(&alias_name) {
            ids.remove(&alias_id);
            names.remove(&alias_name);
        } else {
            conn.execute("DELETE FROM tag_aliases WHERE id = ?", [alias_id])?;
        }
    }

    for name in names {
        conn.execute(
            "INSERT INTO tag_aliases (name, tag_id) VALUES (?, ?)",
            params![name, tag_id],
        )?;
    }
    Ok(())
}

/// Tags whose name, shorthand or alias contains `query` (case-insensitive)
pub fn search_tags(conn: &Connection, query: &str, limit: usize) -> LibraryResult<Vec<Tag>> {
    let pattern = format!("%{}%", escape_like(query.trim()));
    let mut stmt = conn.prepare(
        r#"
        SELECT DISTINCT t.id
        FROM tags t
        LEFT JOIN tag_aliases a ON a.tag_id = t.id
        WHERE t.name LIKE ?1 ESCAPE '\'
           OR t.shorthand LIKE ?1 ESCAPE '\'
           OR a.name LIKE ?1 ESCAPE '\'
        ORDER BY t.id
        LIMIT ?2
        "#,
    )?;
    let ids = stmt
        .query_map(params![pattern, limit as i64], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;

    load_tags(conn, &ids)
}

/// Ids of tags whose name, shorthand or alias equals `literal`, ignoring case
pub fn find_exact(conn: &Connection, literal: &str) -> LibraryResult<Vec<i64>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT DISTINCT t.id
        FROM tags t
        LEFT JOIN tag_aliases a ON a.tag_id = t.id
        WHERE lower(t.name) = lower(?1)
           OR lower(t.shorthand) = lower(?1)
           OR lower(a.name) = lower(?1)
        ORDER BY t.id
        "#,
    )?;
    let ids = stmt
        .query_map([literal.trim()], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(ids)
}

/// Id of the tag named exactly `name`, creating it when missing
pub fn get_or_create_by_name(conn: &Connection, name: &str) -> LibraryResult<i64> {
    let existing: Option<i64> = conn
        .query_row("SELECT id FROM tags WHERE name = ?", [name], |row| row.get(0))
        .optional()?;

    match existing {
        Some(id) => Ok(id),
        None => insert_tag(conn, &NewTag::new(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::create_tables;

    fn setup() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        create_tables(&mut conn).unwrap();
        conn
    }

    fn tag(conn: &Connection, name: &str) -> i64 {
        insert_tag(conn, &NewTag::new(name)).unwrap()
    }

    #[test]
    fn test_add_subtag_rules() {
        let conn = setup();
        let a = tag(&conn, "a");
        let b = tag(&conn, "b");

        assert!(!add_subtag(&conn, a, a).unwrap());
        assert!(add_subtag(&conn, a, b).unwrap());
        assert!(add_subtag(&conn, a, b).unwrap_err().is_conflict());

        remove_subtag(&conn, a, b).unwrap();
        assert!(remove_subtag(&conn, a, b).unwrap_err().is_not_found());
    }

    #[test]
    fn test_descendants_survive_cycle() {
        let conn = setup();
        let a = tag(&conn, "a");
        let b = tag(&conn, "b");
        let c = tag(&conn, "c");
        add_subtag(&conn, a, b).unwrap();
        add_subtag(&conn, b, c).unwrap();
        add_subtag(&conn, c, a).unwrap();

        let ids = descendant_ids(&conn, a).unwrap();
        assert_eq!(ids, BTreeSet::from([a, b, c]));
    }

    #[test]
    fn test_descendants_independent_of_insert_order() {
        let first = setup();
        let second = setup();
        for conn in [&first, &second] {
            for name in ["root", "x", "y", "z"] {
                tag(conn, name);
            }
        }
        let (root, x, y, z) = (1, 2, 3, 4);

        for (p, c) in [(root, x), (x, y), (root, z), (z, y)] {
            add_subtag(&first, p, c).unwrap();
        }
        for (p, c) in [(z, y), (root, z), (x, y), (root, x)] {
            add_subtag(&second, p, c).unwrap();
        }

        assert_eq!(
            descendant_ids(&first, root).unwrap(),
            descendant_ids(&second, root).unwrap()
        );
    }

    #[test]
    fn test_descendants_of_missing_tag() {
        let conn = setup();
        assert!(descendant_ids(&conn, 42).unwrap_err().is_not_found());
    }

    #[test]
    fn test_update_subtags_minimal_diff() {
        let conn = setup();
        let parent = tag(&conn, "parent");
        let keep = tag(&conn, "keep");
        let drop = tag(&conn, "drop");
        let new = tag(&conn, "new");
        add_subtag(&conn, parent, keep).unwrap();
        add_subtag(&conn, parent, drop).unwrap();

        let keep_rowid: i64 = conn
            .query_row(
                "SELECT rowid FROM tag_subtags WHERE parent_id = ? AND child_id = ?",
                params![parent, keep],
                |row| row.get(0),
            )
            .unwrap();

        update_subtags(&conn, parent, &BTreeSet::from([keep, new, parent])).unwrap();

        assert_eq!(child_ids(&conn, parent).unwrap(), vec![keep, new]);
        let keep_rowid_after: i64 = conn
            .query_row(
                "SELECT rowid FROM tag_subtags WHERE parent_id = ? AND child_id = ?",
                params![parent, keep],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(keep_rowid, keep_rowid_after);
    }

    #[test]
    fn test_update_aliases_keys_on_id_and_name() {
        let conn = setup();
        let t = tag(&conn, "cat");
        update_aliases(&conn, t, &AliasUpdate::names(["kitty", "feline"])).unwrap();
        let before = load_tag(&conn, t).unwrap().unwrap();
        let kitty = before.aliases.iter().find(|a| a.name == "kitty").unwrap().clone();

        // kitty kept as-is, feline dropped, puss added
        let update = AliasUpdate {
            ids: BTreeSet::from([kitty.id]),
            names: BTreeSet::from(["kitty".to_string(), "puss".to_string()]),
        };
        update_aliases(&conn, t, &update).unwrap();

        let after = load_tag(&conn, t).unwrap().unwrap();
        let mut names = after.alias_names();
        names.sort();
        assert_eq!(names, vec!["kitty", "puss"]);
        assert!(after.aliases.contains(&kitty));
    }

    #[test]
    fn test_search_and_exact_match() {
        let conn = setup();
        let id = insert_tag(&conn, &NewTag::new("Animal").with_shorthand("ani")).unwrap();
        update_aliases(&conn, id, &AliasUpdate::names(["Creature"])).unwrap();
        tag(&conn, "Plant");

        assert_eq!(search_tags(&conn, "nim", 10).unwrap().len(), 1);
        assert_eq!(search_tags(&conn, "creat", 10).unwrap()[0].id, id);
        assert_eq!(search_tags(&conn, "", 10).unwrap().len(), 2);

        assert_eq!(find_exact(&conn, "ANIMAL").unwrap(), vec![id]);
        assert_eq!(find_exact(&conn, "ani").unwrap(), vec![id]);
        assert_eq!(find_exact(&conn, "creature").unwrap(), vec![id]);
        assert!(find_exact(&conn, "anim").unwrap().is_empty());
    }

    #[test]
    fn test_get_or_create_by_name() {
        let conn = setup();
        let id = get_or_create_by_name(&conn, "new").unwrap();
        assert_eq!(get_or_create_by_name(&conn, "new").unwrap(), id);
    }
}
