//! Search & filter engine
//!
//! A [`FilterState`] carries at most one primary predicate (checked in the
//! order id, tag id, tag, name, path) plus folder scoping. The extension
//! allow/deny list comes from the library preferences. Results are ordered
//! by entry id so repeated calls page identically.

use std::collections::BTreeSet;

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use tracing::debug;

use crate::error::{LibraryError, LibraryResult};
use crate::models::{normalize_extension, Entry, LibraryPref};
use crate::storage::{entries, escape_like, placeholders, preferences};
use crate::tags;

pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Declarative search request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    pub page_index: usize,
    pub page_size: usize,
    pub id: Option<i64>,
    pub tag_id: Option<i64>,
    pub tag: Option<String>,
    pub name: Option<String>,
    pub path: Option<String>,
    pub include_folders: BTreeSet<i64>,
    pub exclude_folders: BTreeSet<i64>,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            page_index: 0,
            page_size: DEFAULT_PAGE_SIZE,
            id: None,
            tag_id: None,
            tag: None,
            name: None,
            path: None,
            include_folders: BTreeSet::new(),
            exclude_folders: BTreeSet::new(),
        }
    }
}

impl FilterState {
    pub fn by_id(id: i64) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn by_tag_id(tag_id: i64) -> Self {
        Self {
            tag_id: Some(tag_id),
            ..Self::default()
        }
    }

    pub fn by_tag(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..Self::default()
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn by_path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn page(mut self, page_index: usize) -> Self {
        self.page_index = page_index;
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn include_folder(mut self, folder_id: i64) -> Self {
        self.include_folders.insert(folder_id);
        self
    }

    pub fn exclude_folder(mut self, folder_id: i64) -> Self {
        self.exclude_folders.insert(folder_id);
        self
    }

    /// The active primary predicate; blank strings count as absent
    pub fn predicate(&self) -> Predicate<'_> {
        fn text(value: &Option<String>) -> Option<&str> {
            value.as_deref().map(str::trim).filter(|s| !s.is_empty())
        }

        if let Some(id) = self.id {
            Predicate::Id(id)
        } else if let Some(tag_id) = self.tag_id {
            Predicate::TagId(tag_id)
        } else if let Some(tag) = text(&self.tag) {
            Predicate::Tag(tag)
        } else if let Some(name) = text(&self.name) {
            Predicate::Name(name)
        } else if let Some(path) = text(&self.path) {
            Predicate::Path(path)
        } else {
            Predicate::All
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate<'a> {
    Id(i64),
    TagId(i64),
    Tag(&'a str),
    Name(&'a str),
    Path(&'a str),
    All,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// Matches ignoring pagination
    pub total_count: usize,
    pub items: Vec<Entry>,
}

impl SearchResult {
    fn empty() -> Self {
        Self {
            total_count: 0,
            items: Vec::new(),
        }
    }

    pub fn ids(&self) -> Vec<i64> {
        self.items.iter().map(|e| e.id).collect()
    }
}

/// Extension list as stored in the library preferences
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
    pub exclude: bool,
    /// Normalized: lower-case, no leading dot
    pub extensions: BTreeSet<String>,
}

impl ExtensionFilter {
    /// Read from preferences, falling back to the defaults for missing rows
    pub fn load(conn: &Connection) -> LibraryResult<Self> {
        let read = |pref: LibraryPref| match preferences::get(conn, pref.key()) {
            Ok(value) => Ok(value),
            Err(e) if e.is_not_found() => Ok(pref.default_value()),
            Err(e) => Err(e),
        };

        let exclude = read(LibraryPref::IsExcludeList)?.as_bool().unwrap_or(true);
        let extensions = read(LibraryPref::ExtensionList)?
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(normalize_extension)
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            exclude,
            extensions,
        })
    }
}

/// Run a filter against the library
pub fn search(conn: &Connection, filter: &FilterState) -> LibraryResult<SearchResult> {
    let (limit, offset) = page_window(filter)?;

    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    let predicate = filter.predicate();
    match predicate {
        Predicate::Id(id) => {
            clauses.push("e.id = ?".to_string());
            values.push(id.into());
        }
        Predicate::TagId(tag_id) => {
            clauses.push(tagged_with(1));
            values.push(tag_id.into());
        }
        Predicate::Tag(query) => {
            let roots = tags::find_exact(conn, query)?;
            let wanted = tags::descendants_of(conn, &roots)?;
            if wanted.is_empty() {
                debug!(tag = query, "no tag matches query");
                return Ok(SearchResult::empty());
            }
            clauses.push(tagged_with(wanted.len()));
            values.extend(wanted.into_iter().map(Value::from));
        }
        Predicate::Name(query) => {
            let escaped = escape_like(query);
            clauses.push(r"e.path LIKE ? ESCAPE '\'".to_string());
            clauses.push(r"e.path NOT LIKE ? ESCAPE '\'".to_string());
            values.push(format!("%{}%", escaped).into());
            values.push(format!("%{}%/%", escaped).into());
        }
        Predicate::Path(query) => {
            clauses.push(r"e.path LIKE ? ESCAPE '\'".to_string());
            values.push(format!("%{}%", escape_like(query)).into());
        }
        Predicate::All => {}
    }

    // An exact id lookup ignores the secondary filters
    if !matches!(predicate, Predicate::Id(_)) {
        let ext = ExtensionFilter::load(conn)?;
        if !ext.extensions.is_empty() {
            let op = if ext.exclude { "NOT IN" } else { "IN" };
            clauses.push(format!("e.suffix {} ({})", op, placeholders(ext.extensions.len())));
            values.extend(ext.extensions.into_iter().map(Value::from));
        }

        if !filter.exclude_folders.is_empty() {
            clauses.push(format!(
                "e.folder_id NOT IN ({})",
                placeholders(filter.exclude_folders.len())
            ));
            values.extend(filter.exclude_folders.iter().map(|id| Value::from(*id)));
        } else if !filter.include_folders.is_empty() {
            clauses.push(format!(
                "e.folder_id IN ({})",
                placeholders(filter.include_folders.len())
            ));
            values.extend(filter.include_folders.iter().map(|id| Value::from(*id)));
        }
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM entries e{}", where_sql);
    debug!(sql = %count_sql, ?predicate, "search");
    let total: i64 = conn.query_row(&count_sql, params_from_iter(values.iter()), |row| row.get(0))?;

    let page_sql = format!("SELECT e.id FROM entries e{} ORDER BY e.id LIMIT ? OFFSET ?", where_sql);
    values.push(limit.into());
    values.push(offset.into());

    let mut stmt = conn.prepare(&page_sql)?;
    let ids = stmt
        .query_map(params_from_iter(values.iter()), |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;

    Ok(SearchResult {
        total_count: total as usize,
        items: entries::load_entries(conn, &ids, true)?,
    })
}

/// `LIMIT` and `OFFSET` for the requested page
fn page_window(filter: &FilterState) -> LibraryResult<(i64, i64)> {
    if filter.page_size == 0 {
        return Err(LibraryError::invalid("page size must be positive"));
    }
    let limit = i64::try_from(filter.page_size)
        .map_err(|_| LibraryError::invalid(format!("page size {} is too large", filter.page_size)))?;
    let offset = filter
        .page_index
        .checked_mul(filter.page_size)
        .and_then(|offset| i64::try_from(offset).ok())
        .ok_or_else(|| {
            LibraryError::invalid(format!(
                "page {} of size {} is out of range",
                filter.page_index, filter.page_size
            ))
        })?;
    Ok((limit, offset))
}

/// Entries whose tag boxes hold any of `n` bound tag ids
fn tagged_with(n: usize) -> String {
    format!(
        "e.id IN (SELECT tb.entry_id FROM tag_box_fields tb \
         JOIN tag_fields tf ON tf.field_id = tb.id WHERE tf.tag_id IN ({}))",
        placeholders(n)
    )
}
