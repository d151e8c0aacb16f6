//! Library service
//!
//! A [`Library`] is an explicit handle to one open catalog. It owns the
//! storage handle and exposes every operation the scanner and front ends
//! need. Each call runs in its own transaction against a short-lived
//! connection, so no call leaves state behind for the next one.
//!
//! ## Usage
//!
//! ```ignore
//! let mut library = Library::new();
//! let status = library.open(Path::new("/photos"))?;
//! assert!(status.success);
//!
//! let folder = library.add_folder(Path::new("/photos"))?;
//! let ids = library.add_entries(&[EntryDraft::new(folder.id, "cat.jpg")])?;
//! let found = library.search(&FilterState::by_id(ids[0]))?;
//! ```

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::OptionalExtension;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{LibraryError, LibraryResult};
use crate::fields::{instantiate_field, Field, FieldId, FieldInput, FieldKind, NewFieldValue, ValueType};
use crate::models::{
    normalize_path, AliasUpdate, Entry, EntryDraft, Folder, LibraryPref, NewTag, Tag, TagAlias,
    TagColor, RESERVED_TAG_END, TAG_ARCHIVED, TAG_FAVORITE,
};
use crate::search::{self, ExtensionFilter, FilterState, SearchResult};
use crate::storage::schema::get_schema_version;
use crate::storage::{self, entries, preferences, Storage, SCHEMA_VERSION};
use crate::tags;
use crate::thumbnails::{DataDirThumbnails, ThumbnailCache};

/// Hidden directory inside the library root
pub const DATA_DIR: &str = ".TagShelf";
pub const STORAGE_FILENAME: &str = "ts_library.sqlite";
/// Directories holding this file are skipped by scans
pub const NOINDEX_MARKER: &str = ".ts_noindex";
pub const BACKUP_FOLDER: &str = "backups";

/// Entries loaded per connection by [`EntryIter`]
const ENTRY_BATCH: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LibraryState {
    Closed,
    Opening,
    Open,
}

/// Outcome of [`Library::open`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryStatus {
    pub success: bool,
    pub storage_path: Option<PathBuf>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenOptions {
    /// Upgrade step by step instead of creating the head schema directly
    pub use_migrations: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            use_migrations: true,
        }
    }
}

/// What [`Library::add_field_tag`] does when the entry lacks the tag box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingFieldAction {
    #[default]
    Skip,
    Create,
    Raise,
}

/// Handle to a single library
pub struct Library {
    state: LibraryState,
    storage: Option<Storage>,
    root: Option<PathBuf>,
    thumbnails: Option<Box<dyn ThumbnailCache>>,
}

impl Default for Library {
    fn default() -> Self {
        Self::new()
    }
}

impl Library {
    pub fn new() -> Self {
        Self {
            state: LibraryState::Closed,
            storage: None,
            root: None,
            thumbnails: None,
        }
    }

    pub fn state(&self) -> LibraryState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == LibraryState::Open
    }

    /// Root directory of the open library
    pub fn library_dir(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn data_dir(&self) -> Option<PathBuf> {
        self.root.as_ref().map(|r| r.join(DATA_DIR))
    }

    pub fn storage_path(&self) -> Option<&Path> {
        self.storage.as_ref().and_then(Storage::path)
    }

    pub(crate) fn storage(&self) -> LibraryResult<&Storage> {
        match (&self.state, &self.storage) {
            (LibraryState::Open, Some(storage)) => Ok(storage),
            _ => Err(LibraryError::Closed),
        }
    }

    pub fn thumbnail_cache(&self) -> Option<&dyn ThumbnailCache> {
        self.thumbnails.as_deref()
    }

    /// Replace the thumbnail resolver of the open library
    pub fn set_thumbnail_cache(&mut self, cache: Box<dyn ThumbnailCache>) {
        self.thumbnails = Some(cache);
    }

    // ==================== Lifecycle ====================

    /// Open or create the library rooted at `root`
    pub fn open(&mut self, root: &Path) -> LibraryResult<LibraryStatus> {
        self.open_with(root, OpenOptions::default())
    }

    pub fn open_with(&mut self, root: &Path, options: OpenOptions) -> LibraryResult<LibraryStatus> {
        self.close();
        self.state = LibraryState::Opening;

        match self.open_file(root, options) {
            Ok(status) => Ok(status),
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    fn open_file(&mut self, root: &Path, options: OpenOptions) -> LibraryResult<LibraryStatus> {
        let data_dir = root.join(DATA_DIR);
        fs::create_dir_all(&data_dir).map_err(|e| LibraryError::from_io(e, &data_dir))?;

        let storage_path = data_dir.join(STORAGE_FILENAME);
        let is_new = !storage_path.exists();
        let storage = Storage::open_file(&storage_path).map_err(|e| unusable(e, &storage_path))?;

        if is_new {
            info!(path = %storage_path.display(), "creating library");
        } else {
            info!(path = %storage_path.display(), "opening library");
        }
        let marker = data_dir.join(NOINDEX_MARKER);
        if !marker.exists() {
            fs::write(&marker, b"").map_err(|e| LibraryError::from_io(e, &marker))?;
        }

        let prepared = prepare_schema(&storage, options).and_then(|too_new| match too_new {
            Some(message) => Ok(Some(message)),
            None => bootstrap(&storage).map(|_| None),
        });

        if let Some(message) = prepared.map_err(|e| unusable(e, &storage_path))? {
            warn!(%message, "refusing to open library");
            self.close();
            return Ok(LibraryStatus {
                success: false,
                storage_path: Some(storage_path),
                message: Some(message),
            });
        }

        self.thumbnails = Some(Box::new(DataDirThumbnails::new(&data_dir)));
        self.storage = Some(storage);
        self.root = Some(root.to_path_buf());
        self.state = LibraryState::Open;

        Ok(LibraryStatus {
            success: true,
            storage_path: Some(storage_path),
            message: None,
        })
    }

    /// Open a private library that lives only as long as this handle
    pub fn open_in_memory(&mut self) -> LibraryResult<LibraryStatus> {
        self.open_in_memory_with(OpenOptions::default())
    }

    pub fn open_in_memory_with(&mut self, options: OpenOptions) -> LibraryResult<LibraryStatus> {
        self.close();
        self.state = LibraryState::Opening;

        let storage = Storage::open_in_memory().and_then(|storage| {
            prepare_schema(&storage, options)?;
            bootstrap(&storage)?;
            Ok(storage)
        });
        let storage = match storage {
            Ok(storage) => storage,
            Err(e) => {
                self.close();
                return Err(e);
            }
        };

        self.storage = Some(storage);
        self.state = LibraryState::Open;
        debug!("opened in-memory library");

        Ok(LibraryStatus {
            success: true,
            storage_path: None,
            message: None,
        })
    }

    /// Release the storage; a no-op when already closed
    pub fn close(&mut self) {
        if self.state != LibraryState::Closed {
            if let Some(path) = self.storage_path() {
                info!(path = %path.display(), "closing library");
            }
        }
        self.storage = None;
        self.root = None;
        self.thumbnails = None;
        self.state = LibraryState::Closed;
    }

    /// Copy the storage file into the backup folder and return the copy's path
    pub fn save_backup(&self) -> LibraryResult<PathBuf> {
        let source = self
            .storage()?
            .path()
            .ok_or_else(|| LibraryError::invalid("in-memory library has no storage file"))?;
        let data_dir = self.data_dir().ok_or(LibraryError::Closed)?;

        let backup_dir = data_dir.join(BACKUP_FOLDER);
        fs::create_dir_all(&backup_dir).map_err(|e| LibraryError::from_io(e, &backup_dir))?;

        let stem = Path::new(STORAGE_FILENAME)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let target = backup_dir.join(format!(
            "{}_backup_{}.sqlite",
            stem,
            Utc::now().format("%Y_%m_%d_%H%M%S")
        ));

        fs::copy(source, &target).map_err(|e| LibraryError::from_io(e, &target))?;
        info!(path = %target.display(), "saved backup");
        Ok(target)
    }

    // ==================== Folders ====================

    pub fn add_folder(&self, path: &Path) -> LibraryResult<Folder> {
        let path = normalize_path(path);
        let uuid = Uuid::new_v4().to_string();
        self.storage()?
            .transaction(|tx| entries::insert_folder(tx, &path, &uuid))
    }

    pub fn get_folder(&self, folder_id: i64) -> LibraryResult<Option<Folder>> {
        self.storage()?
            .with_connection(|conn| entries::load_folder(conn, folder_id))
    }

    pub fn get_folders(&self) -> LibraryResult<Vec<Folder>> {
        self.storage()?.with_connection(|conn| entries::load_folders(conn))
    }

    /// Remove a folder with its entries, then its cached thumbnails
    pub fn remove_folder(&self, folder_id: i64) -> LibraryResult<()> {
        self.storage()?
            .transaction(|tx| entries::delete_folder(tx, folder_id))?;
        info!(folder_id, "removed folder");

        if let Some(cache) = &self.thumbnails {
            if let Err(e) = cache.remove_folder(folder_id) {
                warn!(folder_id, error = %e, "failed to remove folder thumbnails");
            }
        }
        Ok(())
    }

    // ==================== Entries ====================

    /// Insert entries in one transaction, attaching the default fields
    ///
    /// Either every draft is stored or none is.
    pub fn add_entries(&self, drafts: &[EntryDraft]) -> LibraryResult<Vec<i64>> {
        self.storage()?.transaction(|tx| {
            let defaults: Vec<ValueType> = entries::load_value_types(tx)?
                .into_iter()
                .filter(|vt| vt.is_default)
                .collect();

            let mut ids = Vec::with_capacity(drafts.len());
            for draft in drafts {
                let entry_id = entries::insert_entry(tx, draft)?;

                let mut supplied = BTreeSet::new();
                for (key, input) in &draft.fields {
                    let value_type = entries::load_value_type(tx, key)?;
                    let field = instantiate_field(&value_type, input.clone())?;
                    entries::insert_field(tx, entry_id, &field)?;
                    supplied.insert(key.as_str());
                }
                for value_type in &defaults {
                    if supplied.contains(value_type.key.as_str()) {
                        continue;
                    }
                    let field = instantiate_field(value_type, FieldInput::None)?;
                    entries::insert_field(tx, entry_id, &field)?;
                }
                ids.push(entry_id);
            }
            Ok(ids)
        })
    }

    /// Load an entry with all of its fields
    pub fn get_entry(&self, entry_id: i64) -> LibraryResult<Option<Entry>> {
        self.storage()?
            .transaction(|tx| entries::load_entry(tx, entry_id))
    }

    pub fn get_entry_by_path(&self, path: impl AsRef<Path>) -> LibraryResult<Option<Entry>> {
        let path = normalize_path(path.as_ref());
        self.storage()?.transaction(|tx| {
            match entries::entry_id_by_path(tx, &path)? {
                Some(id) => entries::load_entry(tx, id),
                None => Ok(None),
            }
        })
    }

    pub fn has_path_entry(&self, path: impl AsRef<Path>) -> LibraryResult<bool> {
        let path = normalize_path(path.as_ref());
        self.storage()?
            .with_connection(|conn| Ok(entries::entry_id_by_path(conn, &path)?.is_some()))
    }

    pub fn get_paths(&self) -> LibraryResult<Vec<String>> {
        self.storage()?.with_connection(|conn| entries::entry_paths(conn))
    }

    pub fn entries_count(&self) -> LibraryResult<usize> {
        self.storage()?.with_connection(|conn| entries::entry_count(conn))
    }

    pub fn update_entry_path(&self, entry_id: i64, path: impl AsRef<Path>) -> LibraryResult<()> {
        let path = normalize_path(path.as_ref());
        self.storage()?
            .transaction(|tx| entries::update_entry_path(tx, entry_id, &path))
    }

    /// Delete entries, returning how many existed
    pub fn remove_entries(&self, entry_ids: &[i64]) -> LibraryResult<usize> {
        self.storage()?
            .transaction(|tx| entries::delete_entries(tx, entry_ids))
    }

    /// Lazily walk every entry in id order
    pub fn get_entries(&self, with_full_fields: bool) -> LibraryResult<EntryIter<'_>> {
        Ok(EntryIter {
            storage: self.storage()?,
            with_fields: with_full_fields,
            last_id: i64::MIN,
            buffer: VecDeque::new(),
            done: false,
        })
    }

    // ==================== Value types ====================

    /// Every registered value type keyed by its key
    pub fn field_types(&self) -> LibraryResult<BTreeMap<String, ValueType>> {
        let types = self
            .storage()?
            .with_connection(|conn| entries::load_value_types(conn))?;
        Ok(types.into_iter().map(|vt| (vt.key.clone(), vt)).collect())
    }

    pub fn get_value_type(&self, key: &str) -> LibraryResult<ValueType> {
        self.storage()?
            .with_connection(|conn| entries::load_value_type(conn, key))
    }

    /// Value types attached to every new entry
    pub fn default_fields(&self) -> LibraryResult<Vec<ValueType>> {
        let types = self
            .storage()?
            .with_connection(|conn| entries::load_value_types(conn))?;
        Ok(types.into_iter().filter(|vt| vt.is_default).collect())
    }

    /// Register a new value type; `Conflict` if the key exists
    pub fn add_value_type(&self, value_type: &ValueType) -> LibraryResult<()> {
        if value_type.key.trim().is_empty() {
            return Err(LibraryError::invalid("value type key must not be empty"));
        }
        self.storage()?
            .transaction(|tx| entries::insert_value_type(tx, value_type))
    }

    // ==================== Tags ====================

    /// Create a tag with optional subtags and aliases in one transaction
    pub fn add_tag(
        &self,
        tag: &NewTag,
        subtag_ids: Option<&BTreeSet<i64>>,
        aliases: Option<&AliasUpdate>,
    ) -> LibraryResult<Tag> {
        if tag.name.trim().is_empty() {
            return Err(LibraryError::invalid("tag name must not be empty"));
        }

        self.storage()?.transaction(|tx| {
            let id = tags::insert_tag(tx, tag)?;
            if let Some(subtag_ids) = subtag_ids {
                tags::update_subtags(tx, id, subtag_ids)?;
            }
            if let Some(aliases) = aliases {
                tags::update_aliases(tx, id, aliases)?;
            }
            tags::load_tag(tx, id)?.ok_or_else(|| LibraryError::not_found(format!("tag {}", id)))
        })
    }

    /// Rewrite a tag and reconcile its subtags and aliases when given
    pub fn update_tag(
        &self,
        tag: &Tag,
        subtag_ids: Option<&BTreeSet<i64>>,
        aliases: Option<&AliasUpdate>,
    ) -> LibraryResult<Tag> {
        if tag.name.trim().is_empty() {
            return Err(LibraryError::invalid("tag name must not be empty"));
        }

        self.storage()?.transaction(|tx| {
            tags::update_tag_row(tx, tag)?;
            if let Some(subtag_ids) = subtag_ids {
                tags::update_subtags(tx, tag.id, subtag_ids)?;
            }
            if let Some(aliases) = aliases {
                tags::update_aliases(tx, tag.id, aliases)?;
            }
            tags::load_tag(tx, tag.id)?
                .ok_or_else(|| LibraryError::not_found(format!("tag {}", tag.id)))
        })
    }

    pub fn get_tag(&self, tag_id: i64) -> LibraryResult<Option<Tag>> {
        self.storage()?
            .transaction(|tx| tags::load_tag(tx, tag_id))
    }

    pub fn get_tags(&self) -> LibraryResult<Vec<Tag>> {
        self.storage()?.transaction(|tx| tags::load_all_tags(tx))
    }

    pub fn get_alias(&self, tag_id: i64, alias_id: i64) -> LibraryResult<Option<TagAlias>> {
        self.storage()?
            .with_connection(|conn| tags::get_alias(conn, tag_id, alias_id))
    }

    pub fn search_tags(&self, query: &str, limit: usize) -> LibraryResult<Vec<Tag>> {
        self.storage()?
            .transaction(|tx| tags::search_tags(tx, query, limit))
    }

    /// Add the edge `parent -> child`; `false` for a self edge
    pub fn add_subtag(&self, parent_id: i64, child_id: i64) -> LibraryResult<bool> {
        self.storage()?
            .transaction(|tx| tags::add_subtag(tx, parent_id, child_id))
    }

    pub fn remove_subtag(&self, parent_id: i64, child_id: i64) -> LibraryResult<()> {
        self.storage()?
            .transaction(|tx| tags::remove_subtag(tx, parent_id, child_id))
    }

    /// Reconcile a tag's children against `subtag_ids`
    pub fn update_subtags(&self, tag_id: i64, subtag_ids: &BTreeSet<i64>) -> LibraryResult<()> {
        self.storage()?
            .transaction(|tx| tags::update_subtags(tx, tag_id, subtag_ids))
    }

    pub fn update_aliases(&self, tag_id: i64, aliases: &AliasUpdate) -> LibraryResult<()> {
        self.storage()?
            .transaction(|tx| tags::update_aliases(tx, tag_id, aliases))
    }

    /// `tag_id` and every tag reachable below it
    pub fn get_all_descendant_ids(&self, tag_id: i64) -> LibraryResult<BTreeSet<i64>> {
        self.storage()?
            .transaction(|tx| tags::descendant_ids(tx, tag_id))
    }

    // ==================== Field tags ====================

    /// Put a tag into one of an entry's tag boxes (`TAGS` by default)
    ///
    /// Returns `false` only when the box is missing and `on_missing` is
    /// [`MissingFieldAction::Skip`]. A tag already in the box is a `Conflict`.
    pub fn add_field_tag(
        &self,
        entry_id: i64,
        tag_id: i64,
        field_key: Option<&str>,
        on_missing: MissingFieldAction,
    ) -> LibraryResult<bool> {
        let key = field_key.unwrap_or(FieldId::Tags.key());

        self.storage()?.transaction(|tx| {
            let field_id = match entries::tag_box_id(tx, entry_id, key)? {
                Some(id) => id,
                None => match on_missing {
                    MissingFieldAction::Skip => return Ok(false),
                    MissingFieldAction::Raise => {
                        return Err(LibraryError::not_found(format!(
                            "field '{}' on entry {}",
                            key, entry_id
                        )))
                    }
                    MissingFieldAction::Create => {
                        if !entries::entry_exists(tx, entry_id)? {
                            return Err(LibraryError::not_found(format!("entry {}", entry_id)));
                        }
                        let value_type = entries::load_value_type(tx, key)?;
                        if value_type.kind != FieldKind::Tags {
                            return Err(LibraryError::invalid(format!(
                                "field '{}' is not a tag box",
                                key
                            )));
                        }
                        let field = instantiate_field(&value_type, FieldInput::None)?;
                        entries::insert_field(tx, entry_id, &field)?
                    }
                },
            };

            entries::link_tag(tx, field_id, tag_id)?;
            Ok(true)
        })
    }

    /// Take a tag out of an entry's tag box; `false` if the box is missing
    pub fn remove_field_tag(
        &self,
        entry_id: i64,
        tag_id: i64,
        field_key: Option<&str>,
    ) -> LibraryResult<bool> {
        let key = field_key.unwrap_or(FieldId::Tags.key());
        self.storage()?.transaction(|tx| {
            match entries::tag_box_id(tx, entry_id, key)? {
                Some(field_id) => {
                    entries::unlink_tag(tx, field_id, tag_id)?;
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    /// Remove one tag link by tag box id
    pub fn remove_tag_from_field(&self, tag_id: i64, field_id: i64) -> LibraryResult<()> {
        self.storage()?.transaction(|tx| {
            if entries::unlink_tag(tx, field_id, tag_id)? {
                Ok(())
            } else {
                Err(LibraryError::not_found(format!(
                    "tag {} on field {}",
                    tag_id, field_id
                )))
            }
        })
    }

    // ==================== Fields ====================

    /// Attach a new field to each entry, returning the new field ids
    pub fn add_entry_field(
        &self,
        entry_ids: &[i64],
        type_key: &str,
        value: FieldInput,
    ) -> LibraryResult<Vec<i64>> {
        self.storage()?.transaction(|tx| {
            let value_type = entries::load_value_type(tx, type_key)?;
            let table = entries::table_for(value_type.kind);

            let mut field_ids = Vec::with_capacity(entry_ids.len());
            for &entry_id in entry_ids {
                let field = instantiate_field(&value_type, value.clone())?;
                field_ids.push(entries::insert_field(tx, entry_id, &field)?);
                entries::renumber_positions(tx, table, entry_id, type_key)?;
            }
            Ok(field_ids)
        })
    }

    /// Delete the field at `field`'s (key, position) on every given entry
    pub fn remove_entry_field(&self, field: &Field, entry_ids: &[i64]) -> LibraryResult<usize> {
        self.storage()?.transaction(|tx| {
            entries::delete_fields_at(tx, field.table(), entry_ids, field.type_key(), field.position())
        })
    }

    /// Set the value of the field at `field`'s (key, position) on every given entry
    ///
    /// Tag boxes get their tag set reconciled rather than rewritten.
    pub fn update_entry_field(
        &self,
        entry_ids: &[i64],
        field: &Field,
        value: FieldInput,
    ) -> LibraryResult<usize> {
        self.storage()?.transaction(|tx| {
            let value_type = entries::load_value_type(tx, field.type_key())?;
            let new = instantiate_field(&value_type, value)?;
            let table = entries::table_for(value_type.kind);
            let targets =
                entries::fields_at(tx, table, entry_ids, field.type_key(), field.position())?;

            match &new.value {
                NewFieldValue::Tags { names, ids } => {
                    let desired = entries::resolve_tag_ids(tx, names, ids)?;
                    for field_id in &targets {
                        entries::reconcile_links(tx, *field_id, &desired)?;
                    }
                }
                other => {
                    for field_id in &targets {
                        entries::update_field_value(tx, table, *field_id, other)?;
                    }
                }
            }
            Ok(targets.len())
        })
    }

    /// Give every entry the field keys present on any of them
    ///
    /// Missing fields copy the value of the first entry holding that key.
    /// Returns the number of fields added.
    pub fn mirror_fields(&self, entry_ids: &[i64]) -> LibraryResult<usize> {
        self.storage()?.transaction(|tx| {
            let loaded = entries::load_entries(tx, entry_ids, true)?;

            let mut sources: BTreeMap<String, &Field> = BTreeMap::new();
            for entry in &loaded {
                for field in &entry.fields {
                    sources.entry(field.type_key().to_string()).or_insert(field);
                }
            }

            let mut added = 0;
            for entry in &loaded {
                for (key, source) in &sources {
                    if entry.field(key).is_some() {
                        continue;
                    }
                    let value_type = entries::load_value_type(tx, key)?;
                    let field = instantiate_field(&value_type, source.to_input())?;
                    entries::insert_field(tx, entry.id, &field)?;
                    added += 1;
                }
            }
            Ok(added)
        })
    }

    // ==================== Preferences ====================

    pub fn get_preference(&self, pref: LibraryPref) -> LibraryResult<serde_json::Value> {
        self.storage()?
            .with_connection(|conn| preferences::get(conn, pref.key()))
    }

    /// Every stored preference keyed by its storage key
    pub fn get_preferences(&self) -> LibraryResult<BTreeMap<String, serde_json::Value>> {
        let stored = self
            .storage()?
            .with_connection(|conn| preferences::all(conn))?;
        Ok(stored.into_iter().collect())
    }

    /// Store a preference after checking its JSON shape
    pub fn set_preference(&self, pref: LibraryPref, value: serde_json::Value) -> LibraryResult<()> {
        let valid = match pref {
            LibraryPref::IsExcludeList => value.is_boolean(),
            LibraryPref::ExtensionList => value
                .as_array()
                .is_some_and(|items| items.iter().all(|v| v.is_string())),
            LibraryPref::PageSize => value.as_u64().is_some_and(|n| n > 0),
        };
        if !valid {
            return Err(LibraryError::invalid(format!(
                "{} cannot be set to {}",
                pref.key(),
                value
            )));
        }

        self.storage()?
            .transaction(|tx| preferences::set(tx, pref.key(), &value))
    }

    /// Extension list and mode currently applied to searches
    pub fn extension_filter(&self) -> LibraryResult<ExtensionFilter> {
        self.storage()?.transaction(|tx| ExtensionFilter::load(tx))
    }

    // ==================== Search ====================

    pub fn search(&self, filter: &FilterState) -> LibraryResult<SearchResult> {
        self.storage()?
            .transaction(|tx| search::search(tx, filter))
    }
}

/// Anything SQLite rejects while opening means the storage file is unusable
fn unusable(error: LibraryError, path: &Path) -> LibraryError {
    match error {
        LibraryError::Database(e) => LibraryError::from_io(
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()),
            path,
        ),
        other => other,
    }
}

/// Returns a message when the stored schema is newer than this build
fn prepare_schema(storage: &Storage, options: OpenOptions) -> LibraryResult<Option<String>> {
    storage.with_connection(|conn| {
        if let Some(version) = get_schema_version(conn)? {
            if version > SCHEMA_VERSION {
                return Ok(Some(format!(
                    "library schema version {} is newer than supported version {}",
                    version, SCHEMA_VERSION
                )));
            }
        }

        if options.use_migrations {
            let applied = storage::migrate(conn)?;
            if applied > 0 {
                info!(applied, "applied schema migrations");
            }
        } else if storage::needs_init(conn) {
            storage::create_tables(conn)?;
        }
        Ok(None)
    })
}

/// Seed built-in tags, preferences and value types; rows already present are kept
fn bootstrap(storage: &Storage) -> LibraryResult<()> {
    storage.transaction(|tx| {
        let tag_seq: Option<i64> = tx
            .query_row(
                "SELECT seq FROM sqlite_sequence WHERE name = 'tags'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        if tag_seq.map_or(true, |seq| seq < RESERVED_TAG_END - 1) {
            // Bump AUTOINCREMENT past the reserved range
            debug!(?tag_seq, "reserving built-in tag ids");
            tx.execute(
                "INSERT INTO tags (id, name) VALUES (?, '__reserved__')",
                [RESERVED_TAG_END - 1],
            )?;
            tx.execute("DELETE FROM tags WHERE id = ?", [RESERVED_TAG_END - 1])?;
        }

        let builtin_tags = [
            (
                TAG_ARCHIVED,
                NewTag::new("Archived").with_color(TagColor::Red),
                vec!["Archive"],
            ),
            (
                TAG_FAVORITE,
                NewTag::new("Favorite").with_color(TagColor::Yellow),
                vec!["Favorited", "Favorites"],
            ),
        ];
        for (id, tag, aliases) in builtin_tags {
            match tags::insert_tag_with_id(tx, id, &tag) {
                Ok(()) => tags::update_aliases(tx, id, &AliasUpdate::names(aliases))?,
                Err(e) if e.is_conflict() => debug!(tag = %tag.name, "built-in tag already present"),
                Err(e) => return Err(e),
            }
        }

        for pref in LibraryPref::ALL {
            match preferences::insert(tx, pref.key(), &pref.default_value()) {
                Err(e) if e.is_conflict() => debug!(key = pref.key(), "preference already present"),
                other => other?,
            }
        }

        for field in FieldId::ALL {
            match entries::insert_value_type(tx, &field.value_type()) {
                Err(e) if e.is_conflict() => debug!(key = field.key(), "value type already present"),
                other => other?,
            }
        }
        Ok(())
    })
}

/// Lazy entry sequence from [`Library::get_entries`]
///
/// Ids are paged in batches, each loaded through its own connection.
pub struct EntryIter<'a> {
    storage: &'a Storage,
    with_fields: bool,
    last_id: i64,
    buffer: VecDeque<Entry>,
    done: bool,
}

impl EntryIter<'_> {
    fn fill(&mut self) -> LibraryResult<()> {
        let (last_id, with_fields) = (self.last_id, self.with_fields);
        let batch = self.storage.transaction(|tx| {
            let ids = entries::entry_ids_after(tx, last_id, ENTRY_BATCH)?;
            entries::load_entries(tx, &ids, with_fields)
        })?;

        match batch.last() {
            Some(last) => self.last_id = last.id,
            None => self.done = true,
        }
        self.buffer.extend(batch);
        Ok(())
    }
}

impl Iterator for EntryIter<'_> {
    type Item = LibraryResult<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.done {
            if let Err(e) = self.fill() {
                self.done = true;
                return Some(Err(e));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thumbnails::ThumbSize;
    use serde_json::json;
    use tempfile::TempDir;

    fn memory_library() -> (Library, i64) {
        let mut library = Library::new();
        assert!(library.open_in_memory().unwrap().success);
        let folder = library.add_folder(Path::new("/library")).unwrap();
        (library, folder.id)
    }

    fn add(library: &Library, folder_id: i64, path: &str) -> i64 {
        library.add_entries(&[EntryDraft::new(folder_id, path)]).unwrap()[0]
    }

    fn new_tag(library: &Library, name: &str) -> Tag {
        library.add_tag(&NewTag::new(name), None, None).unwrap()
    }

    fn count(library: &Library, table: &str) -> i64 {
        library
            .storage()
            .unwrap()
            .with_connection(|conn| {
                Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?)
            })
            .unwrap()
    }

    // ---- lifecycle ----

    #[test]
    fn test_open_creates_layout() {
        let temp_dir = TempDir::new().unwrap();
        let mut library = Library::new();

        let status = library.open(temp_dir.path()).unwrap();

        assert!(status.success);
        let data_dir = temp_dir.path().join(DATA_DIR);
        assert_eq!(status.storage_path, Some(data_dir.join(STORAGE_FILENAME)));
        assert!(data_dir.join(NOINDEX_MARKER).exists());
        assert_eq!(library.state(), LibraryState::Open);
    }

    #[test]
    fn test_reopen_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let mut library = Library::new();

        library.open(temp_dir.path()).unwrap();
        let tags_before = library.get_tags().unwrap();
        let types_before = library.field_types().unwrap();
        library.close();

        library
            .open_with(temp_dir.path(), OpenOptions { use_migrations: false })
            .unwrap();
        library.open(temp_dir.path()).unwrap();

        assert_eq!(library.get_tags().unwrap(), tags_before);
        assert_eq!(library.field_types().unwrap(), types_before);
        assert_eq!(tags_before.len(), 2);
        assert_eq!(types_before.len(), FieldId::ALL.len());
        assert_eq!(count(&library, "preferences"), LibraryPref::ALL.len() as i64);
    }

    #[test]
    fn test_builtin_tags_and_reserved_ids() {
        let (library, _) = memory_library();

        let archived = library.get_tag(TAG_ARCHIVED).unwrap().unwrap();
        assert_eq!(archived.name, "Archived");
        assert_eq!(archived.color, TagColor::Red);
        assert_eq!(archived.alias_names(), vec!["Archive"]);

        let favorite = library.get_tag(TAG_FAVORITE).unwrap().unwrap();
        assert_eq!(favorite.alias_names(), vec!["Favorited", "Favorites"]);

        assert!(new_tag(&library, "first").id >= RESERVED_TAG_END);
    }

    #[test]
    fn test_precreated_storage_still_reserves_ids() {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join(DATA_DIR);
        fs::create_dir_all(&data_dir).unwrap();
        fs::write(data_dir.join(STORAGE_FILENAME), b"").unwrap();

        let mut library = Library::new();
        assert!(library.open(temp_dir.path()).unwrap().success);

        assert!(new_tag(&library, "first").id >= RESERVED_TAG_END);
        assert!(data_dir.join(NOINDEX_MARKER).exists());
    }

    #[test]
    fn test_interrupted_first_open_heals_on_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join(DATA_DIR);
        fs::create_dir_all(&data_dir).unwrap();

        // Schema committed, bootstrap never ran
        let storage = Storage::open_file(data_dir.join(STORAGE_FILENAME)).unwrap();
        prepare_schema(&storage, OpenOptions::default()).unwrap();
        drop(storage);

        let mut library = Library::new();
        library.open(temp_dir.path()).unwrap();
        let first = new_tag(&library, "first").id;
        library.close();

        library.open(temp_dir.path()).unwrap();
        let second = new_tag(&library, "second").id;

        assert!(first >= RESERVED_TAG_END);
        assert_eq!(second, first + 1);
        assert_eq!(library.get_tags().unwrap().len(), 4);
    }

    #[test]
    fn test_newer_schema_is_refused() {
        let temp_dir = TempDir::new().unwrap();
        let mut library = Library::new();
        library.open(temp_dir.path()).unwrap();
        library
            .storage()
            .unwrap()
            .with_connection(|conn| {
                conn.execute("UPDATE schema_info SET value = '99' WHERE key = 'version'", [])?;
                Ok(())
            })
            .unwrap();
        library.close();

        let status = library.open(temp_dir.path()).unwrap();
        assert!(!status.success);
        assert!(status.message.unwrap().contains("99"));
        assert_eq!(library.state(), LibraryState::Closed);
    }

    #[test]
    fn test_corrupt_storage_is_io_failure() {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join(DATA_DIR);
        fs::create_dir_all(&data_dir).unwrap();
        fs::write(data_dir.join(STORAGE_FILENAME), b"definitely not sqlite at all").unwrap();

        let mut library = Library::new();
        let err = library.open(temp_dir.path()).unwrap_err();
        assert!(matches!(err, LibraryError::Io { .. }));
        assert!(!library.is_open());
    }

    #[test]
    fn test_close_is_safe_twice_and_blocks_calls() {
        let (mut library, _) = memory_library();
        library.close();
        library.close();

        assert_eq!(library.state(), LibraryState::Closed);
        assert!(matches!(library.entries_count(), Err(LibraryError::Closed)));
        assert!(library.library_dir().is_none());
    }

    #[test]
    fn test_save_backup() {
        let temp_dir = TempDir::new().unwrap();
        let mut library = Library::new();
        library.open(temp_dir.path()).unwrap();

        let backup = library.save_backup().unwrap();

        assert!(backup.exists());
        assert_eq!(
            backup.parent().unwrap(),
            temp_dir.path().join(DATA_DIR).join(BACKUP_FOLDER)
        );
        let name = backup.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("ts_library_backup_"));
        assert!(name.ends_with(".sqlite"));
        // "ts_library_backup_" + "YYYY_MM_DD_HHMMSS" + ".sqlite"
        assert_eq!(name.len(), 18 + 17 + 7);

        let (memory, _) = memory_library();
        assert!(memory.save_backup().is_err());
    }

    // ---- entries ----

    #[test]
    fn test_round_trip_through_search() {
        let (library, folder) = memory_library();
        let draft = EntryDraft::new(folder, "./docs\\notes.TXT")
            .with_field("AUTHOR", FieldInput::Text("Ada".into()))
            .with_field("TAGS", FieldInput::TagNames(vec!["draft".into()]));
        let id = library.add_entries(&[draft]).unwrap()[0];

        let stored = library.get_entry(id).unwrap().unwrap();
        let found = library.search(&FilterState::by_id(id)).unwrap();

        assert_eq!(found.total_count, 1);
        assert_eq!(found.items[0], stored);
        assert_eq!(stored.path, "docs/notes.TXT");
        assert_eq!(stored.suffix, "txt");

        // Defaults fill in around supplied fields
        let keys: Vec<&str> = stored.fields.iter().map(|f| f.type_key()).collect();
        assert_eq!(keys, vec!["TITLE", "AUTHOR", "TAGS", "TAGS_META"]);
        assert_eq!(stored.tags()[0].name, "draft");
    }

    #[test]
    fn test_add_entries_is_atomic() {
        let (library, folder) = memory_library();
        add(&library, folder, "taken.txt");

        let drafts = [
            EntryDraft::new(folder, "fresh.txt"),
            EntryDraft::new(folder, "taken.txt"),
        ];
        assert!(library.add_entries(&drafts).unwrap_err().is_conflict());

        assert_eq!(library.entries_count().unwrap(), 1);
        assert!(!library.has_path_entry("fresh.txt").unwrap());
    }

    #[test]
    fn test_entry_paths() {
        let (library, folder) = memory_library();
        let a = add(&library, folder, "a.txt");
        let b = add(&library, folder, "b.txt");

        library.update_entry_path(a, "moved/a.md").unwrap();
        assert_eq!(library.get_entry_by_path("moved/a.md").unwrap().unwrap().suffix, "md");
        assert!(library.update_entry_path(b, "moved/a.md").unwrap_err().is_conflict());
        assert_eq!(library.get_paths().unwrap(), vec!["moved/a.md", "b.txt"]);

        assert_eq!(library.remove_entries(&[a, 12345]).unwrap(), 1);
        assert_eq!(library.entries_count().unwrap(), 1);
    }

    #[test]
    fn test_get_entries_pages_through_everything() {
        let (library, folder) = memory_library();
        let drafts: Vec<EntryDraft> = (0..(ENTRY_BATCH * 2 + 5))
            .map(|i| EntryDraft::new(folder, format!("f{}.txt", i)))
            .collect();
        let ids = library.add_entries(&drafts).unwrap();

        let walked: Vec<i64> = library
            .get_entries(false)
            .unwrap()
            .map(|e| e.unwrap().id)
            .collect();
        assert_eq!(walked, ids);

        let first = library.get_entries(true).unwrap().next().unwrap().unwrap();
        assert!(!first.fields.is_empty());
    }

    #[test]
    fn test_remove_folder_cascades_and_drops_thumbnails() {
        let temp_dir = TempDir::new().unwrap();
        let mut library = Library::new();
        library.open(temp_dir.path()).unwrap();
        let folder = library.add_folder(temp_dir.path()).unwrap();
        let id = add(&library, folder.id, "a.png");

        let thumb = library
            .thumbnail_cache()
            .unwrap()
            .thumbnail_path(folder.id, id, ThumbSize::Medium);
        fs::create_dir_all(thumb.parent().unwrap()).unwrap();
        fs::write(&thumb, b"png").unwrap();

        library.remove_folder(folder.id).unwrap();

        assert_eq!(library.entries_count().unwrap(), 0);
        assert!(!thumb.exists());
        assert!(library.get_folder(folder.id).unwrap().is_none());
        assert!(library.remove_folder(folder.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_duplicate_folder_is_conflict() {
        let (library, _) = memory_library();
        let err = library.add_folder(Path::new("/library")).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(library.get_folders().unwrap().len(), 1);
    }

    // ---- tags ----

    #[test]
    fn test_add_tag_conflict_rolls_back_everything() {
        let (library, _) = memory_library();
        let child = new_tag(&library, "child");
        new_tag(&library, "taken");

        let err = library
            .add_tag(
                &NewTag::new("taken"),
                Some(&BTreeSet::from([child.id])),
                Some(&AliasUpdate::names(["alt"])),
            )
            .unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(count(&library, "tag_subtags"), 0);
        assert!(library.search_tags("alt", 10).unwrap().is_empty());
    }

    #[test]
    fn test_update_tag() {
        let (library, _) = memory_library();
        let a = new_tag(&library, "a");
        let b = new_tag(&library, "b");
        let mut tag = library
            .add_tag(
                &NewTag::new("parent"),
                Some(&BTreeSet::from([a.id])),
                Some(&AliasUpdate::names(["p"])),
            )
            .unwrap();

        tag.name = "renamed".into();
        tag.color = TagColor::Teal;
        let updated = library
            .update_tag(
                &tag,
                Some(&BTreeSet::from([b.id, tag.id])),
                Some(&AliasUpdate::keep(&tag.aliases)),
            )
            .unwrap();

        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.color, TagColor::Teal);
        assert_eq!(updated.subtag_ids, BTreeSet::from([b.id]));
        assert_eq!(updated.aliases, tag.aliases);
        assert_eq!(
            library.get_alias(tag.id, tag.aliases[0].id).unwrap().unwrap().name,
            "p"
        );

        tag.id = 5;
        assert!(library.update_tag(&tag, None, None).unwrap_err().is_not_found());
    }

    #[test]
    fn test_cycle_is_traversed_once() {
        let (library, _) = memory_library();
        let a = new_tag(&library, "A").id;
        let b = new_tag(&library, "B").id;
        let c = new_tag(&library, "C").id;
        library.add_subtag(a, b).unwrap();
        library.add_subtag(b, c).unwrap();
        library.add_subtag(c, a).unwrap();

        assert_eq!(library.get_all_descendant_ids(a).unwrap(), BTreeSet::from([a, b, c]));
        assert!(!library.add_subtag(a, a).unwrap());
        assert!(library.add_subtag(a, b).unwrap_err().is_conflict());
    }

    #[test]
    fn test_child_tag_satisfies_parent_query() {
        let (library, folder) = memory_library();
        let animal = new_tag(&library, "animal");
        let dog = new_tag(&library, "dog");
        library.add_subtag(animal.id, dog.id).unwrap();

        let tagged = add(&library, folder, "rex.jpg");
        add(&library, folder, "untagged.jpg");
        library
            .add_field_tag(tagged, dog.id, None, MissingFieldAction::Raise)
            .unwrap();

        let found = library.search(&FilterState::by_tag("animal")).unwrap();
        assert_eq!(found.ids(), vec![tagged]);
    }

    #[test]
    fn test_archived_scenario() {
        let (library, folder) = memory_library();
        let id = add(&library, folder, "foo.txt");

        library.set_preference(LibraryPref::ExtensionList, json!([])).unwrap();
        assert!(library
            .add_field_tag(id, TAG_ARCHIVED, None, MissingFieldAction::Skip)
            .unwrap());

        let found = library.search(&FilterState::by_tag_id(TAG_ARCHIVED)).unwrap();
        assert_eq!(found.ids(), vec![id]);
        assert!(found.items[0].is_archived());

        assert!(library.remove_field_tag(id, TAG_ARCHIVED, None).unwrap());
        let found = library.search(&FilterState::by_tag_id(TAG_ARCHIVED)).unwrap();
        assert_eq!(found.total_count, 0);
    }

    #[test]
    fn test_add_field_tag_missing_field_modes() {
        let (library, folder) = memory_library();
        let id = add(&library, folder, "a.txt");
        let key = Some("TAGS_CONTENT");

        assert!(!library
            .add_field_tag(id, TAG_FAVORITE, key, MissingFieldAction::Skip)
            .unwrap());
        assert!(library
            .add_field_tag(id, TAG_FAVORITE, key, MissingFieldAction::Raise)
            .unwrap_err()
            .is_not_found());
        assert!(library
            .add_field_tag(id, TAG_FAVORITE, key, MissingFieldAction::Create)
            .unwrap());
        assert!(library
            .add_field_tag(id, TAG_FAVORITE, key, MissingFieldAction::Create)
            .unwrap_err()
            .is_conflict());

        let err = library
            .add_field_tag(id, TAG_FAVORITE, Some("AUTHOR"), MissingFieldAction::Create)
            .unwrap_err();
        assert!(matches!(err, LibraryError::InvalidArgument(_)));

        assert!(!library.remove_field_tag(id, TAG_FAVORITE, Some("COMPOSER")).unwrap());
    }

    #[test]
    fn test_remove_tag_from_field() {
        let (library, folder) = memory_library();
        let id = add(&library, folder, "a.txt");
        library
            .add_field_tag(id, TAG_FAVORITE, None, MissingFieldAction::Raise)
            .unwrap();
        let field_id = library.get_entry(id).unwrap().unwrap().field("TAGS").unwrap().id();

        library.remove_tag_from_field(TAG_FAVORITE, field_id).unwrap();
        assert!(library
            .remove_tag_from_field(TAG_FAVORITE, field_id)
            .unwrap_err()
            .is_not_found());
    }

    // ---- fields ----

    #[test]
    fn test_add_entry_field_renumbers() {
        let (library, folder) = memory_library();
        let a = add(&library, folder, "a.txt");
        let b = add(&library, folder, "b.txt");

        library
            .add_entry_field(&[a, b], "AUTHOR", FieldInput::Text("one".into()))
            .unwrap();
        library
            .add_entry_field(&[a, b], "AUTHOR", FieldInput::Text("two".into()))
            .unwrap();

        let entry = library.get_entry(b).unwrap().unwrap();
        let authors: Vec<i64> = entry
            .fields
            .iter()
            .filter(|f| f.type_key() == "AUTHOR")
            .map(|f| f.position())
            .collect();
        assert_eq!(authors, vec![0, 1]);

        let err = library
            .add_entry_field(&[a], "NOT_A_FIELD", FieldInput::None)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_remove_entry_field_is_a_column_operation() {
        let (library, folder) = memory_library();
        let a = add(&library, folder, "a.txt");
        let b = add(&library, folder, "b.txt");
        let c = add(&library, folder, "c.txt");

        let title = library.get_entry(a).unwrap().unwrap().field("TITLE").unwrap().clone();
        assert_eq!(library.remove_entry_field(&title, &[a, b]).unwrap(), 2);

        assert!(library.get_entry(a).unwrap().unwrap().field("TITLE").is_none());
        assert!(library.get_entry(b).unwrap().unwrap().field("TITLE").is_none());
        assert!(library.get_entry(c).unwrap().unwrap().field("TITLE").is_some());
    }

    #[test]
    fn test_update_entry_field() {
        let (library, folder) = memory_library();
        let a = add(&library, folder, "a.txt");
        let b = add(&library, folder, "b.txt");
        let entry = library.get_entry(a).unwrap().unwrap();

        let title = entry.field("TITLE").unwrap();
        let updated = library
            .update_entry_field(&[a, b], title, FieldInput::Text("Same".into()))
            .unwrap();
        assert_eq!(updated, 2);

        let tags = entry.field("TAGS").unwrap();
        library
            .update_entry_field(&[a], tags, FieldInput::TagNames(vec!["x".into(), "y".into()]))
            .unwrap();
        library
            .update_entry_field(&[a], tags, FieldInput::TagNames(vec!["y".into()]))
            .unwrap();

        let entry = library.get_entry(a).unwrap().unwrap();
        match entry.field("TITLE").unwrap() {
            Field::Text(f) => assert_eq!(f.value.as_deref(), Some("Same")),
            other => panic!("unexpected {:?}", other),
        }
        let names: Vec<&str> = entry.tags().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["y"]);

        let err = library
            .update_entry_field(&[a], title, FieldInput::Boolean(true))
            .unwrap_err();
        assert!(matches!(err, LibraryError::InvalidArgument(_)));
    }

    #[test]
    fn test_mirror_fields() {
        let (library, folder) = memory_library();
        let e1 = library
            .add_entries(&[EntryDraft::new(folder, "e1.txt")
                .with_field("DESCRIPTION", FieldInput::Text("shared".into()))])
            .unwrap()[0];
        let e2 = add(&library, folder, "e2.txt");
        let before = library.get_entry(e1).unwrap().unwrap();

        assert_eq!(library.mirror_fields(&[e1, e2]).unwrap(), 1);

        let after = library.get_entry(e2).unwrap().unwrap();
        match after.field("DESCRIPTION").unwrap() {
            Field::Text(f) => assert_eq!(f.value.as_deref(), Some("shared")),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(library.get_entry(e1).unwrap().unwrap(), before);
        assert_eq!(library.mirror_fields(&[e1, e2]).unwrap(), 0);
    }

    #[test]
    fn test_value_type_registry() {
        let (library, _) = memory_library();
        let defaults: Vec<String> = library
            .default_fields()
            .unwrap()
            .into_iter()
            .map(|vt| vt.key)
            .collect();
        assert_eq!(defaults, vec!["TITLE", "TAGS", "TAGS_META"]);

        let rating = ValueType {
            key: "RATING".into(),
            name: "Rating".into(),
            kind: FieldKind::TextLine,
            position: 31,
            is_default: false,
        };
        library.add_value_type(&rating).unwrap();
        assert_eq!(library.get_value_type("RATING").unwrap(), rating);
        assert!(library.add_value_type(&rating).unwrap_err().is_conflict());
    }

    // ---- preferences / search ----

    #[test]
    fn test_preferences_and_extension_modes() {
        let (library, folder) = memory_library();
        let txt = add(&library, folder, "a.txt");
        let jpg = add(&library, folder, "b.jpg");

        assert_eq!(library.get_preference(LibraryPref::PageSize).unwrap(), json!(500));

        library.set_preference(LibraryPref::IsExcludeList, json!(false)).unwrap();
        library.set_preference(LibraryPref::ExtensionList, json!([".txt"])).unwrap();
        assert_eq!(library.search(&FilterState::default()).unwrap().ids(), vec![txt]);

        library.set_preference(LibraryPref::IsExcludeList, json!(true)).unwrap();
        assert_eq!(library.search(&FilterState::default()).unwrap().ids(), vec![jpg]);

        let err = library
            .set_preference(LibraryPref::PageSize, json!("lots"))
            .unwrap_err();
        assert!(matches!(err, LibraryError::InvalidArgument(_)));
    }

    #[test]
    fn test_get_preferences_lists_every_key() {
        let (library, _) = memory_library();
        library.set_preference(LibraryPref::PageSize, json!(25)).unwrap();

        let prefs = library.get_preferences().unwrap();
        let keys: Vec<&str> = prefs.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["EXTENSION_LIST", "IS_EXCLUDE_LIST", "PAGE_SIZE"]);
        assert_eq!(prefs["PAGE_SIZE"], json!(25));
    }

    #[test]
    fn test_default_extension_list_hides_sidecars() {
        let (library, folder) = memory_library();
        let photo = add(&library, folder, "IMG_1.jpg");
        add(&library, folder, "IMG_1.xmp");

        let filter = library.extension_filter().unwrap();
        assert!(filter.exclude);
        assert!(filter.extensions.contains("xmp"));
        assert_eq!(library.search(&FilterState::default()).unwrap().ids(), vec![photo]);
    }
}
