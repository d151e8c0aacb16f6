//! Long-running library walks as lazy progress sequences
//!
//! Each sequence yields one [`ScanProgress`] tick per item and does its
//! work between ticks. Dropping a sequence early cancels it; anything it
//! already committed stays committed.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{LibraryError, LibraryResult};
use crate::fields::{instantiate_field, FieldInput, ValueType};
use crate::library::{EntryIter, Library, DATA_DIR, NOINDEX_MARKER};
use crate::models::{normalize_path, EntryDraft};
use crate::storage::{entries, Storage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanProgress {
    /// Items handled so far
    pub done: usize,
    /// Items expected, when known up front
    pub total: Option<usize>,
    /// Items that matched so far (new files, missing files, entries fixed)
    pub found: usize,
}

/// Files below a folder that are not in the library yet
pub struct RefreshDir {
    folder_id: i64,
    root: PathBuf,
    walker: walkdir::FilterEntry<walkdir::IntoIter, fn(&walkdir::DirEntry) -> bool>,
    known: HashSet<String>,
    new_files: Vec<String>,
    done: usize,
}

fn is_indexable(entry: &walkdir::DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return true;
    }
    if entry.depth() > 0 && entry.file_name() == DATA_DIR {
        return false;
    }
    !entry.path().join(NOINDEX_MARKER).exists()
}

impl RefreshDir {
    pub fn folder_id(&self) -> i64 {
        self.folder_id
    }

    /// Relative paths found so far
    pub fn new_files(&self) -> &[String] {
        &self.new_files
    }

    pub fn into_new_files(self) -> Vec<String> {
        self.new_files
    }
}

impl Iterator for RefreshDir {
    type Item = ScanProgress;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable path");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            self.done += 1;
            if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                let relative = normalize_path(relative);
                if !self.known.contains(&relative) {
                    self.known.insert(relative.clone());
                    self.new_files.push(relative);
                }
            }

            return Some(ScanProgress {
                done: self.done,
                total: None,
                found: self.new_files.len(),
            });
        }
    }
}

/// Entries whose file no longer exists on disk
pub struct MissingFiles<'a> {
    entries: EntryIter<'a>,
    folders: BTreeMap<i64, PathBuf>,
    missing: Vec<i64>,
    done: usize,
    total: usize,
}

impl MissingFiles<'_> {
    pub fn missing(&self) -> &[i64] {
        &self.missing
    }

    pub fn into_missing(self) -> Vec<i64> {
        self.missing
    }
}

impl Iterator for MissingFiles<'_> {
    type Item = LibraryResult<ScanProgress>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = match self.entries.next()? {
            Ok(entry) => entry,
            Err(e) => return Some(Err(e)),
        };

        self.done += 1;
        let exists = self
            .folders
            .get(&entry.folder_id)
            .map(|root| root.join(&entry.path).exists())
            .unwrap_or(false);
        if !exists {
            debug!(entry_id = entry.id, path = %entry.path, "file missing");
            self.missing.push(entry.id);
        }

        Some(Ok(ScanProgress {
            done: self.done,
            total: Some(self.total),
            found: self.missing.len(),
        }))
    }
}

/// Adds any missing default fields to each entry, one transaction per entry
pub struct DefaultFieldsBootstrap<'a> {
    storage: &'a Storage,
    entries: EntryIter<'a>,
    defaults: Vec<ValueType>,
    done: usize,
    fixed: usize,
    total: usize,
}

impl DefaultFieldsBootstrap<'_> {
    fn fill_entry(&self, entry_id: i64) -> LibraryResult<bool> {
        self.storage.transaction(|tx| {
            let present = entries::field_keys(tx, entry_id)?;
            let mut added = false;
            for value_type in &self.defaults {
                if present.contains(&value_type.key) {
                    continue;
                }
                let field = instantiate_field(value_type, FieldInput::None)?;
                entries::insert_field(tx, entry_id, &field)?;
                added = true;
            }
            Ok(added)
        })
    }
}

impl Iterator for DefaultFieldsBootstrap<'_> {
    type Item = LibraryResult<ScanProgress>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = match self.entries.next()? {
            Ok(entry) => entry,
            Err(e) => return Some(Err(e)),
        };

        match self.fill_entry(entry.id) {
            Ok(true) => self.fixed += 1,
            Ok(false) => {}
            Err(e) => return Some(Err(e)),
        }
        self.done += 1;

        Some(Ok(ScanProgress {
            done: self.done,
            total: Some(self.total),
            found: self.fixed,
        }))
    }
}

impl Library {
    /// Walk a folder on disk looking for files not yet cataloged
    pub fn refresh_dir(&self, folder_id: i64) -> LibraryResult<RefreshDir> {
        let folder = self
            .get_folder(folder_id)?
            .ok_or_else(|| LibraryError::not_found(format!("folder {}", folder_id)))?;
        let known: HashSet<String> = self.get_paths()?.into_iter().collect();
        let root = PathBuf::from(&folder.path);

        let filter: fn(&walkdir::DirEntry) -> bool = is_indexable;
        let walker = WalkDir::new(&root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(filter);

        Ok(RefreshDir {
            folder_id,
            root,
            walker,
            known,
            new_files: Vec::new(),
            done: 0,
        })
    }

    /// Register paths found by [`RefreshDir`] as entries of a folder
    pub fn add_new_files(&self, folder_id: i64, paths: &[String]) -> LibraryResult<Vec<i64>> {
        let drafts: Vec<EntryDraft> = paths
            .iter()
            .map(|p| EntryDraft::new(folder_id, Path::new(p)))
            .collect();
        let ids = self.add_entries(&drafts)?;
        debug!(folder_id, added = ids.len(), "added new files");
        Ok(ids)
    }

    /// Check every entry against the file system
    pub fn scan_missing(&self) -> LibraryResult<MissingFiles<'_>> {
        let folders = self
            .get_folders()?
            .into_iter()
            .map(|f| (f.id, PathBuf::from(f.path)))
            .collect();

        Ok(MissingFiles {
            total: self.entries_count()?,
            entries: self.get_entries(false)?,
            folders,
            missing: Vec::new(),
            done: 0,
        })
    }

    pub fn remove_missing(&self, entry_ids: &[i64]) -> LibraryResult<usize> {
        let removed = self.remove_entries(entry_ids)?;
        debug!(removed, "removed missing entries");
        Ok(removed)
    }

    /// Give every entry the default fields it lacks
    pub fn bootstrap_default_fields(&self) -> LibraryResult<DefaultFieldsBootstrap<'_>> {
        Ok(DefaultFieldsBootstrap {
            storage: self.storage()?,
            defaults: self.default_fields()?,
            total: self.entries_count()?,
            entries: self.get_entries(false)?,
            done: 0,
            fixed: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldId;
    use std::fs::{self, File};
    use tempfile::TempDir;

    fn open(temp_dir: &TempDir) -> (Library, i64) {
        let mut library = Library::new();
        library.open(temp_dir.path()).unwrap();
        let folder = library.add_folder(temp_dir.path()).unwrap();
        (library, folder.id)
    }

    #[test]
    fn test_refresh_finds_only_new_files() {
        let temp_dir = TempDir::new().unwrap();
        let (library, folder) = open(&temp_dir);

        File::create(temp_dir.path().join("a.jpg")).unwrap();
        fs::create_dir(temp_dir.path().join("sub")).unwrap();
        File::create(temp_dir.path().join("sub/b.png")).unwrap();
        fs::create_dir(temp_dir.path().join("hidden")).unwrap();
        File::create(temp_dir.path().join("hidden").join(NOINDEX_MARKER)).unwrap();
        File::create(temp_dir.path().join("hidden/c.png")).unwrap();

        library.add_entries(&[EntryDraft::new(folder, "a.jpg")]).unwrap();

        let mut refresh = library.refresh_dir(folder).unwrap();
        let ticks: Vec<ScanProgress> = refresh.by_ref().collect();

        // a.jpg and sub/b.png are visited; the library's own files are not
        assert_eq!(ticks.len(), 2);
        assert_eq!(refresh.new_files(), ["sub/b.png".to_string()]);

        let ids = library.add_new_files(folder, &refresh.into_new_files()).unwrap();
        assert_eq!(ids.len(), 1);
        assert!(library.has_path_entry("sub/b.png").unwrap());
    }

    #[test]
    fn test_missing_files() {
        let temp_dir = TempDir::new().unwrap();
        let (library, folder) = open(&temp_dir);
        File::create(temp_dir.path().join("here.txt")).unwrap();

        let ids = library
            .add_entries(&[
                EntryDraft::new(folder, "here.txt"),
                EntryDraft::new(folder, "gone.txt"),
            ])
            .unwrap();

        let mut scan = library.scan_missing().unwrap();
        let last = scan.by_ref().last().unwrap().unwrap();
        assert_eq!(last, ScanProgress { done: 2, total: Some(2), found: 1 });
        assert_eq!(scan.missing(), [ids[1]]);

        let missing = scan.into_missing();
        assert_eq!(library.remove_missing(&missing).unwrap(), 1);
        assert_eq!(library.get_paths().unwrap(), vec!["here.txt"]);
    }

    #[test]
    fn test_default_field_bootstrap_resumes_after_cancel() {
        let mut library = Library::new();
        library.open_in_memory().unwrap();
        let folder = library.add_folder(Path::new("/lib")).unwrap().id;
        let drafts: Vec<EntryDraft> = (0..4)
            .map(|i| EntryDraft::new(folder, format!("{}.txt", i)))
            .collect();
        let ids = library.add_entries(&drafts).unwrap();

        // Strip the defaults back off every entry
        for field in library.get_entry(ids[0]).unwrap().unwrap().fields {
            library.remove_entry_field(&field, &ids).unwrap();
        }

        // Cancel after two entries
        let first: Vec<ScanProgress> = library
            .bootstrap_default_fields()
            .unwrap()
            .take(2)
            .map(|p| p.unwrap())
            .collect();
        assert_eq!(first.last().unwrap().found, 2);
        assert!(library.get_entry(ids[1]).unwrap().unwrap().field("TITLE").is_some());
        assert!(library.get_entry(ids[2]).unwrap().unwrap().field("TITLE").is_none());

        let rest: Vec<ScanProgress> = library
            .bootstrap_default_fields()
            .unwrap()
            .map(|p| p.unwrap())
            .collect();
        assert_eq!(rest.len(), 4);
        assert_eq!(rest.last().unwrap().found, 2);

        let entry = library.get_entry(ids[3]).unwrap().unwrap();
        for field in [FieldId::Title, FieldId::Tags, FieldId::TagsMeta] {
            assert!(entry.field(field.key()).is_some());
        }
    }
}
