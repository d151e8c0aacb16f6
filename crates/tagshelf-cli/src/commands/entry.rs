//! Entry command handlers

use anyhow::{Context, Result};

use tagshelf_core::{EntryDraft, FieldId, FieldInput, Library};

use super::require_entry;
use crate::output::Output;
use crate::prompt::confirm;

/// Add one entry by relative path
pub fn add(
    library: &Library,
    folder_id: i64,
    path: String,
    title: Option<String>,
    output: &Output,
) -> Result<()> {
    let mut draft = EntryDraft::new(folder_id, &path);
    if let Some(title) = title {
        draft = draft.with_field(FieldId::Title.key(), FieldInput::Text(title));
    }

    let ids = library
        .add_entries(&[draft])
        .context("Failed to add entry")?;
    let entry = require_entry(library, ids[0])?;

    output.success(&format!("Added entry: {}", entry.id));
    output.print_entry(&entry);
    Ok(())
}

pub fn show(library: &Library, entry_id: i64, output: &Output) -> Result<()> {
    let entry = require_entry(library, entry_id)?;
    output.print_entry(&entry);
    Ok(())
}

/// Show the entry stored under a relative path
pub fn find(library: &Library, path: String, output: &Output) -> Result<()> {
    let entry = library
        .get_entry_by_path(&path)?
        .ok_or_else(|| anyhow::anyhow!("No entry for path: {}", path))?;
    output.print_entry(&entry);
    Ok(())
}

/// Point an entry at a new relative path
pub fn rename(library: &Library, entry_id: i64, path: String, output: &Output) -> Result<()> {
    library
        .update_entry_path(entry_id, &path)
        .context("Failed to move entry")?;
    output.success(&format!("Entry {} now at {}", entry_id, path));
    Ok(())
}

pub fn remove(library: &Library, entry_ids: Vec<i64>, output: &Output) -> Result<()> {
    if output.should_prompt() {
        println!("Remove {} entry(s) from the library.", entry_ids.len());
        println!("Files on disk are not touched.");
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let removed = library
        .remove_entries(&entry_ids)
        .context("Failed to remove entries")?;
    output.success(&format!("Removed {} entry(s)", removed));
    Ok(())
}

/// List entries in id order
pub fn list(library: &Library, limit: usize, offset: usize, output: &Output) -> Result<()> {
    let entries = library
        .get_entries(true)?
        .skip(offset)
        .take(limit)
        .collect::<Result<Vec<_>, _>>()?;
    output.print_entries(&entries);
    Ok(())
}
