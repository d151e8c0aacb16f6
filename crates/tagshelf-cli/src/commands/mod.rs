//! Command handlers

pub mod config;
pub mod entry;
pub mod field;
pub mod folder;
pub mod library;
pub mod pref;
pub mod search;
pub mod tag;

use anyhow::{bail, Result};

use tagshelf_core::{Entry, Library, Tag};

/// Largest limit SQLite accepts for tag lookups
const NO_LIMIT: usize = usize::MAX >> 1;

/// Resolve a tag given by id or by exact name, shorthand or alias
pub fn resolve_tag(library: &Library, reference: &str) -> Result<Tag> {
    // Numeric names like "2024" still resolve when no tag has that id
    if let Ok(id) = reference.parse::<i64>() {
        if let Some(tag) = library.get_tag(id)? {
            return Ok(tag);
        }
    }

    let mut matches: Vec<Tag> = library
        .search_tags(reference, NO_LIMIT)?
        .into_iter()
        .filter(|t| t.matches_exact(reference))
        .collect();

    match matches.len() {
        0 => bail!("No tag found matching: {}", reference),
        1 => Ok(matches.remove(0)),
        _ => {
            eprintln!("Multiple tags match '{}':", reference);
            for tag in &matches {
                eprintln!("  {} - {}", tag.id, tag.name);
            }
            bail!("Ambiguous tag. Use the tag id instead.");
        }
    }
}

/// Load an entry with its fields or fail with a readable message
pub fn require_entry(library: &Library, entry_id: i64) -> Result<Entry> {
    library
        .get_entry(entry_id)?
        .ok_or_else(|| anyhow::anyhow!("Entry not found: {}", entry_id))
}
