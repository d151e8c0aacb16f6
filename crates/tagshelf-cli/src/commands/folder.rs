//! Folder command handlers

use std::path::PathBuf;

use anyhow::{Context, Result};

use tagshelf_core::Library;

use crate::output::Output;
use crate::prompt::confirm;

/// Register a directory as a library folder
pub fn add(library: &Library, path: PathBuf, output: &Output) -> Result<()> {
    let path = path
        .canonicalize()
        .with_context(|| format!("Folder not accessible: {}", path.display()))?;
    let folder = library.add_folder(&path).context("Failed to add folder")?;

    if output.is_quiet() {
        println!("{}", folder.id);
    } else {
        output.success(&format!("Added folder {}: {}", folder.id, folder.path));
    }
    Ok(())
}

pub fn list(library: &Library, output: &Output) -> Result<()> {
    let folders = library.get_folders()?;
    output.print_folders(&folders);
    Ok(())
}

/// Remove a folder together with its entries and thumbnails
pub fn remove(library: &Library, folder_id: i64, output: &Output) -> Result<()> {
    let folder = library
        .get_folder(folder_id)?
        .ok_or_else(|| anyhow::anyhow!("Folder not found: {}", folder_id))?;

    if output.should_prompt() {
        println!("Remove folder: {} - {}", folder.id, folder.path);
        println!("Every entry in this folder is removed from the library.");
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    library
        .remove_folder(folder_id)
        .context("Failed to remove folder")?;
    output.success(&format!("Removed folder: {}", folder.path));
    Ok(())
}

/// Walk folders for new files and add them as entries
pub fn scan(library: &Library, folder_id: Option<i64>, output: &Output) -> Result<()> {
    let folder_ids: Vec<i64> = match folder_id {
        Some(id) => vec![id],
        None => library.get_folders()?.into_iter().map(|f| f.id).collect(),
    };

    let mut added = 0;
    for id in folder_ids {
        let mut refresh = library.refresh_dir(id)?;
        let last = refresh.by_ref().last();
        if let Some(progress) = last {
            output.print_progress(&format!("Folder {}", id), &progress);
        }
        let ids = library.add_new_files(id, &refresh.into_new_files())?;
        added += ids.len();
    }

    output.success(&format!("Added {} new entry(s)", added));
    Ok(())
}

/// Find entries whose files are gone, optionally removing them
pub fn missing(library: &Library, remove: bool, output: &Output) -> Result<()> {
    let mut scan = library.scan_missing()?;
    let mut last = None;
    for progress in scan.by_ref() {
        last = Some(progress?);
    }
    if let Some(progress) = last {
        output.print_progress("Missing files", &progress);
    }

    let missing = scan.into_missing();
    if !remove {
        if output.is_quiet() {
            for id in &missing {
                println!("{}", id);
            }
        } else if !missing.is_empty() {
            output.message(&format!(
                "{} entry(s) missing. Run with --remove to drop them.",
                missing.len()
            ));
        }
        return Ok(());
    }

    let removed = library.remove_missing(&missing)?;
    output.success(&format!("Removed {} missing entry(s)", removed));
    Ok(())
}
