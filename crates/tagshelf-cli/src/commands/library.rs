//! Library lifecycle command handlers

use anyhow::{Context, Result};

use tagshelf_core::{Library, LibraryStatus};

use crate::output::{Output, OutputFormat};

/// Report the result of opening a library
pub fn open(library: &Library, status: &LibraryStatus, output: &Output) -> Result<()> {
    match output.format {
        OutputFormat::Json => output.json(status),
        OutputFormat::Quiet => {
            if let Some(path) = &status.storage_path {
                println!("{}", path.display());
            }
        }
        OutputFormat::Human => {
            let dir = library
                .library_dir()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            println!("✓ Opened library: {}", dir);
            if let Some(message) = &status.message {
                println!("  {}", message);
            }
        }
    }
    Ok(())
}

/// Show library location and contents
pub fn status(library: &Library, output: &Output) -> Result<()> {
    let folders = library.get_folders()?;
    let entries = library.entries_count()?;
    let tags = library.get_tags()?.len();
    let storage = library
        .storage_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(in memory)".to_string());
    let root = library
        .library_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "library_dir": root,
                    "storage_path": storage,
                    "counts": {
                        "folders": folders.len(),
                        "entries": entries,
                        "tags": tags
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", root);
        }
        OutputFormat::Human => {
            println!("TagShelf Status");
            println!("===============");
            println!();
            println!("Library:");
            println!("  Location: {}", root);
            println!("  Storage:  {}", storage);
            println!();
            println!("Contents:");
            println!("  Folders: {}", folders.len());
            println!("  Entries: {}", entries);
            println!("  Tags:    {}", tags);
        }
    }

    Ok(())
}

/// Copy the storage file into the backups directory
pub fn backup(library: &Library, output: &Output) -> Result<()> {
    let path = library.save_backup().context("Failed to save backup")?;

    if output.is_quiet() {
        println!("{}", path.display());
    } else {
        output.success(&format!("Saved backup: {}", path.display()));
    }
    Ok(())
}
