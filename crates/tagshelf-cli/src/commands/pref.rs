//! Library preference command handlers

use anyhow::{bail, Context, Result};

use tagshelf_core::{Library, LibraryPref};

use crate::output::{Output, OutputFormat};

fn parse_pref(key: &str) -> Result<LibraryPref> {
    match LibraryPref::from_key(key) {
        Some(pref) => Ok(pref),
        None => {
            let valid: Vec<&str> = LibraryPref::ALL.iter().map(|p| p.key()).collect();
            bail!(
                "Unknown preference: '{}'\nValid keys: {}",
                key,
                valid.join(", ")
            );
        }
    }
}

/// Show one preference, or all of them
pub fn get(library: &Library, key: Option<String>, output: &Output) -> Result<()> {
    let mut values = serde_json::Map::new();
    match key {
        Some(key) => {
            let pref = parse_pref(&key)?;
            values.insert(pref.key().to_string(), library.get_preference(pref)?);
        }
        None => values.extend(library.get_preferences()?),
    }

    match output.format {
        OutputFormat::Json => output.json(&values),
        OutputFormat::Quiet => {
            for value in values.values() {
                println!("{}", value);
            }
        }
        OutputFormat::Human => {
            for (key, value) in &values {
                println!("  {:<16} {}", key, value);
            }
        }
    }
    Ok(())
}

/// Set a preference from a JSON literal such as `true`, `500` or `[".txt"]`
pub fn set(library: &Library, key: String, value: String, output: &Output) -> Result<()> {
    let pref = parse_pref(&key)?;
    let json: serde_json::Value = serde_json::from_str(&value)
        .with_context(|| format!("Value for {} must be JSON, got: {}", pref.key(), value))?;

    library
        .set_preference(pref, json)
        .context("Failed to set preference")?;
    output.success(&format!("Set {} = {}", pref.key(), value));
    Ok(())
}
