//! Config command handlers

use anyhow::{bail, Context, Result};

use tagshelf_core::Config;

use crate::output::{Output, OutputFormat};

fn display_path(path: Option<&std::path::Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "(not set)".to_string())
}

/// Show current configuration
pub fn show(output: &Output) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => output.json(&config),
        OutputFormat::Quiet => {
            println!("{}", display_path(config.last_library.as_deref()));
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!(
                "  last_library:      {}",
                display_path(config.last_library.as_deref())
            );
            println!("  open_last_library: {}", config.open_last_library);
            println!("  use_migrations:    {}", config.use_migrations);
            println!("  page_size:         {}", config.page_size);
            println!(
                "  log_file:          {}",
                display_path(config.log_file.as_deref())
            );
            if !config.recent_libraries.is_empty() {
                println!();
                println!("Recent libraries:");
                for path in &config.recent_libraries {
                    println!("  {}", path.display());
                }
            }
            println!();
            println!("Config file: {}", Config::config_file_path().display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(key: String, value: String, output: &Output) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;
    apply(&mut config, &key, &value)?;

    config.save().context("Failed to save configuration")?;
    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let unset = value.is_empty() || value == "none";

    match key {
        "last_library" => {
            config.last_library = if unset { None } else { Some(value.into()) };
        }
        "open_last_library" => {
            config.open_last_library = value
                .parse()
                .context("Invalid value for open_last_library. Use 'true' or 'false'.")?;
        }
        "use_migrations" => {
            config.use_migrations = value
                .parse()
                .context("Invalid value for use_migrations. Use 'true' or 'false'.")?;
        }
        "page_size" => {
            let size: usize = value
                .parse()
                .context("Invalid value for page_size. Use a positive number.")?;
            if size == 0 {
                bail!("page_size must be greater than zero");
            }
            config.page_size = size;
        }
        "log_file" => {
            config.log_file = if unset { None } else { Some(value.into()) };
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: last_library, open_last_library, use_migrations, page_size, log_file",
                key
            );
        }
    }
    Ok(())
}
