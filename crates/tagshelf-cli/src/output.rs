//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;

use tagshelf_core::fields::Field;
use tagshelf_core::{Entry, Folder, ScanProgress, SearchResult, Tag, ValueType};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print any serializable value as pretty JSON
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Failed to encode JSON output: {}", e),
        }
    }

    /// Print a single entry with all of its fields
    pub fn print_entry(&self, entry: &Entry) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:      {}", entry.id);
                println!("Folder:  {}", entry.folder_id);
                println!("Path:    {}", entry.path);
                if !entry.suffix.is_empty() {
                    println!("Suffix:  {}", entry.suffix);
                }

                if !entry.fields.is_empty() {
                    println!();
                    println!("── Fields ({}) ──", entry.fields.len());
                    for field in &entry.fields {
                        println!(
                            "{:<16} {}",
                            field_label(field),
                            format_field_value(field)
                        );
                    }
                }
            }
            OutputFormat::Json => self.json(entry),
            OutputFormat::Quiet => println!("{}", entry.id),
        }
    }

    /// Print a list of entries, one per line
    pub fn print_entries(&self, entries: &[Entry]) {
        match self.format {
            OutputFormat::Human => {
                if entries.is_empty() {
                    println!("No entries found.");
                    return;
                }
                for entry in entries {
                    println!("{}", entry_line(entry));
                }
                println!("\n{} entry(s)", entries.len());
            }
            OutputFormat::Json => self.json(entries),
            OutputFormat::Quiet => {
                for entry in entries {
                    println!("{}", entry.id);
                }
            }
        }
    }

    /// Print one page of search results
    pub fn print_search(&self, result: &SearchResult, page_index: usize, page_size: usize) {
        match self.format {
            OutputFormat::Human => {
                if result.items.is_empty() {
                    println!("No entries found.");
                    return;
                }
                for entry in &result.items {
                    println!("{}", entry_line(entry));
                }
                let pages = result.total_count.div_ceil(page_size.max(1));
                println!(
                    "\n{} of {} entry(s), page {}/{}",
                    result.items.len(),
                    result.total_count,
                    page_index + 1,
                    pages.max(1)
                );
            }
            OutputFormat::Json => self.json(result),
            OutputFormat::Quiet => {
                for entry in &result.items {
                    println!("{}", entry.id);
                }
            }
        }
    }

    /// Print a single tag with aliases and subtags
    pub fn print_tag(&self, tag: &Tag, subtags: &[Tag]) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:        {}", tag.id);
                println!("Name:      {}", tag.name);
                if let Some(ref shorthand) = tag.shorthand {
                    println!("Shorthand: {}", shorthand);
                }
                println!("Color:     {:?}", tag.color);
                if let Some(ref icon) = tag.icon {
                    println!("Icon:      {}", icon);
                }
                if !tag.aliases.is_empty() {
                    println!("Aliases:   {}", tag.alias_names().join(", "));
                }
                if !subtags.is_empty() {
                    let names: Vec<String> = subtags
                        .iter()
                        .map(|t| format!("{} ({})", t.name, t.id))
                        .collect();
                    println!("Subtags:   {}", names.join(", "));
                }
            }
            OutputFormat::Json => self.json(tag),
            OutputFormat::Quiet => println!("{}", tag.id),
        }
    }

    /// Print a list of tags
    pub fn print_tags(&self, tags: &[Tag]) {
        match self.format {
            OutputFormat::Human => {
                if tags.is_empty() {
                    println!("No tags found.");
                    return;
                }
                for tag in tags {
                    let shorthand = tag
                        .shorthand
                        .as_deref()
                        .map(|s| format!(" [{}]", s))
                        .unwrap_or_default();
                    println!("{:>6} | {}{}", tag.id, truncate(&tag.name, 40), shorthand);
                }
                println!("\n{} tag(s)", tags.len());
            }
            OutputFormat::Json => self.json(tags),
            OutputFormat::Quiet => {
                for tag in tags {
                    println!("{}", tag.id);
                }
            }
        }
    }

    /// Print the library's root folders
    pub fn print_folders(&self, folders: &[Folder]) {
        match self.format {
            OutputFormat::Human => {
                if folders.is_empty() {
                    println!("No folders found.");
                    return;
                }
                for folder in folders {
                    println!("{:>4} | {}", folder.id, folder.path);
                }
                println!("\n{} folder(s)", folders.len());
            }
            OutputFormat::Json => self.json(folders),
            OutputFormat::Quiet => {
                for folder in folders {
                    println!("{}", folder.id);
                }
            }
        }
    }

    /// Print the value type registry
    pub fn print_value_types(&self, value_types: &[ValueType]) {
        match self.format {
            OutputFormat::Human => {
                for vt in value_types {
                    let default = if vt.is_default { " *" } else { "" };
                    println!("{:<16} {:<10} {}{}", vt.key, vt.kind.as_str(), vt.name, default);
                }
                println!("\n{} field type(s), * = added to new entries", value_types.len());
            }
            OutputFormat::Json => self.json(value_types),
            OutputFormat::Quiet => {
                for vt in value_types {
                    println!("{}", vt.key);
                }
            }
        }
    }

    /// Print the final tick of a scan
    pub fn print_progress(&self, label: &str, progress: &ScanProgress) {
        match self.format {
            OutputFormat::Human => match progress.total {
                Some(total) => println!(
                    "{}: {}/{} checked, {} found",
                    label, progress.done, total, progress.found
                ),
                None => println!(
                    "{}: {} checked, {} found",
                    label, progress.done, progress.found
                ),
            },
            OutputFormat::Json => self.json(progress),
            OutputFormat::Quiet => {}
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn entry_line(entry: &Entry) -> String {
    let tags: Vec<&str> = entry.tags().iter().map(|t| t.name.as_str()).collect();
    if tags.is_empty() {
        format!("{:>6} | {}", entry.id, truncate(&entry.path, 60))
    } else {
        format!(
            "{:>6} | {} | {}",
            entry.id,
            truncate(&entry.path, 45),
            truncate(&tags.join(", "), 30)
        )
    }
}

fn field_label(field: &Field) -> String {
    if field.position() == 0 {
        field.type_key().to_string()
    } else {
        format!("{}[{}]", field.type_key(), field.position())
    }
}

/// Render a field value on one line
pub fn format_field_value(field: &Field) -> String {
    match field {
        Field::Text(f) => truncate_line(f.value.as_deref().unwrap_or(""), 60),
        Field::TagBox(f) => f
            .tags
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        Field::Datetime(f) => f
            .value
            .map(|v| v.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default(),
        Field::Boolean(f) => if f.value { "yes" } else { "no" }.to_string(),
    }
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Truncate to first line and max length
fn truncate_line(s: &str, max_len: usize) -> String {
    let first_line = s.lines().next().unwrap_or("");
    truncate(first_line, max_len)
}
