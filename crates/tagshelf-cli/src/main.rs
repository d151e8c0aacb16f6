//! TagShelf CLI
//!
//! Command-line interface for TagShelf - tag and annotate files on disk.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use tagshelf_core::{Config, Library, LibraryStatus, OpenOptions};

mod commands;
mod output;
mod prompt;

use commands::search::SearchQuery;
use commands::tag::TagOptions;
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "tagshelf")]
#[command(about = "TagShelf - Tag and annotate media files without moving them")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Library directory (defaults to the last opened library)
    #[arg(short, long, global = true)]
    library: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log debug details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a library, creating it if needed
    Open {
        /// Library directory
        path: Option<PathBuf>,
    },
    /// Show library location and contents
    Status,
    /// Save a timestamped copy of the library storage
    Backup,
    /// Manage library folders
    Folder {
        #[command(subcommand)]
        command: FolderCommands,
    },
    /// Add files not yet in the library
    Scan {
        /// Only scan this folder
        #[arg(long)]
        folder: Option<i64>,
    },
    /// Find entries whose files no longer exist
    Missing {
        /// Remove the missing entries
        #[arg(long)]
        remove: bool,
    },
    /// Manage entries
    Entry {
        #[command(subcommand)]
        command: EntryCommands,
    },
    /// Search entries
    Search(SearchArgs),
    /// Manage tags
    Tag {
        #[command(subcommand)]
        command: TagCommands,
    },
    /// Manage entry fields
    Field {
        #[command(subcommand)]
        command: FieldCommands,
    },
    /// Show or set library preferences
    Pref {
        #[command(subcommand)]
        command: Option<PrefCommands>,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum FolderCommands {
    /// Register a directory with the library
    Add {
        /// Directory on disk
        path: PathBuf,
    },
    /// List folders
    #[command(alias = "ls")]
    List,
    /// Remove a folder and all of its entries
    #[command(alias = "rm")]
    Remove {
        /// Folder ID
        id: i64,
    },
}

#[derive(Subcommand)]
enum EntryCommands {
    /// Add an entry by path relative to its folder
    Add {
        /// Folder ID
        #[arg(short, long)]
        folder: i64,
        /// Path relative to the folder
        path: String,
        /// Title field value
        #[arg(short = 'T', long)]
        title: Option<String>,
    },
    /// Show entry details
    Show {
        /// Entry ID
        id: i64,
    },
    /// Show the entry for a relative path
    Find {
        /// Path relative to its folder
        path: String,
    },
    /// Change an entry's path
    #[command(alias = "mv")]
    Move {
        /// Entry ID
        id: i64,
        /// New relative path
        path: String,
    },
    /// Remove entries (files on disk are kept)
    #[command(alias = "rm")]
    Remove {
        /// Entry IDs
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// List entries
    #[command(alias = "ls")]
    List {
        /// Maximum number of entries
        #[arg(short = 'n', long, default_value_t = 50)]
        limit: usize,
        /// Entries to skip
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
}

#[derive(Args)]
struct SearchArgs {
    /// Match a single entry id
    #[arg(long)]
    id: Option<i64>,
    /// Entries tagged with this tag id or any of its subtags
    #[arg(long)]
    tag_id: Option<i64>,
    /// Entries tagged with a tag of this name, shorthand or alias
    #[arg(short, long)]
    tag: Option<String>,
    /// File name contains this text
    #[arg(short, long)]
    name: Option<String>,
    /// Path matches this pattern
    #[arg(short, long)]
    path: Option<String>,
    /// Zero-based page number
    #[arg(long, default_value_t = 0)]
    page: usize,
    /// Results per page (defaults to the configured page size)
    #[arg(long)]
    page_size: Option<usize>,
    /// Only search these folders
    #[arg(long = "include-folder")]
    include_folders: Vec<i64>,
    /// Never return entries from these folders
    #[arg(long = "exclude-folder")]
    exclude_folders: Vec<i64>,
}

#[derive(Args)]
struct TagArgs {
    /// Short name
    #[arg(short, long)]
    shorthand: Option<String>,
    /// Color name (e.g. red, light-blue)
    #[arg(short, long)]
    color: Option<String>,
    /// Alias; replaces all aliases when editing
    #[arg(short, long = "alias")]
    aliases: Vec<String>,
    /// Subtag id or name; replaces all subtags when editing
    #[arg(long = "subtag")]
    subtags: Vec<String>,
}

impl TagArgs {
    fn into_options(self, name: Option<String>) -> TagOptions {
        TagOptions {
            name,
            shorthand: self.shorthand,
            color: self.color,
            aliases: (!self.aliases.is_empty()).then_some(self.aliases),
            subtags: (!self.subtags.is_empty()).then_some(self.subtags),
        }
    }
}

#[derive(Subcommand)]
enum TagCommands {
    /// Create a tag
    #[command(alias = "create")]
    Add {
        /// Tag name
        name: String,
        #[command(flatten)]
        args: TagArgs,
    },
    /// List tags
    #[command(alias = "ls")]
    List {
        /// Only tags whose name, shorthand or alias contains this text
        query: Option<String>,
        /// Maximum number of tags
        #[arg(short = 'n', long, default_value_t = 100)]
        limit: usize,
    },
    /// Show tag details
    Show {
        /// Tag id, name, shorthand or alias
        tag: String,
    },
    /// Edit a tag
    #[command(alias = "edit")]
    Update {
        /// Tag id, name, shorthand or alias
        tag: String,
        /// New name
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        args: TagArgs,
    },
    /// Make one tag a subtag of another
    Link {
        /// Parent tag
        parent: String,
        /// Child tag
        child: String,
    },
    /// Remove a subtag relationship
    Unlink {
        /// Parent tag
        parent: String,
        /// Child tag
        child: String,
    },
    /// List a tag and every tag below it
    Descendants {
        /// Tag id, name, shorthand or alias
        tag: String,
    },
    /// Tag entries
    Apply {
        /// Tag id, name, shorthand or alias
        tag: String,
        /// Entry IDs
        #[arg(required = true)]
        entries: Vec<i64>,
        /// Tag box field (defaults to TAGS)
        #[arg(short, long)]
        field: Option<String>,
    },
    /// Remove a tag from entries
    Detach {
        /// Tag id, name, shorthand or alias
        tag: String,
        /// Entry IDs
        #[arg(required = true)]
        entries: Vec<i64>,
        /// Tag box field (defaults to TAGS)
        #[arg(short, long)]
        field: Option<String>,
    },
}

#[derive(Subcommand)]
enum FieldCommands {
    /// List available field types
    Types,
    /// Add a field to entries
    Add {
        /// Field type key (e.g. TITLE, NOTES)
        key: String,
        /// Entry IDs
        #[arg(short, long = "entry", required = true)]
        entries: Vec<i64>,
        /// Initial value
        #[arg(long)]
        value: Option<String>,
    },
    /// Set a field's value on entries
    Set {
        /// Field type key
        key: String,
        /// New value (comma-separated tag names for tag boxes)
        value: String,
        /// Entry IDs
        #[arg(short, long = "entry", required = true)]
        entries: Vec<i64>,
        /// Which field of this type, counting from 0
        #[arg(long, default_value_t = 0)]
        position: i64,
    },
    /// Remove a field from entries
    #[command(alias = "rm")]
    Remove {
        /// Field type key
        key: String,
        /// Entry IDs
        #[arg(short, long = "entry", required = true)]
        entries: Vec<i64>,
        /// Which field of this type, counting from 0
        #[arg(long, default_value_t = 0)]
        position: i64,
    },
    /// Copy fields between entries so each has every field
    Mirror {
        /// Entry IDs
        #[arg(required = true)]
        entries: Vec<i64>,
    },
    /// Add missing default fields to every entry
    Bootstrap,
}

#[derive(Subcommand)]
enum PrefCommands {
    /// Show preferences
    Get {
        /// Preference key (IS_EXCLUDE_LIST, EXTENSION_LIST, PAGE_SIZE)
        key: Option<String>,
    },
    /// Set a preference to a JSON value
    Set {
        /// Preference key
        key: String,
        /// JSON value (e.g. true, 500, '[".txt"]')
        value: String,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (last_library, open_last_library, use_migrations, page_size, log_file)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let mut config = Config::load().context("Failed to load configuration")?;

    init_logging(&config, cli.verbose)?;

    // Config commands don't need a library
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), &output);
    }

    let root = match &cli.command {
        Commands::Open { path: Some(path) } => path.clone(),
        _ => resolve_library_dir(cli.library.as_deref(), &config)?,
    };

    let mut library = Library::new();
    let status = open_library(&mut library, &root, &config)?;

    if let Some(dir) = library.library_dir() {
        config.remember_library(dir);
        if let Err(e) = config.save() {
            warn!(error = %e, "could not remember library");
        }
    }

    let page_size = config.page_size;
    let result = match cli.command {
        Commands::Config { .. } => unreachable!(), // Handled above
        Commands::Open { .. } => commands::library::open(&library, &status, &output),
        Commands::Status => commands::library::status(&library, &output),
        Commands::Backup => commands::library::backup(&library, &output),
        Commands::Folder { command } => handle_folder_command(command, &library, &output),
        Commands::Scan { folder } => commands::folder::scan(&library, folder, &output),
        Commands::Missing { remove } => commands::folder::missing(&library, remove, &output),
        Commands::Entry { command } => handle_entry_command(command, &library, &output),
        Commands::Search(args) => handle_search_command(args, page_size, &library, &output),
        Commands::Tag { command } => handle_tag_command(command, &library, &output),
        Commands::Field { command } => handle_field_command(command, &library, &output),
        Commands::Pref { command } => handle_pref_command(command, &library, &output),
    };

    library.close();
    result
}

/// Initialize logging to stderr, or to the configured log file
///
/// `TAGSHELF_LOG` overrides the level chosen by `--verbose`.
fn init_logging(config: &Config, verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_env("TAGSHELF_LOG").unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "tagshelf_core={},tagshelf={}",
            default_level, default_level
        ))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);

    // Ignore error if already initialized
    match &config.log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory: {:?}", parent))?;
            }
            let log_file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {:?}", path))?;
            let _ = builder
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(log_file))
                .try_init();
        }
        None => {
            let _ = builder.with_writer(std::io::stderr).try_init();
        }
    }

    Ok(())
}

/// `--library`, then the last opened library, then the current directory
fn resolve_library_dir(explicit: Option<&Path>, config: &Config) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = config.startup_library() {
        return Ok(path.to_path_buf());
    }
    std::env::current_dir().context("Failed to determine current directory")
}

fn open_library(library: &mut Library, root: &Path, config: &Config) -> Result<LibraryStatus> {
    let options = OpenOptions {
        use_migrations: config.use_migrations,
    };
    let status = library
        .open_with(root, options)
        .with_context(|| format!("Failed to open library: {}", root.display()))?;

    if !status.success {
        bail!(
            "Cannot open library {}: {}",
            root.display(),
            status.message.as_deref().unwrap_or("unknown error")
        );
    }
    debug!(path = %root.display(), "library opened");
    Ok(status)
}

fn handle_folder_command(command: FolderCommands, library: &Library, output: &Output) -> Result<()> {
    match command {
        FolderCommands::Add { path } => commands::folder::add(library, path, output),
        FolderCommands::List => commands::folder::list(library, output),
        FolderCommands::Remove { id } => commands::folder::remove(library, id, output),
    }
}

fn handle_entry_command(command: EntryCommands, library: &Library, output: &Output) -> Result<()> {
    match command {
        EntryCommands::Add {
            folder,
            path,
            title,
        } => commands::entry::add(library, folder, path, title, output),
        EntryCommands::Show { id } => commands::entry::show(library, id, output),
        EntryCommands::Find { path } => commands::entry::find(library, path, output),
        EntryCommands::Move { id, path } => commands::entry::rename(library, id, path, output),
        EntryCommands::Remove { ids } => commands::entry::remove(library, ids, output),
        EntryCommands::List { limit, offset } => {
            commands::entry::list(library, limit, offset, output)
        }
    }
}

fn handle_search_command(
    args: SearchArgs,
    default_page_size: usize,
    library: &Library,
    output: &Output,
) -> Result<()> {
    let query = SearchQuery {
        id: args.id,
        tag_id: args.tag_id,
        tag: args.tag,
        name: args.name,
        path: args.path,
        page: args.page,
        page_size: args.page_size.unwrap_or(default_page_size),
        include_folders: args.include_folders,
        exclude_folders: args.exclude_folders,
    };
    commands::search::search(library, query, output)
}

fn handle_tag_command(command: TagCommands, library: &Library, output: &Output) -> Result<()> {
    match command {
        TagCommands::Add { name, args } => {
            commands::tag::add(library, name, args.into_options(None), output)
        }
        TagCommands::List { query, limit } => commands::tag::list(library, query, limit, output),
        TagCommands::Show { tag } => commands::tag::show(library, tag, output),
        TagCommands::Update { tag, name, args } => {
            commands::tag::update(library, tag, args.into_options(name), output)
        }
        TagCommands::Link { parent, child } => commands::tag::link(library, parent, child, output),
        TagCommands::Unlink { parent, child } => {
            commands::tag::unlink(library, parent, child, output)
        }
        TagCommands::Descendants { tag } => commands::tag::descendants(library, tag, output),
        TagCommands::Apply {
            tag,
            entries,
            field,
        } => commands::tag::apply(library, tag, entries, field, output),
        TagCommands::Detach {
            tag,
            entries,
            field,
        } => commands::tag::detach(library, tag, entries, field, output),
    }
}

fn handle_field_command(command: FieldCommands, library: &Library, output: &Output) -> Result<()> {
    match command {
        FieldCommands::Types => commands::field::types(library, output),
        FieldCommands::Add {
            key,
            entries,
            value,
        } => commands::field::add(library, key, entries, value, output),
        FieldCommands::Set {
            key,
            value,
            entries,
            position,
        } => commands::field::set(library, key, value, entries, position, output),
        FieldCommands::Remove {
            key,
            entries,
            position,
        } => commands::field::remove(library, key, entries, position, output),
        FieldCommands::Mirror { entries } => commands::field::mirror(library, entries, output),
        FieldCommands::Bootstrap => commands::field::bootstrap(library, output),
    }
}

fn handle_pref_command(
    command: Option<PrefCommands>,
    library: &Library,
    output: &Output,
) -> Result<()> {
    match command {
        Some(PrefCommands::Get { key }) => commands::pref::get(library, key, output),
        None => commands::pref::get(library, None, output),
        Some(PrefCommands::Set { key, value }) => commands::pref::set(library, key, value, output),
    }
}

fn handle_config_command(command: Option<ConfigCommands>, output: &Output) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(output),
        Some(ConfigCommands::Set { key, value }) => commands::config::set(key, value, output),
    }
}
