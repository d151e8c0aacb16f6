//! TagShelf Core Library
//!
//! This crate provides the data-and-query core of TagShelf, a media
//! catalog that tags and annotates files on disk without moving them.
//!
//! # Architecture
//!
//! - **SQLite**: one storage file per library under `<root>/.TagShelf/`
//! - **Connection per operation**: every public call runs in its own
//!   transaction and returns plain values
//!
//! # Quick Start
//!
//! ```text
//! let mut library = Library::new();
//! library.open(Path::new("/photos"))?;
//!
//! let folder = library.add_folder(Path::new("/photos"))?;
//! let ids = library.add_entries(&[EntryDraft::new(folder.id, "cat.jpg")])?;
//!
//! let animal = library.add_tag(&NewTag::new("animal"), None, None)?;
//! library.add_field_tag(ids[0], animal.id, None, MissingFieldAction::Create)?;
//!
//! let results = library.search(&FilterState::by_tag("animal"))?;
//! ```
//!
//! # Modules
//!
//! - `library`: lifecycle and every catalog operation (main entry point)
//! - `models`: entries, folders, tags and preferences
//! - `fields`: field kinds, the built-in value types and field values
//! - `tags`: subtag graph and alias reconciliation
//! - `search`: filter requests and paginated results
//! - `refresh`: directory scans and other progress sequences
//! - `storage`: SQLite schema and row access
//! - `thumbnails`: where thumbnails for entries are kept
//! - `config`: application configuration

pub mod config;
pub mod error;
pub mod fields;
pub mod library;
pub mod models;
pub mod refresh;
pub mod search;
pub mod storage;
pub mod tags;
pub mod thumbnails;

pub use config::Config;
pub use error::{LibraryError, LibraryResult};
pub use fields::{Field, FieldId, FieldInput, FieldKind, ValueType};
pub use library::{
    Library, LibraryState, LibraryStatus, MissingFieldAction, OpenOptions, DATA_DIR,
};
pub use models::{
    AliasUpdate, Entry, EntryDraft, Folder, LibraryPref, NewTag, Tag, TagAlias, TagColor,
    TAG_ARCHIVED, TAG_FAVORITE,
};
pub use refresh::ScanProgress;
pub use search::{FilterState, SearchResult};
pub use thumbnails::{ThumbSize, ThumbnailCache};
