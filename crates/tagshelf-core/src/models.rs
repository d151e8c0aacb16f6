//! Data models for TagShelf
//!
//! Plain value records for entries, folders, tags and preferences. None of
//! these hold a database handle; every library call loads, mutates and
//! persists them within its own transaction.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::fields::Field;

/// Id of the built-in "Archived" tag
pub const TAG_ARCHIVED: i64 = 0;
/// Id of the built-in "Favorite" tag
pub const TAG_FAVORITE: i64 = 1;
/// User-created tags always get ids at or above this value
pub const RESERVED_TAG_END: i64 = 1000;

/// Display color of a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TagColor {
    #[default]
    Default = 1,
    Black = 2,
    DarkGray = 3,
    Gray = 4,
    LightGray = 5,
    White = 6,
    LightPink = 7,
    Pink = 8,
    Red = 9,
    RedOrange = 10,
    Orange = 11,
    YellowOrange = 12,
    Yellow = 13,
    Lime = 14,
    LightGreen = 15,
    Mint = 16,
    Green = 17,
    Teal = 18,
    Cyan = 19,
    LightBlue = 20,
    Blue = 21,
    BlueViolet = 22,
    Violet = 23,
    Purple = 24,
    Lavender = 25,
    Berry = 26,
    Magenta = 27,
    Salmon = 28,
    Auburn = 29,
    DarkBrown = 30,
    Brown = 31,
    LightBrown = 32,
    Blonde = 33,
    Peach = 34,
    WarmGray = 35,
    CoolGray = 36,
    Olive = 37,
}

impl TagColor {
    const ALL: [TagColor; 37] = [
        TagColor::Default,
        TagColor::Black,
        TagColor::DarkGray,
        TagColor::Gray,
        TagColor::LightGray,
        TagColor::White,
        TagColor::LightPink,
        TagColor::Pink,
        TagColor::Red,
        TagColor::RedOrange,
        TagColor::Orange,
        TagColor::YellowOrange,
        TagColor::Yellow,
        TagColor::Lime,
        TagColor::LightGreen,
        TagColor::Mint,
        TagColor::Green,
        TagColor::Teal,
        TagColor::Cyan,
        TagColor::LightBlue,
        TagColor::Blue,
        TagColor::BlueViolet,
        TagColor::Violet,
        TagColor::Purple,
        TagColor::Lavender,
        TagColor::Berry,
        TagColor::Magenta,
        TagColor::Salmon,
        TagColor::Auburn,
        TagColor::DarkBrown,
        TagColor::Brown,
        TagColor::LightBrown,
        TagColor::Blonde,
        TagColor::Peach,
        TagColor::WarmGray,
        TagColor::CoolGray,
        TagColor::Olive,
    ];

    /// Stored integer value
    pub fn as_i64(self) -> i64 {
        self as i64
    }

    /// Decode a stored value; unknown values fall back to `Default`
    pub fn from_i64(value: i64) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_i64() == value)
            .unwrap_or_default()
    }

    /// Parse a color name such as `red`, `light-blue` or `LightBlue`
    pub fn parse(name: &str) -> Option<Self> {
        let wanted: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|c| format!("{:?}", c).to_ascii_lowercase() == wanted)
    }
}

/// An alternate literal name resolving to a tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagAlias {
    pub id: i64,
    pub name: String,
    pub tag_id: i64,
}

/// A reusable label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub shorthand: Option<String>,
    pub color: TagColor,
    pub icon: Option<String>,
    pub aliases: Vec<TagAlias>,
    /// Ids of direct children in the subtag graph
    pub subtag_ids: BTreeSet<i64>,
}

impl Tag {
    pub fn alias_names(&self) -> Vec<&str> {
        self.aliases.iter().map(|a| a.name.as_str()).collect()
    }

    /// Case-insensitive equality against name, shorthand or any alias
    pub fn matches_exact(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.name.to_lowercase() == query
            || self
                .shorthand
                .as_deref()
                .is_some_and(|s| s.to_lowercase() == query)
            || self.aliases.iter().any(|a| a.name.to_lowercase() == query)
    }
}

/// Attributes for a tag that has not been stored yet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTag {
    pub name: String,
    pub shorthand: Option<String>,
    pub color: TagColor,
    pub icon: Option<String>,
}

impl NewTag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_color(mut self, color: TagColor) -> Self {
        self.color = color;
        self
    }

    pub fn with_shorthand(mut self, shorthand: impl Into<String>) -> Self {
        self.shorthand = Some(shorthand.into());
        self
    }
}

/// Desired alias state for a tag
///
/// An existing alias survives only when both its id is in `ids` and its
/// name is in `names`. Every name left unmatched becomes a fresh alias row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasUpdate {
    pub ids: BTreeSet<i64>,
    pub names: BTreeSet<String>,
}

impl AliasUpdate {
    /// Only new names, no aliases kept
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: BTreeSet::new(),
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Keep the given aliases as they are
    pub fn keep(aliases: &[TagAlias]) -> Self {
        Self {
            ids: aliases.iter().map(|a| a.id).collect(),
            names: aliases.iter().map(|a| a.name.clone()).collect(),
        }
    }
}

/// A root directory registered into the library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: i64,
    pub path: String,
    pub uuid: String,
}

/// One cataloged file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub folder_id: i64,
    /// Path relative to the folder, `/`-separated
    pub path: String,
    /// Lower-cased extension without the dot
    pub suffix: String,
    pub fields: Vec<Field>,
}

impl Entry {
    /// All tags across every tag box, deduplicated by id
    pub fn tags(&self) -> Vec<&Tag> {
        let mut seen = BTreeSet::new();
        self.fields
            .iter()
            .filter_map(Field::as_tag_box)
            .flat_map(|f| f.tags.iter())
            .filter(|t| seen.insert(t.id))
            .collect()
    }

    pub fn has_tag(&self, tag_id: i64) -> bool {
        self.tags().iter().any(|t| t.id == tag_id)
    }

    pub fn is_archived(&self) -> bool {
        self.has_tag(TAG_ARCHIVED)
    }

    pub fn is_favorite(&self) -> bool {
        self.has_tag(TAG_FAVORITE)
    }

    pub fn field(&self, type_key: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.type_key() == type_key)
    }

    pub fn filename(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// A path waiting to be registered as an entry
#[derive(Debug, Clone, PartialEq)]
pub struct EntryDraft {
    pub folder_id: i64,
    pub path: String,
    /// Fields to attach in addition to the library defaults
    pub fields: Vec<(String, crate::fields::FieldInput)>,
}

impl EntryDraft {
    pub fn new(folder_id: i64, path: impl AsRef<Path>) -> Self {
        Self {
            folder_id,
            path: normalize_path(path.as_ref()),
            fields: Vec::new(),
        }
    }

    pub fn with_field(
        mut self,
        type_key: impl Into<String>,
        value: crate::fields::FieldInput,
    ) -> Self {
        self.fields.push((type_key.into(), value));
        self
    }
}

/// Library-scoped settings stored in the preferences table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryPref {
    IsExcludeList,
    ExtensionList,
    PageSize,
}

impl LibraryPref {
    pub const ALL: [LibraryPref; 3] = [
        LibraryPref::IsExcludeList,
        LibraryPref::ExtensionList,
        LibraryPref::PageSize,
    ];

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.key().eq_ignore_ascii_case(key))
    }

    pub fn key(self) -> &'static str {
        match self {
            LibraryPref::IsExcludeList => "IS_EXCLUDE_LIST",
            LibraryPref::ExtensionList => "EXTENSION_LIST",
            LibraryPref::PageSize => "PAGE_SIZE",
        }
    }

    pub fn default_value(self) -> serde_json::Value {
        match self {
            LibraryPref::IsExcludeList => serde_json::json!(true),
            LibraryPref::ExtensionList => serde_json::json!([".json", ".xmp", ".aae"]),
            LibraryPref::PageSize => serde_json::json!(500),
        }
    }
}

/// Convert a path to the stored `/`-separated relative form
pub fn normalize_path(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    let mut trimmed = raw.as_str();
    while let Some(rest) = trimmed.strip_prefix("./") {
        trimmed = rest;
    }
    trimmed.to_string()
}

/// Lower-cased extension without the leading dot
pub fn path_suffix(path: &str) -> String {
    Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Normalize an extension-list item: trimmed, lower-cased, no leading dot
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}
