//! Field type system
//!
//! A field is a named unit of metadata attached to an entry. Its *kind*
//! (text line, text box, tag box, datetime, boolean) comes from the value
//! type registered under its key. The built-in catalog lives in [`FieldId`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LibraryError, LibraryResult};
use crate::models::Tag;

/// Storage kind of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldKind {
    TextLine,
    TextBox,
    Tags,
    Datetime,
    Boolean,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::TextLine => "TEXT_LINE",
            FieldKind::TextBox => "TEXT_BOX",
            FieldKind::Tags => "TAGS",
            FieldKind::Datetime => "DATETIME",
            FieldKind::Boolean => "BOOLEAN",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldKind {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TEXT_LINE" => Ok(FieldKind::TextLine),
            "TEXT_BOX" => Ok(FieldKind::TextBox),
            "TAGS" => Ok(FieldKind::Tags),
            "DATETIME" => Ok(FieldKind::Datetime),
            "BOOLEAN" => Ok(FieldKind::Boolean),
            other => Err(LibraryError::NotImplemented(format!(
                "field kind not implemented: {}",
                other
            ))),
        }
    }
}

/// Registry row describing a field kind available in the library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueType {
    pub key: String,
    pub name: String,
    pub kind: FieldKind,
    pub position: i64,
    /// Attached to every new entry
    pub is_default: bool,
}

macro_rules! builtin_fields {
    ($( $variant:ident => ($key:literal, $name:literal, $kind:ident, $pos:literal, $default:literal) ),+ $(,)?) => {
        /// Built-in value types created with every library
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum FieldId {
            $( $variant, )+
        }

        impl FieldId {
            pub const ALL: &'static [FieldId] = &[ $( FieldId::$variant, )+ ];

            pub fn key(self) -> &'static str {
                match self { $( FieldId::$variant => $key, )+ }
            }

            pub fn name(self) -> &'static str {
                match self { $( FieldId::$variant => $name, )+ }
            }

            pub fn kind(self) -> FieldKind {
                match self { $( FieldId::$variant => FieldKind::$kind, )+ }
            }

            pub fn position(self) -> i64 {
                match self { $( FieldId::$variant => $pos, )+ }
            }

            pub fn is_default(self) -> bool {
                match self { $( FieldId::$variant => $default, )+ }
            }
        }
    };
}

builtin_fields! {
    Title => ("TITLE", "Title", TextLine, 0, true),
    Author => ("AUTHOR", "Author", TextLine, 1, false),
    Artist => ("ARTIST", "Artist", TextLine, 2, false),
    Url => ("URL", "URL", TextLine, 3, false),
    Description => ("DESCRIPTION", "Description", TextLine, 4, false),
    Notes => ("NOTES", "Notes", TextBox, 5, false),
    Tags => ("TAGS", "Tags", Tags, 6, true),
    TagsContent => ("TAGS_CONTENT", "Content Tags", Tags, 7, false),
    TagsMeta => ("TAGS_META", "Meta Tags", Tags, 8, true),
    Collation => ("COLLATION", "Collation", TextLine, 9, false),
    Date => ("DATE", "Date", Datetime, 10, false),
    DateCreated => ("DATE_CREATED", "Date Created", Datetime, 11, false),
    DateModified => ("DATE_MODIFIED", "Date Modified", Datetime, 12, false),
    DateTaken => ("DATE_TAKEN", "Date Taken", Datetime, 13, false),
    DatePublished => ("DATE_PUBLISHED", "Date Published", Datetime, 14, false),
    Archived => ("ARCHIVED", "Archived", Boolean, 15, false),
    Favorite => ("FAVORITE", "Favorite", Boolean, 16, false),
    Book => ("BOOK", "Book", TextLine, 17, false),
    Comic => ("COMIC", "Comic", TextLine, 18, false),
    Series => ("SERIES", "Series", TextLine, 19, false),
    Manga => ("MANGA", "Manga", TextLine, 20, false),
    Source => ("SOURCE", "Source", TextLine, 21, false),
    DateUploaded => ("DATE_UPLOADED", "Date Uploaded", Datetime, 22, false),
    DateReleased => ("DATE_RELEASED", "Date Released", Datetime, 23, false),
    Volume => ("VOLUME", "Volume", TextLine, 24, false),
    Anthology => ("ANTHOLOGY", "Anthology", TextLine, 25, false),
    Magazine => ("MAGAZINE", "Magazine", TextLine, 26, false),
    Publisher => ("PUBLISHER", "Publisher", TextLine, 27, false),
    GuestArtist => ("GUEST_ARTIST", "Guest Artist", TextLine, 28, false),
    Composer => ("COMPOSER", "Composer", TextLine, 29, false),
    Comments => ("COMMENTS", "Comments", TextLine, 30, false),
}

impl FieldId {
    pub fn value_type(self) -> ValueType {
        ValueType {
            key: self.key().to_string(),
            name: self.name().to_string(),
            kind: self.kind(),
            position: self.position(),
            is_default: self.is_default(),
        }
    }
}

/// Display grouping of a tag box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagBoxGroup {
    Generic,
    Content,
    Meta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextField {
    pub id: i64,
    pub entry_id: i64,
    pub type_key: String,
    pub position: i64,
    /// Text box rather than text line
    pub multiline: bool,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagBoxField {
    pub id: i64,
    pub entry_id: i64,
    pub type_key: String,
    pub position: i64,
    pub tags: Vec<Tag>,
}

impl TagBoxField {
    pub fn group(&self) -> TagBoxGroup {
        match self.type_key.as_str() {
            "TAGS_CONTENT" => TagBoxGroup::Content,
            "TAGS_META" => TagBoxGroup::Meta,
            _ => TagBoxGroup::Generic,
        }
    }

    pub fn tag_ids(&self) -> Vec<i64> {
        self.tags.iter().map(|t| t.id).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatetimeField {
    pub id: i64,
    pub entry_id: i64,
    pub type_key: String,
    pub position: i64,
    pub value: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BooleanField {
    pub id: i64,
    pub entry_id: i64,
    pub type_key: String,
    pub position: i64,
    pub value: bool,
}

/// A stored field of any kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Field {
    Text(TextField),
    TagBox(TagBoxField),
    Datetime(DatetimeField),
    Boolean(BooleanField),
}

impl Field {
    pub fn id(&self) -> i64 {
        match self {
            Field::Text(f) => f.id,
            Field::TagBox(f) => f.id,
            Field::Datetime(f) => f.id,
            Field::Boolean(f) => f.id,
        }
    }

    pub fn entry_id(&self) -> i64 {
        match self {
            Field::Text(f) => f.entry_id,
            Field::TagBox(f) => f.entry_id,
            Field::Datetime(f) => f.entry_id,
            Field::Boolean(f) => f.entry_id,
        }
    }

    pub fn type_key(&self) -> &str {
        match self {
            Field::Text(f) => &f.type_key,
            Field::TagBox(f) => &f.type_key,
            Field::Datetime(f) => &f.type_key,
            Field::Boolean(f) => &f.type_key,
        }
    }

    pub fn position(&self) -> i64 {
        match self {
            Field::Text(f) => f.position,
            Field::TagBox(f) => f.position,
            Field::Datetime(f) => f.position,
            Field::Boolean(f) => f.position,
        }
    }

    /// Table holding rows of this variant
    pub(crate) fn table(&self) -> &'static str {
        match self {
            Field::Text(_) => "text_fields",
            Field::TagBox(_) => "tag_box_fields",
            Field::Datetime(_) => "datetime_fields",
            Field::Boolean(_) => "boolean_fields",
        }
    }

    pub fn as_tag_box(&self) -> Option<&TagBoxField> {
        match self {
            Field::TagBox(f) => Some(f),
            _ => None,
        }
    }

    /// The current value expressed as input for a new field
    pub fn to_input(&self) -> FieldInput {
        match self {
            Field::Text(f) => f
                .value
                .clone()
                .map(FieldInput::Text)
                .unwrap_or(FieldInput::None),
            Field::TagBox(f) => FieldInput::TagIds(f.tag_ids()),
            Field::Datetime(f) => f.value.map(FieldInput::Datetime).unwrap_or(FieldInput::None),
            Field::Boolean(f) => FieldInput::Boolean(f.value),
        }
    }
}

/// Caller-supplied value for a new or updated field
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldInput {
    /// Kind-specific empty value
    #[default]
    None,
    Text(String),
    /// Tag names; missing tags are created
    TagNames(Vec<String>),
    TagIds(Vec<i64>),
    Datetime(DateTime<Utc>),
    Boolean(bool),
}

/// Validated value ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewFieldValue {
    Text(Option<String>),
    Tags { names: Vec<String>, ids: Vec<i64> },
    Datetime(Option<DateTime<Utc>>),
    Boolean(bool),
}

/// A field instance that has not been attached to an entry yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewField {
    pub type_key: String,
    pub kind: FieldKind,
    pub value: NewFieldValue,
}

/// Build the field variant matching the value type's kind
pub fn instantiate_field(value_type: &ValueType, input: FieldInput) -> LibraryResult<NewField> {
    let mismatch = |input: &FieldInput| {
        LibraryError::invalid(format!(
            "value {:?} does not fit field '{}' of kind {}",
            input, value_type.key, value_type.kind
        ))
    };

    let value = match value_type.kind {
        FieldKind::TextLine | FieldKind::TextBox => match input {
            FieldInput::None => NewFieldValue::Text(Some(String::new())),
            FieldInput::Text(s) => NewFieldValue::Text(Some(s)),
            other => return Err(mismatch(&other)),
        },
        FieldKind::Tags => match input {
            FieldInput::None => NewFieldValue::Tags {
                names: Vec::new(),
                ids: Vec::new(),
            },
            FieldInput::TagNames(names) => NewFieldValue::Tags {
                names,
                ids: Vec::new(),
            },
            FieldInput::TagIds(ids) => NewFieldValue::Tags {
                names: Vec::new(),
                ids,
            },
            other => return Err(mismatch(&other)),
        },
        FieldKind::Datetime => match input {
            FieldInput::None => NewFieldValue::Datetime(None),
            FieldInput::Datetime(d) => NewFieldValue::Datetime(Some(d)),
            FieldInput::Text(ref s) => match DateTime::parse_from_rfc3339(s) {
                Ok(d) => NewFieldValue::Datetime(Some(d.with_timezone(&Utc))),
                Err(_) => return Err(mismatch(&input)),
            },
            other => return Err(mismatch(&other)),
        },
        FieldKind::Boolean => match input {
            FieldInput::None => NewFieldValue::Boolean(false),
            FieldInput::Boolean(b) => NewFieldValue::Boolean(b),
            FieldInput::Text(ref s) => match s.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => NewFieldValue::Boolean(true),
                "false" | "0" | "no" => NewFieldValue::Boolean(false),
                _ => return Err(mismatch(&input)),
            },
            other => return Err(mismatch(&other)),
        },
    };

    Ok(NewField {
        type_key: value_type.key.clone(),
        kind: value_type.kind,
        value,
    })
}
