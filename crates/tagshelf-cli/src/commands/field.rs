//! Field command handlers

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use tagshelf_core::fields::Field;
use tagshelf_core::{FieldInput, FieldKind, Library, ValueType};

use super::require_entry;
use crate::output::Output;

/// Parse a command-line value for a field of the given kind
///
/// Tag boxes take a comma-separated list of tag names; dates take
/// RFC 3339 or `YYYY-MM-DD`.
pub fn parse_field_input(kind: FieldKind, value: Option<&str>) -> Result<FieldInput> {
    let Some(value) = value else {
        return Ok(FieldInput::None);
    };

    let input = match kind {
        FieldKind::TextLine | FieldKind::TextBox => FieldInput::Text(value.to_string()),
        FieldKind::Tags => FieldInput::TagNames(
            value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        ),
        FieldKind::Datetime => FieldInput::Datetime(parse_datetime(value)?),
        FieldKind::Boolean => match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => FieldInput::Boolean(true),
            "false" | "no" | "0" => FieldInput::Boolean(false),
            _ => bail!("Invalid boolean: '{}'. Use 'true' or 'false'.", value),
        },
    };
    Ok(input)
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid date: '{}'. Use YYYY-MM-DD or RFC 3339.", value))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow::anyhow!("Invalid date: '{}'", value))?;
    Ok(Utc.from_utc_datetime(&midnight))
}

/// The field at `(key, position)` on an entry, used as the reference for bulk edits
fn field_at(library: &Library, entry_id: i64, key: &str, position: i64) -> Result<Field> {
    let entry = require_entry(library, entry_id)?;
    entry
        .fields
        .into_iter()
        .find(|f| f.type_key() == key && f.position() == position)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Entry {} has no field {} at position {}",
                entry_id,
                key,
                position
            )
        })
}

fn first_entry(entry_ids: &[i64]) -> Result<i64> {
    match entry_ids.first() {
        Some(&id) => Ok(id),
        None => bail!("At least one --entry is required"),
    }
}

/// List the registered value types in display order
pub fn types(library: &Library, output: &Output) -> Result<()> {
    let mut value_types: Vec<ValueType> = library.field_types()?.into_values().collect();
    value_types.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.key.cmp(&b.key)));
    output.print_value_types(&value_types);
    Ok(())
}

/// Attach a new field to each entry
pub fn add(
    library: &Library,
    key: String,
    entry_ids: Vec<i64>,
    value: Option<String>,
    output: &Output,
) -> Result<()> {
    first_entry(&entry_ids)?;
    let value_type = library
        .get_value_type(&key)
        .with_context(|| format!("Unknown field type: {}", key))?;
    let input = parse_field_input(value_type.kind, value.as_deref())?;

    let ids = library
        .add_entry_field(&entry_ids, &key, input)
        .context("Failed to add field")?;
    output.success(&format!("Added {} to {} entry(s)", key, ids.len()));
    Ok(())
}

/// Set the value of a field on each entry
pub fn set(
    library: &Library,
    key: String,
    value: String,
    entry_ids: Vec<i64>,
    position: i64,
    output: &Output,
) -> Result<()> {
    let field = field_at(library, first_entry(&entry_ids)?, &key, position)?;
    let value_type = library.get_value_type(&key)?;
    let input = parse_field_input(value_type.kind, Some(&value))?;

    let updated = library
        .update_entry_field(&entry_ids, &field, input)
        .context("Failed to update field")?;
    output.success(&format!("Updated {} on {} entry(s)", key, updated));
    Ok(())
}

/// Remove a field from each entry
pub fn remove(
    library: &Library,
    key: String,
    entry_ids: Vec<i64>,
    position: i64,
    output: &Output,
) -> Result<()> {
    let field = field_at(library, first_entry(&entry_ids)?, &key, position)?;

    let removed = library
        .remove_entry_field(&field, &entry_ids)
        .context("Failed to remove field")?;
    output.success(&format!("Removed {} from {} entry(s)", key, removed));
    Ok(())
}

/// Give every entry the fields any of them has
pub fn mirror(library: &Library, entry_ids: Vec<i64>, output: &Output) -> Result<()> {
    let added = library
        .mirror_fields(&entry_ids)
        .context("Failed to mirror fields")?;
    output.success(&format!("Added {} field(s)", added));
    Ok(())
}

/// Add missing default fields to every entry
pub fn bootstrap(library: &Library, output: &Output) -> Result<()> {
    let mut last = None;
    for progress in library.bootstrap_default_fields()? {
        last = Some(progress?);
    }

    match last {
        Some(progress) => output.print_progress("Default fields", &progress),
        None => output.message("No entries in the library."),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_parse_text_and_none() {
        assert_eq!(
            parse_field_input(FieldKind::TextLine, Some("Moby Dick")).unwrap(),
            FieldInput::Text("Moby Dick".to_string())
        );
        assert_eq!(
            parse_field_input(FieldKind::Boolean, None).unwrap(),
            FieldInput::None
        );
    }

    #[test]
    fn test_parse_tag_names() {
        assert_eq!(
            parse_field_input(FieldKind::Tags, Some("cat, dog,,bird ")).unwrap(),
            FieldInput::TagNames(vec!["cat".into(), "dog".into(), "bird".into()])
        );
    }

    #[test]
    fn test_parse_boolean() {
        assert_eq!(
            parse_field_input(FieldKind::Boolean, Some("Yes")).unwrap(),
            FieldInput::Boolean(true)
        );
        assert!(parse_field_input(FieldKind::Boolean, Some("maybe")).is_err());
    }

    #[test]
    fn test_parse_datetime() {
        let FieldInput::Datetime(date) =
            parse_field_input(FieldKind::Datetime, Some("2024-03-09")).unwrap()
        else {
            panic!("expected a datetime");
        };
        assert_eq!((date.year(), date.month(), date.day()), (2024, 3, 9));

        let FieldInput::Datetime(stamp) =
            parse_field_input(FieldKind::Datetime, Some("2024-03-09T12:30:00+02:00")).unwrap()
        else {
            panic!("expected a datetime");
        };
        assert_eq!(stamp.to_rfc3339(), "2024-03-09T10:30:00+00:00");

        assert!(parse_field_input(FieldKind::Datetime, Some("March 9th")).is_err());
    }
}
