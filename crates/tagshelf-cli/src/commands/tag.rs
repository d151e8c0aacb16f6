//! Tag command handlers

use std::collections::BTreeSet;

use anyhow::{bail, Context, Result};

use tagshelf_core::{AliasUpdate, Library, MissingFieldAction, NewTag, Tag, TagColor};

use super::resolve_tag;
use crate::output::Output;

/// Options for creating or editing a tag
#[derive(Debug, Default)]
pub struct TagOptions {
    pub name: Option<String>,
    pub shorthand: Option<String>,
    pub color: Option<String>,
    pub aliases: Option<Vec<String>>,
    pub subtags: Option<Vec<String>>,
}

fn parse_color(name: &str) -> Result<TagColor> {
    TagColor::parse(name).ok_or_else(|| anyhow::anyhow!("Unknown tag color: '{}'", name))
}

fn resolve_subtags(library: &Library, refs: &[String]) -> Result<BTreeSet<i64>> {
    refs.iter()
        .map(|r| resolve_tag(library, r).map(|t| t.id))
        .collect()
}

/// Create a new tag
pub fn add(library: &Library, name: String, options: TagOptions, output: &Output) -> Result<()> {
    let mut new_tag = NewTag::new(name);
    if let Some(shorthand) = options.shorthand {
        new_tag = new_tag.with_shorthand(shorthand);
    }
    if let Some(color) = options.color.as_deref() {
        new_tag = new_tag.with_color(parse_color(color)?);
    }

    let subtags = options
        .subtags
        .as_deref()
        .map(|refs| resolve_subtags(library, refs))
        .transpose()?;
    let aliases = options.aliases.map(AliasUpdate::names);

    let tag = library
        .add_tag(&new_tag, subtags.as_ref(), aliases.as_ref())
        .context("Failed to create tag")?;

    output.success(&format!("Created tag: {} ({})", tag.name, tag.id));
    show_tag(library, &tag, output)
}

/// Edit a tag; aliases and subtags given replace the current sets
pub fn update(library: &Library, reference: String, options: TagOptions, output: &Output) -> Result<()> {
    let mut tag = resolve_tag(library, &reference)?;
    if let Some(name) = options.name {
        tag.name = name;
    }
    if let Some(shorthand) = options.shorthand {
        tag.shorthand = if shorthand.is_empty() { None } else { Some(shorthand) };
    }
    if let Some(color) = options.color.as_deref() {
        tag.color = parse_color(color)?;
    }

    let subtags = options
        .subtags
        .as_deref()
        .map(|refs| resolve_subtags(library, refs))
        .transpose()?;
    let aliases = options.aliases.map(AliasUpdate::names);

    let tag = library
        .update_tag(&tag, subtags.as_ref(), aliases.as_ref())
        .context("Failed to update tag")?;

    output.success("Tag updated");
    show_tag(library, &tag, output)
}

/// List tags, optionally narrowed by a substring
pub fn list(library: &Library, query: Option<String>, limit: usize, output: &Output) -> Result<()> {
    let tags = match query {
        Some(q) => library.search_tags(&q, limit)?,
        None => library.get_tags()?.into_iter().take(limit).collect(),
    };
    output.print_tags(&tags);
    Ok(())
}

pub fn show(library: &Library, reference: String, output: &Output) -> Result<()> {
    let tag = resolve_tag(library, &reference)?;
    show_tag(library, &tag, output)
}

fn show_tag(library: &Library, tag: &Tag, output: &Output) -> Result<()> {
    let mut subtags = Vec::with_capacity(tag.subtag_ids.len());
    for &id in &tag.subtag_ids {
        if let Some(subtag) = library.get_tag(id)? {
            subtags.push(subtag);
        }
    }
    output.print_tag(tag, &subtags);
    Ok(())
}

/// Add the edge `parent -> child`
pub fn link(library: &Library, parent: String, child: String, output: &Output) -> Result<()> {
    let parent = resolve_tag(library, &parent)?;
    let child = resolve_tag(library, &child)?;

    if !library
        .add_subtag(parent.id, child.id)
        .context("Failed to add subtag")?
    {
        bail!("A tag cannot be its own subtag");
    }
    output.success(&format!("{} is now a subtag of {}", child.name, parent.name));
    Ok(())
}

pub fn unlink(library: &Library, parent: String, child: String, output: &Output) -> Result<()> {
    let parent = resolve_tag(library, &parent)?;
    let child = resolve_tag(library, &child)?;

    library
        .remove_subtag(parent.id, child.id)
        .context("Failed to remove subtag")?;
    output.success(&format!("{} is no longer a subtag of {}", child.name, parent.name));
    Ok(())
}

/// Show a tag and everything reachable below it
pub fn descendants(library: &Library, reference: String, output: &Output) -> Result<()> {
    let tag = resolve_tag(library, &reference)?;
    let ids = library.get_all_descendant_ids(tag.id)?;

    let mut tags = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(tag) = library.get_tag(id)? {
            tags.push(tag);
        }
    }
    output.print_tags(&tags);
    Ok(())
}

/// Put a tag into a tag box on each entry, creating the box when missing
pub fn apply(
    library: &Library,
    reference: String,
    entry_ids: Vec<i64>,
    field: Option<String>,
    output: &Output,
) -> Result<()> {
    let tag = resolve_tag(library, &reference)?;

    let mut applied = 0;
    for entry_id in &entry_ids {
        match library.add_field_tag(*entry_id, tag.id, field.as_deref(), MissingFieldAction::Create) {
            Ok(true) => applied += 1,
            Ok(false) => {}
            Err(e) if e.is_conflict() => {
                tracing::debug!(entry_id, tag_id = tag.id, "tag already applied");
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to tag entry {}", entry_id))
            }
        }
    }

    output.success(&format!("Tagged {} entry(s) with {}", applied, tag.name));
    Ok(())
}

/// Take a tag out of a tag box on each entry
pub fn detach(
    library: &Library,
    reference: String,
    entry_ids: Vec<i64>,
    field: Option<String>,
    output: &Output,
) -> Result<()> {
    let tag = resolve_tag(library, &reference)?;

    let mut detached = 0;
    for entry_id in &entry_ids {
        if library.remove_field_tag(*entry_id, tag.id, field.as_deref())? {
            detached += 1;
        }
    }

    output.success(&format!("Removed {} from {} entry(s)", tag.name, detached));
    Ok(())
}
