//! Search command handler

use anyhow::Result;

use tagshelf_core::{FilterState, Library};

use crate::output::Output;

/// Query options collected from the command line
#[derive(Debug, Default)]
pub struct SearchQuery {
    pub id: Option<i64>,
    pub tag_id: Option<i64>,
    pub tag: Option<String>,
    pub name: Option<String>,
    pub path: Option<String>,
    pub page: usize,
    pub page_size: usize,
    pub include_folders: Vec<i64>,
    pub exclude_folders: Vec<i64>,
}

impl SearchQuery {
    pub fn to_filter(&self) -> FilterState {
        let mut filter = FilterState {
            id: self.id,
            tag_id: self.tag_id,
            tag: self.tag.clone(),
            name: self.name.clone(),
            path: self.path.clone(),
            ..FilterState::default()
        }
        .page(self.page)
        .page_size(self.page_size);

        for &folder in &self.include_folders {
            filter = filter.include_folder(folder);
        }
        for &folder in &self.exclude_folders {
            filter = filter.exclude_folder(folder);
        }
        filter
    }
}

pub fn search(library: &Library, query: SearchQuery, output: &Output) -> Result<()> {
    let filter = query.to_filter();
    let result = library.search(&filter)?;
    output.print_search(&result, filter.page_index, filter.page_size);
    Ok(())
}
