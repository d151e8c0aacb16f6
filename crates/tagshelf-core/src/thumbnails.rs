//! Thumbnail cache paths
//!
//! The library never decodes images. It only needs to know where a
//! renderer keeps thumbnails so that removing a folder can drop them too.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Thumbnail edge length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThumbSize {
    Medium,
    Large,
}

impl ThumbSize {
    pub fn pixels(self) -> u32 {
        match self {
            ThumbSize::Medium => 256,
            ThumbSize::Large => 512,
        }
    }
}

/// Resolves where thumbnails for a folder's entries live
pub trait ThumbnailCache: Send + Sync {
    fn folder_dir(&self, folder_id: i64) -> PathBuf;

    fn thumbnail_path(&self, folder_id: i64, entry_id: i64, size: ThumbSize) -> PathBuf {
        self.folder_dir(folder_id)
            .join(size.pixels().to_string())
            .join(format!("{}.png", entry_id))
    }

    /// Delete every cached thumbnail of a folder; missing is fine
    fn remove_folder(&self, folder_id: i64) -> io::Result<()> {
        match fs::remove_dir_all(self.folder_dir(folder_id)) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

/// `<data dir>/thumbnails/<folder_id>/...`
#[derive(Debug, Clone)]
pub struct DataDirThumbnails {
    root: PathBuf,
}

impl DataDirThumbnails {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            root: data_dir.join("thumbnails"),
        }
    }
}

impl ThumbnailCache for DataDirThumbnails {
    fn folder_dir(&self, folder_id: i64) -> PathBuf {
        self.root.join(folder_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_thumbnail_layout() {
        let cache = DataDirThumbnails::new(Path::new("/lib/.TagShelf"));
        assert_eq!(
            cache.thumbnail_path(3, 42, ThumbSize::Large),
            PathBuf::from("/lib/.TagShelf/thumbnails/3/512/42.png")
        );
    }

    #[test]
    fn test_remove_folder() {
        let temp_dir = TempDir::new().unwrap();
        let cache = DataDirThumbnails::new(temp_dir.path());

        // Nothing cached yet
        cache.remove_folder(1).unwrap();

        let thumb = cache.thumbnail_path(1, 7, ThumbSize::Medium);
        fs::create_dir_all(thumb.parent().unwrap()).unwrap();
        fs::write(&thumb, b"png").unwrap();

        cache.remove_folder(1).unwrap();
        assert!(!cache.folder_dir(1).exists());
    }
}
