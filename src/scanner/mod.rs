pub mod discovery;

use std::path::{Path, PathBuf};

use crate::db::Database;
use crate::error::Result;

pub use discovery::discover_images;

/// Stable key for an image in the processed-images table.
pub fn image_key(path: &Path) -> String {
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

/// Images under `directory` that have not been through extraction yet.
/// The directory is created if it does not exist.
pub fn pending_images(db: &Database, directory: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !directory.exists() {
        std::fs::create_dir_all(directory)?;
        tracing::info!("Created image directory {:?}", directory);
        return Ok(Vec::new());
    }

    let mut pending = Vec::new();
    for path in discover_images(directory, extensions)? {
        if !db.is_image_processed(&image_key(&path))? {
            pending.push(path);
        }
    }
    Ok(pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    #[test]
    fn test_pending_images_skips_processed() {
        let dir = tempdir().unwrap();
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();

        File::create(dir.path().join("a.jpg")).unwrap();
        File::create(dir.path().join("b.jpg")).unwrap();
        db.mark_image_processed(&image_key(&dir.path().join("a.jpg")), 1).unwrap();

        let pending = pending_images(&db, dir.path(), &["jpg".to_string()]).unwrap();
        assert_eq!(pending, vec![dir.path().join("b.jpg")]);
    }

    #[test]
    fn test_pending_images_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("albums_wishlist");
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();

        let pending = pending_images(&db, &target, &["jpg".to_string()]).unwrap();
        assert!(pending.is_empty());
        assert!(target.is_dir());
    }
}
