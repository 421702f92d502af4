use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::Result;

/// All files under `directory` whose extension is in `extensions`, sorted by path.
/// Extensions compare case-insensitively and may be given with or without a dot.
pub fn discover_images(directory: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let wanted: Vec<String> = extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect();

    let mut images = Vec::new();

    for entry in WalkDir::new(directory)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if path.is_file() {
            if let Some(ext) = path.extension() {
                let ext_lower = ext.to_string_lossy().to_lowercase();
                if wanted.iter().any(|e| *e == ext_lower) {
                    images.push(path.to_path_buf());
                }
            }
        }
    }

    // Sort by path for consistent ordering
    images.sort();

    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::tempdir;

    #[test]
    fn test_discover_images() {
        let dir = tempdir().unwrap();

        File::create(dir.path().join("cover1.jpg")).unwrap();
        File::create(dir.path().join("cover2.PNG")).unwrap();
        File::create(dir.path().join("notes.txt")).unwrap();

        fs::create_dir(dir.path().join("crate_b")).unwrap();
        File::create(dir.path().join("crate_b/cover3.jpeg")).unwrap();

        let extensions = vec!["jpg".to_string(), ".jpeg".to_string(), "png".to_string()];
        let images = discover_images(dir.path(), &extensions).unwrap();

        assert_eq!(images.len(), 3);
        assert!(images.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_discover_images_missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        let images = discover_images(&dir.path().join("nope"), &["jpg".to_string()]).unwrap();
        assert!(images.is_empty());
    }
}
