use log::{info, warn};
use std::path::Path;
use thiserror::Error;
use walkdir::WalkDir;

use super::normalize::{normalize, NormalizeOptions};

/// Photo extensions picked up by a folder import
const PHOTO_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "bmp", "webp"];

/// Result of a folder import operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportResult {
    pub imported_count: usize,
    /// Already present in the image directory
    pub skipped_count: usize,
    pub failed_count: usize,
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("cannot create image directory {path}: {source}")]
    ImagesDir {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("cannot read folder {path}: {source}")]
    Walk {
        path: std::path::PathBuf,
        source: walkdir::Error,
    },
}

/// Normalize every photo directly inside `folder` into `images_dir`.
///
/// Files whose name already exists in `images_dir` are skipped; a photo that
/// fails to normalize is counted and the import carries on.
pub fn import_folder(
    folder: &Path,
    images_dir: &Path,
    options: &NormalizeOptions,
) -> Result<ImportResult, ImportError> {
    std::fs::create_dir_all(images_dir).map_err(|source| ImportError::ImagesDir {
        path: images_dir.to_path_buf(),
        source,
    })?;

    info!("Importing photos from {}", folder.display());
    let mut result = ImportResult::default();

    // Only the folder itself, not its subdirectories
    for entry in WalkDir::new(folder).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|source| ImportError::Walk {
            path: folder.to_path_buf(),
            source,
        })?;
        let path = entry.path();

        if !entry.file_type().is_file() || !is_photo(path) {
            continue;
        }

        let file_name = entry.file_name();
        let destination = images_dir.join(file_name);
        if destination.exists() {
            info!("Skipped (already exists): {}", file_name.to_string_lossy());
            result.skipped_count += 1;
            continue;
        }

        match normalize(path, &destination, options) {
            Ok(_) => result.imported_count += 1,
            Err(e) => {
                warn!("Failed to import {}: {}", path.display(), e);
                result.failed_count += 1;
            }
        }
    }

    info!(
        "Folder import complete: {} new, {} skipped, {} failed",
        result.imported_count, result.skipped_count, result.failed_count
    );
    Ok(result)
}

fn is_photo(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| PHOTO_EXTENSIONS.contains(&ext.as_str()))
}
