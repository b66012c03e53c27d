/// The photo catalog behind the public listing
///
/// `data.json` is an array of entry objects; every entry points at a file
/// under the image directory. Nothing is cached: each operation reads the
/// whole file, mutates it and writes it back. Keys this program doesn't know
/// about are carried through every rewrite.

use log::{debug, info, warn};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::data::{file_name_of, CatalogEntry, PhotoDetails};
use crate::media::normalize::{normalize, NormalizeError, NormalizeOptions};

const UTF8_BOM: &str = "\u{feff}";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("a photo file and a full address are both required")]
    MissingField,
    #[error("{0} has no file name")]
    NoFileName(PathBuf),
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot serialize catalog: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("photo optimization failed: {0}")]
    Normalize(#[from] NormalizeError),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Outcome of removing a batch of entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalSummary {
    /// Entries taken out of the catalog
    pub removed: usize,
    /// Names of photo files deleted from disk
    pub files_deleted: Vec<String>,
    /// Photo files that existed but could not be deleted, with the reason
    pub file_errors: Vec<(String, String)>,
    /// Requested indices past the end of the catalog
    pub skipped: Vec<usize>,
}

impl RemovalSummary {
    /// Commit message naming the first few deleted files
    pub fn commit_message(&self) -> String {
        let shown = self
            .files_deleted
            .iter()
            .take(3)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        let more = if self.files_deleted.len() > 3 { "..." } else { "" };
        format!("Remove {} photos: {}{}", self.removed, shown, more)
    }
}

/// Handle to the catalog file and the image directory it references
#[derive(Debug, Clone)]
pub struct PhotoCatalog {
    project_dir: PathBuf,
    catalog_path: PathBuf,
    images_dir: PathBuf,
}

impl PhotoCatalog {
    pub fn new(project_dir: PathBuf, catalog_path: PathBuf, images_dir: PathBuf) -> Self {
        Self {
            project_dir,
            catalog_path,
            images_dir,
        }
    }

    pub fn path(&self) -> &Path {
        &self.catalog_path
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Read every entry.
    ///
    /// A missing or empty file is an empty catalog and a leading BOM is
    /// ignored. Invalid UTF-8 or malformed JSON degrades to an empty catalog
    /// with a warning.
    pub fn load(&self) -> CatalogResult<Vec<CatalogEntry>> {
        let raw = match fs::read(&self.catalog_path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(CatalogError::Read {
                    path: self.catalog_path.clone(),
                    source,
                })
            }
        };

        let bytes = raw.strip_prefix(UTF8_BOM.as_bytes()).unwrap_or(&raw);
        let text = match std::str::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    "Catalog {} is not valid UTF-8 ({}), treating it as empty",
                    self.catalog_path.display(),
                    e
                );
                return Ok(Vec::new());
            }
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<Vec<CatalogEntry>>(text) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(
                    "Catalog {} is malformed ({}), treating it as empty",
                    self.catalog_path.display(),
                    e
                );
                Ok(Vec::new())
            }
        }
    }

    /// Rewrite the whole file: 4-space indent, non-ASCII kept as is.
    pub fn save(&self, entries: &[CatalogEntry]) -> CatalogResult<()> {
        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        entries.serialize(&mut serializer)?;

        if let Some(parent) = self.catalog_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| CatalogError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        fs::write(&self.catalog_path, buf).map_err(|source| CatalogError::Write {
            path: self.catalog_path.clone(),
            source,
        })?;

        debug!(
            "Wrote {} catalog entries to {}",
            entries.len(),
            self.catalog_path.display()
        );
        Ok(())
    }

    /// Add one entry at the end, returning the new length.
    pub fn append(&self, entry: CatalogEntry) -> CatalogResult<usize> {
        let mut entries = self.load()?;
        entries.push(entry);
        self.save(&entries)?;
        Ok(entries.len())
    }

    /// Remove entries by position and delete their photo files.
    ///
    /// Indices are handled highest first so earlier removals don't shift later
    /// ones. File deletion is best-effort: failures are recorded in the summary
    /// and never abort the batch.
    pub fn remove(&self, indices: &[usize]) -> CatalogResult<RemovalSummary> {
        let mut entries = self.load()?;
        let mut summary = RemovalSummary::default();

        let mut ordered = indices.to_vec();
        ordered.sort_unstable_by(|a, b| b.cmp(a));
        ordered.dedup();

        for index in ordered {
            if index >= entries.len() {
                warn!("Skipping invalid catalog index {}", index);
                summary.skipped.push(index);
                continue;
            }

            let entry = entries.remove(index);
            summary.removed += 1;

            if entry.photo_path.is_empty() {
                continue;
            }

            let photo = self.project_dir.join(&entry.photo_path);
            if !photo.exists() {
                continue;
            }

            let name = entry.file_name().to_string();
            debug!("Deleting photo file {}", photo.display());
            match fs::remove_file(&photo) {
                Ok(()) => summary.files_deleted.push(name),
                Err(e) => {
                    warn!("Could not delete {}: {}", photo.display(), e);
                    summary.file_errors.push((name, e.to_string()));
                }
            }
        }

        if summary.removed > 0 {
            self.save(&entries)?;
            info!(
                "Removed {} catalog entries, deleted {} files",
                summary.removed,
                summary.files_deleted.len()
            );
        }

        Ok(summary)
    }

    /// Normalize a photo into the image directory and catalog it.
    ///
    /// The entry's `photo_path` is `images/<file name>` relative to the project root.
    pub fn add_photo(
        &self,
        source: &Path,
        details: &PhotoDetails,
        options: &NormalizeOptions,
    ) -> CatalogResult<CatalogEntry> {
        let full_address = details.full_address.trim();
        if source.as_os_str().is_empty() || full_address.is_empty() {
            return Err(CatalogError::MissingField);
        }

        let file_name = source
            .file_name()
            .ok_or_else(|| CatalogError::NoFileName(source.to_path_buf()))?;

        fs::create_dir_all(&self.images_dir).map_err(|e| CatalogError::Write {
            path: self.images_dir.clone(),
            source: e,
        })?;
        let destination = self.images_dir.join(file_name);
        normalize(source, &destination, options)?;

        let entry = CatalogEntry {
            photo_path: self.relative_photo_path(&destination),
            full_address: full_address.to_string(),
            age: details.age.trim().to_string(),
            price: details.price.trim().to_string(),
            height: details.height.trim().to_string(),
            weight: details.weight.trim().to_string(),
            ..Default::default()
        };
        self.append(entry.clone())?;

        info!("Cataloged photo {}", entry.photo_path);
        Ok(entry)
    }

    /// Append entries whose photo file name isn't cataloged yet.
    /// Returns how many were added.
    pub fn merge(&self, candidates: Vec<CatalogEntry>) -> CatalogResult<usize> {
        let mut entries = self.load()?;
        let mut known: HashSet<String> = entries
            .iter()
            .map(|entry| entry.file_name().to_string())
            .collect();

        let mut added = 0;
        for candidate in candidates {
            let name = candidate.file_name().to_string();
            if name.is_empty() || !known.insert(name) {
                continue;
            }
            entries.push(candidate);
            added += 1;
        }

        if added > 0 {
            self.save(&entries)?;
            info!("Merged {} entries into the catalog", added);
        }
        Ok(added)
    }

    /// `photo_path` value for a file inside the image directory
    fn relative_photo_path(&self, photo: &Path) -> String {
        let relative = photo.strip_prefix(&self.project_dir).unwrap_or(photo);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Listing text for one entry, e.g. `[0] Some Street 1 - a.jpg`
pub fn listing_line(index: usize, entry: &CatalogEntry) -> String {
    let address = if entry.full_address.is_empty() {
        "N/A"
    } else {
        entry.full_address.as_str()
    };
    let file = match file_name_of(&entry.photo_path) {
        "" => "N/A",
        name => name,
    };
    format!("[{}] {} - {}", index, address, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn catalog_in(dir: &Path) -> PhotoCatalog {
        PhotoCatalog::new(
            dir.to_path_buf(),
            dir.join("data.json"),
            dir.join("images"),
        )
    }

    fn entry(name: &str) -> CatalogEntry {
        CatalogEntry {
            photo_path: format!("images/{}", name),
            full_address: format!("Street of {}", name),
            age: "30".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_empty_and_malformed_files_load_empty() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog_in(dir.path());
        assert!(catalog.load().unwrap().is_empty());

        fs::write(catalog.path(), "").unwrap();
        assert!(catalog.load().unwrap().is_empty());

        fs::write(catalog.path(), "{ not json").unwrap();
        assert!(catalog.load().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_utf8_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog_in(dir.path());
        fs::write(catalog.path(), [0xff, 0xfe, b'[', b']']).unwrap();

        assert!(catalog.load().unwrap().is_empty());
        assert_eq!(catalog.append(entry("a.jpg")).unwrap(), 1);
    }

    #[test]
    fn test_append_keeps_numeric_values_and_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog_in(dir.path());
        fs::write(
            catalog.path(),
            r#"[
                {"photo_path": "images/a.jpg", "full_address": "A", "age": 25},
                {"photo_path": "images/b.jpg", "full_address": "B", "photo_filename": "b.jpg"}
            ]"#,
        )
        .unwrap();
        assert_eq!(catalog.load().unwrap().len(), 2);

        assert_eq!(catalog.append(entry("c.jpg")).unwrap(), 3);

        let loaded = catalog.load().unwrap();
        let names: Vec<&str> = loaded.iter().map(CatalogEntry::file_name).collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg", "c.jpg"]);
        assert_eq!(loaded[0].age, "25");
        assert_eq!(loaded[1].extra["photo_filename"], "b.jpg");

        let text = fs::read_to_string(catalog.path()).unwrap();
        assert!(text.contains("\"photo_filename\": \"b.jpg\""));
    }

    #[test]
    fn test_load_accepts_byte_order_mark() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog_in(dir.path());
        fs::write(
            catalog.path(),
            "\u{feff}[{\"photo_path\": \"images/a.jpg\", \"full_address\": \"杭州\"}]",
        )
        .unwrap();

        let entries = catalog.load().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].full_address, "杭州");
    }

    #[test]
    fn test_append_save_load_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog_in(dir.path());

        for name in ["c.jpg", "a.jpg", "b.jpg"] {
            catalog.append(entry(name)).unwrap();
        }

        let loaded = catalog.load().unwrap();
        assert_eq!(loaded, vec![entry("c.jpg"), entry("a.jpg"), entry("b.jpg")]);
    }

    #[test]
    fn test_save_is_pretty_and_keeps_unicode() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog_in(dir.path());
        let mut e = entry("a.jpg");
        e.full_address = "浙江省杭州市".into();
        catalog.save(&[e]).unwrap();

        let text = fs::read_to_string(catalog.path()).unwrap();
        assert!(text.contains("浙江省杭州市"));
        assert!(text.contains("\n        \"photo_path\": \"images/a.jpg\""));
    }

    #[test]
    fn test_remove_first_and_last_of_three() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog_in(dir.path());
        fs::create_dir_all(catalog.images_dir()).unwrap();
        for name in ["a.jpg", "b.jpg", "c.jpg"] {
            fs::write(catalog.images_dir().join(name), b"x").unwrap();
            catalog.append(entry(name)).unwrap();
        }

        let summary = catalog.remove(&[0, 2]).unwrap();

        assert_eq!(summary.removed, 2);
        assert_eq!(summary.files_deleted, vec!["c.jpg", "a.jpg"]);
        assert_eq!(catalog.load().unwrap(), vec![entry("b.jpg")]);
        assert!(catalog.images_dir().join("b.jpg").exists());
        assert!(!catalog.images_dir().join("a.jpg").exists());
    }

    #[test]
    fn test_remove_tolerates_missing_files_and_bad_indices() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog_in(dir.path());
        catalog.append(entry("gone.jpg")).unwrap();

        let summary = catalog.remove(&[5, 0, 0]).unwrap();

        assert_eq!(summary.removed, 1);
        assert!(summary.files_deleted.is_empty());
        assert_eq!(summary.skipped, vec![5]);
        assert!(catalog.load().unwrap().is_empty());
    }

    #[test]
    fn test_remove_records_file_errors_and_carries_on() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog_in(dir.path());
        // A directory where the photo should be can't be removed as a file
        fs::create_dir_all(catalog.images_dir().join("stuck.jpg")).unwrap();
        fs::write(catalog.images_dir().join("ok.jpg"), b"x").unwrap();
        catalog.append(entry("stuck.jpg")).unwrap();
        catalog.append(entry("ok.jpg")).unwrap();

        let summary = catalog.remove(&[0, 1]).unwrap();

        assert_eq!(summary.removed, 2);
        assert_eq!(summary.files_deleted, vec!["ok.jpg"]);
        assert_eq!(summary.file_errors.len(), 1);
        assert_eq!(summary.file_errors[0].0, "stuck.jpg");
        assert!(catalog.load().unwrap().is_empty());
    }

    #[test]
    fn test_commit_message_lists_first_three_files() {
        let summary = RemovalSummary {
            removed: 4,
            files_deleted: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            ..Default::default()
        };
        assert_eq!(summary.commit_message(), "Remove 4 photos: a, b, c...");

        let summary = RemovalSummary {
            removed: 1,
            files_deleted: vec!["a".into()],
            ..Default::default()
        };
        assert_eq!(summary.commit_message(), "Remove 1 photos: a");
    }

    #[test]
    fn test_add_photo_normalizes_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let catalog = catalog_in(dir.path());
        let source = outside.path().join("portrait.png");
        RgbImage::from_pixel(200, 200, Rgb([9, 9, 9]))
            .save(&source)
            .unwrap();

        let details = PhotoDetails {
            full_address: " Lake Rd 1 ".into(),
            price: "100".into(),
            ..Default::default()
        };
        let added = catalog
            .add_photo(&source, &details, &NormalizeOptions::default())
            .unwrap();

        assert_eq!(added.photo_path, "images/portrait.png");
        assert_eq!(added.full_address, "Lake Rd 1");
        let stored = image::open(catalog.images_dir().join("portrait.png")).unwrap();
        assert_eq!((stored.width(), stored.height()), (600, 600));
        assert_eq!(catalog.load().unwrap(), vec![added]);
    }

    #[test]
    fn test_add_photo_requires_address() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog_in(dir.path());

        let err = catalog
            .add_photo(
                Path::new("/tmp/a.jpg"),
                &PhotoDetails::default(),
                &NormalizeOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, CatalogError::MissingField));
        assert!(catalog.load().unwrap().is_empty());
    }

    #[test]
    fn test_merge_skips_known_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog_in(dir.path());
        catalog.append(entry("a.jpg")).unwrap();

        let added = catalog
            .merge(vec![entry("a.jpg"), entry("b.jpg"), entry("b.jpg")])
            .unwrap();

        assert_eq!(added, 1);
        assert_eq!(catalog.load().unwrap(), vec![entry("a.jpg"), entry("b.jpg")]);
    }

    #[test]
    fn test_listing_line() {
        assert_eq!(listing_line(2, &entry("a.jpg")), "[2] Street of a.jpg - a.jpg");
        assert_eq!(listing_line(0, &CatalogEntry::default()), "[0] N/A - N/A");
    }
}
