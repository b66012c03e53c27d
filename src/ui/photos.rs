use iced::widget::{button, checkbox, column, row, scrollable, text, text_input, Column};
use iced::{Alignment, Element, Length, Task};
use log::{error, info};
use rfd::FileDialog;
use std::collections::BTreeSet;
use std::path::PathBuf;

use super::{confirm, run_blocking};
use crate::media::import::{import_folder, ImportResult};
use crate::media::normalize::NormalizeOptions;
use crate::publish::{PublishError, Publisher, SyncReport};
use crate::state::catalog::{listing_line, PhotoCatalog, RemovalSummary};
use crate::state::data::{CatalogEntry, PhotoDetails};
use crate::state::records::RecordStore;

/// Metadata inputs on the photo form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoField {
    FullAddress,
    Age,
    Price,
    Height,
    Weight,
}

impl PhotoField {
    const ALL: [PhotoField; 5] = [
        PhotoField::FullAddress,
        PhotoField::Age,
        PhotoField::Price,
        PhotoField::Height,
        PhotoField::Weight,
    ];

    fn label(self) -> &'static str {
        match self {
            PhotoField::FullAddress => "Full address",
            PhotoField::Age => "Age",
            PhotoField::Price => "Price",
            PhotoField::Height => "Height",
            PhotoField::Weight => "Weight",
        }
    }

    fn value(self, details: &PhotoDetails) -> &str {
        match self {
            PhotoField::FullAddress => &details.full_address,
            PhotoField::Age => &details.age,
            PhotoField::Price => &details.price,
            PhotoField::Height => &details.height,
            PhotoField::Weight => &details.weight,
        }
    }

    fn value_mut(self, details: &mut PhotoDetails) -> &mut String {
        match self {
            PhotoField::FullAddress => &mut details.full_address,
            PhotoField::Age => &mut details.age,
            PhotoField::Price => &mut details.price,
            PhotoField::Height => &mut details.height,
            PhotoField::Weight => &mut details.weight,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    PickPhoto,
    PhotoPathChanged(String),
    DetailChanged(PhotoField, String),
    ClearForm,
    Submit,
    PhotoAdded(Result<CatalogEntry, String>),
    Toggle(usize, bool),
    DeleteSelected,
    Removed(Result<RemovalSummary, String>),
    ImportLegacyDb,
    LegacyImported(Result<usize, String>),
    ImportFolder,
    FolderImported(Result<ImportResult, String>),
    Publish,
    Synced(Result<SyncReport, PublishError>),
}

/// Photo tab: add photos to the published catalog, delete them, import old
/// data, and push the result to the site repository.
pub struct PhotoTab {
    catalog: PhotoCatalog,
    publisher: Publisher,
    options: NormalizeOptions,
    photo_path: String,
    details: PhotoDetails,
    entries: Vec<CatalogEntry>,
    selected: BTreeSet<usize>,
    /// A background catalog job is running
    working: bool,
    status: String,
}

impl PhotoTab {
    pub fn new(catalog: PhotoCatalog, publisher: Publisher, options: NormalizeOptions) -> Self {
        let mut tab = PhotoTab {
            catalog,
            publisher,
            options,
            photo_path: String::new(),
            details: PhotoDetails::default(),
            entries: Vec::new(),
            selected: BTreeSet::new(),
            working: false,
            status: String::new(),
        };
        tab.reload();
        info!(
            "Catalog {} holds {} photos",
            tab.catalog.path().display(),
            tab.entries.len()
        );
        tab.status = format!("{} photos in the catalog.", tab.entries.len());
        tab
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::PickPhoto => {
                let picked = FileDialog::new()
                    .set_title("Select a photo")
                    .add_filter("Image files", &["jpg", "jpeg", "png", "gif", "webp"])
                    .add_filter("All files", &["*"])
                    .pick_file();
                if let Some(path) = picked {
                    self.photo_path = path.to_string_lossy().to_string();
                }
                Task::none()
            }
            Message::PhotoPathChanged(path) => {
                self.photo_path = path;
                Task::none()
            }
            Message::DetailChanged(field, value) => {
                *field.value_mut(&mut self.details) = value;
                Task::none()
            }
            Message::ClearForm => {
                self.clear_form();
                Task::none()
            }
            Message::Submit => self.submit(),
            Message::PhotoAdded(result) => {
                self.working = false;
                match result {
                    Ok(entry) => {
                        self.status = format!("Added {} to the catalog.", entry.photo_path);
                        self.clear_form();
                        self.reload();
                        self.start_sync(None)
                    }
                    Err(e) => {
                        self.status = format!("Could not add the photo: {}", e);
                        Task::none()
                    }
                }
            }
            Message::Toggle(index, checked) => {
                if checked {
                    self.selected.insert(index);
                } else {
                    self.selected.remove(&index);
                }
                Task::none()
            }
            Message::DeleteSelected => self.delete_selected(),
            Message::Removed(result) => {
                self.working = false;
                self.reload();
                match result {
                    Ok(summary) => self.after_removal(summary),
                    Err(e) => {
                        self.status = format!("Deleting photos failed: {}", e);
                        Task::none()
                    }
                }
            }
            Message::ImportLegacyDb => self.import_legacy_db(),
            Message::LegacyImported(result) => {
                self.working = false;
                match result {
                    Ok(0) => {
                        self.status = "No new entries to import.".to_string();
                        Task::none()
                    }
                    Ok(added) => {
                        self.status = format!("Imported {} entries.", added);
                        self.reload();
                        self.start_sync(None)
                    }
                    Err(e) => {
                        self.status = format!("Import failed: {}", e);
                        Task::none()
                    }
                }
            }
            Message::ImportFolder => self.import_folder(),
            Message::FolderImported(result) => {
                self.working = false;
                match result {
                    Ok(summary) => {
                        self.status = format!(
                            "Copied {} photos, skipped {} existing, {} failed.",
                            summary.imported_count, summary.skipped_count, summary.failed_count
                        );
                        if summary.imported_count > 0 {
                            self.start_sync(None)
                        } else {
                            Task::none()
                        }
                    }
                    Err(e) => {
                        self.status = format!("Folder import failed: {}", e);
                        Task::none()
                    }
                }
            }
            Message::Publish => {
                self.status.clear();
                self.start_sync(None)
            }
            Message::Synced(result) => {
                match result {
                    Ok(report) => {
                        self.status = format!(
                            "Published \"{}\" to {} ({}) at {}.",
                            report.commit_message,
                            report.remote,
                            report.branch,
                            report.finished_at.format("%H:%M:%S")
                        );
                    }
                    Err(e) => {
                        self.status = format!("Publishing failed: {}", e);
                    }
                }
                Task::none()
            }
        }
    }

    fn submit(&mut self) -> Task<Message> {
        let source = self.photo_path.trim();
        if source.is_empty() || self.details.full_address.trim().is_empty() {
            self.status = "A photo file and a full address are required.".to_string();
            return Task::none();
        }

        let catalog = self.catalog.clone();
        let source = PathBuf::from(source);
        let details = self.details.clone();
        let options = self.options;

        self.working = true;
        self.status = format!("Optimizing {}...", source.display());
        Task::perform(
            run_blocking(move || {
                catalog
                    .add_photo(&source, &details, &options)
                    .map_err(|e| e.to_string())
            }),
            Message::PhotoAdded,
        )
    }

    fn delete_selected(&mut self) -> Task<Message> {
        let indices: Vec<usize> = self.selected.iter().copied().collect();
        if indices.is_empty() {
            self.status = "Select the photos to delete first.".to_string();
            return Task::none();
        }

        let question = format!(
            "Delete the {} selected photos and their files? The website will be updated.",
            indices.len()
        );
        if !confirm("Confirm deletion", &question) {
            return Task::none();
        }

        let catalog = self.catalog.clone();
        self.working = true;
        self.selected.clear();
        self.status = format!("Deleting {} photos...", indices.len());
        Task::perform(
            run_blocking(move || catalog.remove(&indices).map_err(|e| e.to_string())),
            Message::Removed,
        )
    }

    fn after_removal(&mut self, summary: RemovalSummary) -> Task<Message> {
        if summary.removed == 0 {
            self.status = "Nothing was deleted.".to_string();
            return Task::none();
        }

        let mut status = format!(
            "Removed {} photos ({} files deleted).",
            summary.removed,
            summary.files_deleted.len()
        );
        for (name, reason) in &summary.file_errors {
            status.push_str(&format!(" Could not delete {}: {}.", name, reason));
        }
        self.status = status;
        self.start_sync(Some(summary.commit_message()))
    }

    fn import_legacy_db(&mut self) -> Task<Message> {
        let Some(db_path) = FileDialog::new()
            .set_title("Select an addresses.db file")
            .add_filter("SQLite database", &["db"])
            .add_filter("All files", &["*"])
            .pick_file()
        else {
            return Task::none();
        };

        let catalog = self.catalog.clone();
        self.working = true;
        self.status = format!("Importing from {}...", db_path.display());
        Task::perform(
            run_blocking(move || {
                let store = RecordStore::open_read_only(&db_path).map_err(|e| e.to_string())?;
                let candidates = store.catalog_candidates().map_err(|e| e.to_string())?;
                catalog.merge(candidates).map_err(|e| e.to_string())
            }),
            Message::LegacyImported,
        )
    }

    fn import_folder(&mut self) -> Task<Message> {
        let Some(folder) = FileDialog::new()
            .set_title("Select a folder of old photos")
            .pick_folder()
        else {
            return Task::none();
        };

        let images_dir = self.catalog.images_dir().to_path_buf();
        let options = self.options;
        self.working = true;
        self.status = format!("Importing photos from {}...", folder.display());
        Task::perform(
            run_blocking(move || {
                import_folder(&folder, &images_dir, &options).map_err(|e| e.to_string())
            }),
            Message::FolderImported,
        )
    }

    /// Kick off a publish; the outcome of the current action stays in the status line
    fn start_sync(&mut self, message: Option<String>) -> Task<Message> {
        let (notice, task) = match self.publisher.synchronize(message) {
            Ok(job) => {
                info!("Synchronization started");
                (
                    "Publishing in the background...".to_string(),
                    Task::perform(job.finished(), Message::Synced),
                )
            }
            Err(e) => (e.to_string(), Task::none()),
        };
        if !self.status.is_empty() {
            self.status.push(' ');
        }
        self.status.push_str(&notice);
        task
    }

    fn reload(&mut self) {
        match self.catalog.load() {
            Ok(entries) => self.entries = entries,
            Err(e) => {
                error!("Failed to load catalog: {}", e);
                self.status = format!("Could not read the catalog: {}", e);
            }
        }
        self.selected.retain(|&i| i < self.entries.len());
    }

    fn clear_form(&mut self) {
        self.photo_path.clear();
        self.details = PhotoDetails::default();
    }

    pub fn view(&self) -> Element<'_, Message> {
        let idle = !self.working;

        let mut form = Column::new().spacing(6).push(text("Upload a photo").size(20));
        form = form.push(
            row![
                text("Photo file").width(Length::Fixed(130.0)),
                text_input("Path to a photo", &self.photo_path)
                    .on_input(Message::PhotoPathChanged)
                    .width(Length::Fill),
                button("Browse").on_press(Message::PickPhoto),
            ]
            .spacing(8)
            .align_y(Alignment::Center),
        );
        for field in PhotoField::ALL {
            form = form.push(
                row![
                    text(field.label()).width(Length::Fixed(130.0)),
                    text_input(field.label(), field.value(&self.details))
                        .on_input(move |value| Message::DetailChanged(field, value))
                        .width(Length::Fill),
                ]
                .spacing(8)
                .align_y(Alignment::Center),
            );
        }
        form = form.push(
            row![
                button("Clear").on_press(Message::ClearForm),
                button("Add photo and publish").on_press_maybe(idle.then_some(Message::Submit)),
            ]
            .spacing(8),
        );

        let list = if self.entries.is_empty() {
            Column::new().push(text("No photos yet"))
        } else {
            Column::with_children(self.entries.iter().enumerate().map(|(index, entry)| {
                checkbox(listing_line(index, entry), self.selected.contains(&index))
                    .on_toggle(move |checked| Message::Toggle(index, checked))
                    .into()
            }))
        };

        let actions = row![
            button("Delete selected").on_press_maybe(idle.then_some(Message::DeleteSelected)),
            button("Import old info (DB)").on_press_maybe(idle.then_some(Message::ImportLegacyDb)),
            button("Import old photos (folder)")
                .on_press_maybe(idle.then_some(Message::ImportFolder)),
            button("Publish now")
                .on_press_maybe((!self.publisher.is_busy()).then_some(Message::Publish)),
        ]
        .spacing(8);

        let content = column![
            form,
            text("Uploaded photos").size(20),
            scrollable(list.spacing(4)).height(Length::Fixed(300.0)),
            actions,
            text(&self.status).size(14),
        ]
        .spacing(16)
        .padding(10);

        scrollable(content).into()
    }
}
