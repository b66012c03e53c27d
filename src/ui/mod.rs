/// User interface
///
/// Each tab owns its state and message type; `main.rs` routes between them.
/// - Address book form, queries and results (address.rs)
/// - Photo catalog, imports and publishing (photos.rs)

pub mod address;
pub mod photos;

/// Top-level tabs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Addresses,
    Photos,
}

/// Run blocking work (file I/O, image codecs) off the UI thread
pub async fn run_blocking<T, F>(job: F) -> Result<T, String>
where
    F: FnOnce() -> Result<T, String> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| format!("Task join error: {}", e))?
}

/// Ask the operator a yes/no question with a native dialog
pub fn confirm(title: &str, description: &str) -> bool {
    let answer = rfd::MessageDialog::new()
        .set_level(rfd::MessageLevel::Warning)
        .set_title(title)
        .set_description(description)
        .set_buttons(rfd::MessageButtons::YesNo)
        .show();
    matches!(answer, rfd::MessageDialogResult::Yes)
}
