/// State management module
///
/// This module handles all persistent application state:
/// - Shared data structures (data.rs)
/// - The SQLite address book (records.rs)
/// - The published photo catalog, data.json plus images/ (catalog.rs)

pub mod catalog;
pub mod data;
pub mod records;
