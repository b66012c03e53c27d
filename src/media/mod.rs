/// Photo file handling
///
/// This module handles:
/// - Resizing and re-encoding photos into the publish envelope
/// - Bulk imports of photo folders into the image directory

pub mod import;
pub mod normalize;
