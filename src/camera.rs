// Thin wrapper around the media-store picker that reports errors as AppError
// and hands results to the gallery controller.

use crate::controller::GalleryController;
use crate::error::AppError;
use chrono::{DateTime, Local};
use media_store::picker;
use std::path::PathBuf;

pub use media_store::picker::AndroidPickerConfig;

/// Display name for a fresh capture; the store appends the extension
pub fn capture_display_name(now: DateTime<Local>) -> String {
    now.format("IMG_%Y%m%d_%H%M%S").to_string()
}

pub async fn capture_photo() -> Result<PathBuf, AppError> {
    Ok(picker::capture_photo().await?)
}

pub async fn pick_images() -> Result<Vec<String>, AppError> {
    Ok(picker::pick_images().await?)
}

/// Takes a photo and hands it to the controller for storage.
///
/// Returns the display name the photo is stored under.
pub async fn capture_into(controller: &GalleryController) -> Result<String, AppError> {
    let temp_file = capture_photo().await?;
    let name = capture_display_name(Local::now());
    log::info!("Captured {} as {}", temp_file.display(), name);
    controller.capture_completed(temp_file, name.clone());
    Ok(name)
}

/// Lets the user pick images and imports them. Returns how many were picked.
pub async fn pick_into(controller: &GalleryController) -> Result<usize, AppError> {
    let picked = pick_images().await?;
    let count = picked.len();
    controller.import_images(picked);
    Ok(count)
}
