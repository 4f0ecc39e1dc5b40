use media_store::{is_content_locator, LocalImage};
use serde::{Deserialize, Serialize};

/// One entry of the gallery, either an owned local image or a remote photo.
///
/// Lists of items are replaced wholesale on every fetch; an item is never
/// changed after it was built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GalleryItem {
    /// Content locator for local items, remote photo id otherwise
    pub id: String,
    /// Locator for the grid thumbnail
    pub regular_url: String,
    /// Locator for full resolution display
    pub full_url: String,
    pub description: Option<String>,
    pub is_local: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pixel_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_make: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aperture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focal_length: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photographer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl GalleryItem {
    /// Item for an owned image; both URLs are the content locator
    pub fn from_local(image: LocalImage) -> Self {
        Self {
            id: image.uri.clone(),
            regular_url: image.uri.clone(),
            full_url: image.uri,
            description: Some(image.display_name),
            is_local: true,
            filename: None,
            file_size: None,
            pixel_size: None,
            camera_make: None,
            camera_model: None,
            exposure_time: None,
            aperture: None,
            focal_length: None,
            iso: None,
            photographer: None,
            location_name: None,
            city: None,
            country: None,
        }
    }

    /// Only owned images behind a content locator can be deleted
    pub fn is_deletable(&self) -> bool {
        self.is_local && is_content_locator(&self.id)
    }
}
