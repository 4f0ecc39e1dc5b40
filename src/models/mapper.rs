//! Conversion of remote photos into gallery items.

use super::GalleryItem;
use unsplash_client::RawPhoto;

/// Maps a remote photo. Optional EXIF and location blocks are flattened
/// only when present; nothing gets a placeholder value here.
pub fn to_gallery_item(photo: RawPhoto) -> GalleryItem {
    let exif = photo.exif.unwrap_or_default();
    let location = photo.location.unwrap_or_default();

    GalleryItem {
        id: photo.id,
        regular_url: photo.urls.regular,
        full_url: photo.urls.full,
        description: photo.description.or(photo.alt_description),
        is_local: false,
        filename: None,
        file_size: None,
        pixel_size: Some(format!("{} x {}", photo.width, photo.height)),
        camera_make: exif.make,
        camera_model: exif.model,
        exposure_time: exif.exposure_time,
        aperture: exif.aperture,
        focal_length: exif.focal_length,
        iso: exif.iso.map(|iso| iso.to_string()),
        photographer: Some(photo.user.name),
        location_name: location.name,
        city: location.city,
        country: location.country,
    }
}

impl From<RawPhoto> for GalleryItem {
    fn from(photo: RawPhoto) -> Self {
        to_gallery_item(photo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unsplash_client::{Exif, Location, PhotoUrls, PhotoUser};

    fn photo() -> RawPhoto {
        RawPhoto {
            id: "abc".to_string(),
            description: None,
            alt_description: None,
            urls: PhotoUrls {
                raw: "https://images.unsplash.com/abc".to_string(),
                full: "https://images.unsplash.com/abc?q=85".to_string(),
                regular: "https://images.unsplash.com/abc?w=1080".to_string(),
                small: String::new(),
                thumb: String::new(),
            },
            width: 4000,
            height: 3000,
            user: PhotoUser {
                name: "Ann Example".to_string(),
                username: "ann".to_string(),
            },
            exif: None,
            location: None,
        }
    }

    #[test]
    fn test_minimal_photo() {
        let item = to_gallery_item(photo());

        assert_eq!(item.id, "abc");
        assert!(!item.is_local);
        assert_eq!(item.regular_url, "https://images.unsplash.com/abc?w=1080");
        assert_eq!(item.full_url, "https://images.unsplash.com/abc?q=85");
        assert_eq!(item.pixel_size.as_deref(), Some("4000 x 3000"));
        assert_eq!(item.photographer.as_deref(), Some("Ann Example"));
        assert_eq!(item.description, None);
        // absent blocks stay absent
        assert_eq!(item.camera_make, None);
        assert_eq!(item.iso, None);
        assert_eq!(item.city, None);
    }

    #[test]
    fn test_nested_blocks_are_flattened() {
        let mut raw = photo();
        raw.exif = Some(Exif {
            make: Some("Canon".to_string()),
            model: Some("EOS 40D".to_string()),
            exposure_time: Some("1/60".to_string()),
            aperture: Some("4.0".to_string()),
            focal_length: Some("35".to_string()),
            iso: Some(200),
        });
        raw.location = Some(Location {
            name: Some("Montreal, Canada".to_string()),
            city: Some("Montreal".to_string()),
            country: Some("Canada".to_string()),
            position: None,
        });

        let item: GalleryItem = raw.into();
        assert_eq!(item.camera_make.as_deref(), Some("Canon"));
        assert_eq!(item.camera_model.as_deref(), Some("EOS 40D"));
        assert_eq!(item.exposure_time.as_deref(), Some("1/60"));
        assert_eq!(item.aperture.as_deref(), Some("4.0"));
        assert_eq!(item.focal_length.as_deref(), Some("35"));
        assert_eq!(item.iso.as_deref(), Some("200"));
        assert_eq!(item.location_name.as_deref(), Some("Montreal, Canada"));
        assert_eq!(item.city.as_deref(), Some("Montreal"));
        assert_eq!(item.country.as_deref(), Some("Canada"));
    }

    #[test]
    fn test_description_falls_back_to_alt_text() {
        let mut raw = photo();
        raw.alt_description = Some("green leaves".to_string());
        assert_eq!(to_gallery_item(raw.clone()).description.as_deref(), Some("green leaves"));

        raw.description = Some("Fern".to_string());
        assert_eq!(to_gallery_item(raw).description.as_deref(), Some("Fern"));
    }
}
