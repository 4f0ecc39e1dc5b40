use serde::{Deserialize, Serialize};

/// A photo as returned by the search and random endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawPhoto {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub alt_description: Option<String>,
    pub urls: PhotoUrls,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    pub user: PhotoUser,
    #[serde(default)]
    pub exif: Option<Exif>,
    #[serde(default)]
    pub location: Option<Location>,
}

/// Hotlinks to the photo in various sizes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhotoUrls {
    #[serde(default)]
    pub raw: String,
    pub full: String,
    pub regular: String,
    #[serde(default)]
    pub small: String,
    #[serde(default)]
    pub thumb: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhotoUser {
    pub name: String,
    #[serde(default)]
    pub username: String,
}

/// Camera settings; any field may be missing or null
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Exif {
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub exposure_time: Option<String>,
    #[serde(default)]
    pub aperture: Option<String>,
    #[serde(default)]
    pub focal_length: Option<String>,
    #[serde(default)]
    pub iso: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Location {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub position: Option<Position>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// Envelope of `GET /search/photos`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    pub total: u64,
    pub total_pages: u32,
    pub results: Vec<RawPhoto>,
}

/// Error body the API sends with non-2xx responses
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_FIXTURE: &str = r##"{
        "total": 133,
        "total_pages": 7,
        "results": [
            {
                "id": "eOLpJytrbsQ",
                "created_at": "2014-11-18T14:35:36-05:00",
                "width": 4000,
                "height": 3000,
                "color": "#A7A2A1",
                "likes": 286,
                "description": "A man drinking a coffee.",
                "alt_description": "man in black jacket",
                "user": {
                    "id": "Ul0QVz12Goo",
                    "username": "ugmonk",
                    "name": "Jeff Sheldon"
                },
                "urls": {
                    "raw": "https://images.unsplash.com/photo-1416339306562-f3d12fefd36f",
                    "full": "https://images.unsplash.com/photo-1416339306562-f3d12fefd36f?q=85",
                    "regular": "https://images.unsplash.com/photo-1416339306562-f3d12fefd36f?w=1080",
                    "small": "https://images.unsplash.com/photo-1416339306562-f3d12fefd36f?w=400",
                    "thumb": "https://images.unsplash.com/photo-1416339306562-f3d12fefd36f?w=200"
                }
            }
        ]
    }"##;

    const RANDOM_FIXTURE: &str = r#"[{
        "id": "Dwu85P9SOIk",
        "width": 2448,
        "height": 3264,
        "description": null,
        "alt_description": "green leaves",
        "exif": {
            "make": "Canon",
            "model": "Canon EOS 40D",
            "exposure_time": "0.011111111111111112",
            "aperture": "4.970854",
            "focal_length": "37",
            "iso": 100
        },
        "location": {
            "name": "Montreal, Canada",
            "city": "Montreal",
            "country": "Canada",
            "position": { "latitude": 45.5016889, "longitude": -73.567256 }
        },
        "urls": {
            "raw": "https://images.unsplash.com/photo-1417325384643-aac51acc9e5d",
            "full": "https://images.unsplash.com/photo-1417325384643-aac51acc9e5d?q=75",
            "regular": "https://images.unsplash.com/photo-1417325384643-aac51acc9e5d?w=1080",
            "small": "https://images.unsplash.com/photo-1417325384643-aac51acc9e5d?w=400",
            "thumb": "https://images.unsplash.com/photo-1417325384643-aac51acc9e5d?w=200"
        },
        "user": { "username": "johndoe", "name": "John Doe" }
    }]"#;

    #[test]
    fn test_search_fixture_parses() {
        let response: SearchResponse = serde_json::from_str(SEARCH_FIXTURE).unwrap();
        assert_eq!(response.total, 133);
        assert_eq!(response.total_pages, 7);
        assert_eq!(response.results.len(), 1);

        let photo = &response.results[0];
        assert_eq!(photo.id, "eOLpJytrbsQ");
        assert_eq!(photo.user.name, "Jeff Sheldon");
        assert_eq!(photo.width, 4000);
        assert!(photo.exif.is_none());
        assert!(photo.location.is_none());
    }

    #[test]
    fn test_random_fixture_parses_nested_blocks() {
        let photos: Vec<RawPhoto> = serde_json::from_str(RANDOM_FIXTURE).unwrap();
        let photo = &photos[0];

        assert_eq!(photo.description, None);
        assert_eq!(photo.alt_description.as_deref(), Some("green leaves"));
        let exif = photo.exif.as_ref().unwrap();
        assert_eq!(exif.make.as_deref(), Some("Canon"));
        assert_eq!(exif.iso, Some(100));
        let location = photo.location.as_ref().unwrap();
        assert_eq!(location.city.as_deref(), Some("Montreal"));
        assert_eq!(
            location.position.as_ref().and_then(|p| p.latitude),
            Some(45.5016889)
        );
    }

    #[test]
    fn test_null_location_fields() {
        let json = r#"{
            "id": "x",
            "urls": { "full": "f", "regular": "r" },
            "user": { "name": "n" },
            "exif": { "make": null, "iso": null },
            "location": { "name": null, "city": null, "country": null,
                          "position": { "latitude": null, "longitude": null } }
        }"#;
        let photo: RawPhoto = serde_json::from_str(json).unwrap();
        assert_eq!(photo.exif, Some(Exif::default()));
        assert_eq!(photo.location.unwrap().city, None);
    }

    #[test]
    fn test_error_body() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"errors":["OAuth error: The access token is invalid"]}"#)
                .unwrap();
        assert_eq!(body.errors, vec!["OAuth error: The access token is invalid"]);
    }
}
