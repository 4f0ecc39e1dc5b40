//! # Unsplash Client
//!
//! A thin typed binding for the two Unsplash endpoints a photo gallery needs.
//!
//! This crate provides:
//! - Keyword search (`GET /search/photos`, paginated)
//! - Random sample (`GET /photos/random`)
//! - Serde models mirroring the API's JSON
//! - The [`PhotoSource`] trait, so callers can swap the network for a fake
//!
//! It does **not** retry, cache or rate-limit; failures are returned to the
//! caller as [`ApiError`].
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use unsplash_client::{UnsplashClient, UnsplashConfig, DEFAULT_PAGE_SIZE};
//!
//! let client = UnsplashClient::new(UnsplashConfig {
//!     access_key: "your-access-key".to_string(),
//!     ..UnsplashConfig::default()
//! })?;
//! let page = client.search_photos("lighthouse", 1, DEFAULT_PAGE_SIZE).await?;
//! ```

pub mod models;
pub mod service;

pub use models::{Exif, Location, PhotoUrls, PhotoUser, Position, RawPhoto, SearchResponse};
pub use service::{
    ApiError, PhotoSource, UnsplashClient, UnsplashConfig, DEFAULT_BASE_URL, DEFAULT_PAGE_SIZE,
    RANDOM_SAMPLE_COUNT,
};
