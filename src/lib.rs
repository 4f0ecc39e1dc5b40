//! # Unsplash Gallery
//!
//! Data layer of a photo gallery that shows the user's own images next to
//! photos from Unsplash.
//!
//! - [`models`]: the unified [`models::GalleryItem`] and the remote mapper
//! - [`services`]: the repository merging local and remote results
//! - [`controller`]: debounced search and the observable gallery state
//! - [`app`]: one-time wiring of client, media index and repository

pub mod app;
pub mod camera;
pub mod config;
pub mod controller;
pub mod error;
pub mod models;
pub mod platform;
pub mod services;
