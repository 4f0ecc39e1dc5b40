//! Search-driven gallery state for the UI layer.

pub mod debounce;
pub mod gallery;

pub use gallery::{ControllerSettings, GalleryController, GalleryEvent, EVENT_BUFFER};
