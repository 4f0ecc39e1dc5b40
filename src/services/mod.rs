pub mod gallery_repository;

pub use gallery_repository::{FetchSequence, GalleryRepository};
