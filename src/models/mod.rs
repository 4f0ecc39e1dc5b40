pub mod gallery_item;
pub mod mapper;

pub use gallery_item::GalleryItem;
pub use mapper::to_gallery_item;
