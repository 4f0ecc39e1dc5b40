//! # Media Store
//!
//! Storage of app-owned images inside the device's shared media index.
//!
//! This crate provides:
//! - Listing, importing, persisting and deleting owned images ([`LocalMediaStore`])
//! - Both device storage regimes: scoped collections with pending writes, and
//!   legacy direct file paths registered after writing
//! - A [`MediaIndex`] abstraction with a SQLite-backed implementation for
//!   desktop runs and tests, and a `ContentResolver` binding on Android
//! - Camera capture and image picking through single-use completion slots
//!
//! ## Failure policy
//!
//! Store operations never fail towards the caller. Problems are logged and
//! reported as an empty list, `None` or `false`; cancellation is the one
//! outcome reported as an error ([`Cancelled`]).
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use media_store::{LocalMediaStore, MediaStoreConfig, SqliteMediaIndex, StorageRegime};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! let config = MediaStoreConfig::default();
//! let index = Arc::new(SqliteMediaIndex::open(&db_path, &config.external_root)?);
//! let store = LocalMediaStore::new(index, StorageRegime::ModernScoped, &config);
//!
//! let locator = store
//!     .import_external_image("/home/me/photo.jpg", &CancellationToken::new())
//!     .await?;
//! let images = store.list_owned_images().await;
//! ```

pub mod copy;
pub mod index;
pub mod layout;
pub mod models;
pub mod picker;
pub mod schema;
pub mod sqlite_index;
pub mod store;

#[cfg(target_os = "android")]
pub mod android;

pub use copy::Cancelled;
pub use index::{is_content_locator, IndexError, MediaIndex, CONTENT_SCHEME};
pub use layout::StorageLayout;
pub use models::{IndexRow, LocalImage, MediaStoreConfig, NewEntry, QueryFilter, StorageRegime};
pub use picker::PickerError;
pub use schema::init_index_schema;
pub use sqlite_index::SqliteMediaIndex;
pub use store::LocalMediaStore;

#[cfg(target_os = "android")]
pub use android::{probe_regime, ContentResolverIndex};
