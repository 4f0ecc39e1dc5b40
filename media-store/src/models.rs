use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// An image owned by this app, as read back from the shared media index
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocalImage {
    /// Content locator (`content://media/...`)
    pub uri: String,
    pub display_name: String,
    /// Insertion time in epoch milliseconds
    pub date_added: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
}

/// Raw row as returned by a [`crate::MediaIndex`] query.
///
/// Every column except the locator is optional: the index is shared with
/// other writers and may hand back rows that are incomplete.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexRow {
    pub uri: String,
    pub id: Option<i64>,
    pub display_name: Option<String>,
    pub relative_path: Option<String>,
    pub data: Option<String>,
    pub mime_type: Option<String>,
    pub size: Option<i64>,
    pub date_added: Option<i64>,
}

/// Values for a new index entry
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub display_name: String,
    pub mime_type: String,
    /// Scoped storage: collection token, e.g. `Pictures/UnsplashGallery/`
    pub relative_path: Option<String>,
    /// Legacy storage: absolute path of an already written file
    pub data: Option<PathBuf>,
    pub pending: bool,
}

/// Row filter selecting the owned sub-collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryFilter {
    /// Exact match on the relative path column
    RelativePath(String),
    /// Prefix match on the absolute data path (must end with a separator)
    DataPrefix(String),
}

/// Device storage model, resolved once when the store is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageRegime {
    /// Relative-path collections with provisional (pending) writes
    ModernScoped,
    /// Direct file paths registered with the index after writing
    LegacyDirectPath,
}

/// First platform API level with scoped storage and pending entries
pub const SCOPED_STORAGE_MIN_SDK: i32 = 29;

impl StorageRegime {
    pub fn from_sdk_int(sdk_int: i32) -> Self {
        if sdk_int >= SCOPED_STORAGE_MIN_SDK {
            StorageRegime::ModernScoped
        } else {
            StorageRegime::LegacyDirectPath
        }
    }

    pub fn supports_pending(&self) -> bool {
        matches!(self, StorageRegime::ModernScoped)
    }
}

/// Configuration for the local media store
#[derive(Debug, Clone)]
pub struct MediaStoreConfig {
    /// Name of the app-owned sub-collection below the standard pictures directory
    pub album: String,
    /// Root of shared external storage (legacy regime writes below it)
    pub external_root: PathBuf,
    /// Chunk size of the byte-stream copy loop
    pub buffer_size: usize,
}

impl Default for MediaStoreConfig {
    fn default() -> Self {
        Self {
            album: "UnsplashGallery".to_string(),
            external_root: PathBuf::from("/storage/emulated/0"),
            buffer_size: 8 * 1024,
        }
    }
}
