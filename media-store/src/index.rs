use crate::models::{IndexRow, NewEntry, QueryFilter};
use std::io::{Read, Write};
use std::path::Path;

/// Scheme of locators handed out by the shared media index
pub const CONTENT_SCHEME: &str = "content://";

/// Base locator of image entries in the shared index
pub const IMAGES_CONTENT_URI: &str = "content://media/external/images/media";

/// Error type for media index operations
#[derive(Debug)]
pub enum IndexError {
    Database(rusqlite::Error),
    Io(std::io::Error),
    NotFound(String),
    PermissionDenied(String),
    Platform(String),
}

impl std::fmt::Display for IndexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexError::Database(e) => write!(f, "Database error: {}", e),
            IndexError::Io(e) => write!(f, "IO error: {}", e),
            IndexError::NotFound(msg) => write!(f, "Not found: {}", msg),
            IndexError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            IndexError::Platform(msg) => write!(f, "Platform error: {}", msg),
        }
    }
}

impl std::error::Error for IndexError {}

impl From<rusqlite::Error> for IndexError {
    fn from(err: rusqlite::Error) -> Self {
        IndexError::Database(err)
    }
}

impl From<std::io::Error> for IndexError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::PermissionDenied {
            IndexError::PermissionDenied(err.to_string())
        } else {
            IndexError::Io(err)
        }
    }
}

/// The device's shared media index.
///
/// Other apps and the OS mutate it concurrently. All methods block and must
/// be called off the UI context.
pub trait MediaIndex: Send + Sync {
    /// Finalised rows matching `filter`, newest first
    fn query(&self, filter: &QueryFilter) -> Result<Vec<IndexRow>, IndexError>;

    /// Creates an entry and returns its locator
    fn insert(&self, entry: &NewEntry) -> Result<String, IndexError>;

    /// Clears the pending flag; returns affected rows
    fn finish_pending(&self, uri: &str) -> Result<usize, IndexError>;

    /// Removes an entry (and its backing bytes); returns affected rows
    fn delete(&self, uri: &str) -> Result<usize, IndexError>;

    fn open_read(&self, uri: &str) -> Result<Box<dyn Read + Send>, IndexError>;

    fn open_write(&self, uri: &str) -> Result<Box<dyn Write + Send>, IndexError>;

    /// Tells the index about a file written directly to disk
    fn scan_file(&self, path: &Path, mime_type: &str) -> Result<(), IndexError>;
}

/// True for locators that point into the shared index
pub fn is_content_locator(locator: &str) -> bool {
    locator.starts_with(CONTENT_SCHEME)
}

pub fn image_uri(id: i64) -> String {
    format!("{}/{}", IMAGES_CONTENT_URI, id)
}

/// Extracts the row id from an image locator
pub fn image_id(uri: &str) -> Option<i64> {
    uri.strip_prefix(IMAGES_CONTENT_URI)?
        .strip_prefix('/')?
        .parse()
        .ok()
}

/// `LIKE` pattern matching everything under `prefix`, for use with `ESCAPE '\\'`
pub fn like_prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
