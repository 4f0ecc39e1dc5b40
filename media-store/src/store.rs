use crate::copy::{copy_chunked, read_head, Cancelled, CopyError};
use crate::index::{is_content_locator, IndexError, MediaIndex};
use crate::layout::{timestamp_name, unique_name, StorageLayout};
use crate::models::{IndexRow, LocalImage, MediaStoreConfig, NewEntry, StorageRegime};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Bytes sniffed from the start of a stream to detect the image format
const SNIFF_LEN: usize = 512;

const FALLBACK_MIME: &str = "image/jpeg";
const FALLBACK_EXTENSION: &str = "jpg";

/// Failure inside a write sequence, before it is collapsed at the store boundary
#[derive(Debug)]
enum WriteError {
    Index(IndexError),
    Io(std::io::Error),
    Cancelled,
}

impl std::fmt::Display for WriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteError::Index(e) => write!(f, "{}", e),
            WriteError::Io(e) => write!(f, "IO error: {}", e),
            WriteError::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl From<IndexError> for WriteError {
    fn from(err: IndexError) -> Self {
        WriteError::Index(err)
    }
}

impl From<std::io::Error> for WriteError {
    fn from(err: std::io::Error) -> Self {
        WriteError::Io(err)
    }
}

impl From<CopyError> for WriteError {
    fn from(err: CopyError) -> Self {
        match err {
            CopyError::Io(e) => WriteError::Io(e),
            CopyError::Cancelled => WriteError::Cancelled,
        }
    }
}

/// Reads, writes and deletes the images this app owns in the shared media index.
///
/// Every public operation is total: failures are logged and collapse into
/// an empty list, `None` or `false`. The only error that gets through is
/// [`Cancelled`]. The async methods run their blocking work on the blocking
/// pool; dropping one of their futures cancels the work in flight.
#[derive(Clone)]
pub struct LocalMediaStore {
    index: Arc<dyn MediaIndex>,
    layout: StorageLayout,
    buffer_size: usize,
}

impl LocalMediaStore {
    /// Creates a store for the given regime; the storage layout is fixed from here on
    pub fn new(index: Arc<dyn MediaIndex>, regime: StorageRegime, config: &MediaStoreConfig) -> Self {
        let layout = StorageLayout::resolve(regime, config);
        log::info!("Media store using {:?}", layout);
        Self {
            index,
            layout,
            buffer_size: config.buffer_size,
        }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn regime(&self) -> StorageRegime {
        self.layout.regime()
    }

    pub async fn list_owned_images(&self) -> Vec<LocalImage> {
        let store = self.clone();
        match tokio::task::spawn_blocking(move || store.list_owned_images_blocking()).await {
            Ok(images) => images,
            Err(e) => {
                log::error!("Listing owned images failed: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn import_external_image(
        &self,
        source: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, Cancelled> {
        let source = source.to_string();
        self.run_blocking(cancel, move |store, token| {
            store.import_external_image_blocking(&source, &token)
        })
        .await
    }

    pub async fn persist_captured_image(
        &self,
        temp_file: &Path,
        display_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, Cancelled> {
        let temp_file = temp_file.to_path_buf();
        let display_name = display_name.to_string();
        self.run_blocking(cancel, move |store, token| {
            store.persist_captured_image_blocking(&temp_file, &display_name, &token)
        })
        .await
    }

    pub async fn delete_owned_image(&self, locator: &str) -> bool {
        let store = self.clone();
        let locator = locator.to_string();
        match tokio::task::spawn_blocking(move || store.delete_owned_image_blocking(&locator)).await
        {
            Ok(deleted) => deleted,
            Err(e) => {
                log::error!("Delete task failed: {}", e);
                false
            }
        }
    }

    /// Runs `op` on the blocking pool with a child token that is cancelled if
    /// the returned future is dropped before completion.
    async fn run_blocking<T, F>(
        &self,
        cancel: &CancellationToken,
        op: F,
    ) -> Result<Option<T>, Cancelled>
    where
        T: Send + 'static,
        F: FnOnce(LocalMediaStore, CancellationToken) -> Result<Option<T>, Cancelled>
            + Send
            + 'static,
    {
        let token = cancel.child_token();
        let guard = token.clone().drop_guard();
        let store = self.clone();
        let result = tokio::task::spawn_blocking(move || op(store, token)).await;
        guard.disarm();

        match result {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => Err(Cancelled),
            Err(e) => {
                log::error!("Storage task failed: {}", e);
                Ok(None)
            }
        }
    }

    /// Owned images, newest first. Rows that are malformed or whose bytes can
    /// not be opened are skipped; a failing query yields an empty list.
    pub fn list_owned_images_blocking(&self) -> Vec<LocalImage> {
        let rows = match self.index.query(&self.layout.filter()) {
            Ok(rows) => rows,
            Err(e) => {
                log::warn!("Media index query failed: {}", e);
                return Vec::new();
            }
        };

        let total = rows.len();
        let images: Vec<LocalImage> = rows
            .into_iter()
            .filter_map(|row| self.validate_row(row))
            .collect();
        if images.len() < total {
            log::debug!("Skipped {} of {} index rows", total - images.len(), total);
        }
        images
    }

    fn validate_row(&self, row: IndexRow) -> Option<LocalImage> {
        let display_name = match (row.id, row.display_name) {
            (Some(_), Some(name)) if !row.uri.is_empty() => name,
            _ => {
                log::debug!("Skipping malformed index row {:?}", row.uri);
                return None;
            }
        };

        // The index may list entries whose bytes are gone or unreadable
        match self.index.open_read(&row.uri) {
            Ok(stream) => drop(stream),
            Err(e) => {
                log::debug!("Skipping unreadable entry {}: {}", row.uri, e);
                return None;
            }
        }

        Some(LocalImage {
            uri: row.uri,
            display_name,
            date_added: row.date_added.unwrap_or_default(),
            size: row.size,
        })
    }

    /// Copies an external image (content locator, path or `file://` URL) into
    /// a new owned entry and returns its locator.
    pub fn import_external_image_blocking(
        &self,
        source: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, Cancelled> {
        log::debug!("Importing {}", source);
        let result = self.open_source(source).and_then(|mut reader| {
            let head = read_head(&mut *reader, SNIFF_LEN)?;
            let (mime_type, extension) = sniff_format(&head, None);
            let display_name = self.free_display_name(&timestamp_name(
                chrono::Local::now(),
                extension,
            ));
            self.write_entry(&display_name, mime_type, &head, reader, cancel)
        });

        match result {
            Ok(uri) => {
                log::info!("Imported {} as {}", source, uri);
                Ok(Some(uri))
            }
            Err(WriteError::Cancelled) => {
                log::info!("Import of {} cancelled", source);
                Err(Cancelled)
            }
            Err(e) => {
                log::error!("Import of {} failed: {}", source, e);
                Ok(None)
            }
        }
    }

    /// Moves a captured photo from `temp_file` into a new owned entry.
    ///
    /// The temporary file is removed in every outcome.
    pub fn persist_captured_image_blocking(
        &self,
        temp_file: &Path,
        display_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, Cancelled> {
        log::debug!("Persisting capture {} as {}", temp_file.display(), display_name);
        let result = File::open(temp_file)
            .map_err(WriteError::from)
            .and_then(|mut file| {
                let head = read_head(&mut file, SNIFF_LEN)?;
                let (mime_type, extension) = sniff_format(&head, Some(display_name));
                let name = if Path::new(display_name).extension().is_some() {
                    display_name.to_string()
                } else {
                    format!("{}.{}", display_name, extension)
                };
                let name = self.free_display_name(&name);
                self.write_entry(&name, mime_type, &head, Box::new(file), cancel)
            });

        if let Err(e) = std::fs::remove_file(temp_file) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Could not remove capture {}: {}", temp_file.display(), e);
            }
        }

        match result {
            Ok(uri) => {
                log::info!("Saved capture as {}", uri);
                Ok(Some(uri))
            }
            Err(WriteError::Cancelled) => {
                log::info!("Saving capture cancelled");
                Err(Cancelled)
            }
            Err(e) => {
                log::error!("Saving capture failed: {}", e);
                Ok(None)
            }
        }
    }

    /// Deletes an owned entry; true if a row went away
    pub fn delete_owned_image_blocking(&self, locator: &str) -> bool {
        if !is_content_locator(locator) {
            log::warn!("Refusing to delete non-content locator {}", locator);
            return false;
        }

        match self.index.open_read(locator) {
            Ok(stream) => drop(stream),
            Err(e) => {
                log::warn!("Not deleting {}: {}", locator, e);
                return false;
            }
        }

        match self.index.delete(locator) {
            Ok(rows) => {
                log::info!("Deleted {} ({} rows)", locator, rows);
                rows > 0
            }
            Err(IndexError::PermissionDenied(msg)) => {
                log::error!("No permission to delete {}: {}", locator, msg);
                false
            }
            Err(e) => {
                log::error!("Deleting {} failed: {}", locator, e);
                false
            }
        }
    }

    fn open_source(&self, source: &str) -> Result<Box<dyn Read + Send>, WriteError> {
        if is_content_locator(source) {
            return Ok(self.index.open_read(source)?);
        }
        let path = source.strip_prefix("file://").unwrap_or(source);
        Ok(Box::new(File::open(path)?))
    }

    fn free_display_name(&self, base: &str) -> String {
        let taken: HashSet<String> = match self.index.query(&self.layout.filter()) {
            Ok(rows) => rows.into_iter().filter_map(|r| r.display_name).collect(),
            Err(e) => {
                log::debug!("Could not read existing names: {}", e);
                HashSet::new()
            }
        };
        unique_name(base, |name| {
            taken.contains(name)
                || self
                    .layout
                    .data_path(name)
                    .map(|p| p.exists())
                    .unwrap_or(false)
        })
    }

    fn write_entry(
        &self,
        display_name: &str,
        mime_type: &str,
        head: &[u8],
        reader: Box<dyn Read + Send>,
        cancel: &CancellationToken,
    ) -> Result<String, WriteError> {
        match &self.layout {
            StorageLayout::Scoped { relative_path } => self.write_pending(
                relative_path,
                display_name,
                mime_type,
                head,
                reader,
                cancel,
            ),
            StorageLayout::Legacy { .. } => {
                self.write_direct(display_name, mime_type, head, reader, cancel)
            }
        }
    }

    /// Pending entry → stream → finalize; the entry is deleted on any failure
    fn write_pending(
        &self,
        relative_path: &str,
        display_name: &str,
        mime_type: &str,
        head: &[u8],
        reader: Box<dyn Read + Send>,
        cancel: &CancellationToken,
    ) -> Result<String, WriteError> {
        if cancel.is_cancelled() {
            return Err(WriteError::Cancelled);
        }

        let uri = self.index.insert(&NewEntry {
            display_name: display_name.to_string(),
            mime_type: mime_type.to_string(),
            relative_path: Some(relative_path.to_string()),
            data: None,
            pending: true,
        })?;
        log::debug!("Created pending entry {}", uri);

        match self.stream_and_finish(&uri, head, reader, cancel) {
            Ok(bytes) => {
                log::debug!("Finalized {} ({} bytes)", uri, bytes);
                Ok(uri)
            }
            Err(e) => {
                self.discard_entry(&uri);
                Err(e)
            }
        }
    }

    fn stream_and_finish(
        &self,
        uri: &str,
        head: &[u8],
        reader: Box<dyn Read + Send>,
        cancel: &CancellationToken,
    ) -> Result<u64, WriteError> {
        let writer = self.index.open_write(uri)?;
        let bytes = copy_chunked(head, reader, writer, self.buffer_size, cancel)?;
        if self.index.finish_pending(uri)? == 0 {
            return Err(WriteError::Index(IndexError::NotFound(format!(
                "{} vanished before it was finalized",
                uri
            ))));
        }
        Ok(bytes)
    }

    fn discard_entry(&self, uri: &str) {
        match self.index.delete(uri) {
            Ok(_) => log::debug!("Discarded partial entry {}", uri),
            Err(e) => log::error!("Could not discard partial entry {}: {}", uri, e),
        }
    }

    /// File → index entry → scan; the file is removed if any step fails
    fn write_direct(
        &self,
        display_name: &str,
        mime_type: &str,
        head: &[u8],
        reader: Box<dyn Read + Send>,
        cancel: &CancellationToken,
    ) -> Result<String, WriteError> {
        if cancel.is_cancelled() {
            return Err(WriteError::Cancelled);
        }

        self.layout.ensure_directory()?;
        let path = self
            .layout
            .data_path(display_name)
            .ok_or_else(|| WriteError::Index(IndexError::Platform("no data path".to_string())))?;

        let file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        if let Err(e) = copy_chunked(head, reader, Box::new(file), self.buffer_size, cancel) {
            remove_quietly(&path);
            return Err(e.into());
        }

        let uri = match self.index.insert(&NewEntry {
            display_name: display_name.to_string(),
            mime_type: mime_type.to_string(),
            relative_path: None,
            data: Some(path.clone()),
            pending: false,
        }) {
            Ok(uri) => uri,
            Err(e) => {
                remove_quietly(&path);
                return Err(e.into());
            }
        };

        if let Err(e) = self.index.scan_file(&path, mime_type) {
            log::warn!("Media scan of {} failed: {}", path.display(), e);
        }

        Ok(uri)
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        log::warn!("Could not remove {}: {}", path.display(), e);
    }
}

/// MIME type and extension for the sniffed bytes, falling back to the name's
/// extension and finally to JPEG
fn sniff_format(head: &[u8], name: Option<&str>) -> (&'static str, &'static str) {
    if let Ok(format) = image::guess_format(head) {
        if let Some(ext) = format.extensions_str().first() {
            return (format.to_mime_type(), *ext);
        }
    }

    let by_name = name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .and_then(image::ImageFormat::from_extension);
    match by_name {
        Some(format) => match format.extensions_str().first() {
            Some(ext) => (format.to_mime_type(), *ext),
            None => (FALLBACK_MIME, FALLBACK_EXTENSION),
        },
        None => (FALLBACK_MIME, FALLBACK_EXTENSION),
    }
}
