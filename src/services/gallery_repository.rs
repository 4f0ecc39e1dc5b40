use crate::models::GalleryItem;
use media_store::{Cancelled, LocalMediaStore};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use unsplash_client::{ApiError, PhotoSource, DEFAULT_PAGE_SIZE, RANDOM_SAMPLE_COUNT};

/// Lists produced by one [`GalleryRepository::fetch`] call: the local list,
/// then (if the remote call succeeds) local followed by remote items.
///
/// A remote failure does not end the sequence abnormally; it is available
/// from [`FetchSequence::failure`] once [`FetchSequence::next`] returned `None`.
pub struct FetchSequence {
    items: mpsc::Receiver<Vec<GalleryItem>>,
    failure: oneshot::Receiver<ApiError>,
    task: JoinHandle<()>,
}

impl FetchSequence {
    pub async fn next(&mut self) -> Option<Vec<GalleryItem>> {
        self.items.recv().await
    }

    /// The remote failure of this fetch, if any
    pub async fn failure(&mut self) -> Option<ApiError> {
        (&mut self.failure).await.ok()
    }
}

impl Drop for FetchSequence {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Combines owned local images with remote photos
#[derive(Clone)]
pub struct GalleryRepository {
    store: LocalMediaStore,
    remote: Arc<dyn PhotoSource>,
    page_size: u32,
    random_count: u32,
}

impl GalleryRepository {
    pub fn new(store: LocalMediaStore, remote: Arc<dyn PhotoSource>) -> Self {
        Self {
            store,
            remote,
            page_size: DEFAULT_PAGE_SIZE,
            random_count: RANDOM_SAMPLE_COUNT,
        }
    }

    pub fn with_sizes(mut self, page_size: u32, random_count: u32) -> Self {
        self.page_size = page_size;
        self.random_count = random_count;
        self
    }

    pub fn store(&self) -> &LocalMediaStore {
        &self.store
    }

    /// Starts a fetch for `term`; a blank term asks for a random sample.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn fetch(&self, term: &str) -> FetchSequence {
        let (items_tx, items) = mpsc::channel(2);
        let (failure_tx, failure) = oneshot::channel();
        let repository = self.clone();
        let term = term.trim().to_string();

        let task = tokio::spawn(async move {
            let local: Vec<GalleryItem> = repository
                .store
                .list_owned_images()
                .await
                .into_iter()
                .map(GalleryItem::from_local)
                .collect();
            log::debug!("Fetch {:?}: {} local items", term, local.len());
            if items_tx.send(local.clone()).await.is_err() {
                return;
            }

            let remote = if term.is_empty() {
                repository.remote.random_photos(repository.random_count).await
            } else {
                repository
                    .remote
                    .search_photos(&term, 1, repository.page_size)
                    .await
                    .map(|response| response.results)
            };

            match remote {
                Ok(photos) => {
                    log::debug!("Fetch {:?}: {} remote items", term, photos.len());
                    let mut merged = local;
                    merged.extend(photos.into_iter().map(GalleryItem::from));
                    let _ = items_tx.send(merged).await;
                }
                Err(e) => {
                    log::warn!("Remote fetch for {:?} failed: {}", term, e);
                    let _ = failure_tx.send(e);
                }
            }
        });

        FetchSequence {
            items,
            failure,
            task,
        }
    }

    /// Local items only, newest first
    pub async fn local_items(&self) -> Vec<GalleryItem> {
        self.store
            .list_owned_images()
            .await
            .into_iter()
            .map(GalleryItem::from_local)
            .collect()
    }

    pub async fn persist_captured_photo(
        &self,
        temp_file: &Path,
        display_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, Cancelled> {
        self.store
            .persist_captured_image(temp_file, display_name, cancel)
            .await
    }

    pub async fn import_external_image(
        &self,
        source: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, Cancelled> {
        self.store.import_external_image(source, cancel).await
    }

    pub async fn delete_owned_image(&self, locator: &str) -> bool {
        self.store.delete_owned_image(locator).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use media_store::{MediaStoreConfig, SqliteMediaIndex, StorageRegime};
    use std::sync::Mutex;
    use unsplash_client::{PhotoUrls, PhotoUser, RawPhoto, SearchResponse};

    pub(crate) fn remote_photo(id: &str) -> RawPhoto {
        RawPhoto {
            id: id.to_string(),
            description: Some(format!("remote {}", id)),
            alt_description: None,
            urls: PhotoUrls {
                raw: String::new(),
                full: format!("https://images.unsplash.com/{}?full", id),
                regular: format!("https://images.unsplash.com/{}?regular", id),
                small: String::new(),
                thumb: String::new(),
            },
            width: 10,
            height: 20,
            user: PhotoUser {
                name: "Photographer".to_string(),
                username: "photographer".to_string(),
            },
            exif: None,
            location: None,
        }
    }

    /// Photo source with canned answers that records its calls
    #[derive(Default)]
    pub(crate) struct FakeSource {
        pub offline: bool,
        pub calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PhotoSource for FakeSource {
        async fn search_photos(
            &self,
            query: &str,
            page: u32,
            per_page: u32,
        ) -> Result<SearchResponse, ApiError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("search:{}:{}:{}", query, page, per_page));
            if self.offline {
                return Err(ApiError::Network("offline".to_string()));
            }
            Ok(SearchResponse {
                total: 1,
                total_pages: 1,
                results: vec![remote_photo(&format!("{}-1", query))],
            })
        }

        async fn random_photos(&self, count: u32) -> Result<Vec<RawPhoto>, ApiError> {
            self.calls.lock().unwrap().push(format!("random:{}", count));
            if self.offline {
                return Err(ApiError::Network("offline".to_string()));
            }
            Ok(vec![remote_photo("r1"), remote_photo("r2")])
        }
    }

    pub(crate) struct Fixture {
        pub dir: tempfile::TempDir,
        pub source: Arc<FakeSource>,
        pub repository: GalleryRepository,
    }

    impl Fixture {
        pub fn new(offline: bool) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path().join("media");
            let index = Arc::new(SqliteMediaIndex::open_in_memory(&root).unwrap());
            let config = MediaStoreConfig {
                album: "Test".to_string(),
                external_root: root,
                buffer_size: 1024,
            };
            let store = LocalMediaStore::new(index, StorageRegime::ModernScoped, &config);
            let source = Arc::new(FakeSource {
                offline,
                ..FakeSource::default()
            });
            let repository = GalleryRepository::new(store, source.clone());
            Self {
                dir,
                source,
                repository,
            }
        }

        /// Imports a small file and returns its locator
        pub async fn add_local(&self, name: &str) -> String {
            let path = self.dir.path().join(name);
            std::fs::write(&path, b"local image bytes").unwrap();
            self.repository
                .import_external_image(path.to_str().unwrap(), &CancellationToken::new())
                .await
                .unwrap()
                .unwrap()
        }
    }

    async fn collect(mut sequence: FetchSequence) -> (Vec<Vec<GalleryItem>>, Option<ApiError>) {
        let mut lists = Vec::new();
        while let Some(items) = sequence.next().await {
            lists.push(items);
        }
        let failure = sequence.failure().await;
        (lists, failure)
    }

    #[tokio::test]
    async fn test_blank_term_fetches_random_sample() {
        let fx = Fixture::new(false);
        let local = fx.add_local("a.jpg").await;

        let (lists, failure) = collect(fx.repository.fetch("  ")).await;

        assert!(failure.is_none());
        assert_eq!(lists.len(), 2);
        assert_eq!(lists[0].len(), 1);
        assert_eq!(lists[0][0].id, local);
        let ids: Vec<_> = lists[1].iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec![local.as_str(), "r1", "r2"]);
        assert_eq!(*fx.source.calls.lock().unwrap(), vec!["random:30"]);
    }

    #[tokio::test]
    async fn test_search_term_uses_first_page() {
        let fx = Fixture::new(false);

        let (lists, _) = collect(fx.repository.fetch("cats")).await;

        assert_eq!(lists.len(), 2);
        assert!(lists[0].is_empty());
        assert_eq!(lists[1][0].id, "cats-1");
        assert!(!lists[1][0].is_local);
        assert_eq!(*fx.source.calls.lock().unwrap(), vec!["search:cats:1:20"]);
    }

    #[tokio::test]
    async fn test_offline_keeps_local_list_and_reports_failure() {
        let fx = Fixture::new(true);
        let local = fx.add_local("a.jpg").await;

        let (lists, failure) = collect(fx.repository.fetch("")).await;

        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0][0].id, local);
        assert!(matches!(failure, Some(ApiError::Network(_))));
    }

    #[tokio::test]
    async fn test_custom_sizes() {
        let fx = Fixture::new(false);
        let repository = fx.repository.clone().with_sizes(5, 7);

        collect(repository.fetch("dogs")).await;
        collect(repository.fetch("")).await;

        assert_eq!(
            *fx.source.calls.lock().unwrap(),
            vec!["search:dogs:1:5", "random:7"]
        );
    }

    #[tokio::test]
    async fn test_pass_through_delete() {
        let fx = Fixture::new(false);
        let local = fx.add_local("a.jpg").await;

        assert!(fx.repository.delete_owned_image(&local).await);
        assert!(fx.repository.local_items().await.is_empty());
    }
}
