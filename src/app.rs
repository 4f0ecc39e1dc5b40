use crate::config::GalleryConfig;
use crate::controller::GalleryController;
use crate::error::AppError;
use crate::platform;
use crate::services::GalleryRepository;
use media_store::{LocalMediaStore, MediaIndex, MediaStoreConfig, StorageRegime};
use std::sync::Arc;
use unsplash_client::{PhotoSource, UnsplashClient};

/// Services shared by the whole app, built once at start
pub struct AppContext {
    pub config: GalleryConfig,
    pub remote: Arc<dyn PhotoSource>,
    pub repository: Arc<GalleryRepository>,
}

impl AppContext {
    pub fn init(config: GalleryConfig) -> Result<Self, AppError> {
        let remote: Arc<dyn PhotoSource> = Arc::new(UnsplashClient::new(config.unsplash_config())?);
        if config.unsplash.access_key.trim().is_empty() {
            log::warn!("No Unsplash access key configured; remote results will be unavailable");
        }

        let media_config = config.media_store_config(&platform::default_storage_root()?);
        let (index, detected) = open_index(&media_config)?;
        let regime = config.fixed_regime().unwrap_or(detected);
        let store = LocalMediaStore::new(index, regime, &media_config);

        Ok(Self::with_parts(config, store, remote))
    }

    /// Wires already constructed parts
    pub fn with_parts(
        config: GalleryConfig,
        store: LocalMediaStore,
        remote: Arc<dyn PhotoSource>,
    ) -> Self {
        let repository = GalleryRepository::new(store, remote.clone())
            .with_sizes(config.unsplash.page_size, config.unsplash.random_count);
        Self {
            config,
            remote,
            repository: Arc::new(repository),
        }
    }

    pub fn repository(&self) -> Arc<GalleryRepository> {
        self.repository.clone()
    }

    /// Starts a controller with `query` as the initial search text.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn start_controller(&self, query: &str) -> GalleryController {
        GalleryController::start_with_query(
            self.repository.as_ref().clone(),
            self.config.controller_settings(),
            query,
        )
    }
}

#[cfg(target_os = "android")]
fn open_index(
    _config: &MediaStoreConfig,
) -> Result<(Arc<dyn MediaIndex>, StorageRegime), AppError> {
    let index = media_store::ContentResolverIndex::new()?;
    Ok((Arc::new(index), media_store::probe_regime()))
}

#[cfg(not(target_os = "android"))]
fn open_index(
    config: &MediaStoreConfig,
) -> Result<(Arc<dyn MediaIndex>, StorageRegime), AppError> {
    let db_path = platform::index_db_path()?;
    log::debug!("Opening media index at {}", db_path.display());
    let index = media_store::SqliteMediaIndex::open(&db_path, &config.external_root)?;
    Ok((Arc::new(index), StorageRegime::ModernScoped))
}
