use crate::controller::ControllerSettings;
use crate::error::AppError;
use media_store::{MediaStoreConfig, StorageRegime};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use unsplash_client::{UnsplashConfig, DEFAULT_BASE_URL, DEFAULT_PAGE_SIZE, RANDOM_SAMPLE_COUNT};

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const APP_DIR_NAME: &str = "unsplash-gallery";
pub const ACCESS_KEY_ENV: &str = "UNSPLASH_ACCESS_KEY";

/// Application configuration, read from TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    pub unsplash: UnsplashSection,
    pub storage: StorageSection,
    pub controller: ControllerSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnsplashSection {
    pub access_key: String,
    pub base_url: String,
    pub page_size: u32,
    pub random_count: u32,
    pub timeout_secs: u64,
}

impl Default for UnsplashSection {
    fn default() -> Self {
        Self {
            access_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            random_count: RANDOM_SAMPLE_COUNT,
            timeout_secs: 30,
        }
    }
}

/// Which storage regime to use; `Auto` asks the device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegimeSetting {
    #[default]
    Auto,
    Scoped,
    Legacy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub album: String,
    pub regime: RegimeSetting,
    /// Storage root; platform default when unset
    pub root: Option<PathBuf>,
    pub buffer_size: usize,
}

impl Default for StorageSection {
    fn default() -> Self {
        let media = MediaStoreConfig::default();
        Self {
            album: media.album,
            regime: RegimeSetting::Auto,
            root: None,
            buffer_size: media.buffer_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSection {
    pub debounce_ms: u64,
    pub min_query_len: usize,
    pub refresh_attempts: u32,
    pub refresh_delay_ms: u64,
}

impl Default for ControllerSection {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            min_query_len: 3,
            refresh_attempts: 5,
            refresh_delay_ms: 1000,
        }
    }
}

impl GalleryConfig {
    /// Loads the configuration.
    ///
    /// An explicit path must exist. Without one the default location is
    /// tried and a missing file yields the defaults. The access key from
    /// the environment wins over the file.
    pub fn load(explicit: Option<&Path>) -> Result<Self, AppError> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    log::debug!("No configuration file found, using defaults");
                    Self::default()
                }
            },
        };

        if let Ok(key) = std::env::var(ACCESS_KEY_ENV) {
            if !key.trim().is_empty() {
                config.unsplash.access_key = key;
            }
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        log::info!("Loaded configuration from {}", path.display());
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, AppError> {
        Ok(toml::from_str(text)?)
    }

    pub fn unsplash_config(&self) -> UnsplashConfig {
        UnsplashConfig {
            access_key: self.unsplash.access_key.clone(),
            base_url: self.unsplash.base_url.clone(),
            timeout_secs: self.unsplash.timeout_secs,
        }
    }

    /// Media store settings with the storage root resolved against `default_root`
    pub fn media_store_config(&self, default_root: &Path) -> MediaStoreConfig {
        MediaStoreConfig {
            album: self.storage.album.clone(),
            external_root: self
                .storage
                .root
                .clone()
                .unwrap_or_else(|| default_root.to_path_buf()),
            buffer_size: self.storage.buffer_size.max(1),
        }
    }

    /// The configured regime, or `None` when the device should decide
    pub fn fixed_regime(&self) -> Option<StorageRegime> {
        match self.storage.regime {
            RegimeSetting::Auto => None,
            RegimeSetting::Scoped => Some(StorageRegime::ModernScoped),
            RegimeSetting::Legacy => Some(StorageRegime::LegacyDirectPath),
        }
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            debounce: Duration::from_millis(self.controller.debounce_ms),
            min_query_len: self.controller.min_query_len,
            refresh_attempts: self.controller.refresh_attempts,
            refresh_delay: Duration::from_millis(self.controller.refresh_delay_ms),
        }
    }
}

/// `<config dir>/unsplash-gallery/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = GalleryConfig::parse("").unwrap();
        assert_eq!(config, GalleryConfig::default());
        assert_eq!(config.unsplash.page_size, 20);
        assert_eq!(config.unsplash.random_count, 30);
        assert_eq!(config.controller_settings(), ControllerSettings::default());
        assert_eq!(config.fixed_regime(), None);
    }

    #[test]
    fn test_partial_sections() {
        let config = GalleryConfig::parse(
            r#"
            [unsplash]
            access_key = "abc"

            [storage]
            regime = "legacy"
            root = "/sdcard"

            [controller]
            debounce_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.unsplash.access_key, "abc");
        assert_eq!(config.unsplash.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.fixed_regime(), Some(StorageRegime::LegacyDirectPath));
        assert_eq!(
            config.controller_settings().debounce,
            Duration::from_millis(250)
        );
        assert_eq!(config.controller.min_query_len, 3);

        let media = config.media_store_config(Path::new("/unused"));
        assert_eq!(media.external_root, PathBuf::from("/sdcard"));
    }

    #[test]
    fn test_default_root_is_used_when_unset() {
        let media = GalleryConfig::default().media_store_config(Path::new("/data/gallery"));
        assert_eq!(media.external_root, PathBuf::from("/data/gallery"));
        assert_eq!(media.album, MediaStoreConfig::default().album);
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let err = GalleryConfig::parse("[storage]\nregime = \"sideways\"").unwrap_err();
        assert!(matches!(err, AppError::ConfigParse(_)));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = GalleryConfig::from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[storage]\nalbum = \"Trips\"\n").unwrap();

        let config = GalleryConfig::from_file(&path).unwrap();
        assert_eq!(config.storage.album, "Trips");
    }
}
