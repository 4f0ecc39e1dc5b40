//! Where owned images live, per storage regime.
//!
//! The value written into the index and the value used to filter reads are
//! both produced here from the same [`StorageLayout`], so they can not drift
//! apart (a relative path missing its trailing separator, or a doubled one on
//! the legacy data prefix, makes every owned image invisible to reads).

use crate::models::{MediaStoreConfig, QueryFilter, StorageRegime};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// Standard shared pictures directory
pub const PICTURES_DIR: &str = "Pictures";

/// Resolved storage path descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLayout {
    /// Collection token, always `Pictures/<album>/`
    Scoped { relative_path: String },
    /// Absolute app directory, created on first write
    Legacy { directory: PathBuf },
}

impl StorageLayout {
    pub fn resolve(regime: StorageRegime, config: &MediaStoreConfig) -> Self {
        let album = config.album.trim_matches('/');
        match regime {
            StorageRegime::ModernScoped => StorageLayout::Scoped {
                relative_path: format!("{}/{}/", PICTURES_DIR, album),
            },
            StorageRegime::LegacyDirectPath => StorageLayout::Legacy {
                directory: config.external_root.join(PICTURES_DIR).join(album),
            },
        }
    }

    pub fn regime(&self) -> StorageRegime {
        match self {
            StorageLayout::Scoped { .. } => StorageRegime::ModernScoped,
            StorageLayout::Legacy { .. } => StorageRegime::LegacyDirectPath,
        }
    }

    /// Filter selecting exactly the entries this layout writes
    pub fn filter(&self) -> QueryFilter {
        match self {
            StorageLayout::Scoped { relative_path } => {
                QueryFilter::RelativePath(relative_path.clone())
            }
            StorageLayout::Legacy { directory } => QueryFilter::DataPrefix(data_prefix(directory)),
        }
    }

    /// Relative path value for new scoped entries
    pub fn relative_path(&self) -> Option<&str> {
        match self {
            StorageLayout::Scoped { relative_path } => Some(relative_path),
            StorageLayout::Legacy { .. } => None,
        }
    }

    /// Absolute file path for a new legacy entry
    pub fn data_path(&self, display_name: &str) -> Option<PathBuf> {
        match self {
            StorageLayout::Scoped { .. } => None,
            StorageLayout::Legacy { directory } => Some(PathBuf::from(format!(
                "{}{}",
                data_prefix(directory),
                display_name
            ))),
        }
    }

    /// Creates the legacy app directory if it is missing
    pub fn ensure_directory(&self) -> std::io::Result<()> {
        match self {
            StorageLayout::Scoped { .. } => Ok(()),
            StorageLayout::Legacy { directory } => {
                if !directory.exists() {
                    log::debug!("Creating app directory {}", directory.display());
                    std::fs::create_dir_all(directory)?;
                }
                Ok(())
            }
        }
    }
}

fn data_prefix(directory: &Path) -> String {
    format!("{}/", directory.to_string_lossy().trim_end_matches('/'))
}

/// Builds `IMG_YYYYMMDD_HHMMSS_mmm.<ext>`
pub fn timestamp_name(now: DateTime<Local>, extension: &str) -> String {
    format!("IMG_{}.{}", now.format("%Y%m%d_%H%M%S_%3f"), extension)
}

/// Appends `_1`, `_2`, ... to the file stem until `is_taken` says the name is free
pub fn unique_name(base: &str, is_taken: impl Fn(&str) -> bool) -> String {
    if !is_taken(base) {
        return base.to_string();
    }

    let (stem, ext) = match base.rsplit_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (base, None),
    };

    let mut counter = 1u32;
    loop {
        let candidate = match ext {
            Some(ext) => format!("{}_{}.{}", stem, counter, ext),
            None => format!("{}_{}", stem, counter),
        };
        if !is_taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config(root: &str) -> MediaStoreConfig {
        MediaStoreConfig {
            album: "UnsplashGallery".to_string(),
            external_root: PathBuf::from(root),
            ..MediaStoreConfig::default()
        }
    }

    #[test]
    fn test_scoped_token_matches_filter() {
        let layout = StorageLayout::resolve(StorageRegime::ModernScoped, &config("/sdcard"));
        assert_eq!(layout.relative_path(), Some("Pictures/UnsplashGallery/"));
        assert_eq!(
            layout.filter(),
            QueryFilter::RelativePath("Pictures/UnsplashGallery/".to_string())
        );
    }

    #[test]
    fn test_album_slashes_are_normalised() {
        let mut cfg = config("/sdcard");
        cfg.album = "/UnsplashGallery/".to_string();
        let layout = StorageLayout::resolve(StorageRegime::ModernScoped, &cfg);
        assert_eq!(layout.relative_path(), Some("Pictures/UnsplashGallery/"));
    }

    #[test]
    fn test_legacy_data_path_starts_with_filter_prefix() {
        for root in ["/sdcard", "/sdcard/"] {
            let layout =
                StorageLayout::resolve(StorageRegime::LegacyDirectPath, &config(root));
            let path = layout.data_path("IMG_1.jpg").unwrap();
            match layout.filter() {
                QueryFilter::DataPrefix(prefix) => {
                    assert_eq!(prefix, "/sdcard/Pictures/UnsplashGallery/");
                    assert!(path.to_string_lossy().starts_with(&prefix));
                }
                other => panic!("unexpected filter {:?}", other),
            }
        }
    }

    #[test]
    fn test_timestamp_name() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(timestamp_name(now, "jpg"), "IMG_20240309_140507_000.jpg");
    }

    #[test]
    fn test_unique_name_appends_counter() {
        let taken = ["IMG_1.jpg", "IMG_1_1.jpg"];
        let name = unique_name("IMG_1.jpg", |n| taken.contains(&n));
        assert_eq!(name, "IMG_1_2.jpg");
        assert_eq!(unique_name("IMG_2.jpg", |n| taken.contains(&n)), "IMG_2.jpg");
    }
}
