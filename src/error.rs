use media_store::PickerError;
use std::fmt;
use unsplash_client::ApiError;

/// Central error types for the gallery
#[derive(Debug)]
pub enum AppError {
    /// Configuration could not be located or is invalid
    Config(String),
    /// Configuration file is not valid TOML
    ConfigParse(toml::de::Error),
    /// Remote photo service failure
    Remote(ApiError),
    /// Local media storage failure
    Storage(String),
    /// Camera or picker failure
    Picker(PickerError),
    /// Filesystem error
    Io(std::io::Error),
    /// General error
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::ConfigParse(e) => write!(f, "Invalid configuration: {}", e),
            AppError::Remote(e) => write!(f, "Remote error: {}", e),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Picker(e) => write!(f, "Picker error: {}", e),
            AppError::Io(e) => write!(f, "Filesystem error: {}", e),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for AppError {}

// Conversions from other error types
impl From<toml::de::Error> for AppError {
    fn from(e: toml::de::Error) -> Self {
        AppError::ConfigParse(e)
    }
}

impl From<ApiError> for AppError {
    fn from(e: ApiError) -> Self {
        AppError::Remote(e)
    }
}

impl From<PickerError> for AppError {
    fn from(e: PickerError) -> Self {
        AppError::Picker(e)
    }
}

impl From<media_store::IndexError> for AppError {
    fn from(e: media_store::IndexError) -> Self {
        AppError::Storage(e.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e)
    }
}

/// User-facing messages shown in the gallery's error slot
pub const MSG_NOT_YET_VISIBLE: &str =
    "The photo was saved but is not visible yet. Pull to refresh in a moment.";
pub const MSG_SAVE_FAILED: &str = "The photo could not be saved.";
pub const MSG_IMPORT_FAILED: &str = "Some images could not be imported.";
pub const MSG_DELETE_FAILED: &str = "The image could not be deleted.";

impl AppError {
    pub fn user_message(&self) -> String {
        match self {
            AppError::Config(_) | AppError::ConfigParse(_) => {
                "The app is not configured correctly.".to_string()
            }
            AppError::Remote(ApiError::Network(_)) => {
                "No connection to Unsplash. Showing your photos only.".to_string()
            }
            AppError::Remote(ApiError::MissingCredential) => {
                "No Unsplash access key configured. Showing your photos only.".to_string()
            }
            AppError::Remote(ApiError::Server { status: 401, .. }) => {
                "Unsplash rejected the access key.".to_string()
            }
            AppError::Remote(ApiError::Server { status: 403, .. }) => {
                "Unsplash rate limit reached. Try again later.".to_string()
            }
            AppError::Remote(ApiError::Server { status, .. }) => {
                format!("Unsplash is not available right now (HTTP {}).", status)
            }
            AppError::Remote(ApiError::Json(_)) => {
                "Unsplash sent a response the app does not understand.".to_string()
            }
            AppError::Storage(_) | AppError::Io(_) => {
                "Error accessing photos. Please check app permissions.".to_string()
            }
            AppError::Picker(PickerError::PermissionDenied(msg)) => {
                format!("Permission required: {}", msg)
            }
            AppError::Picker(PickerError::PlatformNotSupported(_)) => {
                "The camera is not available on this device.".to_string()
            }
            AppError::Picker(e) => e.to_string(),
            AppError::Other(msg) => msg.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_messages_are_distinct() {
        let offline = AppError::Remote(ApiError::Network("dns".to_string())).user_message();
        let unauthorized = AppError::Remote(ApiError::Server {
            status: 401,
            message: "OAuth error".to_string(),
        })
        .user_message();
        let unavailable = AppError::Remote(ApiError::Server {
            status: 503,
            message: String::new(),
        })
        .user_message();

        assert_ne!(offline, unauthorized);
        assert!(unavailable.contains("503"));
        assert_ne!(offline, MSG_NOT_YET_VISIBLE);
    }

    #[test]
    fn test_from_conversions() {
        let err: AppError = ApiError::MissingCredential.into();
        assert!(matches!(err, AppError::Remote(ApiError::MissingCredential)));

        let err: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "x").into();
        assert!(matches!(err, AppError::Io(_)));
    }
}
