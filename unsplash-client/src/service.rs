use crate::models::{ErrorBody, RawPhoto, SearchResponse};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.unsplash.com";

/// Results per search page
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Photos per random sample
pub const RANDOM_SAMPLE_COUNT: u32 = 30;

const API_VERSION: &str = "v1";
const USER_AGENT: &str = "UnsplashGallery/0.1.0";

/// Error type for remote API calls
#[derive(Debug)]
pub enum ApiError {
    Network(String),
    Json(String),
    Server { status: u16, message: String },
    MissingCredential,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Network(msg) => write!(f, "Network error: {}", msg),
            ApiError::Json(msg) => write!(f, "JSON error: {}", msg),
            ApiError::Server { status, message } => {
                write!(f, "Server error {}: {}", status, message)
            }
            ApiError::MissingCredential => write!(f, "No Unsplash access key configured"),
        }
    }
}

impl std::error::Error for ApiError {}

/// Settings for [`UnsplashClient`]
#[derive(Debug, Clone)]
pub struct UnsplashConfig {
    pub access_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for UnsplashConfig {
    fn default() -> Self {
        Self {
            access_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

/// The two remote operations the gallery needs
#[async_trait]
pub trait PhotoSource: Send + Sync {
    async fn search_photos(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<SearchResponse, ApiError>;

    async fn random_photos(&self, count: u32) -> Result<Vec<RawPhoto>, ApiError>;
}

/// Unsplash API client. Build it once and share it; the underlying
/// connection pool lives as long as the client.
pub struct UnsplashClient {
    client: reqwest::Client,
    base_url: String,
    access_key: String,
}

impl UnsplashClient {
    pub fn new(config: UnsplashConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .tcp_keepalive(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ApiError::Network(format!("Client build failed: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_key: config.access_key.trim().to_string(),
        })
    }

    fn credential(&self) -> Result<&str, ApiError> {
        if self.access_key.is_empty() {
            return Err(ApiError::MissingCredential);
        }
        Ok(&self.access_key)
    }

    /// `GET /search/photos`
    pub fn search_request(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<reqwest::Request, ApiError> {
        let key = self.credential()?;
        self.client
            .get(format!("{}/search/photos", self.base_url))
            .query(&[
                ("query", query.to_string()),
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
                ("client_id", key.to_string()),
            ])
            .header("Accept-Version", API_VERSION)
            .build()
            .map_err(|e| ApiError::Network(format!("Invalid request: {}", e)))
    }

    /// `GET /photos/random`
    pub fn random_request(&self, count: u32) -> Result<reqwest::Request, ApiError> {
        let key = self.credential()?;
        self.client
            .get(format!("{}/photos/random", self.base_url))
            .query(&[("count", count.to_string()), ("client_id", key.to_string())])
            .header("Accept-Version", API_VERSION)
            .build()
            .map_err(|e| ApiError::Network(format!("Invalid request: {}", e)))
    }

    pub async fn search_photos(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<SearchResponse, ApiError> {
        let request = self.search_request(query, page, per_page)?;
        log::debug!("Searching photos for {:?} (page {})", query, page);
        let response: SearchResponse = self.execute(request).await?;
        log::info!(
            "Search {:?} returned {} of {} photos",
            query,
            response.results.len(),
            response.total
        );
        Ok(response)
    }

    pub async fn random_photos(&self, count: u32) -> Result<Vec<RawPhoto>, ApiError> {
        let request = self.random_request(count)?;
        log::debug!("Fetching {} random photos", count);
        let photos: Vec<RawPhoto> = self.execute(request).await?;
        log::info!("Fetched {} random photos", photos.len());
        Ok(photos)
    }

    async fn execute<T: DeserializeOwned>(&self, request: reqwest::Request) -> Result<T, ApiError> {
        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| ApiError::Network(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Server {
                status: status.as_u16(),
                message: server_message(status, &body),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::Network(format!("Reading response failed: {}", e)))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::Json(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl PhotoSource for UnsplashClient {
    async fn search_photos(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<SearchResponse, ApiError> {
        UnsplashClient::search_photos(self, query, page, per_page).await
    }

    async fn random_photos(&self, count: u32) -> Result<Vec<RawPhoto>, ApiError> {
        UnsplashClient::random_photos(self, count).await
    }
}

/// Message for a failed call: the API's `errors` list if there is one
fn server_message(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) if !parsed.errors.is_empty() => parsed.errors.join("; "),
        _ if !body.trim().is_empty() => body.trim().to_string(),
        _ => status
            .canonical_reason()
            .unwrap_or("Unknown status")
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn client(base_url: &str, key: &str) -> UnsplashClient {
        UnsplashClient::new(UnsplashConfig {
            access_key: key.to_string(),
            base_url: base_url.to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    /// Serves one canned HTTP response on a local port and returns its base URL
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_search_request_url() {
        let request = client("https://api.unsplash.com/", "abc123")
            .search_request("snowy mountains", 1, DEFAULT_PAGE_SIZE)
            .unwrap();

        let url = request.url();
        assert_eq!(url.path(), "/search/photos");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("query".to_string(), "snowy mountains".to_string()),
                ("page".to_string(), "1".to_string()),
                ("per_page".to_string(), "20".to_string()),
                ("client_id".to_string(), "abc123".to_string()),
            ]
        );
        assert_eq!(request.headers()["Accept-Version"], "v1");
    }

    #[test]
    fn test_random_request_url() {
        let request = client(DEFAULT_BASE_URL, "abc123")
            .random_request(RANDOM_SAMPLE_COUNT)
            .unwrap();

        assert_eq!(
            request.url().as_str(),
            "https://api.unsplash.com/photos/random?count=30&client_id=abc123"
        );
    }

    #[test]
    fn test_blank_key_is_rejected_before_sending() {
        let client = client(DEFAULT_BASE_URL, "   ");
        assert!(matches!(
            client.random_request(1),
            Err(ApiError::MissingCredential)
        ));
        assert!(matches!(
            client.search_request("cats", 1, 20),
            Err(ApiError::MissingCredential)
        ));
    }

    #[test]
    fn test_server_message() {
        assert_eq!(
            server_message(
                reqwest::StatusCode::UNAUTHORIZED,
                r#"{"errors":["OAuth error: The access token is invalid"]}"#
            ),
            "OAuth error: The access token is invalid"
        );
        assert_eq!(
            server_message(reqwest::StatusCode::FORBIDDEN, "Rate Limit Exceeded"),
            "Rate Limit Exceeded"
        );
        assert_eq!(
            server_message(reqwest::StatusCode::SERVICE_UNAVAILABLE, ""),
            "Service Unavailable"
        );
    }

    #[tokio::test]
    async fn test_search_against_local_server() {
        let base = serve_once(
            "200 OK",
            r#"{"total":1,"total_pages":1,"results":[{"id":"a","urls":{"full":"f","regular":"r"},"user":{"name":"Ann"}}]}"#,
        )
        .await;

        let response = client(&base, "key").search_photos("cats", 1, 20).await.unwrap();
        assert_eq!(response.results[0].id, "a");
        assert_eq!(response.results[0].user.name, "Ann");
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_server_error() {
        let base = serve_once("401 Unauthorized", r#"{"errors":["OAuth error"]}"#).await;

        match client(&base, "bad").random_photos(30).await {
            Err(ApiError::Server { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "OAuth error");
            }
            other => panic!("unexpected result: {:?}", other.map(|p| p.len())),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_maps_to_json_error() {
        let base = serve_once("200 OK", r#"{"unexpected":true}"#).await;

        let result = client(&base, "key").random_photos(30).await;
        assert!(matches!(result, Err(ApiError::Json(_))));
    }

    #[tokio::test]
    async fn test_unreachable_host_maps_to_network_error() {
        // bind then drop to get a port with nothing listening
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = client(&format!("http://{}", addr), "key")
            .random_photos(30)
            .await;
        assert!(matches!(result, Err(ApiError::Network(_))));
    }
}
