//! Cat API client
//!
//! Relative paths are resolved against the configured base URL; absolute
//! `http(s)` URLs are used as given.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use super::model::Cat;
use crate::error::ApiError;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Source of cats
#[async_trait]
pub trait CatApi: Send + Sync {
    /// GET `/cat`
    async fn random_cat(&self) -> Result<Cat, ApiError>;

    /// GET `/cat/{id}`
    async fn cat_by_id(&self, cat_id: &str) -> Result<Cat, ApiError>;
}

/// Prefix relative `path` with `base`, leaving absolute URLs alone
pub fn resolve_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!("{}{}", base, path)
}

/// reqwest-backed [`CatApi`]
#[derive(Clone)]
pub struct HttpCatApi {
    http: Client,
    base_url: String,
}

impl HttpCatApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let base_url = base_url.into();
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ApiError::Transport {
                url: base_url.clone(),
                message: e.to_string(),
            })?;

        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = resolve_url(&self.base_url, path);
        url::Url::parse(&url).map_err(|e| ApiError::InvalidUrl {
            url: url.clone(),
            message: e.to_string(),
        })?;

        debug!(url = %url, "GET");
        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ApiError::Transport {
                url: url.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        response.json::<T>().await.map_err(|e| ApiError::Decode {
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl CatApi for HttpCatApi {
    async fn random_cat(&self) -> Result<Cat, ApiError> {
        self.get("/cat").await
    }

    async fn cat_by_id(&self, cat_id: &str) -> Result<Cat, ApiError> {
        self.get(&format!("/cat/{}", urlencoding::encode(cat_id))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_path() {
        assert_eq!(
            resolve_url("https://api.example.com", "/cat"),
            "https://api.example.com/cat"
        );
    }

    #[test]
    fn test_resolve_absolute_url_untouched() {
        assert_eq!(
            resolve_url("https://api.example.com", "https://other.example/cat/1"),
            "https://other.example/cat/1"
        );
        assert_eq!(
            resolve_url("https://api.example.com", "http://plain.example/x"),
            "http://plain.example/x"
        );
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let api = HttpCatApi::new("http://localhost:4000/").unwrap();
        assert_eq!(api.base_url(), "http://localhost:4000");
    }

    #[test]
    fn test_encode_path_segment() {
        assert_eq!(urlencoding::encode("abc-12_3"), "abc-12_3");
        assert_eq!(urlencoding::encode("a/b c"), "a%2Fb%20c");
    }

    #[tokio::test]
    async fn test_invalid_base_url_reported() {
        let api = HttpCatApi::new("not a url").unwrap();
        let err = api.random_cat().await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidUrl { .. }));
    }
}
