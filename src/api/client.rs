//! HTTP client for the remote price-tracking API.

use super::types::{ErrorBody, ProductDetail, ScrapeStatus, TrackRequest, TrackResponse};
use crate::config::ApiConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Operations the monitor and the registration flow need from the remote API.
///
/// Every call takes the base URL because it is read from the settings store
/// on each poll cycle and may change while the process runs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceApi: Send + Sync {
    /// `POST {base}/track`: register a product for tracking.
    async fn track(&self, base_url: &str, request: &TrackRequest) -> Result<TrackResponse>;

    /// `POST {base}/scrape-now?product_id={id}`: force a price check.
    async fn scrape_now(&self, base_url: &str, product_id: &str) -> Result<ScrapeStatus>;

    /// `GET {base}/products/{id}`: fetch product details.
    async fn product(&self, base_url: &str, product_id: &str) -> Result<ProductDetail>;
}

/// Human-facing reference page of the API.
pub fn docs_url(base_url: &str) -> String {
    endpoint(base_url, "docs")
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

/// Builder for creating an API client.
pub struct ApiClientBuilder {
    config: ApiConfig,
    user_agent: String,
}

impl ApiClientBuilder {
    /// Create a new builder with default config.
    pub fn new() -> Self {
        Self {
            config: ApiConfig::default(),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Set the API configuration.
    pub fn config(mut self, config: ApiConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Build the API client.
    pub fn build(self) -> Result<ApiClient> {
        let http = Client::builder()
            .timeout(self.config.timeout())
            .connect_timeout(self.config.connect_timeout())
            .user_agent(self.user_agent)
            .build()?;

        Ok(ApiClient { http })
    }
}

impl Default for ApiClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// `reqwest`-backed [`PriceApi`] with per-request timeouts.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
}

impl ApiClient {
    /// Create a client from the API configuration.
    pub fn new(config: ApiConfig) -> Result<Self> {
        ApiClientBuilder::new().config(config).build()
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        let body = if status.is_success() {
            response.text().await?
        } else {
            response.text().await.unwrap_or_default()
        };
        decode_body(status, &body)
    }
}

/// Decode a response body, mapping non-success statuses to [`Error::Api`].
///
/// The error detail comes from the JSON `detail` field, then the raw body,
/// then the status' canonical reason.
fn decode_body<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T> {
    if status.is_success() {
        return Ok(serde_json::from_str(body)?);
    }

    let detail = serde_json::from_str::<ErrorBody>(body)
        .map(|e| e.message())
        .unwrap_or_else(|_| match body.trim() {
            "" => status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string(),
            text => text.to_string(),
        });
    Err(Error::api(status.as_u16(), detail))
}

#[async_trait]
impl PriceApi for ApiClient {
    async fn track(&self, base_url: &str, request: &TrackRequest) -> Result<TrackResponse> {
        let url = endpoint(base_url, "track");
        debug!(%url, product_url = %request.url, "Registering product");

        let response = self.http.post(&url).json(request).send().await?;
        Self::decode(response).await
    }

    async fn scrape_now(&self, base_url: &str, product_id: &str) -> Result<ScrapeStatus> {
        let url = endpoint(base_url, "scrape-now");
        debug!(%url, product_id, "Forcing price check");

        let response = self
            .http
            .post(&url)
            .query(&[("product_id", product_id)])
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn product(&self, base_url: &str, product_id: &str) -> Result<ProductDetail> {
        let url = endpoint(base_url, &format!("products/{product_id}"));
        debug!(%url, product_id, "Fetching product detail");

        let response = self.http.get(&url).send().await?;
        Self::decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn api_error<T: std::fmt::Debug>(result: Result<T>) -> (u16, String) {
        match result {
            Err(Error::Api { status, detail }) => (status, detail),
            other => panic!("expected an API error, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_success_bodies() {
        let track: TrackResponse =
            decode_body(StatusCode::OK, r#"{"product_id": 7, "watch_id": 3}"#).unwrap();
        assert_eq!(track.product_id, "7");

        let status: ScrapeStatus =
            decode_body(StatusCode::OK, r#"{"ok": true, "updated": true}"#).unwrap();
        assert!(status.updated);

        let detail: ProductDetail = decode_body(
            StatusCode::OK,
            r#"{"id": 7, "url": "https://www.loja.com/tv", "domain": "loja.com",
                "title": null, "currency": "BRL", "current_price": 1899.9, "in_stock": true}"#,
        )
        .unwrap();
        assert_eq!(detail.current_price, Some(dec!(1899.9)));
    }

    #[test]
    fn test_decode_malformed_success_body() {
        let err = decode_body::<ScrapeStatus>(StatusCode::OK, "<html>").unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_decode_error_detail_sources() {
        assert_eq!(
            api_error(decode_body::<ScrapeStatus>(
                StatusCode::NOT_FOUND,
                r#"{"detail": "Produto n\u00e3o encontrado"}"#
            )),
            (404, "Produto não encontrado".to_string())
        );

        let (status, detail) = api_error(decode_body::<TrackResponse>(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"detail": [{"loc": ["body", "url"], "msg": "field required"}]}"#,
        ));
        assert_eq!(status, 422);
        assert!(detail.contains("field required"));

        assert_eq!(
            api_error(decode_body::<ScrapeStatus>(
                StatusCode::BAD_GATEWAY,
                "upstream scraper timed out\n"
            )),
            (502, "upstream scraper timed out".to_string())
        );

        assert_eq!(
            api_error(decode_body::<ScrapeStatus>(StatusCode::SERVICE_UNAVAILABLE, "  ")),
            (503, "Service Unavailable".to_string())
        );
    }

    #[test]
    fn test_endpoint_ignores_trailing_slash() {
        assert_eq!(endpoint("http://api:8000/", "track"), "http://api:8000/track");
        assert_eq!(endpoint("http://api:8000", "products/p1"), "http://api:8000/products/p1");
        assert_eq!(docs_url("https://prices.example.com//"), "https://prices.example.com/docs");
    }

    #[test]
    fn test_builder_applies_config() {
        let config = ApiConfig {
            timeout_secs: 3,
            ..ApiConfig::default()
        };
        assert_eq!(config.timeout(), Duration::from_secs(3));
        assert!(ApiClientBuilder::new().config(config).user_agent("test").build().is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_api_is_a_recoverable_error() {
        let client = ApiClientBuilder::new()
            .config(ApiConfig {
                timeout_secs: 2,
                connect_timeout_secs: 1,
                ..ApiConfig::default()
            })
            .build()
            .unwrap();

        // Port 9 (discard) on localhost is closed on any sane test host.
        let err = client.scrape_now("http://127.0.0.1:9", "p1").await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
        assert!(err.is_recoverable());
    }
}
