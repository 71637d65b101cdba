use std::time::Duration;

use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};

use shared_config::AppConfig;
use shared_models::AppError;

/// JSON client for the Tabib REST backend.
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_base_url(config, &config.api_base_url)
    }

    /// Client for the payments service, which may be hosted separately.
    pub fn for_payments(config: &AppConfig) -> Self {
        Self::with_base_url(config, &config.payments_base_url)
    }

    pub fn with_base_url(config: &AppConfig, base_url: &str) -> Self {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build configured HTTP client ({}), using defaults", e);
                Client::new()
            });

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn get_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    /// Sends a request and decodes a JSON body; an empty body is an error.
    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T, AppError>
    where
        T: DeserializeOwned,
    {
        self.request_optional(method, path, body)
            .await?
            .ok_or_else(|| AppError::Decode(format!("Empty response body from {}", path)))
    }

    /// Like [`request`](Self::request) but maps `204 No Content` and empty bodies to `None`.
    pub async fn request_optional<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Option<T>, AppError>
    where
        T: DeserializeOwned,
    {
        let (status, text) = self.send(method, path, body).await?;

        if status == StatusCode::NO_CONTENT || text.trim().is_empty() {
            return Ok(None);
        }

        let data = serde_json::from_str::<T>(&text)?;
        Ok(Some(data))
    }

    /// Sends a request and returns the raw status and body of a successful response.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<(StatusCode, String), AppError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut req = self.client.request(method, &url).headers(self.get_headers());

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await.map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            error!("API error ({}) from {}: {}", status, path, text);
            return Err(AppError::from_status(status.as_u16(), text));
        }

        Ok((status, text))
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

fn transport_error(err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::Timeout(err.to_string())
    } else if err.is_decode() {
        AppError::Decode(err.to_string())
    } else {
        AppError::Network(err.to_string())
    }
}
