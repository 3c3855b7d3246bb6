//! reqwest-backed fetcher.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method};
use tracing::debug;
use url::Url;

use crate::models::{Asset, ContentRequest};

use super::{FetchError, Fetcher};

/// HTTP fetcher for seed assets and cache misses.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    origin: Option<Url>,
}

impl HttpFetcher {
    /// Create a fetcher that resolves origin-relative URLs against `origin`.
    ///
    /// With `timeout` unset a hung request waits indefinitely.
    pub fn new(origin: Option<Url>, timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            origin,
        })
    }

    fn request_headers(request: &ContentRequest) -> Result<header::HeaderMap, FetchError> {
        let mut headers = header::HeaderMap::new();
        for (name, value) in &request.headers {
            let invalid = |reason: String| FetchError::InvalidHeader {
                name: name.clone(),
                reason,
            };
            let header_name = header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| invalid(e.to_string()))?;
            let header_value =
                header::HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
            headers.append(header_name, header_value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &ContentRequest) -> Result<Asset, FetchError> {
        let identity = request.identity();
        let url = identity
            .resolve(self.origin.as_ref())
            .map_err(|e| FetchError::InvalidUrl {
                url: request.url.clone(),
                reason: e.to_string(),
            })?;
        let method = Method::from_bytes(identity.method().as_bytes())
            .map_err(|_| FetchError::InvalidMethod(identity.method().to_string()))?;

        let response = self
            .client
            .request(method, url.clone())
            .headers(Self::request_headers(request)?)
            .send()
            .await?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        debug!(url = %url, status = status.as_u16(), bytes = body.len(), "Fetched from network");
        Ok(Asset::new(status.as_u16(), headers, body))
    }
}
