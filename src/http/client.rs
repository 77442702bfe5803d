//! reqwest-backed HTTP transport with request tracking

use super::{HttpTransport, RawResponse};
use crate::error::{Result, VigilError};
use crate::models::HarnessConfig;
use crate::probe::HttpRequest;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// HTTP client shared read-only by every HTTP probe of a run
///
/// Sends each request exactly once: no retries and no back-off on 429, since
/// the probes observe those statuses directly.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    request_count: Arc<AtomicU64>,
}

impl HttpClient {
    /// Creates a new HttpClient from harness configuration
    pub fn from_config(config: &HarnessConfig) -> Result<Self> {
        if config.http_timeout_secs == 0 {
            return Err(VigilError::ConfigError(
                "HTTP timeout must be at least one second".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(Self {
            client,
            request_count: Arc::new(AtomicU64::new(0)),
        })
    }
}

#[async_trait]
impl HttpTransport for HttpClient {
    async fn send(&self, request: &HttpRequest, url: Url) -> Result<RawResponse> {
        self.request_count.fetch_add(1, Ordering::Relaxed);

        let mut req = self.client.request(request.method.clone(), url);
        for (key, value) in &request.headers {
            req = req.header(key.as_str(), value.as_str());
        }
        if let Some(ref body) = request.json {
            req = req.json(body);
        }

        let response = req.send().await?;
        let status = response.status().as_u16();
        debug!("Response: {status} for {}", response.url());

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
        let body = response.text().await?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }

    fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }
}
