//! HTTP capability used by the capture layer

pub mod client;

pub use client::HttpClient;

use crate::error::Result;
use crate::probe::HttpRequest;
use async_trait::async_trait;
use url::Url;

/// A completed response before body interpretation
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// Header names as sent by the server; repeated headers appear repeatedly
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Capability to send one HTTP request
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &HttpRequest, url: Url) -> Result<RawResponse>;

    /// Total requests attempted so far
    fn request_count(&self) -> u64 {
        0
    }
}
