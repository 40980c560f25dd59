//! Metadata enrichment client.
//!
//! Calls `GET <endpoint>?url=<page>` and decodes `{title, description, image}`.
//! Enrichment is best-effort: callers treat every error as "no metadata".

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::types::errors::MetadataError;
use crate::types::metadata::PageMetadata;

/// Source of page metadata for new bookmarks.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<PageMetadata, MetadataError>;
}

/// `reqwest`-based client for the metadata endpoint.
pub struct HttpMetadataClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpMetadataClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, MetadataError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MetadataError::NetworkError(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl MetadataFetcher for HttpMetadataClient {
    async fn fetch(&self, url: &str) -> Result<PageMetadata, MetadataError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("url", url)])
            .send()
            .await
            .map_err(|e| MetadataError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MetadataError::BadStatus(status.as_u16()));
        }

        let metadata = response
            .json::<PageMetadata>()
            .await
            .map_err(|e| MetadataError::ParseError(e.to_string()))?;
        debug!(url, has_title = !metadata.title.is_empty(), "fetched page metadata");
        Ok(metadata)
    }
}
