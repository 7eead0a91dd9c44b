//! Backend client: HTTP implementation of the metadata and image fetches.
//!
//! DESIGN
//! ======
//! Thin wrapper over `reqwest`. One client serves both lookups:
//!
//! - `GET {base}/asset-decks/{deck_id}/map-metadata` → metadata JSON
//! - `GET {base}/missions/{site_id}/{map_name}/map` → raster bytes
//!
//! Transport errors, non-2xx statuses and bad payloads all map onto the
//! matching `*Unavailable` error; no retries happen here. Image decoding
//! runs on the blocking pool and acquires its handle from the client's
//! registry.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use tracing::debug;

use crate::config::{HttpTimeouts, ViewerConfig};
use crate::map_image::{HandleRegistry, LoadedImage, MapImageLoader, decode_image};
use crate::metadata::{MapMetadata, MapMetadataStore, parse_metadata};
use crate::types::MapError;

pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
    handles: Arc<HandleRegistry>,
}

impl BackendClient {
    /// Build a client for `backend_url`.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::ConfigParse`] for an invalid base URL and
    /// [`MapError::HttpClientBuild`] if the HTTP client fails to build.
    pub fn new(backend_url: &str, timeouts: HttpTimeouts) -> Result<Self, MapError> {
        let base_url =
            Url::parse(backend_url).map_err(|e| MapError::ConfigParse(format!("invalid backend URL {backend_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(MapError::ConfigParse(format!("backend URL cannot be a base: {backend_url}")));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| MapError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url, handles: HandleRegistry::new() })
    }

    /// Build a client from parsed config.
    ///
    /// # Errors
    ///
    /// Same as [`BackendClient::new`].
    pub fn from_config(config: &ViewerConfig) -> Result<Self, MapError> {
        Self::new(&config.backend_url, config.timeouts)
    }

    /// Registry tracking handles of images this client decoded.
    #[must_use]
    pub fn handles(&self) -> Arc<HandleRegistry> {
        Arc::clone(&self.handles)
    }

    #[must_use]
    pub fn metadata_url(&self, deck_id: &str) -> Url {
        self.endpoint(&["asset-decks", deck_id, "map-metadata"])
    }

    #[must_use]
    pub fn image_url(&self, site_id: &str, map_name: &str) -> Url {
        self.endpoint(&["missions", site_id, map_name, "map"])
    }

    /// Append percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response, String> {
        debug!(%url, "backend request");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("status {}", status.as_u16()));
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl MapMetadataStore for BackendClient {
    async fn fetch_metadata(&self, deck_id: &str) -> Result<MapMetadata, MapError> {
        let response = self
            .get(self.metadata_url(deck_id))
            .await
            .map_err(|reason| MapError::metadata(deck_id, reason))?;
        let body = response
            .text()
            .await
            .map_err(|e| MapError::metadata(deck_id, format!("body read failed: {e}")))?;
        parse_metadata(deck_id, &body)
    }
}

#[async_trait::async_trait]
impl MapImageLoader for BackendClient {
    async fn fetch_image(&self, site_id: &str, map_name: &str) -> Result<LoadedImage, MapError> {
        let response = self
            .get(self.image_url(site_id, map_name))
            .await
            .map_err(|reason| MapError::image(site_id, map_name, reason))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| MapError::image(site_id, map_name, format!("body read failed: {e}")))?
            .to_vec();

        let registry = Arc::clone(&self.handles);
        let (site, name) = (site_id.to_owned(), map_name.to_owned());
        tokio::task::spawn_blocking(move || decode_image(&bytes, &site, &name, &registry))
            .await
            .map_err(|e| MapError::image(site_id, map_name, format!("decode task failed: {e}")))?
    }
}

#[cfg(test)]
#[path = "backend_test.rs"]
mod tests;
