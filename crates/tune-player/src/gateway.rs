//! Client side of the catalog API.
//!
//! `CatalogApi` is what the controllers talk to; `HttpGateway` implements it
//! over reqwest against one of several configured servers.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use tune_proto::protocol::{api_prefix, IdsRequest, MarkerPatch};
use tune_proto::{MarkerEdit, SongId, SongRecord};

use crate::song::SortOrder;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered {0}")]
    Status(u16),
    /// The server refused the mutation (demo mode) and said why.
    #[error("{0}")]
    Rejected(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Ids of songs matching free text.
    async fn query_ids(&self, text: &str, limit: usize, offset: usize)
        -> GatewayResult<Vec<SongId>>;
    /// Ids of the catalog page at `cursor` under `sort`.
    async fn page_ids(&self, cursor: u64, sort: SortOrder) -> GatewayResult<Vec<SongId>>;
    async fn random_song(&self) -> GatewayResult<SongRecord>;
    /// Records for `ids`, in no particular order.
    async fn songs(&self, ids: &[SongId]) -> GatewayResult<Vec<SongRecord>>;
    async fn markers(&self, id: SongId) -> GatewayResult<Vec<f64>>;
    /// Apply a marker edit; returns the song's markers afterwards.
    async fn edit_marker(&self, id: SongId, edit: MarkerEdit) -> GatewayResult<Vec<f64>>;

    fn file_url(&self, id: SongId) -> String;
    fn current_endpoint(&self) -> (usize, String);
    /// Switch to the next configured server, wrapping around.
    fn rotate_endpoint(&self) -> (usize, String);
}

/// Configured servers and the one in use.
#[derive(Debug, Clone)]
pub struct EndpointRing {
    endpoints: Vec<String>,
    current: usize,
}

impl EndpointRing {
    pub fn new(endpoints: Vec<String>, current: usize) -> anyhow::Result<Self> {
        let endpoints: Vec<String> = endpoints
            .into_iter()
            .map(|e| e.trim().trim_end_matches('/').to_string())
            .filter(|e| !e.is_empty())
            .collect();
        if endpoints.is_empty() {
            anyhow::bail!("no catalog endpoints configured");
        }
        let current = if current < endpoints.len() { current } else { 0 };
        Ok(Self { endpoints, current })
    }

    pub fn current(&self) -> (usize, &str) {
        (self.current, &self.endpoints[self.current])
    }

    pub fn rotate(&mut self) -> (usize, &str) {
        self.current = (self.current + 1) % self.endpoints.len();
        self.current()
    }
}

#[derive(Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    ring: Arc<RwLock<EndpointRing>>,
    api_version: u32,
}

impl HttpGateway {
    pub fn new(ring: EndpointRing, api_version: u32) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            ring: Arc::new(RwLock::new(ring)),
            api_version,
        })
    }

    fn base(&self) -> String {
        let ring = self.ring.read().unwrap_or_else(PoisonError::into_inner);
        format!("{}{}", ring.current().1, api_prefix(self.api_version))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base(), path)
    }

    async fn read<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> GatewayResult<T> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            debug!("gateway: {} from {}", status, response.url());
            return Err(GatewayError::Status(status.as_u16()));
        }
        Ok(response.json::<T>().await?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> GatewayResult<T> {
        self.read(self.client.get(self.url(path))).await
    }
}

fn ids_of(records: Vec<SongRecord>) -> Vec<SongId> {
    records.into_iter().map(|r| r.id).collect()
}

#[async_trait]
impl CatalogApi for HttpGateway {
    async fn query_ids(
        &self,
        text: &str,
        limit: usize,
        offset: usize,
    ) -> GatewayResult<Vec<SongId>> {
        let request = self.client.get(self.url("/songs")).query(&[
            ("q", text.to_string()),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ]);
        Ok(ids_of(self.read(request).await?))
    }

    async fn page_ids(&self, cursor: u64, sort: SortOrder) -> GatewayResult<Vec<SongId>> {
        let path = match sort {
            SortOrder::Modified => format!("/songs/offset/{}?sortByModifiedDate", cursor),
            SortOrder::Id => format!("/songs/offset/{}", cursor),
        };
        Ok(ids_of(self.get(&path).await?))
    }

    async fn random_song(&self) -> GatewayResult<SongRecord> {
        self.get("/songs/random").await
    }

    async fn songs(&self, ids: &[SongId]) -> GatewayResult<Vec<SongRecord>> {
        let body = IdsRequest { ids: ids.to_vec() };
        self.read(self.client.post(self.url("/songs/multiple")).json(&body))
            .await
    }

    async fn markers(&self, id: SongId) -> GatewayResult<Vec<f64>> {
        self.get(&format!("/songs/{}/marker", id)).await
    }

    async fn edit_marker(&self, id: SongId, edit: MarkerEdit) -> GatewayResult<Vec<f64>> {
        let body = MarkerPatch::from(edit);
        let request = self
            .client
            .patch(self.url(&format!("/songs/{}/marker", id)))
            .json(&body);
        let reply: Value = self.read(request).await?;
        markers_or_rejection(reply)
    }

    fn file_url(&self, id: SongId) -> String {
        self.url(&format!("/songs/{}/file", id))
    }

    fn current_endpoint(&self) -> (usize, String) {
        let ring = self.ring.read().unwrap_or_else(PoisonError::into_inner);
        let (i, e) = ring.current();
        (i, e.to_string())
    }

    fn rotate_endpoint(&self) -> (usize, String) {
        let mut ring = self.ring.write().unwrap_or_else(PoisonError::into_inner);
        let (i, e) = ring.rotate();
        info!("gateway: switched to endpoint #{} {}", i, e);
        (i, e.to_string())
    }
}

/// A marker PATCH answers either with the marker list or, in demo mode,
/// with `{"message": ...}`.
fn markers_or_rejection(reply: Value) -> GatewayResult<Vec<f64>> {
    if let Some(message) = reply.get("message").and_then(Value::as_str) {
        return Err(GatewayError::Rejected(message.to_string()));
    }
    serde_json::from_value(reply)
        .map_err(|e| GatewayError::Rejected(format!("unexpected marker reply: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gateway(endpoints: &[&str]) -> HttpGateway {
        let ring = EndpointRing::new(endpoints.iter().map(|e| e.to_string()).collect(), 0).unwrap();
        HttpGateway::new(ring, 1).unwrap()
    }

    #[test]
    fn test_urls_use_versioned_base() {
        let g = gateway(&["http://music.local:3000/"]);
        assert_eq!(g.file_url(7), "http://music.local:3000/api/v1/songs/7/file");
    }

    #[test]
    fn test_rotation_wraps_and_moves_urls() {
        let g = gateway(&["http://a", "http://b"]);
        assert_eq!(g.rotate_endpoint(), (1, "http://b".to_string()));
        assert_eq!(g.file_url(1), "http://b/api/v1/songs/1/file");
        assert_eq!(g.rotate_endpoint(), (0, "http://a".to_string()));

        // Clones share the ring.
        let clone = g.clone();
        clone.rotate_endpoint();
        assert_eq!(g.current_endpoint().1, "http://b");
    }

    #[test]
    fn test_ring_rejects_empty_and_clamps_index() {
        assert!(EndpointRing::new(vec!["  ".into()], 0).is_err());
        let ring = EndpointRing::new(vec!["http://a".into()], 5).unwrap();
        assert_eq!(ring.current(), (0, "http://a"));
    }

    #[test]
    fn test_marker_reply_parsing() {
        assert_eq!(markers_or_rejection(json!([0.1, 0.5])).unwrap(), vec![0.1, 0.5]);
        match markers_or_rejection(json!({ "message": "This API is not available in demo mode" })) {
            Err(GatewayError::Rejected(m)) => assert!(m.contains("demo mode")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
