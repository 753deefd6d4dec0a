//! HTTP transport for the catalog service
//!
//! Maps the service's JSON payloads onto catalog types and its status codes
//! onto the transport error taxonomy: 401/403 → `Denied`, 404 → `NotFound`,
//! an error body with a server reason → `Validation`, everything else →
//! `Network`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{event, Level};

use crate::catalog::{AssetId, AssetRecord, ScopeId, UploadFile, UsageLocation};

use super::{
    BinaryFetch, CatalogTransport, LockResponse, PageResponse, TransportError,
};

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Network(err.to_string())
    }
}

/// `CatalogTransport` backed by the catalog service's REST API
#[derive(Clone)]
pub struct HttpCatalogTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCatalogTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Use a preconfigured client (default headers, auth)
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn assets_url(&self, scope: &ScopeId) -> String {
        format!("{}/assets/{}/", self.base_url, scope)
    }

    fn asset_url(&self, scope: &ScopeId, id: &AssetId) -> String {
        format!("{}/assets/{}/{}", self.base_url, scope, id)
    }
}

fn classify(status: StatusCode, body: &str) -> TransportError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TransportError::Denied,
        StatusCode::NOT_FOUND => TransportError::NotFound,
        _ => {
            // surface the server's own reason when the body carries one
            if let Ok(body) = serde_json::from_str::<ErrorBody>(body) {
                TransportError::Validation(body.error)
            } else {
                TransportError::Network(format!("request failed with status {status}"))
            }
        }
    }
}

fn parse<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, TransportError> {
    serde_json::from_str(body).map_err(|err| TransportError::Unexpected(err.to_string()))
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PagePayload {
    assets: Vec<AssetPayload>,
    total_count: u64,
    has_more: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetPayload {
    id: String,
    display_name: String,
    content_type: String,
    file_size: u64,
    date_added: DateTime<Utc>,
    locked: bool,
    #[serde(default)]
    thumbnail: Option<String>,
}

impl From<AssetPayload> for AssetRecord {
    fn from(payload: AssetPayload) -> Self {
        let mut record = AssetRecord::new(
            AssetId::from_string(payload.id),
            payload.display_name,
            payload.content_type,
            payload.file_size,
        )
        .with_created_at(payload.date_added)
        .with_locked(payload.locked);
        record.thumbnail_url = payload.thumbnail;
        record
    }
}

#[derive(Debug, Deserialize)]
struct LockPayload {
    locked: bool,
}

#[derive(Debug, Deserialize)]
struct UsagePayload {
    #[serde(default)]
    usage_locations: HashMap<String, Vec<UsageLocationPayload>>,
}

#[derive(Debug, Deserialize)]
struct UsageLocationPayload {
    display_location: String,
    url: String,
}

#[async_trait]
impl CatalogTransport for HttpCatalogTransport {
    async fn fetch_page(
        &self,
        scope: &ScopeId,
        page_index: usize,
    ) -> Result<PageResponse, TransportError> {
        let url = format!("{}?page={}", self.assets_url(scope), page_index);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(classify(status, &body));
        }
        event!(Level::TRACE, response = body);

        let payload: PagePayload = parse(&body)?;
        Ok(PageResponse {
            records: payload.assets.into_iter().map(Into::into).collect(),
            total_count: payload.total_count,
            has_more: payload.has_more,
        })
    }

    async fn create_asset(
        &self,
        scope: &ScopeId,
        upload: &UploadFile,
    ) -> Result<AssetRecord, TransportError> {
        let response = self
            .client
            .post(self.assets_url(scope))
            .query(&[("name", upload.name.as_str())])
            .header(CONTENT_TYPE, upload.content_type.as_str())
            .body(upload.bytes.clone())
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(classify(status, &body));
        }
        event!(Level::TRACE, response = body);

        let payload: AssetPayload = parse(&body)?;
        Ok(payload.into())
    }

    async fn delete_asset(&self, scope: &ScopeId, id: &AssetId) -> Result<(), TransportError> {
        let response = self
            .client
            .delete(self.asset_url(scope, id))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify(status, &body));
        }
        Ok(())
    }

    async fn set_lock(
        &self,
        scope: &ScopeId,
        id: &AssetId,
        locked: bool,
    ) -> Result<LockResponse, TransportError> {
        let response = self
            .client
            .put(self.asset_url(scope, id))
            .json(&serde_json::json!({ "locked": locked }))
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(classify(status, &body));
        }

        let payload: LockPayload = parse(&body)?;
        Ok(LockResponse {
            locked: payload.locked,
        })
    }

    async fn fetch_usage(
        &self,
        scope: &ScopeId,
        id: &AssetId,
    ) -> Result<Vec<UsageLocation>, TransportError> {
        let url = format!("{}/usage", self.asset_url(scope, id));
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(classify(status, &body));
        }
        event!(Level::TRACE, response = body);

        let mut payload: UsagePayload = parse(&body)?;
        let locations = payload
            .usage_locations
            .remove(id.as_str())
            .unwrap_or_default();
        Ok(locations
            .into_iter()
            .map(|l| UsageLocation::new(l.display_location, l.url))
            .collect())
    }

    async fn fetch_binary(
        &self,
        scope: &ScopeId,
        id: &AssetId,
    ) -> Result<BinaryFetch, TransportError> {
        let url = format!("{}/download", self.asset_url(scope, id));
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        // a non-success response is in-band data, not a transport fault
        if !status.is_success() {
            return Ok(BinaryFetch::Refused(status.as_u16()));
        }
        let bytes = response.bytes().await?;
        Ok(BinaryFetch::Delivered(bytes))
    }
}
