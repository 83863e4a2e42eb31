//! REST client for the backend service-center directory.
//!
//! Envelope: the HTTP status is the transport `ok` flag, and the body
//! carries the business flag:
//!
//! ```json
//! { "success": true, "message": null, "data": [ { "id": 1, ... } ] }
//! ```
//!
//! `data` may also be an object wrapping the list under `centers` or `items`.
//! Records are decoded one by one; an unreadable record is skipped, never
//! the whole list.

use super::{CenterDirectory, DirectoryError};
use crate::center::ServiceCenter;
use crate::geo::GeoPoint;
use crate::http::{HttpClient, HttpError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize, Debug)]
pub struct ApiEnvelope {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<CenterPayload>,
}

fn default_success() -> bool {
    true
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum CenterPayload {
    List(Vec<Value>),
    Wrapped {
        #[serde(alias = "items")]
        centers: Vec<Value>,
    },
}

impl ApiEnvelope {
    /// Unwrap the centers, turning a business-level failure into
    /// [`DirectoryError::Application`].
    pub fn into_centers(self) -> Result<Vec<ServiceCenter>, DirectoryError> {
        if !self.success {
            return Err(DirectoryError::Application(
                self.message.unwrap_or_else(|| "success=false".into()),
            ));
        }
        let records = match self.data {
            Some(CenterPayload::List(records)) | Some(CenterPayload::Wrapped { centers: records }) => records,
            None => Vec::new(),
        };
        Ok(decode_records(records))
    }
}

fn decode_records(records: Vec<Value>) -> Vec<ServiceCenter> {
    let received = records.len();
    let centers: Vec<ServiceCenter> = records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| match serde_json::from_value::<ServiceCenter>(record) {
            Ok(center) => Some(center),
            Err(e) => {
                tracing::warn!(index, error = %e, "skipping unreadable service-center record");
                None
            }
        })
        .collect();
    if centers.len() < received {
        tracing::warn!(received, kept = centers.len(), "directory answer contained unreadable records");
    }
    centers
}

/// The backend directory over HTTP.
#[derive(Clone)]
pub struct HttpDirectory {
    client: HttpClient,
    base_url: String,
}

impl HttpDirectory {
    pub fn new(client: HttpClient, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn nearest_url(&self) -> String {
        format!("{}/service-centers/nearest", self.base_url)
    }

    fn all_url(&self) -> String {
        format!("{}/service-centers", self.base_url)
    }

    async fn fetch(&self, url: &str, query: &[(&str, String)]) -> Result<Vec<ServiceCenter>, DirectoryError> {
        let envelope: ApiEnvelope = self.client.get_json(url, query).await.map_err(map_http_error)?;
        envelope.into_centers()
    }
}

fn map_http_error(e: HttpError) -> DirectoryError {
    match e {
        HttpError::Status { status, url, body } => {
            // A non-2xx answer may still carry a readable business message.
            let message = serde_json::from_str::<ApiEnvelope>(&body)
                .ok()
                .and_then(|env| env.message)
                .unwrap_or_default();
            DirectoryError::Transport(format!("HTTP {} from {} {}", status, url, message).trim_end().to_string())
        }
        HttpError::Decode { message, .. } => DirectoryError::InvalidResponse(message),
        other => DirectoryError::Transport(other.to_string()),
    }
}

#[async_trait]
impl CenterDirectory for HttpDirectory {
    async fn fetch_nearby(&self, point: GeoPoint, radius_km: f64) -> Result<Vec<ServiceCenter>, DirectoryError> {
        let query = [
            ("lat", point.lat.to_string()),
            ("lng", point.lng.to_string()),
            ("radius", radius_km.to_string()),
        ];
        self.fetch(&self.nearest_url(), &query).await
    }

    async fn fetch_all(&self) -> Result<Vec<ServiceCenter>, DirectoryError> {
        self.fetch(&self.all_url(), &[]).await
    }
}
