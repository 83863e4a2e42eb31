//! OpenStreetMap Nominatim geocoder.

use super::{GeocodeError, Geocoder};
use crate::geo::GeoPoint;
use crate::http::{HttpClient, HttpError};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";

/// The public instance allows one request per second per client.
pub const DEFAULT_NOMINATIM_MIN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Deserialize, Debug, Clone)]
pub struct NominatimResult {
    pub lat: String,
    pub lon: String,
    #[serde(default)]
    pub display_name: String,
}

impl NominatimResult {
    fn point(&self) -> Option<GeoPoint> {
        let lat: f64 = self.lat.trim().parse().ok()?;
        let lon: f64 = self.lon.trim().parse().ok()?;
        GeoPoint::checked(lat, lon)
    }
}

/// Geocodes free-text addresses via a Nominatim-compatible search endpoint.
///
/// Requests are spaced at least `min_interval` apart no matter how many
/// lookups are in flight; clones share the same spacing.
#[derive(Clone)]
pub struct NominatimGeocoder {
    client: HttpClient,
    url: String,
    country_codes: Option<String>,
    min_interval: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl NominatimGeocoder {
    pub fn new(client: HttpClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            country_codes: None,
            min_interval: DEFAULT_NOMINATIM_MIN_INTERVAL,
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    /// Zero disables spacing, for self-hosted instances.
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// Wait for this request's slot. The lock is held across the sleep so
    /// concurrent callers queue up behind each other.
    async fn throttle(&self) {
        if self.min_interval.is_zero() {
            return;
        }
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let ready = prev + self.min_interval;
            if ready > Instant::now() {
                tracing::trace!(wait_ms = (ready - Instant::now()).as_millis() as u64, "nominatim throttled");
                tokio::time::sleep_until(ready).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Restrict results to ISO 3166-1 alpha-2 countries (comma-separated).
    pub fn with_country_codes(mut self, codes: Option<String>) -> Self {
        self.country_codes = codes.filter(|c| !c.trim().is_empty());
        self
    }

    async fn search(&self, query: &str) -> Result<Option<GeoPoint>, GeocodeError> {
        let mut params = vec![
            ("q", query.to_string()),
            ("format", "json".to_string()),
            ("limit", "1".to_string()),
        ];
        if let Some(cc) = &self.country_codes {
            params.push(("countrycodes", cc.clone()));
        }

        self.throttle().await;

        let results: Vec<NominatimResult> =
            self.client.get_json(&self.url, &params).await.map_err(|e| match e {
                HttpError::Status { status: 429, .. } => GeocodeError::RateLimited,
                HttpError::Decode { message, .. } => GeocodeError::InvalidResponse(message),
                other => GeocodeError::Network(other.to_string()),
            })?;

        Ok(results.iter().find_map(NominatimResult::point))
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn lookup(&self, address: &str, name_hint: &str) -> Result<GeoPoint, GeocodeError> {
        for query in candidate_queries(address, name_hint) {
            if let Some(point) = self.search(&query).await? {
                tracing::debug!(query, %point, "nominatim match");
                return Ok(point);
            }
        }
        Err(GeocodeError::NotFound(address.to_string()))
    }
}

/// Queries to try, most specific first: "name, address" then the bare
/// address.
fn candidate_queries(address: &str, name_hint: &str) -> Vec<String> {
    let address = address.trim();
    let name = name_hint.trim();
    let mut queries = Vec::with_capacity(2);
    if !name.is_empty() && !address.to_lowercase().contains(&name.to_lowercase()) {
        queries.push(format!("{}, {}", name, address));
    }
    queries.push(address.to_string());
    queries
}
