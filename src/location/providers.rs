//! Position sources: caller-supplied coordinates, IP geolocation, and the
//! "no source available" stand-in.

use super::resolver::PositionSource;
use super::types::{LocationError, LocationSource};
use crate::geo::GeoPoint;
use crate::http::{HttpClient, HttpError};
use async_trait::async_trait;
use serde::Deserialize;

// ─── Manual coordinates ─────────────────────────────────────────

/// Coordinates supplied by the caller, validated on construction.
#[derive(Debug, Clone, Copy)]
pub struct ManualLocation {
    point: Option<GeoPoint>,
}

impl ManualLocation {
    /// Out-of-range or non-finite input yields a source that reports
    /// [`LocationError::InvalidResponse`].
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { point: GeoPoint::checked(lat, lng) }
    }

    /// Build from optional query parameters; both must be present.
    pub fn from_parts(lat: Option<f64>, lng: Option<f64>) -> Option<Self> {
        match (lat, lng) {
            (Some(lat), Some(lng)) => Some(Self::new(lat, lng)),
            _ => None,
        }
    }
}

#[async_trait]
impl PositionSource for ManualLocation {
    async fn locate(&self) -> Result<GeoPoint, LocationError> {
        self.point.ok_or_else(|| {
            LocationError::InvalidResponse("coordinates out of range (lat -90..90, lng -180..180)".into())
        })
    }

    fn source(&self) -> LocationSource {
        LocationSource::Manual
    }
}

// ─── Unsupported platform ───────────────────────────────────────

/// A platform without any position capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

#[async_trait]
impl PositionSource for NoLocation {
    async fn locate(&self) -> Result<GeoPoint, LocationError> {
        Err(LocationError::Unsupported)
    }

    fn source(&self) -> LocationSource {
        LocationSource::Unsupported
    }
}

// ─── IP-based geolocation ───────────────────────────────────────

pub const DEFAULT_IP_LOOKUP_URL: &str = "https://ipapi.co/json/";

#[derive(Deserialize)]
struct IpApiResult {
    latitude: Option<f64>,
    longitude: Option<f64>,
    #[serde(default)]
    error: bool,
    #[serde(default)]
    reason: Option<String>,
}

/// Approximate user position from the public IP address.
#[derive(Clone)]
pub struct IpLocation {
    client: HttpClient,
    url: String,
}

impl IpLocation {
    pub fn new(client: HttpClient, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }
}

#[async_trait]
impl PositionSource for IpLocation {
    async fn locate(&self) -> Result<GeoPoint, LocationError> {
        let r: IpApiResult = self.client.get_json(&self.url, &[]).await.map_err(|e| match e {
            HttpError::Status { status: 403 | 429, .. } => LocationError::Denied,
            HttpError::Decode { message, .. } => LocationError::InvalidResponse(message),
            other => LocationError::Network(other.to_string()),
        })?;

        if r.error {
            return Err(LocationError::InvalidResponse(
                r.reason.unwrap_or_else(|| "lookup refused".into()),
            ));
        }
        let lat = r.latitude.ok_or_else(|| LocationError::InvalidResponse("no latitude".into()))?;
        let lng = r.longitude.ok_or_else(|| LocationError::InvalidResponse("no longitude".into()))?;

        GeoPoint::checked(lat, lng)
            .ok_or_else(|| LocationError::InvalidResponse(format!("coordinates out of range: {}, {}", lat, lng)))
    }

    fn source(&self) -> LocationSource {
        LocationSource::IpApi
    }
}
