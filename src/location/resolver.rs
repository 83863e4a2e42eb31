//! User-location resolution.
//!
//! Flow:  position source → (timeout) → point, or `None` on any failure.
//!
//! Callers only ever see `Option<GeoPoint>`; denial, timeout and an
//! unsupported platform are logged here and never propagated.

use super::types::{LocationError, LocationSource};
use crate::geo::GeoPoint;
use async_trait::async_trait;
use std::time::Duration;

/// Default bound on how long a caller waits for a position.
pub const DEFAULT_LOCATION_TIMEOUT: Duration = Duration::from_secs(10);

/// A raw, fallible source of the user's position.
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn locate(&self) -> Result<GeoPoint, LocationError>;
    fn source(&self) -> LocationSource;
}

/// The never-failing location seam consumed by the finder.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn get_user_location(&self) -> Option<GeoPoint>;
}

/// Wraps a [`PositionSource`] with a fixed timeout and error swallowing.
pub struct BoundedLocation<S> {
    inner: S,
    timeout: Duration,
}

impl<S: PositionSource> BoundedLocation<S> {
    pub fn new(inner: S) -> Self {
        Self::with_timeout(inner, DEFAULT_LOCATION_TIMEOUT)
    }

    pub fn with_timeout(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// The outcome with its error intact, for diagnostics.
    pub async fn try_locate(&self) -> Result<GeoPoint, LocationError> {
        match tokio::time::timeout(self.timeout, self.inner.locate()).await {
            Ok(result) => result,
            Err(_) => Err(LocationError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}

#[async_trait]
impl<S: PositionSource> LocationProvider for BoundedLocation<S> {
    async fn get_user_location(&self) -> Option<GeoPoint> {
        match self.try_locate().await {
            Ok(point) => {
                tracing::debug!(source = %self.inner.source(), %point, "user location resolved");
                Some(point)
            }
            Err(e) => {
                tracing::warn!(source = %self.inner.source(), error = %e, "user location unavailable");
                None
            }
        }
    }
}

/// A provider that already knows its answer.
#[async_trait]
impl LocationProvider for Option<GeoPoint> {
    async fn get_user_location(&self) -> Option<GeoPoint> {
        *self
    }
}
