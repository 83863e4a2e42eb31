//! Address geocoding for centers that carry neither a server distance nor
//! their own coordinates.
//!
//! Flow:  cache → provider (bounded by a timeout) → cache update.
//! Every failure collapses to `None` for the caller. The cache file is
//! written by [`GeocodeResolver::flush`], on the blocking pool.

pub mod cache;
pub mod nominatim;

pub use cache::{normalize_address, GeocodeCache};
pub use nominatim::{NominatimGeocoder, DEFAULT_NOMINATIM_MIN_INTERVAL, DEFAULT_NOMINATIM_URL};

use crate::geo::GeoPoint;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("no match for address '{0}'")]
    NotFound(String),

    #[error("geocoding provider rate-limited the request")]
    RateLimited,

    #[error("geocoding timed out after {0} ms")]
    Timeout(u64),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid geocoding response: {0}")]
    InvalidResponse(String),
}

/// A geocoding backend.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn lookup(&self, address: &str, name_hint: &str) -> Result<GeoPoint, GeocodeError>;
}

/// Caching, timeout-bounded, never-failing front for a [`Geocoder`].
#[derive(Clone)]
pub struct GeocodeResolver {
    geocoder: Arc<dyn Geocoder>,
    cache: Option<Arc<Mutex<GeocodeCache>>>,
    timeout: Duration,
}

impl GeocodeResolver {
    pub fn new(geocoder: Arc<dyn Geocoder>, timeout: Duration) -> Self {
        Self { geocoder, cache: None, timeout }
    }

    pub fn with_cache(mut self, cache: GeocodeCache) -> Self {
        self.cache = Some(Arc::new(Mutex::new(cache)));
        self
    }

    /// Resolve `address` to coordinates, or `None` if that is not possible
    /// right now.
    pub async fn geocode_address(&self, address: &str, name_hint: &str) -> Option<GeoPoint> {
        if address.trim().is_empty() {
            return None;
        }

        if let Some(hit) = self.cached(address) {
            tracing::debug!(address, hit = ?hit, "geocode cache hit");
            return hit;
        }

        let outcome = match tokio::time::timeout(self.timeout, self.geocoder.lookup(address, name_hint)).await {
            Ok(result) => result,
            Err(_) => Err(GeocodeError::Timeout(self.timeout.as_millis() as u64)),
        };

        match outcome {
            Ok(point) => {
                self.remember(address, Some(point));
                Some(point)
            }
            Err(e) => {
                tracing::warn!(address, name = name_hint, error = %e, "geocoding failed");
                // Transient failures are retried next pass; only a definite
                // miss is cached.
                if matches!(e, GeocodeError::NotFound(_)) {
                    self.remember(address, None);
                }
                None
            }
        }
    }

    fn cached(&self, address: &str) -> Option<Option<GeoPoint>> {
        let cache = self.cache.as_ref()?;
        let guard = cache.lock().ok()?;
        guard.get(address)
    }

    /// Persist new cache entries, if any, off the async runtime.
    pub async fn flush(&self) {
        let Some(store) = &self.cache else { return };
        let pending = {
            let Ok(mut guard) = store.lock() else { return };
            guard.take_pending()
        };
        let Some((path, json)) = pending else { return };
        if let Err(e) = tokio::task::spawn_blocking(move || cache::write_file(&path, &json)).await {
            tracing::warn!(error = %e, "geocode cache write aborted");
        }
    }

    fn remember(&self, address: &str, point: Option<GeoPoint>) {
        if let Some(cache) = &self.cache {
            if let Ok(mut guard) = cache.lock() {
                guard.put(address, point);
            }
        }
    }
}
