//! Per-center distance resolution.
//!
//! Precedence, first match wins:
//!   server `distance_km` → own coordinates → geocoded address → unknown.

use crate::center::{DistanceSource, ServiceCenter};
use crate::geo::{haversine_km, GeoPoint};
use crate::geocode::GeocodeResolver;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};

/// Default cap on in-flight geocode lookups within one pass.
pub const DEFAULT_GEOCODE_CONCURRENCY: usize = 5;

/// A resolved distance with its provenance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedDistance {
    pub km: Option<f64>,
    pub source: DistanceSource,
}

impl ResolvedDistance {
    fn known(km: f64, source: DistanceSource) -> Self {
        Self { km: Some(km), source }
    }

    fn unknown() -> Self {
        Self { km: None, source: DistanceSource::Unknown }
    }
}

#[derive(Clone)]
pub struct DistanceResolver {
    geocoder: Option<GeocodeResolver>,
    concurrency: usize,
}

impl DistanceResolver {
    pub fn new(geocoder: Option<GeocodeResolver>) -> Self {
        Self { geocoder, concurrency: DEFAULT_GEOCODE_CONCURRENCY }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Distance from `user` to `center`.
    pub async fn resolve(&self, center: &ServiceCenter, user: Option<GeoPoint>) -> ResolvedDistance {
        if let Some(km) = center.distance_km {
            return ResolvedDistance::known(km, DistanceSource::Server);
        }

        // Without a user position nothing else can be measured, and a
        // geocode call would be wasted.
        let Some(user) = user else {
            return ResolvedDistance::unknown();
        };

        if let Some(point) = center.coordinates() {
            return ResolvedDistance::known(haversine_km(&user, &point), DistanceSource::Coordinates);
        }

        if let Some(geocoder) = &self.geocoder {
            if let Some(point) = geocoder.geocode_address(&center.address, &center.name).await {
                return ResolvedDistance::known(haversine_km(&user, &point), DistanceSource::Geocoded);
            }
        }

        ResolvedDistance::unknown()
    }

    /// Resolve every center concurrently, keeping input order.
    ///
    /// Only centers that need geocoding ever wait; at most `concurrency`
    /// of them are in flight at once. New geocode results are saved once,
    /// after the whole batch.
    pub async fn resolve_all(&self, centers: &[ServiceCenter], user: Option<GeoPoint>) -> Vec<ResolvedDistance> {
        // Boxed so the stream's item type names one lifetime; the pass
        // future then stays `Send` for axum and `tokio::spawn`.
        let pending: Vec<BoxFuture<'_, ResolvedDistance>> =
            centers.iter().map(|center| self.resolve(center, user).boxed()).collect();
        let distances = stream::iter(pending)
            .buffered(self.concurrency)
            .collect()
            .await;

        if let Some(geocoder) = &self.geocoder {
            geocoder.flush().await;
        }
        distances
    }
}
