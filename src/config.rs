//! Runtime configuration and component wiring.

use crate::availability::{AvailabilityEvaluator, OvernightPolicy, SystemClock};
use crate::directory::HttpDirectory;
use crate::distance::{DistanceResolver, DEFAULT_GEOCODE_CONCURRENCY};
use crate::finder::Finder;
use crate::geo::GeoPoint;
use crate::geocode::{
    GeocodeCache, GeocodeResolver, NominatimGeocoder, DEFAULT_NOMINATIM_MIN_INTERVAL, DEFAULT_NOMINATIM_URL,
};
use crate::http::HttpClient;
use crate::location::{
    BoundedLocation, IpLocation, LocationProvider, ManualLocation, NoLocation, DEFAULT_IP_LOOKUP_URL,
    DEFAULT_LOCATION_TIMEOUT,
};
use chrono_tz::Tz;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "http://localhost:8080/api";
pub const DEFAULT_RADIUS_KM: f64 = 20.0;

/// How the user's position is obtained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocationMode {
    Manual(GeoPoint),
    IpLookup,
    Disabled,
}

#[derive(Debug, Clone)]
pub struct FinderConfig {
    /// Base URL of the service-center backend, without trailing slash.
    pub api_base: String,
    pub ip_lookup_url: String,
    pub nominatim_url: String,
    /// Comma-separated ISO country codes passed to the geocoder.
    pub country_codes: Option<String>,
    pub http_timeout: Duration,
    pub location_timeout: Duration,
    pub geocode_timeout: Duration,
    pub geocode_concurrency: usize,
    /// Minimum spacing between geocoder requests.
    pub geocode_min_interval: Duration,
    /// `None` keeps the geocode cache in memory only.
    pub geocode_cache_path: Option<PathBuf>,
    pub geocoding: bool,
    pub tz: Tz,
    pub overnight: OvernightPolicy,
    pub user_agent: String,
    pub default_radius_km: f64,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            ip_lookup_url: DEFAULT_IP_LOOKUP_URL.to_string(),
            nominatim_url: DEFAULT_NOMINATIM_URL.to_string(),
            country_codes: None,
            http_timeout: Duration::from_secs(10),
            location_timeout: DEFAULT_LOCATION_TIMEOUT,
            geocode_timeout: Duration::from_secs(8),
            geocode_concurrency: DEFAULT_GEOCODE_CONCURRENCY,
            geocode_min_interval: DEFAULT_NOMINATIM_MIN_INTERVAL,
            geocode_cache_path: Some(GeocodeCache::default_path()),
            geocoding: true,
            tz: Tz::UTC,
            overnight: OvernightPolicy::default(),
            user_agent: format!("center_finder/{}", env!("CARGO_PKG_VERSION")),
            default_radius_km: DEFAULT_RADIUS_KM,
        }
    }
}

impl FinderConfig {
    pub fn http_client(&self) -> HttpClient {
        HttpClient::new(self.http_timeout, &self.user_agent)
    }

    fn geocode_resolver(&self, client: &HttpClient) -> Option<GeocodeResolver> {
        if !self.geocoding {
            return None;
        }
        let nominatim = NominatimGeocoder::new(client.clone(), self.nominatim_url.clone())
            .with_country_codes(self.country_codes.clone())
            .with_min_interval(self.geocode_min_interval);
        let cache = match &self.geocode_cache_path {
            Some(path) => GeocodeCache::load_from(path.clone()),
            None => GeocodeCache::in_memory(),
        };
        Some(GeocodeResolver::new(Arc::new(nominatim), self.geocode_timeout).with_cache(cache))
    }

    /// Wire the backend directory, geocoder, clock and evaluator.
    pub fn build_finder(&self) -> Finder {
        let client = self.http_client();
        let directory = HttpDirectory::new(client.clone(), self.api_base.clone());
        let distances = DistanceResolver::new(self.geocode_resolver(&client)).with_concurrency(self.geocode_concurrency);

        tracing::debug!(
            api_base = %self.api_base,
            tz = %self.tz,
            overnight = %self.overnight,
            geocoding = self.geocoding,
            "finder configured"
        );

        Finder::new(
            Arc::new(directory),
            distances,
            AvailabilityEvaluator::new(self.overnight),
            Arc::new(SystemClock::new(self.tz)),
        )
    }

    pub fn location_provider(&self, mode: LocationMode) -> Arc<dyn LocationProvider> {
        match mode {
            LocationMode::Manual(p) => Arc::new(BoundedLocation::with_timeout(
                ManualLocation::new(p.lat, p.lng),
                self.location_timeout,
            )),
            LocationMode::IpLookup => Arc::new(BoundedLocation::with_timeout(
                IpLocation::new(self.http_client(), self.ip_lookup_url.clone()),
                self.location_timeout,
            )),
            LocationMode::Disabled => Arc::new(BoundedLocation::new(NoLocation)),
        }
    }
}
