//! Service-center directory access with tiered fallback.
//!
//! Flow:  no location → full directory
//!        location    → nearest-within-radius → (error or empty) → full directory

pub mod http;

pub use self::http::HttpDirectory;

use crate::center::ServiceCenter;
use crate::geo::GeoPoint;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The request never produced a successful HTTP answer.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The backend answered but flagged the call as unsuccessful.
    #[error("directory rejected the request: {0}")]
    Application(String),

    #[error("invalid directory response: {0}")]
    InvalidResponse(String),
}

/// Backend queries for service centers.
#[async_trait]
pub trait CenterDirectory: Send + Sync {
    /// Centers within `radius_km` of `point`. An empty list is a valid answer.
    async fn fetch_nearby(&self, point: GeoPoint, radius_km: f64) -> Result<Vec<ServiceCenter>, DirectoryError>;

    /// Every center in the directory.
    async fn fetch_all(&self) -> Result<Vec<ServiceCenter>, DirectoryError>;
}

/// Which query produced a center list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchTier {
    Nearby,
    Directory,
}

impl fmt::Display for FetchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearby => write!(f, "nearby"),
            Self::Directory => write!(f, "directory"),
        }
    }
}

/// Why the nearby tier was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    NoLocation,
    Transport,
    Application,
    InvalidResponse,
    Empty,
}

impl FallbackReason {
    fn from_error(e: &DirectoryError) -> Self {
        match e {
            DirectoryError::Transport(_) => Self::Transport,
            DirectoryError::Application(_) => Self::Application,
            DirectoryError::InvalidResponse(_) => Self::InvalidResponse,
        }
    }
}

/// A raw center list together with its provenance.
#[derive(Debug, Clone)]
pub struct CenterList {
    pub centers: Vec<ServiceCenter>,
    pub tier: FetchTier,
    pub fallback: Option<FallbackReason>,
}

/// Fetch centers for `point`, falling back to the full directory whenever
/// the proximity query is unavailable, fails, or comes back empty.
///
/// # Errors
///
/// Returns the full-directory error only when that last tier fails too.
pub async fn resolve_list(
    directory: &dyn CenterDirectory,
    point: Option<GeoPoint>,
    radius_km: f64,
) -> Result<CenterList, DirectoryError> {
    let reason = match point {
        None => FallbackReason::NoLocation,
        Some(p) => match directory.fetch_nearby(p, radius_km).await {
            Ok(centers) if !centers.is_empty() => {
                tracing::debug!(count = centers.len(), radius_km, "nearby query answered");
                return Ok(CenterList { centers, tier: FetchTier::Nearby, fallback: None });
            }
            Ok(_) => {
                tracing::info!(radius_km, "nearby query empty, loading full directory");
                FallbackReason::Empty
            }
            Err(e) => {
                tracing::warn!(error = %e, "nearby query failed, loading full directory");
                FallbackReason::from_error(&e)
            }
        },
    };

    let centers = directory.fetch_all().await.map_err(|e| {
        tracing::error!(error = %e, ?reason, "full directory fetch failed");
        e
    })?;
    tracing::debug!(count = centers.len(), ?reason, "directory query answered");

    Ok(CenterList { centers, tier: FetchTier::Directory, fallback: Some(reason) })
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory directory with scripted answers and call counters.

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub enum Answer {
        Centers(Vec<ServiceCenter>),
        Transport,
        Application,
    }

    impl Answer {
        fn produce(&self) -> Result<Vec<ServiceCenter>, DirectoryError> {
            match self {
                Answer::Centers(c) => Ok(c.clone()),
                Answer::Transport => Err(DirectoryError::Transport("connection refused".into())),
                Answer::Application => Err(DirectoryError::Application("success=false".into())),
            }
        }
    }

    pub struct FakeDirectory {
        pub nearby: Answer,
        pub all: Answer,
        pub nearby_calls: AtomicUsize,
        pub all_calls: AtomicUsize,
        pub last_radius: Mutex<Option<f64>>,
    }

    impl FakeDirectory {
        pub fn new(nearby: Answer, all: Answer) -> Self {
            Self {
                nearby,
                all,
                nearby_calls: AtomicUsize::new(0),
                all_calls: AtomicUsize::new(0),
                last_radius: Mutex::new(None),
            }
        }

        pub fn nearby_calls(&self) -> usize {
            self.nearby_calls.load(Ordering::SeqCst)
        }

        pub fn all_calls(&self) -> usize {
            self.all_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CenterDirectory for FakeDirectory {
        async fn fetch_nearby(&self, _point: GeoPoint, radius_km: f64) -> Result<Vec<ServiceCenter>, DirectoryError> {
            self.nearby_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_radius.lock().unwrap() = Some(radius_km);
            self.nearby.produce()
        }

        async fn fetch_all(&self) -> Result<Vec<ServiceCenter>, DirectoryError> {
            self.all_calls.fetch_add(1, Ordering::SeqCst);
            self.all.produce()
        }
    }

    pub fn center(id: &str) -> ServiceCenter {
        ServiceCenter {
            id: id.to_string(),
            name: format!("Center {}", id),
            address: format!("{} Main Street", id),
            phone: None,
            lat: None,
            lng: None,
            distance_km: None,
            schedule: Default::default(),
            is_active: true,
        }
    }
}
