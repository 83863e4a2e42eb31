//! Core types for the user-location subsystem.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Where the user's position came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationSource {
    /// Coordinates handed in by the caller (CLI flags, browser geolocation).
    Manual,
    /// IP-based geolocation.
    IpApi,
    /// No position source on this platform.
    Unsupported,
}

impl fmt::Display for LocationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => write!(f, "Manual"),
            Self::IpApi => write!(f, "IP"),
            Self::Unsupported => write!(f, "Unsupported"),
        }
    }
}

/// Why a position could not be obtained.
///
/// These never reach callers of
/// [`LocationProvider`](super::LocationProvider); they are logged and
/// collapsed into "location unavailable".
#[derive(Debug, Error)]
pub enum LocationError {
    #[error("location permission denied")]
    Denied,

    #[error("location request timed out after {0} ms")]
    Timeout(u64),

    #[error("location is not supported on this platform")]
    Unsupported,

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid location response: {0}")]
    InvalidResponse(String),
}
