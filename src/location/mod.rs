//! User-location subsystem.
//!
//! Resolves the user's coordinates from a permission-gated, possibly slow
//! source, and degrades to "unknown" instead of failing.

pub mod providers;
pub mod resolver;
pub mod types;

pub use providers::{IpLocation, ManualLocation, NoLocation, DEFAULT_IP_LOOKUP_URL};
pub use resolver::{BoundedLocation, LocationProvider, PositionSource, DEFAULT_LOCATION_TIMEOUT};
pub use types::{LocationError, LocationSource};
