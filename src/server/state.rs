use crate::finder::Finder;

pub struct AppState {
    pub finder: Finder,
    /// Radius used when a request does not name one.
    pub default_radius_km: f64,
}
