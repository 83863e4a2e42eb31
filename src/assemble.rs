//! Merges distances, availability and caller filters into one page of
//! [`ResolvedCenter`]s.
//!
//! Filtering never fails closed: the radius constraint only applies when
//! there is enough distance data to judge it, and a center whose distance
//! is unknown always passes it.

use crate::availability::Availability;
use crate::center::{ResolvedCenter, ServiceCenter};
use crate::distance::ResolvedDistance;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Which centers to keep by their `is_active` flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Inactive,
}

impl StatusFilter {
    pub fn matches(&self, is_active: bool) -> bool {
        match self {
            Self::All => true,
            Self::Active => is_active,
            Self::Inactive => !is_active,
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "all" => Ok(Self::All),
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            _ => Err(format!("Unknown status '{}'. Use 'all', 'active' or 'inactive'.", s)),
        }
    }
}

/// Caller-supplied view parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filters {
    pub radius_km: f64,
    pub search_text: String,
    pub status: StatusFilter,
    pub page_size: usize,
    pub page_index: usize,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            radius_km: 20.0,
            search_text: String::new(),
            status: StatusFilter::All,
            page_size: 10,
            page_index: 0,
        }
    }
}

/// Per-surface differences between the screens that list centers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceConfig {
    pub page_size: usize,
    /// Booking screens only allow picking centers that are active and open.
    pub booking_selection: bool,
}

impl SurfaceConfig {
    pub const DIRECTORY: Self = Self { page_size: 10, booking_selection: false };
    pub const BOOKING: Self = Self { page_size: 6, booking_selection: true };
    pub const ADMIN: Self = Self { page_size: 20, booking_selection: false };

    pub fn by_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "directory" | "" => Some(Self::DIRECTORY),
            "booking" => Some(Self::BOOKING),
            "admin" => Some(Self::ADMIN),
            _ => None,
        }
    }
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self::DIRECTORY
    }
}

/// One page of the filtered, sorted result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CenterPage {
    pub items: Vec<ResolvedCenter>,
    /// Centers surviving all filters, across every page.
    pub total: usize,
    /// The page actually served; reset to 0 if the requested one no longer exists.
    pub page_index: usize,
    pub page_count: usize,
    pub page_size: usize,
    /// Whether the radius filter took part.
    pub radius_applied: bool,
}

/// Everything one pass knows about a single center.
pub struct CenterFacts {
    pub center: ServiceCenter,
    pub distance: ResolvedDistance,
    pub availability: Availability,
}

/// Build the page described by `filters` from per-center facts.
pub fn assemble(
    facts: Vec<CenterFacts>,
    location_known: bool,
    filters: &Filters,
    surface: &SurfaceConfig,
) -> CenterPage {
    let radius_applied = location_known && facts.iter().any(|f| f.distance.km.is_some());
    let needle = filters.search_text.trim().to_lowercase();

    let mut kept: Vec<ResolvedCenter> = facts
        .into_iter()
        .filter(|f| matches_text(&f.center, &needle))
        .filter(|f| filters.status.matches(f.center.is_active))
        .filter(|f| !radius_applied || within_radius(f.distance.km, filters.radius_km))
        .map(|f| {
            let selectable = !surface.booking_selection || (f.center.is_active && f.availability.is_open);
            ResolvedCenter {
                center: f.center,
                resolved_distance_km: f.distance.km,
                distance_source: f.distance.source,
                is_open_now: f.availability.is_open,
                today_window: f.availability.today_window,
                selectable,
            }
        })
        .collect();

    // `sort_by` is stable, so unknown distances keep their input order.
    kept.sort_by(|a, b| compare_distance(a.resolved_distance_km, b.resolved_distance_km));

    paginate(kept, filters.page_size, filters.page_index, radius_applied)
}

fn matches_text(center: &ServiceCenter, needle: &str) -> bool {
    needle.is_empty()
        || center.name.to_lowercase().contains(needle)
        || center.address.to_lowercase().contains(needle)
}

fn within_radius(distance: Option<f64>, radius_km: f64) -> bool {
    distance.map_or(true, |d| d <= radius_km)
}

/// Known distances ascending, unknown last.
fn compare_distance(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn paginate(items: Vec<ResolvedCenter>, page_size: usize, page_index: usize, radius_applied: bool) -> CenterPage {
    let page_size = page_size.max(1);
    let total = items.len();
    let page_count = total.div_ceil(page_size);
    let page_index = if page_index < page_count { page_index } else { 0 };

    let items = items.into_iter().skip(page_index * page_size).take(page_size).collect();

    CenterPage { items, total, page_index, page_count, page_size, radius_applied }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::center::{DistanceSource, TimeWindow};
    use crate::directory::testing::center;

    fn fact(id: &str, km: Option<f64>) -> CenterFacts {
        CenterFacts {
            center: center(id),
            distance: ResolvedDistance {
                km,
                source: if km.is_some() { DistanceSource::Coordinates } else { DistanceSource::Unknown },
            },
            availability: Availability { is_open: true, today_window: None },
        }
    }

    fn ids(page: &CenterPage) -> Vec<&str> {
        page.items.iter().map(|c| c.center.id.as_str()).collect()
    }

    fn filters(radius_km: f64) -> Filters {
        Filters { radius_km, page_size: 100, ..Filters::default() }
    }

    #[test]
    fn test_radius_filters_known_distances() {
        let page = assemble(
            vec![fact("near", Some(5.0)), fact("far", Some(50.0)), fact("edge", Some(20.0))],
            true,
            &filters(20.0),
            &SurfaceConfig::DIRECTORY,
        );
        assert_eq!(ids(&page), vec!["near", "edge"]);
        assert!(page.radius_applied);
    }

    #[test]
    fn test_radius_fail_open_without_any_distance() {
        let facts = vec![fact("a", None), fact("b", None), fact("c", None)];
        let page = assemble(facts, true, &filters(1.0), &SurfaceConfig::DIRECTORY);
        assert_eq!(page.total, 3);
        assert!(!page.radius_applied);
    }

    #[test]
    fn test_radius_skipped_without_location() {
        let facts = vec![fact("a", Some(500.0)), fact("b", None)];
        let page = assemble(facts, false, &filters(1.0), &SurfaceConfig::DIRECTORY);
        assert_eq!(page.total, 2);
        assert!(!page.radius_applied);
    }

    #[test]
    fn test_unknown_distance_always_passes_radius() {
        let facts = vec![fact("far", Some(99.0)), fact("unknown", None)];
        let page = assemble(facts, true, &filters(10.0), &SurfaceConfig::DIRECTORY);
        assert_eq!(ids(&page), vec!["unknown"]);
    }

    #[test]
    fn test_sort_known_first_and_stable_unknowns() {
        let facts = vec![
            fact("u1", None),
            fact("k18", Some(18.9)),
            fact("u2", None),
            fact("k5", Some(5.2)),
            fact("u3", None),
        ];
        let page = assemble(facts, true, &filters(100.0), &SurfaceConfig::DIRECTORY);
        assert_eq!(ids(&page), vec!["k5", "k18", "u1", "u2", "u3"]);
    }

    #[test]
    fn test_text_filter_name_or_address_case_insensitive() {
        let mut a = fact("a", None);
        a.center.name = "VinFast Thao Dien".into();
        let mut b = fact("b", None);
        b.center.address = "88 Thao dien, Thu Duc".into();
        let c = fact("c", None);

        let f = Filters { search_text: "  THAO DIEN ".into(), ..filters(10.0) };
        let page = assemble(vec![a, b, c], false, &f, &SurfaceConfig::DIRECTORY);
        assert_eq!(ids(&page), vec!["a", "b"]);
    }

    #[test]
    fn test_status_filter() {
        let facts = || {
            let mut off = fact("off", None);
            off.center.is_active = false;
            vec![fact("on", None), off]
        };

        let active = Filters { status: StatusFilter::Active, ..filters(10.0) };
        assert_eq!(ids(&assemble(facts(), false, &active, &SurfaceConfig::DIRECTORY)), vec!["on"]);

        let inactive = Filters { status: StatusFilter::Inactive, ..filters(10.0) };
        assert_eq!(ids(&assemble(facts(), false, &inactive, &SurfaceConfig::DIRECTORY)), vec!["off"]);

        assert_eq!(assemble(facts(), false, &filters(10.0), &SurfaceConfig::DIRECTORY).total, 2);
    }

    #[test]
    fn test_booking_selection_keeps_but_disables() {
        let mut closed = fact("closed", Some(1.0));
        closed.availability = Availability {
            is_open: false,
            today_window: Some(TimeWindow { open: "08:00".into(), close: "12:00".into() }),
        };
        let mut inactive = fact("inactive", Some(2.0));
        inactive.center.is_active = false;
        let open = fact("open", Some(3.0));

        let page = assemble(vec![closed, inactive, open], true, &filters(10.0), &SurfaceConfig::BOOKING);
        assert_eq!(ids(&page), vec!["closed", "inactive", "open"]);
        let selectable: Vec<bool> = page.items.iter().map(|c| c.selectable).collect();
        assert_eq!(selectable, vec![false, false, true]);
    }

    #[test]
    fn test_directory_surface_everything_selectable() {
        let mut closed = fact("closed", None);
        closed.availability.is_open = false;
        let page = assemble(vec![closed], false, &filters(10.0), &SurfaceConfig::DIRECTORY);
        assert!(page.items[0].selectable);
        assert!(!page.items[0].is_open_now);
    }

    #[test]
    fn test_pagination_slices() {
        let facts: Vec<CenterFacts> = (0..7).map(|i| fact(&format!("c{}", i), Some(i as f64))).collect();
        let f = Filters { page_size: 3, page_index: 2, ..filters(100.0) };
        let page = assemble(facts, true, &f, &SurfaceConfig::DIRECTORY);
        assert_eq!(ids(&page), vec!["c6"]);
        assert_eq!(page.page_count, 3);
        assert_eq!(page.total, 7);
        assert_eq!(page.page_index, 2);
    }

    #[test]
    fn test_out_of_range_page_resets() {
        let facts: Vec<CenterFacts> = (0..4).map(|i| fact(&format!("c{}", i), Some(i as f64))).collect();
        let f = Filters { page_size: 3, page_index: 5, ..filters(100.0) };
        let page = assemble(facts, true, &f, &SurfaceConfig::DIRECTORY);
        assert_eq!(page.page_index, 0);
        assert_eq!(ids(&page), vec!["c0", "c1", "c2"]);
    }

    #[test]
    fn test_empty_result_page() {
        let page = assemble(vec![], true, &filters(10.0), &SurfaceConfig::DIRECTORY);
        assert_eq!(page.total, 0);
        assert_eq!(page.page_count, 0);
        assert_eq!(page.page_index, 0);
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_zero_page_size_is_clamped() {
        let f = Filters { page_size: 0, ..filters(100.0) };
        let page = assemble(vec![fact("a", None), fact("b", None)], false, &f, &SurfaceConfig::DIRECTORY);
        assert_eq!(page.page_size, 1);
        assert_eq!(page.page_count, 2);
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("Active".parse::<StatusFilter>(), Ok(StatusFilter::Active));
        assert_eq!("".parse::<StatusFilter>(), Ok(StatusFilter::All));
        assert!("pending".parse::<StatusFilter>().is_err());
    }

    #[test]
    fn test_surface_by_name() {
        assert_eq!(SurfaceConfig::by_name("booking"), Some(SurfaceConfig::BOOKING));
        assert_eq!(SurfaceConfig::by_name("kiosk"), None);
    }
}
