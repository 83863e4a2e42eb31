//! The discovery pipeline and its stateful session front.
//!
//! Pass:  user location → tiered fetch → per-center distance (concurrent)
//!        → open-now at the injected clock → filter/sort/paginate.
//!
//! [`Finder`] is stateless and shared by every surface; the CLI and the
//! HTTP API call it once per request. [`FinderSession`] is the entry point
//! for embedding an interactive screen: it holds one screen's filters and
//! discards results from superseded passes.

use crate::assemble::{assemble, CenterFacts, CenterPage, Filters, StatusFilter, SurfaceConfig};
use crate::availability::{Availability, AvailabilityEvaluator, Clock};
use crate::center::{ResolvedCenter, ServiceCenter};
use crate::directory::{resolve_list, CenterDirectory, DirectoryError, FallbackReason, FetchTier};
use crate::distance::{DistanceResolver, ResolvedDistance};
use crate::geo::GeoPoint;
use crate::location::LocationProvider;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::OnceCell;

#[derive(Debug, Error)]
pub enum FinderError {
    #[error("Could not load service centers: {0}")]
    Directory(#[from] DirectoryError),
}

/// Fetched centers with their distances, reusable while the user point and
/// radius stay the same.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub user: Option<GeoPoint>,
    pub radius_km: f64,
    pub tier: FetchTier,
    pub fallback: Option<FallbackReason>,
    pub centers: Vec<ServiceCenter>,
    pub distances: Vec<ResolvedDistance>,
}

/// Result of a one-shot pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassResult {
    #[serde(flatten)]
    pub page: CenterPage,
    pub user_location: Option<GeoPoint>,
    pub tier: FetchTier,
    pub fallback: Option<FallbackReason>,
}

/// The shared, stateless resolution service.
pub struct Finder {
    directory: Arc<dyn CenterDirectory>,
    distances: DistanceResolver,
    evaluator: AvailabilityEvaluator,
    clock: Arc<dyn Clock>,
}

impl Finder {
    pub fn new(
        directory: Arc<dyn CenterDirectory>,
        distances: DistanceResolver,
        evaluator: AvailabilityEvaluator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { directory, distances, evaluator, clock }
    }

    /// Fetch centers for `user`/`radius_km` and resolve their distances.
    pub async fn snapshot(&self, user: Option<GeoPoint>, radius_km: f64) -> Result<Snapshot, FinderError> {
        let list = resolve_list(self.directory.as_ref(), user, radius_km).await?;
        let distances = self.distances.resolve_all(&list.centers, user).await;

        Ok(Snapshot {
            user,
            radius_km,
            tier: list.tier,
            fallback: list.fallback,
            centers: list.centers,
            distances,
        })
    }

    /// Evaluate availability at the clock's current time and build the page.
    pub fn assemble(&self, snapshot: &Snapshot, filters: &Filters, surface: &SurfaceConfig) -> CenterPage {
        let now = self.clock.now();
        let facts = snapshot
            .centers
            .iter()
            .zip(&snapshot.distances)
            .map(|(center, distance)| CenterFacts {
                availability: self.evaluator.is_open_now(&center.schedule, now),
                center: center.clone(),
                distance: *distance,
            })
            .collect();

        assemble(facts, snapshot.user.is_some(), filters, surface)
    }

    /// A complete pass for an already-known user point.
    pub async fn run_pass(
        &self,
        user: Option<GeoPoint>,
        filters: &Filters,
        surface: &SurfaceConfig,
    ) -> Result<PassResult, FinderError> {
        let snapshot = self.snapshot(user, filters.radius_km).await?;
        let page = self.assemble(&snapshot, filters, surface);

        tracing::info!(
            tier = %snapshot.tier,
            fallback = ?snapshot.fallback,
            located = user.is_some(),
            fetched = snapshot.centers.len(),
            shown = page.items.len(),
            total = page.total,
            "resolution pass complete"
        );

        Ok(PassResult { page, user_location: user, tier: snapshot.tier, fallback: snapshot.fallback })
    }

    /// Availability of one center right now, looked up in the full directory.
    pub async fn center_availability(&self, id: &str) -> Result<Option<(ServiceCenter, Availability)>, FinderError> {
        let centers = self.directory.fetch_all().await?;
        let now = self.clock.now();
        Ok(centers
            .into_iter()
            .find(|c| c.id == id)
            .map(|c| {
                let availability = self.evaluator.is_open_now(&c.schedule, now);
                (c, availability)
            }))
    }
}

// ─── Session ─────────────────────────────────────────────────────

/// What a presentation layer renders.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CenterView {
    pub resolved_centers: Vec<ResolvedCenter>,
    pub loading: bool,
    pub error: Option<String>,
    pub page_index: usize,
    pub page_count: usize,
    pub total: usize,
}

#[derive(Default)]
struct SessionState {
    filters: Filters,
    snapshot: Option<Arc<Snapshot>>,
    page: Option<CenterPage>,
    loading: bool,
    error: Option<String>,
}

/// One screen's view over the finder, for presentation layers that keep
/// state between user actions (the CLI and the API are one-shot and use
/// [`Finder::run_pass`] directly).
///
/// ```no_run
/// # use center_finder::{config::{FinderConfig, LocationMode}, finder::FinderSession};
/// # use center_finder::assemble::SurfaceConfig;
/// # use std::sync::Arc;
/// # async fn screen() {
/// let config = FinderConfig::default();
/// let session = FinderSession::new(
///     Arc::new(config.build_finder()),
///     config.location_provider(LocationMode::IpLookup),
///     SurfaceConfig::BOOKING,
/// );
/// session.set_search_text("district 7").await;
/// for center in session.view().resolved_centers {
///     println!("{} open={}", center.center.name, center.is_open_now);
/// }
/// # }
/// ```
///
/// Every setter starts a new pass and bumps the generation; a pass only
/// commits if its generation is still the latest when it finishes.
pub struct FinderSession {
    finder: Arc<Finder>,
    location: Arc<dyn LocationProvider>,
    surface: SurfaceConfig,
    user: OnceCell<Option<GeoPoint>>,
    generation: AtomicU64,
    state: Mutex<SessionState>,
}

impl FinderSession {
    pub fn new(finder: Arc<Finder>, location: Arc<dyn LocationProvider>, surface: SurfaceConfig) -> Self {
        let filters = Filters { page_size: surface.page_size, ..Filters::default() };
        Self {
            finder,
            location,
            surface,
            user: OnceCell::new(),
            generation: AtomicU64::new(0),
            state: Mutex::new(SessionState { filters, ..SessionState::default() }),
        }
    }

    /// The user location, resolved once per session.
    pub async fn user_location(&self) -> Option<GeoPoint> {
        *self.user.get_or_init(|| self.location.get_user_location()).await
    }

    pub fn filters(&self) -> Filters {
        self.lock().filters.clone()
    }

    pub fn view(&self) -> CenterView {
        let state = self.lock();
        let page = state.page.as_ref();
        CenterView {
            resolved_centers: page.map(|p| p.items.clone()).unwrap_or_default(),
            loading: state.loading,
            error: state.error.clone(),
            page_index: state.filters.page_index,
            page_count: page.map_or(0, |p| p.page_count),
            total: page.map_or(0, |p| p.total),
        }
    }

    pub async fn set_radius_km(&self, radius_km: f64) -> bool {
        self.lock().filters.radius_km = radius_km.max(0.0);
        self.refresh().await
    }

    pub async fn set_search_text(&self, text: &str) -> bool {
        self.lock().filters.search_text = text.to_string();
        self.refresh().await
    }

    pub async fn set_status_filter(&self, status: StatusFilter) -> bool {
        self.lock().filters.status = status;
        self.refresh().await
    }

    pub async fn set_page_index(&self, page_index: usize) -> bool {
        self.lock().filters.page_index = page_index;
        self.refresh().await
    }

    /// Run a pass with the current filters. Returns `false` if a newer pass
    /// started meanwhile and this one's result was dropped.
    pub async fn refresh(&self) -> bool {
        let token = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (filters, reusable) = {
            let mut state = self.lock();
            state.loading = true;
            let reusable = state
                .snapshot
                .clone()
                .filter(|s| s.radius_km == state.filters.radius_km);
            (state.filters.clone(), reusable)
        };

        let outcome = match reusable {
            Some(snapshot) => Ok(snapshot),
            None => {
                let user = self.user_location().await;
                self.finder.snapshot(user, filters.radius_km).await.map(Arc::new)
            }
        };

        let mut state = self.lock();
        if self.generation.load(Ordering::SeqCst) != token {
            tracing::debug!(token, "discarding stale resolution pass");
            return false;
        }

        match outcome {
            Ok(snapshot) => {
                let page = self.finder.assemble(&snapshot, &filters, &self.surface);
                if page.page_index != filters.page_index {
                    tracing::debug!(requested = filters.page_index, "page out of range, back to first page");
                }
                state.filters.page_index = page.page_index;
                state.snapshot = Some(snapshot);
                state.page = Some(page);
                state.error = None;
            }
            Err(e) => {
                tracing::error!(error = %e, "resolution pass failed");
                state.snapshot = None;
                state.page = None;
                state.error = Some(e.to_string());
            }
        }
        state.loading = false;
        true
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionState> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
