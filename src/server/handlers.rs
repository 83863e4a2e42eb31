use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use crate::assemble::{Filters, StatusFilter, SurfaceConfig};
use crate::availability::Availability;
use crate::finder::{FinderError, PassResult};
use crate::geo::GeoPoint;
use crate::location::{BoundedLocation, LocationProvider, ManualLocation};

use super::state::AppState;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

pub(super) struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

impl From<FinderError> for ApiError {
    fn from(e: FinderError) -> Self {
        tracing::error!(error = %e, "directory unavailable");
        api_error(StatusCode::BAD_GATEWAY, e.to_string())
    }
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    ApiError(status, msg.into())
}

// ─── GET /api/health ─────────────────────────────────────────────

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// ─── GET /api/centers ────────────────────────────────────────────

/// Every field arrives as a raw string: garbage coordinates degrade to
/// "location unknown", other garbage gets a JSON 400.
#[derive(Deserialize, Default)]
pub struct CentersQuery {
    pub lat: Option<String>,
    pub lng: Option<String>,
    pub radius_km: Option<String>,
    pub q: Option<String>,
    pub status: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub surface: Option<String>,
}

fn parse_coord(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
}

/// Blank means absent; anything else must parse.
fn parse_param<T: FromStr>(name: &str, raw: Option<&str>) -> Result<Option<T>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|_| api_error(StatusCode::BAD_REQUEST, format!("Invalid '{}' parameter: '{}'", name, s))),
    }
}

async fn user_point(lat: Option<f64>, lng: Option<f64>) -> Option<GeoPoint> {
    let source = ManualLocation::from_parts(lat, lng)?;
    BoundedLocation::new(source).get_user_location().await
}

pub async fn centers(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CentersQuery>,
) -> Result<Json<PassResult>, ApiError> {
    let start = Instant::now();

    let surface_name = params.surface.as_deref().unwrap_or("");
    let surface = SurfaceConfig::by_name(surface_name)
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, format!("Unknown surface '{}'", surface_name)))?;

    let status: StatusFilter = params
        .status
        .as_deref()
        .unwrap_or("")
        .parse()
        .map_err(|e: String| api_error(StatusCode::BAD_REQUEST, e))?;

    let radius_km: Option<f64> = parse_param("radius_km", params.radius_km.as_deref())?;
    if radius_km.is_some_and(|r| !r.is_finite() || r < 0.0) {
        return Err(api_error(StatusCode::BAD_REQUEST, "'radius_km' must be a non-negative number"));
    }

    let filters = Filters {
        radius_km: radius_km.unwrap_or(state.default_radius_km),
        search_text: params.q.clone().unwrap_or_default(),
        status,
        page_size: parse_param("page_size", params.page_size.as_deref())?.unwrap_or(surface.page_size),
        page_index: parse_param("page", params.page.as_deref())?.unwrap_or(0),
    };

    let user = user_point(parse_coord(params.lat.as_deref()), parse_coord(params.lng.as_deref())).await;
    let result = state.finder.run_pass(user, &filters, &surface).await?;

    tracing::info!(
        located = user.is_some(),
        radius_km = filters.radius_km,
        total = result.page.total,
        page = result.page.page_index,
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "GET /api/centers"
    );

    Ok(Json(result))
}

// ─── GET /api/centers/{id}/availability ─────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    #[serde(flatten)]
    pub availability: Availability,
}

pub async fn center_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let (center, availability) = state
        .finder
        .center_availability(&id)
        .await?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Unknown service center '{}'", id)))?;

    tracing::debug!(%id, is_open = availability.is_open, "center availability");

    Ok(Json(AvailabilityResponse {
        id: center.id,
        name: center.name,
        is_active: center.is_active,
        availability,
    }))
}

#[cfg(test)]
mod tests {
    use super::super::build_router;
    use crate::availability::{AvailabilityEvaluator, FixedClock, OvernightPolicy};
    use crate::center::{DayHours, ServiceCenter, WeeklySchedule};
    use crate::directory::testing::{center, Answer, FakeDirectory};
    use crate::distance::DistanceResolver;
    use crate::finder::Finder;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use chrono::{NaiveDate, Weekday};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn router(directory: FakeDirectory) -> (Router, Arc<FakeDirectory>) {
        let directory = Arc::new(directory);
        let now = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap().and_hms_opt(10, 0, 0).unwrap();
        let finder = Finder::new(
            directory.clone(),
            DistanceResolver::new(None),
            AvailabilityEvaluator::new(OvernightPolicy::Closed),
            Arc::new(FixedClock(now)),
        );
        (build_router(finder, 20.0), directory)
    }

    fn near(id: &str, km: f64) -> ServiceCenter {
        let mut c = center(id);
        c.distance_km = Some(km);
        c
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = app.oneshot(Request::get(uri).body(Body::empty()).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = router(FakeDirectory::new(Answer::Centers(vec![]), Answer::Centers(vec![])));
        let (status, body) = get(app, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_centers_with_location_are_ranked() {
        let (app, dir) = router(FakeDirectory::new(
            Answer::Centers(vec![near("b", 18.9), near("a", 5.2)]),
            Answer::Centers(vec![]),
        ));
        let (status, body) = get(app, "/api/centers?lat=10.0&lng=106.0&radius_km=20").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"][0]["id"], "a");
        assert_eq!(body["items"][1]["resolvedDistanceKm"], 18.9);
        assert_eq!(body["tier"], "nearby");
        assert_eq!(body["radiusApplied"], true);
        assert_eq!(dir.all_calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_coordinates_mean_no_location() {
        let (app, dir) = router(FakeDirectory::new(
            Answer::Centers(vec![near("n", 1.0)]),
            Answer::Centers(vec![center("x"), center("y")]),
        ));
        let (status, body) = get(app, "/api/centers?lat=abc&lng=500").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert_eq!(body["fallback"], "no_location");
        assert!(body["userLocation"].is_null());
        assert_eq!(dir.nearby_calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_status_is_bad_request() {
        let (app, _) = router(FakeDirectory::new(Answer::Centers(vec![]), Answer::Centers(vec![])));
        let (status, body) = get(app, "/api/centers?status=archived").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 400);
    }

    #[tokio::test]
    async fn test_malformed_numbers_get_json_bad_request() {
        for uri in [
            "/api/centers?radius_km=abc",
            "/api/centers?radius_km=-3",
            "/api/centers?page=-1",
            "/api/centers?page_size=ten",
        ] {
            let (app, _) = router(FakeDirectory::new(Answer::Centers(vec![]), Answer::Centers(vec![])));
            let (status, body) = get(app, uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(body["code"], 400, "{}", uri);
            assert!(body["error"].as_str().unwrap().contains('\''), "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_blank_numbers_use_defaults() {
        let (app, _) = router(FakeDirectory::new(Answer::Centers(vec![]), Answer::Centers(vec![center("a")])));
        let (status, body) = get(app, "/api/centers?radius_km=&page=&page_size=").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pageSize"], 10);
        assert_eq!(body["pageIndex"], 0);
    }

    #[tokio::test]
    async fn test_unknown_surface_is_bad_request() {
        let (app, _) = router(FakeDirectory::new(Answer::Centers(vec![]), Answer::Centers(vec![])));
        let (status, _) = get(app, "/api/centers?surface=kiosk").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_booking_surface_page_size_and_selection() {
        let centers: Vec<ServiceCenter> = (0..8).map(|i| center(&i.to_string())).collect();
        let (app, _) = router(FakeDirectory::new(Answer::Centers(vec![]), Answer::Centers(centers)));
        let (status, body) = get(app, "/api/centers?surface=booking").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pageSize"], 6);
        assert_eq!(body["pageCount"], 2);
        // No schedule means closed, so nothing can be booked.
        assert_eq!(body["items"][0]["selectable"], false);
    }

    #[tokio::test]
    async fn test_both_tiers_failing_is_bad_gateway() {
        let (app, _) = router(FakeDirectory::new(Answer::Transport, Answer::Transport));
        let (status, body) = get(app, "/api/centers?lat=10&lng=106").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], 502);
    }

    #[tokio::test]
    async fn test_center_availability() {
        let mut c = center("7");
        c.schedule = WeeklySchedule::new().with_day(Weekday::Mon, DayHours::new("08:00", "12:00"));
        let (app, _) = router(FakeDirectory::new(Answer::Centers(vec![]), Answer::Centers(vec![c])));

        let (status, body) = get(app.clone(), "/api/centers/7/availability").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isOpen"], true);
        assert_eq!(body["todayWindow"]["open"], "08:00");

        let (status, _) = get(app, "/api/centers/missing/availability").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_responses_are_not_cached() {
        let (app, _) = router(FakeDirectory::new(Answer::Centers(vec![]), Answer::Centers(vec![])));
        let resp = app.oneshot(Request::get("/api/health").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.headers()["cache-control"], "no-store");
    }
}
