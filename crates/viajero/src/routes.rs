//! HTTP API for triggering runs and reading stored results.
//!
//! The dashboard talks JSON: `POST /api/execute-test` runs a catalog case in
//! a fresh browser session, the remaining routes read catalogs, results and
//! service health. Engine-level failures are reported inside a stored 200
//! response; only handler and persistence faults surface as 500.

use crate::store::Store;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
#[cfg(feature = "browser")]
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;
#[cfg(feature = "browser")]
use tracing::info;
use viajar::{Mode, Runner, RunnerConfig, SessionConfig};
#[cfg(feature = "browser")]
use viajar::{CdpSession, EngineError, ParameterBag};

/// Shared state behind every handler
pub struct AppState {
    /// Step catalogs and stored results
    pub store: Store,
    /// Engine entry point
    pub runner: Runner,
    /// Browser settings applied to each fresh session
    pub session: SessionConfig,
}

impl AppState {
    /// Assemble the handler state
    #[must_use]
    pub fn new(store: Store, base_url: impl Into<String>, session: SessionConfig) -> Self {
        Self {
            store,
            runner: Runner::new(RunnerConfig::new(base_url)),
            session,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

/// Build the API router.
///
/// CORS is wide open: the dashboard is served from its own dev origin.
pub fn router(state: Arc<AppState>) -> Router {
    let router = Router::new()
        .route("/api/test-result/{id}", get(test_result))
        .route("/api/test-cases", get(test_cases))
        .route("/api/health", get(health));

    #[cfg(feature = "browser")]
    let router = router.route("/api/execute-test", post(execute_test));

    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"success": false, "error": message})),
    )
        .into_response()
}

fn not_found(message: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"success": false, "error": message})),
    )
        .into_response()
}

fn internal_error(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"success": false, "error": message})),
    )
        .into_response()
}

/// Run one catalog case in a fresh browser session and store the outcome.
///
/// Body shape: `{"mode": "...", "testData": {"testCaseId": "...", ...}}`;
/// every other `testData` key becomes a run parameter.
#[cfg(feature = "browser")]
async fn execute_test(State(state): State<Arc<AppState>>, Json(body): Json<Value>) -> Response {
    let Some(mode_raw) = body.get("mode").and_then(Value::as_str) else {
        return bad_request("mode is required");
    };
    let Some(mode) = Mode::parse(mode_raw) else {
        return bad_request(&format!("unknown mode: {mode_raw}"));
    };

    let test_data = body.get("testData").and_then(Value::as_object);
    let Some(test_case_id) = test_data
        .and_then(|data| data.get("testCaseId"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
    else {
        return bad_request("testData.testCaseId is required");
    };

    let steps = match state.store.load_steps(test_case_id, mode) {
        Ok(Some(steps)) => steps,
        Ok(None) => {
            let missing = EngineError::CatalogNotFound {
                test_case_id: test_case_id.to_string(),
                mode: mode.as_str().to_string(),
            };
            return not_found(&missing.to_string());
        }
        Err(e) => {
            error!("Catalog lookup failed: {e}");
            return internal_error("catalog lookup failed");
        }
    };

    let parameters = test_data.map_or_else(
        || ParameterBag::new(mode),
        |data| {
            let mut fields = data.clone();
            fields.remove("testCaseId");
            ParameterBag::from_json(mode, &fields)
        },
    );

    info!(
        test_case_id,
        mode = mode.as_str(),
        steps = steps.len(),
        "Executing test run"
    );

    let session = state.session.clone();
    let result = state
        .runner
        .execute(test_case_id, &steps, parameters, || {
            CdpSession::launch(session)
        })
        .await;

    match state.store.save_result(&result) {
        Ok(result_id) => (
            StatusCode::OK,
            Json(json!({"success": true, "result_id": result_id, "result": result})),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to persist run result: {e}");
            internal_error("failed to persist run result")
        }
    }
}

/// Fetch a stored run result by row id
async fn test_result(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> Response {
    match state.store.load_result(id) {
        Ok(Some(result)) => (
            StatusCode::OK,
            Json(json!({"success": true, "result": result})),
        )
            .into_response(),
        Ok(None) => not_found(&format!("No stored result with id {id}")),
        Err(e) => {
            error!("Result lookup failed: {e}");
            internal_error("result lookup failed")
        }
    }
}

/// List one mode's catalog with per-case step counts
async fn test_cases(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let Some(mode_raw) = query.get("mode") else {
        return bad_request("mode query parameter is required");
    };
    let Some(mode) = Mode::parse(mode_raw) else {
        return bad_request(&format!("unknown mode: {mode_raw}"));
    };

    match state.store.list_cases(mode) {
        Ok(cases) => (
            StatusCode::OK,
            Json(json!({"success": true, "mode": mode.as_str(), "testCases": cases})),
        )
            .into_response(),
        Err(e) => {
            error!("Catalog listing failed: {e}");
            internal_error("catalog listing failed")
        }
    }
}

/// Liveness plus a DB connectivity probe.
///
/// A degraded database still answers 200; the body carries the state.
async fn health(State(state): State<Arc<AppState>>) -> Response {
    match state.store.ping() {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({"status": "healthy", "database": "connected"})),
        )
            .into_response(),
        Err(e) => {
            error!("Health probe failed: {e}");
            (
                StatusCode::OK,
                Json(json!({"status": "unhealthy", "database": "disconnected"})),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use tower::ServiceExt;
    use viajar::{ParameterBag, RunResult, StepDefinition, StepResult};

    fn seeded_store() -> Store {
        let store = Store::open_memory().unwrap();
        store.seed_demo().unwrap();
        store
    }

    fn app(store: Store) -> Router {
        router(Arc::new(AppState::new(
            store,
            "http://localhost:3000",
            SessionConfig::default(),
        )))
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap();
        (status, body)
    }

    mod health_tests {
        use super::*;

        #[tokio::test]
        async fn test_health_reports_connected_database() {
            let (status, body) = send(app(seeded_store()), get_request("/api/health")).await;

            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["status"], "healthy");
            assert_eq!(body["database"], "connected");
        }
    }

    mod catalog_tests {
        use super::*;

        #[tokio::test]
        async fn test_listing_returns_seeded_cases_with_counts() {
            let (status, body) =
                send(app(seeded_store()), get_request("/api/test-cases?mode=flight")).await;

            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["success"], true);
            assert_eq!(body["mode"], "flight");
            assert_eq!(body["testCases"][0]["testCaseId"], "FL001");
            assert_eq!(body["testCases"][0]["stepCount"], 7);
        }

        #[tokio::test]
        async fn test_listing_requires_mode() {
            let (status, body) = send(app(seeded_store()), get_request("/api/test-cases")).await;

            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["success"], false);
            assert!(body["error"].as_str().unwrap().contains("mode"));
        }

        #[tokio::test]
        async fn test_listing_rejects_unknown_mode() {
            let (status, body) =
                send(app(seeded_store()), get_request("/api/test-cases?mode=boat")).await;

            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body["error"].as_str().unwrap().contains("boat"));
        }
    }

    mod execute_tests {
        use super::*;

        #[tokio::test]
        async fn test_missing_mode_is_rejected() {
            let request = post_json(
                "/api/execute-test",
                &json!({"testData": {"testCaseId": "FL001"}}),
            );
            let (status, body) = send(app(seeded_store()), request).await;

            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body["error"].as_str().unwrap().contains("mode"));
        }

        #[tokio::test]
        async fn test_missing_test_case_id_is_rejected() {
            let request = post_json(
                "/api/execute-test",
                &json!({"mode": "flight", "testData": {}}),
            );
            let (status, body) = send(app(seeded_store()), request).await;

            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body["error"].as_str().unwrap().contains("testCaseId"));
        }

        #[tokio::test]
        async fn test_unknown_mode_is_rejected() {
            let request = post_json(
                "/api/execute-test",
                &json!({"mode": "boat", "testData": {"testCaseId": "FL001"}}),
            );
            let (status, body) = send(app(seeded_store()), request).await;

            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body["error"].as_str().unwrap().contains("boat"));
        }

        #[tokio::test]
        async fn test_missing_catalog_is_not_found_and_stores_nothing() {
            let store = seeded_store();
            let request = post_json(
                "/api/execute-test",
                &json!({"mode": "bus", "testData": {"testCaseId": "X999"}}),
            );
            let (status, body) = send(app(store.clone()), request).await;

            assert_eq!(status, StatusCode::NOT_FOUND);
            let message = body["error"].as_str().unwrap();
            assert!(message.contains("X999"));
            assert!(message.contains("bus"));
            assert!(store.load_result(1).unwrap().is_none());
        }
    }

    mod result_tests {
        use super::*;

        fn stored_result(store: &Store) -> i64 {
            let step = StepDefinition::new("FROM", "#from", "CLICK_AND_SELECT", "", 1);
            let result = RunResult::completed(
                "FLIGHT_FL001_1700000000",
                "FL001",
                ParameterBag::new(Mode::Flight),
                vec![StepResult::passed(&step, 1, "Delhi", "completed")],
                900,
            );
            store.save_result(&result).unwrap()
        }

        #[tokio::test]
        async fn test_stored_result_is_returned() {
            let store = seeded_store();
            let id = stored_result(&store);

            let uri = format!("/api/test-result/{id}");
            let (status, body) = send(app(store), get_request(&uri)).await;

            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["success"], true);
            assert_eq!(body["result"]["run_id"], "FLIGHT_FL001_1700000000");
            assert_eq!(body["result"]["outcome"], "PASSED");
            assert_eq!(body["result"]["total_steps"], 1);
        }

        #[tokio::test]
        async fn test_missing_result_is_not_found() {
            let (status, body) =
                send(app(seeded_store()), get_request("/api/test-result/42")).await;

            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(body["success"], false);
        }
    }
}
