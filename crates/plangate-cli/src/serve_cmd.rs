//! HTTP surface: the `/solve-and-validate` endpoint.
//!
//! Thin layer over [`plangate_core::pipeline::SolvePipeline`]. Input errors
//! map to 400; solver, parse, validation, and timeout failures map to 200
//! with an `error` string in the body (clients inspect the body, not the
//! status code — long-standing contract); only infrastructure failures
//! produce 500.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tracing::Instrument;
use uuid::Uuid;

use plangate_core::pipeline::{SolveError, SolvePipeline};
use plangate_core::request::{PlanningRequest, RequestError};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn internal(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{err:#}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<SolvePipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<SolvePipeline>) -> Self {
        Self { pipeline }
    }
}

/// CORS policy: one fixed allowed origin, wildcard methods and headers,
/// 20-day preflight cache. Preflight `OPTIONS` requests are answered by the
/// layer itself with 200 and never reach a handler.
fn cors_layer(allowed_origin: &str) -> Result<CorsLayer> {
    let origin: HeaderValue = allowed_origin
        .parse()
        .with_context(|| format!("invalid allowed origin {allowed_origin:?}"))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(1_728_000)))
}

pub fn build_router(state: AppState, allowed_origin: &str) -> Result<Router> {
    Ok(Router::new()
        .route("/healthz", get(healthz))
        .route("/solve-and-validate", post(solve_and_validate))
        .layer(cors_layer(allowed_origin)?)
        .with_state(state))
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(
    pipeline: Arc<SolvePipeline>,
    bind: &str,
    port: u16,
    allowed_origin: &str,
) -> Result<()> {
    let app = build_router(AppState::new(pipeline), allowed_origin)?;
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!("plangate listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("plangate shut down");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn solve_and_validate(
    State(state): State<AppState>,
    body: Bytes,
) -> axum::response::Response {
    // An absent or non-JSON body gets the same message as the original
    // missing-parameters case.
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => return bad_request(&RequestError::MalformedBody),
    };

    let request = match PlanningRequest::from_json(&payload) {
        Ok(request) => request,
        Err(err) => return bad_request(&err),
    };

    let span = tracing::info_span!(
        "solve_request",
        request_id = %Uuid::new_v4(),
        mode = request.mode.as_deref().unwrap_or("default"),
    );

    match state
        .pipeline
        .solve_and_validate(&request)
        .instrument(span)
        .await
    {
        Ok(envelope) => (StatusCode::OK, Json(Value::Object(envelope))).into_response(),
        Err(SolveError::Internal(err)) => {
            tracing::error!("request failed: {err:#}");
            AppError::internal(err).into_response()
        }
        Err(err) => (StatusCode::OK, Json(failure_body(&err))).into_response(),
    }
}

fn bad_request(err: &RequestError) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": err.to_string() })),
    )
        .into_response()
}

/// Body for the 200-class logical failures.
fn failure_body(err: &SolveError) -> Value {
    match err {
        SolveError::Parse { status } => json!({
            "error": err.to_string(),
            "parse_status": status.as_str(),
        }),
        _ => json!({ "error": err.to_string() }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use plangate_core::pipeline::PipelineConfig;
    use plangate_core::solution::PlanFileProcessor;
    use plangate_core::solver::SolverPaths;

    const TEST_ORIGIN: &str = "https://finitech-sdp.github.io";

    // -----------------------------------------------------------------------
    // HTTP helpers
    // -----------------------------------------------------------------------

    fn test_router(solver: &Path, validator: &Path) -> Router {
        let pipeline = SolvePipeline::new(
            PipelineConfig {
                solver_paths: SolverPaths {
                    agile2014: solver.to_path_buf(),
                    bfws: solver.to_path_buf(),
                },
                validator: validator.to_path_buf(),
                solver_timeout: Duration::from_secs(10),
                validator_timeout: Duration::from_secs(10),
            },
            Arc::new(PlanFileProcessor),
        );
        build_router(AppState::new(Arc::new(pipeline)), TEST_ORIGIN).unwrap()
    }

    /// Router whose solvers never run; for input-validation tests.
    fn unreachable_router() -> Router {
        let missing = Path::new("/nonexistent/plangate-test-solver");
        test_router(missing, missing)
    }

    async fn post_json(router: Router, body: &str) -> axum::response::Response {
        router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/solve-and-validate")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1_048_576)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    // -----------------------------------------------------------------------
    // Input validation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn missing_domain_returns_400() {
        let resp = post_json(unreachable_router(), r#"{"problem": "p"}"#).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert_eq!(
            json["error"],
            json!("Domain was not found in the query parameters.")
        );
    }

    #[tokio::test]
    async fn missing_problem_returns_400() {
        let resp = post_json(unreachable_router(), r#"{"domain": "d"}"#).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert_eq!(
            json["error"],
            json!("Problem was not found in the query parameters.")
        );
    }

    #[tokio::test]
    async fn empty_body_returns_400() {
        let resp = post_json(unreachable_router(), "").await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert_eq!(
            json["error"],
            json!("Query parameters `domain` and `problem` are missing.")
        );
    }

    #[tokio::test]
    async fn malformed_json_returns_400() {
        let resp = post_json(unreachable_router(), "{not json").await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn malformed_escape_returns_400() {
        let resp = post_json(
            unreachable_router(),
            r#"{"domain": "\\xZZ", "problem": "p"}"#,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        let message = json["error"].as_str().unwrap();
        assert!(
            message.contains("invalid escape sequence"),
            "unexpected error: {message}"
        );
    }

    // -----------------------------------------------------------------------
    // CORS
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn preflight_is_answered_without_body_processing() {
        let resp = unreachable_router()
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/solve-and-validate")
                    .header("origin", TEST_ORIGIN)
                    .header("access-control-request-method", "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let allow_origin = resp
            .headers()
            .get("access-control-allow-origin")
            .expect("preflight should carry allow-origin")
            .to_str()
            .unwrap();
        assert_eq!(allow_origin, TEST_ORIGIN);
    }

    #[tokio::test]
    async fn responses_carry_the_allowed_origin() {
        let router = unreachable_router();
        let resp = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/solve-and-validate")
                    .header("content-type", "application/json")
                    .header("origin", TEST_ORIGIN)
                    .body(Body::from(r#"{"problem": "p"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        let allow_origin = resp
            .headers()
            .get("access-control-allow-origin")
            .expect("response should carry allow-origin")
            .to_str()
            .unwrap();
        assert_eq!(allow_origin, TEST_ORIGIN);
    }

    // -----------------------------------------------------------------------
    // End to end
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn healthz_returns_ok() {
        let resp = unreachable_router()
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn solver_failure_is_a_200_with_error_string() {
        let dir = tempfile::TempDir::new().unwrap();
        let solver = write_script(dir.path(), "solver", "printf 'no plan found'\nexit 1");
        let validator = write_script(dir.path(), "validate", "printf 'unreachable'");

        let resp = post_json(
            test_router(&solver, &validator),
            r#"{"domain": "(define (domain d))", "problem": "(define (problem p))", "mode": "AGILE"}"#,
        )
        .await;

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json, json!({"error": "no plan found"}));
    }

    #[tokio::test]
    async fn full_success_returns_the_envelope() {
        let dir = tempfile::TempDir::new().unwrap();
        let solver = write_script(
            dir.path(),
            "solver",
            "while [ $# -gt 0 ]; do\n  case \"$1\" in\n    --output) out=\"$2\"; shift 2 ;;\n    *) shift ;;\n  esac\ndone\nprintf '(pick a)\\n' > \"$out\"",
        );
        let validator = write_script(dir.path(), "validate", "printf 'Plan valid'");

        let resp = post_json(
            test_router(&solver, &validator),
            r#"{"domain": "(define\n (domain d))", "problem": "(define\n (problem p))"}"#,
        )
        .await;

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["error"], json!(false));
        assert_eq!(json["validator"], json!("Plan valid"));
        assert_eq!(json["parse_status"], json!("ok"));
        assert_eq!(json["plan"], json!(["(pick a)"]));
    }

    #[tokio::test]
    async fn parse_failure_reports_parse_status() {
        let dir = tempfile::TempDir::new().unwrap();
        // Solver succeeds but writes nothing usable to the plan file.
        let solver = write_script(dir.path(), "solver", "exit 0");
        let validator = write_script(dir.path(), "validate", "printf 'unreachable'");

        let resp = post_json(
            test_router(&solver, &validator),
            r#"{"domain": "d", "problem": "p"}"#,
        )
        .await;

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["parse_status"], json!("err"));
        assert_eq!(
            json["error"],
            json!("Parsing failed. Please check your domain and problem for syntax errors.")
        );
    }
}
