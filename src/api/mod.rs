use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, OriginalUri};
use axum::http::{
    header::{HeaderName, ACCEPT, AUTHORIZATION, CONTENT_TYPE, ORIGIN},
    Request, StatusCode,
};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, info_span};

use crate::config::Config;
use crate::core::errors::ErrorKind;
use crate::services::gateway::{Gateway, GatewayResponse};

pub mod big_data;
pub mod jobs;
pub mod pipelines;

static START_TIME: Lazy<Instant> = Lazy::new(Instant::now);
static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Multipart framing on top of the largest accepted upload.
const BODY_LIMIT_SLACK: u64 = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
}

pub fn router(cfg: &Config, gateway: Arc<Gateway>) -> Router {
    let allowed_headers = [
        ACCEPT,
        AUTHORIZATION,
        CONTENT_TYPE,
        ORIGIN,
        HeaderName::from_static("x-requested-with"),
        HeaderName::from_static("x-request-id"),
    ];

    let cors = if cfg.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_headers(allowed_headers)
            .allow_methods(Any)
            .allow_credentials(false)
    } else {
        let origins = cfg
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect::<Vec<_>>();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_headers(allowed_headers)
            .allow_methods(Any)
            .allow_credentials(true)
    };

    let trace = TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
            let request_id = header_value(req, &REQUEST_ID_HEADER);
            info_span!(
                "http.request",
                method = %req.method(),
                uri = %req.uri(),
                version = ?req.version(),
                request_id = %request_id
            )
        })
        .on_request(|_req: &Request<Body>, _span: &tracing::Span| {
            info!("request.start");
        })
        .on_response(
            |res: &Response, latency: std::time::Duration, _span: &tracing::Span| {
                info!(status = %res.status(), latency_ms = %latency.as_millis(), "request.end");
            },
        )
        .on_failure(|err, latency: std::time::Duration, _span: &tracing::Span| {
            tracing::error!(error = %err, latency_ms = %latency.as_millis(), "request.failure");
        });

    let body_limit = usize::try_from(cfg.max_upload_bytes.saturating_add(BODY_LIMIT_SLACK))
        .unwrap_or(usize::MAX);
    let state = AppState { gateway };

    Router::new()
        .nest("/big-data", big_data::router())
        .nest("/jobs", jobs::router())
        .nest("/pipelines", pipelines::router())
        .route("/health", axum::routing::get(health))
        .route("/", axum::routing::get(root))
        .fallback(fallback_404)
        .with_state(state)
        .layer(cors)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(trace)
        .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER.clone()))
        .layer(SetRequestIdLayer::new(
            REQUEST_ID_HEADER.clone(),
            MakeRequestUuid,
        ))
}

/// Renders a gateway outcome: `success` on success, the error kind's status
/// otherwise.
pub(crate) fn respond(res: GatewayResponse, success: StatusCode) -> (StatusCode, Json<Value>) {
    match res.status_kind {
        None => (
            success,
            Json(json!({
                "message": res.message,
                "data": res.data,
            })),
        ),
        Some(kind) => (
            kind.status_code(),
            Json(json!({
                "error": {
                    "kind": kind,
                    "message": res.message,
                    "retryable": res.retryable,
                    "cause": res.cause,
                }
            })),
        ),
    }
}

pub(crate) fn bad_request(message: impl Into<String>) -> (StatusCode, Json<Value>) {
    let kind = ErrorKind::InvalidRequest;
    (
        kind.status_code(),
        Json(json!({
            "error": {
                "kind": kind,
                "message": message.into(),
                "retryable": false,
                "cause": null,
            }
        })),
    )
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime": START_TIME.elapsed().as_secs_f64()
    }))
}

async fn root(axum::extract::State(state): axum::extract::State<AppState>) -> Json<Value> {
    let gateway = &state.gateway;
    Json(json!({
        "name": "Big Data Gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Upload, inspect and delete HDFS artifacts; submit Spark jobs to YARN; trigger the ML pipeline",
        "backends": {
            "store": gateway.artifacts().store_backend(),
            "jobs": gateway.jobs().submitter_backend(),
        },
        "endpoints": {
            "health": "/health",
            "upload": "POST /big-data/upload",
            "status": "GET /big-data/status",
            "delete": "DELETE /big-data/delete",
            "jobs": "POST /jobs/process/{task_name}",
            "pipeline": "POST /pipelines/run"
        }
    }))
}

async fn fallback_404(uri: OriginalUri) -> impl IntoResponse {
    let path = uri.0.path().to_string();
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": {
                "message": "resource not found",
                "path": path
            }
        })),
    )
}

fn header_value(req: &Request<Body>, name: &HeaderName) -> String {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string()
}
