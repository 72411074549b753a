//! HTTP surface: health, status, Prometheus metrics and the grant API.
//!
//! The caller is identified by the `x-principal` header. Every grant or revoke
//! outcome is reported through the [`Notifier`] before it is rendered.

use crate::error::GrantError;
use crate::grants::{Capability, GrantService, Principal};
use crate::notify::{Notifier, Report};
use crate::status::StatusSnapshot;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;

/// Header carrying the calling principal's id.
pub const PRINCIPAL_HEADER: &str = "x-principal";

/// Shared state for the HTTP handlers.
#[derive(Clone)]
pub struct ApiState {
    pub service: GrantService,
    pub notifier: Arc<dyn Notifier>,
    pub name: String,
}

/// Body of `POST /api/grants`. `target` takes an id or a mention.
#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub target: Principal,
    pub duration: String,
    pub capability: String,
}

/// Error rendered as `{"error": code, "message": ...}`.
#[derive(Debug)]
pub struct ApiError(pub GrantError);

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            GrantError::Unauthorized => StatusCode::UNAUTHORIZED,
            GrantError::InvalidDuration(_) => StatusCode::BAD_REQUEST,
            GrantError::CapabilityNotFound(_) | GrantError::NotGranted { .. } => {
                StatusCode::NOT_FOUND
            }
            GrantError::BackendForbidden(_) => StatusCode::FORBIDDEN,
            GrantError::BackendUnknown(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.0.error_code(),
            "message": self.0.user_message(),
        }));
        (self.status(), body).into_response()
    }
}

/// Build the router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/grants", post(grant_handler))
        .route("/api/grants/:capability/:target", delete(revoke_handler))
        .with_state(state)
}

/// Handler for GET /metrics - returns Prometheus metrics in text format.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

async fn health_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(json!({ "status": "alive", "service": state.name }))
}

async fn status_handler(State(state): State<ApiState>) -> Json<StatusSnapshot> {
    Json(state.service.snapshot())
}

async fn grant_handler(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<GrantRequest>, JsonRejection>,
) -> Response {
    let caller = match caller(&headers) {
        Ok(caller) => caller,
        Err(e) => return e.into_response(),
    };
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            return bad_request("invalid_request", &rejection.body_text());
        }
    };
    let result = match req.capability.parse::<Capability>() {
        Ok(capability) => {
            state
                .service
                .grant(caller, req.target, &req.duration, capability)
                .await
        }
        Err(e) => Err(GrantError::CapabilityNotFound(e.0)),
    };

    match result {
        Ok(granted) => {
            state.notifier.report(caller, Report::Granted(&granted)).await;
            Json(granted).into_response()
        }
        Err(e) => {
            state.notifier.report(caller, Report::Failed(&e)).await;
            ApiError(e).into_response()
        }
    }
}

async fn revoke_handler(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((capability, target)): Path<(String, String)>,
) -> Response {
    let caller = match caller(&headers) {
        Ok(caller) => caller,
        Err(e) => return e.into_response(),
    };
    let capability = match capability.parse::<Capability>() {
        Ok(c) => c,
        Err(e) => return ApiError(GrantError::CapabilityNotFound(e.0)).into_response(),
    };
    let Ok(target) = target.parse::<Principal>() else {
        return bad_request("invalid_target", "Target must be a user id or mention");
    };

    match state.service.revoke(caller, target, capability).await {
        Ok(revoked) => {
            state.notifier.report(caller, Report::Revoked(&revoked)).await;
            Json(revoked).into_response()
        }
        Err(e) => {
            state.notifier.report(caller, Report::Failed(&e)).await;
            ApiError(e).into_response()
        }
    }
}

fn bad_request(code: &str, message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": code, "message": message })),
    )
        .into_response()
}

/// The calling principal, from the `x-principal` header.
fn caller(headers: &HeaderMap) -> Result<Principal, ApiError> {
    headers
        .get(PRINCIPAL_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .ok_or(ApiError(GrantError::Unauthorized))
}

/// Run the HTTP server.
///
/// Binds to `0.0.0.0:port`. This is a long-running task that should be
/// spawned in the background.
pub async fn run_http_server(port: u16, state: ApiState) {
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("HTTP server listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind HTTP server on {}: {}", addr, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("HTTP server error: {}", e);
    }
}
