//! REST API handlers using axum

use crate::application::Application;
use crate::domain::{DomainError, ServiceSnapshot, WatchlistEntry};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Shared application state
pub type AppState = Arc<Application>;

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error carried back to the client with its HTTP status
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        let status = match &e {
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::AlreadyExists(_) => StatusCode::CONFLICT,
            DomainError::InvalidConfiguration(_) => StatusCode::BAD_REQUEST,
            DomainError::TransientQuery { .. }
            | DomainError::Persistence(_)
            | DomainError::Control { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %e, "Request failed");
        }
        Self::new(status, e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(error = %rejection, "Rejected request body");
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Status response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: &'static str,
    pub uptime_seconds: u64,
    pub subscribers: usize,
}

/// List services response
#[derive(Serialize)]
pub struct ListServicesResponse {
    pub count: usize,
    pub services: Vec<ServiceSnapshot>,
}

/// Result of a start/stop/restart request
#[derive(Serialize)]
pub struct ServiceActionResponse {
    pub service: String,
    pub action: &'static str,
    pub success: bool,
}

/// List watchlist response
#[derive(Serialize)]
pub struct WatchlistResponse {
    pub items: Vec<WatchlistEntry>,
}

/// Add to watchlist request
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddWatchRequest {
    pub service_name: String,
    #[serde(default = "default_auto_restart")]
    pub auto_restart: bool,
}

fn default_auto_restart() -> bool {
    true
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddWatchResponse {
    pub added: bool,
    pub service_name: String,
}

/// Update watchlist entry request
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWatchRequest {
    pub auto_restart: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveWatchResponse {
    pub removed: bool,
    pub service_name: String,
}

// ===== Handlers =====

/// GET /v1/status - Daemon liveness
pub async fn status(State(app): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        uptime_seconds: app.uptime().as_secs(),
        subscribers: app.broadcaster().subscriber_count(),
    })
}

/// GET /v1/services - Every service the controller knows about
pub async fn list_services(State(app): State<AppState>) -> ApiResult<Json<ListServicesResponse>> {
    let services = app.list_services().await.map_err(|e| {
        warn!(error = %e, "Service listing unavailable");
        ApiError::new(StatusCode::NOT_IMPLEMENTED, e.to_string())
    })?;

    debug!(count = services.len(), "Services listed");
    Ok(Json(ListServicesResponse {
        count: services.len(),
        services,
    }))
}

/// GET /v1/services/:name - Live snapshot of one service
pub async fn get_service(
    State(app): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<ServiceSnapshot>> {
    Ok(Json(app.get_service(&name).await?))
}

/// POST /v1/services/:name/start
pub async fn start_service(
    State(app): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<ServiceActionResponse>> {
    info!(service = %name, "REST Start request");
    app.start_service(&name).await?;
    Ok(Json(action_response(name, "start")))
}

/// POST /v1/services/:name/stop
pub async fn stop_service(
    State(app): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<ServiceActionResponse>> {
    info!(service = %name, "REST Stop request");
    app.stop_service(&name).await?;
    Ok(Json(action_response(name, "stop")))
}

/// POST /v1/services/:name/restart
pub async fn restart_service(
    State(app): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<ServiceActionResponse>> {
    info!(service = %name, "REST Restart request");
    app.restart_service(&name).await?;
    Ok(Json(action_response(name, "restart")))
}

fn action_response(service: String, action: &'static str) -> ServiceActionResponse {
    ServiceActionResponse {
        service,
        action,
        success: true,
    }
}

/// GET /v1/watchlist
pub async fn list_watchlist(State(app): State<AppState>) -> ApiResult<Json<WatchlistResponse>> {
    let items = app.list_watchlist().await?;
    Ok(Json(WatchlistResponse { items }))
}

/// POST /v1/watchlist - Start watching a service
pub async fn add_watch(
    State(app): State<AppState>,
    body: Result<Json<AddWatchRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AddWatchResponse>)> {
    let Json(req) = body?;
    let name = req.service_name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("serviceName is required"));
    }

    info!(service = %name, auto_restart = req.auto_restart, "REST Add watch request");
    app.add_to_watchlist(name, req.auto_restart).await?;

    Ok((
        StatusCode::CREATED,
        Json(AddWatchResponse {
            added: true,
            service_name: name.to_string(),
        }),
    ))
}

/// GET /v1/watchlist/:name
pub async fn get_watch(
    State(app): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<WatchlistEntry>> {
    Ok(Json(app.get_watchlist_entry(&name).await?))
}

/// PUT /v1/watchlist/:name - Toggle auto-restart
pub async fn update_watch(
    State(app): State<AppState>,
    Path(name): Path<String>,
    body: Result<Json<UpdateWatchRequest>, JsonRejection>,
) -> ApiResult<Json<WatchlistEntry>> {
    let Json(req) = body?;
    info!(service = %name, auto_restart = req.auto_restart, "REST Update watch request");
    Ok(Json(app.update_watchlist(&name, req.auto_restart).await?))
}

/// DELETE /v1/watchlist/:name
pub async fn remove_watch(
    State(app): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<RemoveWatchResponse>> {
    info!(service = %name, "REST Remove watch request");
    app.remove_from_watchlist(&name).await?;
    Ok(Json(RemoveWatchResponse {
        removed: true,
        service_name: name,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_status_mapping() {
        let cases = [
            (DomainError::NotFound("a".into()), StatusCode::NOT_FOUND),
            (DomainError::AlreadyExists("a".into()), StatusCode::CONFLICT),
            (DomainError::Persistence("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (DomainError::control("a", "denied"), StatusCode::INTERNAL_SERVER_ERROR),
            (DomainError::query("a", "timeout"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status, expected);
        }
    }

    #[test]
    fn test_add_request_defaults_auto_restart() {
        let req: AddWatchRequest = serde_json::from_str(r#"{"serviceName":"nginx"}"#).unwrap();
        assert_eq!(req.service_name, "nginx");
        assert!(req.auto_restart);
    }
}
