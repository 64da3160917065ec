use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use propval_core::{
    analytics, dropdowns, AnalyticsReport, Comparison, ContextHandle, CoreError, FeatureMetadata,
};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    handle: Arc<ContextHandle>,
}

impl AppState {
    pub fn new(handle: Arc<ContextHandle>) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &ContextHandle {
        &self.handle
    }
}

type SharedState = Arc<AppState>;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn service_unavailable<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            err if err.is_client_error() => Self::bad_request(err.to_string()),
            err @ CoreError::ModelNotLoaded => Self::service_unavailable(err.to_string()),
            err => {
                error!("request failed: {}", err);
                Self::internal(err.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let payload = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, payload).into_response()
    }
}

#[derive(Debug, Serialize)]
struct PredictResponse {
    predicted_price: f64,
}

#[derive(Debug, Serialize)]
struct ReloadResponse {
    reloaded: bool,
    model: String,
    features: usize,
}

/// Bind and serve until `shutdown` resolves
pub async fn serve<F>(
    handle: Arc<ContextHandle>,
    addr: &str,
    cors_permissive: bool,
    shutdown: F,
) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let app = build_router(AppState::new(handle), cors_permissive);
    let listener = bind_listener(addr).await?;
    info!("Property price API listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server terminated unexpectedly")
}

async fn bind_listener(addr: &str) -> Result<tokio::net::TcpListener> {
    if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
        tokio::net::TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("failed to bind API listener on {socket_addr}"))
    } else {
        tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind API listener on {addr}"))
    }
}

pub fn build_router(state: AppState, cors_permissive: bool) -> Router {
    let mut router = Router::new()
        .route("/", get(handle_root))
        .route("/predict", post(handle_predict))
        .route("/predict/", post(handle_predict))
        .route("/compare", post(handle_compare))
        .route("/compare/", post(handle_compare))
        .route("/charts/analytics", get(handle_analytics))
        .route("/dropdowns", get(handle_dropdowns))
        .route("/dropdowns/", get(handle_dropdowns))
        .route("/model/info", get(handle_model_info))
        .route("/admin/reload", post(handle_reload))
        .layer(TraceLayer::new_for_http());

    if cors_permissive {
        router = router.layer(CorsLayer::permissive());
    }

    router.with_state(Arc::new(state))
}

async fn handle_root() -> Json<Value> {
    Json(json!({"status": "API running"}))
}

/// Unwrap the `{"data": {...}}` envelope used by the web client
fn unwrap_envelope(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.len() == 1 && map.get("data").is_some_and(Value::is_object) => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

async fn handle_predict(
    State(state): State<SharedState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Json(body) = payload?;
    let input = unwrap_envelope(body);
    let predicted_price = state.handle.predict_price(&input)?;
    debug!(predicted_price, "prediction served");
    Ok(Json(PredictResponse { predicted_price }))
}

async fn handle_compare(
    State(state): State<SharedState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Comparison>, ApiError> {
    let Json(body) = payload?;
    let house1 = body
        .get("house1")
        .ok_or_else(|| ApiError::bad_request("missing 'house1'"))?;
    let house2 = body
        .get("house2")
        .ok_or_else(|| ApiError::bad_request("missing 'house2'"))?;

    let comparison = state.handle.compare(house1, house2)?;
    Ok(Json(comparison))
}

/// The dataset lives in the serving context, so this answers 503 until a model is loaded too
async fn handle_analytics(
    State(state): State<SharedState>,
) -> Result<Json<AnalyticsReport>, ApiError> {
    let context = state.handle.snapshot()?;
    let dataset = context
        .dataset()
        .ok_or_else(|| ApiError::service_unavailable("dataset not loaded"))?;
    Ok(Json(analytics(dataset)))
}

/// Same availability as [`handle_analytics`]
async fn handle_dropdowns(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let context = state.handle.snapshot()?;
    let dataset = context
        .dataset()
        .ok_or_else(|| ApiError::service_unavailable("dataset not loaded"))?;
    let listing = serde_json::to_value(dropdowns(dataset))
        .map_err(|e| ApiError::internal(format!("failed to encode dropdowns: {e}")))?;
    Ok(Json(listing))
}

async fn handle_model_info(
    State(state): State<SharedState>,
) -> Result<Json<FeatureMetadata>, ApiError> {
    Ok(Json(state.handle.metadata()?))
}

async fn handle_reload(State(state): State<SharedState>) -> Result<Json<ReloadResponse>, ApiError> {
    let handle = Arc::clone(&state.handle);
    let reloaded = tokio::task::spawn_blocking(move || handle.reload())
        .await
        .map_err(|e| ApiError::internal(format!("reload task failed: {e}")))?;

    match reloaded {
        Ok(context) => Ok(Json(ReloadResponse {
            reloaded: true,
            model: context.pipeline().name().to_string(),
            features: context.metadata().features.len(),
        })),
        Err(err) => {
            warn!("reload failed, keeping previous context: {}", err);
            Err(ApiError::internal(format!("reload failed: {err}")))
        }
    }
}
