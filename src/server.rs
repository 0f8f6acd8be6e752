use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use tokio::task::JoinError;

use crate::error::DashboardError;
use crate::query::Dashboard;

/// Page shell; `{{ data }}` is replaced with the full payload.
const INDEX_TEMPLATE: &str = include_str!("../static/index.html");
const DATA_PLACEHOLDER: &str = "{{ data }}";

#[derive(Clone)]
struct AppState {
    dashboard: Arc<Dashboard>,
}

/// Routes:
/// * `GET /`         page with the full payload embedded
/// * `GET /pca`      `{country: {x, y}}`
/// * `GET /api/data` full payload as JSON
/// * `GET /healthz`  liveness
pub fn router(dashboard: Dashboard) -> Router {
    let state = AppState {
        dashboard: Arc::new(dashboard),
    };
    Router::new()
        .route("/", get(index))
        .route("/pca", get(pca))
        .route("/api/data", get(data))
        .route("/healthz", get(healthz))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

enum ApiError {
    Dashboard(DashboardError),
    Encode(serde_json::Error),
    Join(JoinError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Dashboard(e @ DashboardError::InsufficientData { .. }) => {
                (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
            }
            ApiError::Dashboard(e @ DashboardError::Load(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ApiError::Encode(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("encoding payload: {e}"),
            ),
            ApiError::Join(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("join error: {e}")),
        };
        log::warn!("request failed ({status}): {message}");
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Loading and projecting is blocking work; keep it off the async workers.
async fn run_blocking<T, F>(dashboard: Arc<Dashboard>, query: F) -> Result<T, ApiError>
where
    F: FnOnce(&Dashboard) -> Result<T, DashboardError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || query(&dashboard))
        .await
        .map_err(ApiError::Join)?
        .map_err(ApiError::Dashboard)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn index(State(st): State<AppState>) -> Result<Html<String>, ApiError> {
    let payload = run_blocking(st.dashboard.clone(), |d| d.full_payload()).await?;
    let encoded = serde_json::to_string(&payload).map_err(ApiError::Encode)?;
    Ok(Html(render_index(&encoded)))
}

async fn pca(State(st): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let points = run_blocking(st.dashboard.clone(), |d| d.projection_only()).await?;
    Ok(Json(points))
}

async fn data(State(st): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let payload = run_blocking(st.dashboard.clone(), |d| d.full_payload()).await?;
    Ok(Json(payload))
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

/// Embed JSON inside a `<script>` element. `</` cannot close the element
/// once escaped, and `<\/` is still valid JSON.
fn render_index(encoded: &str) -> String {
    INDEX_TEMPLATE.replace(DATA_PLACEHOLDER, &encoded.replace("</", "<\\/"))
}
