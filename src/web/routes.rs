use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};

use crate::config::SettingEntry;
use crate::metrics::MetricPoint;
use crate::process::ProcessState;
use crate::properties::{PropertyEntry, ServerProperties};
use crate::web::error::{StatusBody, WebError};
use crate::web::state::AppState;
use crate::web::ws::console_socket;

/// Console control, metrics, settings and properties routes
///
/// Control actions are POST only, so a GET to them is answered with 405.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/console/start", post(start))
        .route("/console/stop", post(stop))
        .route("/console/restart", post(restart))
        .route("/console/status", get(status))
        .route("/console/metrics", get(metrics))
        .route("/console/ws", get(console_socket))
        .route("/settings", get(list_settings).post(update_setting))
        .route("/properties", get(list_properties).post(update_property))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct StateResponse {
    state: ProcessState,
}

#[derive(Debug, Serialize)]
struct MetricsResponse {
    points: Vec<MetricPoint>,
}

#[derive(Debug, Serialize)]
struct SettingsResponse {
    settings: Vec<SettingEntry>,
}

#[derive(Debug, Serialize)]
struct PropertiesResponse {
    properties: Vec<PropertyEntry>,
}

#[derive(Debug, Deserialize)]
struct SettingUpdate {
    #[serde(default)]
    setting: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct PropertyUpdate {
    #[serde(default)]
    property: String,
    #[serde(default)]
    value: String,
}

async fn index() -> impl IntoResponse {
    "mcpanel running"
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

async fn start(State(state): State<AppState>) -> Result<Json<StatusBody>, WebError> {
    state.supervisor.start().await?;
    Ok(Json(StatusBody::success("Minecraft server started")))
}

async fn stop(State(state): State<AppState>) -> Result<Json<StatusBody>, WebError> {
    state.supervisor.stop().await?;
    Ok(Json(StatusBody::success("Stop command sent to Minecraft server")))
}

async fn restart(State(state): State<AppState>) -> Result<Json<StatusBody>, WebError> {
    state.supervisor.restart().await?;
    Ok(Json(StatusBody::success("Minecraft server restarted")))
}

async fn status(State(state): State<AppState>) -> Json<StateResponse> {
    Json(StateResponse {
        state: state.supervisor.state().await,
    })
}

async fn metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        points: state.supervisor.metrics_points(),
    })
}

async fn list_settings(State(state): State<AppState>) -> Json<SettingsResponse> {
    Json(SettingsResponse {
        settings: state.settings.entries(),
    })
}

async fn update_setting(
    State(state): State<AppState>,
    Form(update): Form<SettingUpdate>,
) -> Result<Json<SettingsResponse>, WebError> {
    if update.setting.is_empty() || update.value.is_empty() {
        return Err(WebError::BadRequest("missing setting or value".into()));
    }
    state.settings.set(&update.setting, &update.value)?;
    Ok(Json(SettingsResponse {
        settings: state.settings.entries(),
    }))
}

async fn list_properties(
    State(state): State<AppState>,
) -> Result<Json<PropertiesResponse>, WebError> {
    let path = ServerProperties::path_in(&state.settings.snapshot().server.directory);
    let properties = ServerProperties::load(&path)?;
    Ok(Json(PropertiesResponse {
        properties: properties.entries(),
    }))
}

async fn update_property(
    State(state): State<AppState>,
    Form(update): Form<PropertyUpdate>,
) -> Result<Json<PropertiesResponse>, WebError> {
    if update.property.is_empty() || update.value.is_empty() {
        return Err(WebError::BadRequest("missing property or value".into()));
    }
    let path = ServerProperties::path_in(&state.settings.snapshot().server.directory);
    let mut properties = ServerProperties::load(&path)?;
    properties.set(&update.property, &update.value)?;
    properties.save(&path)?;
    tracing::info!(property = %update.property, value = %update.value, "server property updated");
    Ok(Json(PropertiesResponse {
        properties: properties.entries(),
    }))
}
