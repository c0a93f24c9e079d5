use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use homectl_common::{ArmOutcome, ControlError, InvalidCommand};

use crate::site::Site;

#[derive(Clone)]
pub struct AppState {
    pub site: Arc<Site>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(rename = "openZones", skip_serializing_if = "Option::is_none")]
    open_zones: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct TemperatureView {
    room: String,
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutputView {
    pin: u32,
    on: bool,
}

pub fn router(site: Arc<Site>) -> Router {
    Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/temperature", get(handle_get_temperature))
        .route("/api/heating/target", post(handle_set_heating_target))
        .route("/api/cooling/target", post(handle_set_cooling_target))
        .route("/api/output", get(handle_get_output))
        .route("/api/alarm", get(handle_get_alarm))
        .route("/api/alarm/arm", post(handle_arm))
        .route("/api/alarm/disarm", post(handle_disarm))
        .route("/api/lock", get(handle_get_lock))
        .route("/api/lock/toggle", post(handle_lock_toggle))
        .route("/api/lights", get(handle_get_lights).post(handle_set_light))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { site })
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.site.status().await)
}

async fn handle_get_temperature(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(room) = params.get("room") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'room' parameter");
    };

    match state.site.temperature(room).await {
        Ok(Ok(temperature)) => Json(TemperatureView {
            room: room.clone(),
            temperature: Some(temperature),
            error: None,
        })
        .into_response(),
        Ok(Err(err)) => Json(TemperatureView {
            room: room.clone(),
            temperature: None,
            error: Some(err.to_string()),
        })
        .into_response(),
        Err(err) => control_error_response(err),
    }
}

async fn handle_set_heating_target(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let (room, value) = match room_and_value(&params) {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };

    if let Err(err) = state.site.set_heating_target(room, value) {
        return control_error_response(err);
    }
    handle_get_status(State(state)).await.into_response()
}

async fn handle_set_cooling_target(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let (room, value) = match room_and_value(&params) {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };

    if let Err(err) = state.site.set_cooling_target(room, value) {
        return control_error_response(err);
    }
    handle_get_status(State(state)).await.into_response()
}

async fn handle_get_output(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(pin) = params.get("pin") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'pin' parameter");
    };
    let Ok(pin) = pin.parse::<u32>() else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid pin value");
    };

    match state.site.output_state(pin) {
        Ok(on) => Json(OutputView { pin, on }).into_response(),
        Err(err) => control_error_response(err),
    }
}

async fn handle_get_alarm(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.site.security_status().await)
}

async fn handle_arm(State(state): State<AppState>) -> Response {
    match state.site.request_arm().await {
        Ok(ArmOutcome::Armed) => info!("alarm armed via api"),
        Ok(ArmOutcome::AlreadyArmed) => {}
        Err(err) => {
            warn!("arm rejected: {err}");
            return control_error_response(err);
        }
    }
    handle_get_alarm(State(state)).await.into_response()
}

async fn handle_disarm(State(state): State<AppState>) -> impl IntoResponse {
    state.site.request_disarm();
    handle_get_alarm(State(state)).await
}

async fn handle_get_lock(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.site.lock_status())
}

async fn handle_lock_toggle(State(state): State<AppState>) -> impl IntoResponse {
    state.site.request_lock_toggle();
    handle_get_lock(State(state)).await
}

async fn handle_get_lights(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.site.lights())
}

async fn handle_set_light(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(name) = params.get("name") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'name' parameter");
    };
    let on = match params.get("state").map(String::as_str) {
        Some("on") => true,
        Some("off") => false,
        Some(_) => {
            return error_response(StatusCode::BAD_REQUEST, "Invalid state. Use 'on' or 'off'")
        }
        None => return error_response(StatusCode::BAD_REQUEST, "Missing 'state' parameter"),
    };

    if let Err(err) = state.site.set_light(name, on) {
        return control_error_response(err);
    }
    handle_get_lights(State(state)).await.into_response()
}

fn room_and_value(params: &HashMap<String, String>) -> Result<(&str, f32), Response> {
    let Some(room) = params.get("room") else {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Missing 'room' parameter",
        ));
    };
    let Some(value) = params.get("value") else {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Missing 'value' parameter",
        ));
    };
    let Ok(value) = value.parse::<f32>() else {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Invalid temperature value",
        ));
    };
    Ok((room.as_str(), value))
}

fn control_error_response(err: ControlError) -> Response {
    let status = match &err {
        ControlError::ConfigurationConflict { .. }
        | ControlError::SecurityPreconditionFailed { .. } => StatusCode::CONFLICT,
        ControlError::InvalidCommand(
            InvalidCommand::UnknownRoom(_)
            | InvalidCommand::UnknownPin(_)
            | InvalidCommand::UnknownLight(_),
        ) => StatusCode::NOT_FOUND,
        ControlError::InvalidCommand(_) => StatusCode::BAD_REQUEST,
        ControlError::ActuatorFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let open_zones = match &err {
        ControlError::SecurityPreconditionFailed { open_zones } => Some(open_zones.clone()),
        _ => None,
    };

    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
            open_zones,
        }),
    )
        .into_response()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
            open_zones: None,
        }),
    )
        .into_response()
}
