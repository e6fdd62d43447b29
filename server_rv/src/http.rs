//! The control API and its web page

use crate::camera::{CameraFeed, BOUNDARY};
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use core_rv::drive::DriveCommand;
use core_rv::driving::data::SharedRoverData;
use core_rv::messages::{RadarData, RoverStatus};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub data: Arc<SharedRoverData>,
    /// `None` when the rover has no working camera
    pub camera: Option<CameraFeed>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn unavailable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: message.into(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                success: false,
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

/// A speed given either as a JSON number or as a string holding an integer
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SpeedValue {
    Number(f64),
    Text(String),
}

#[derive(Debug, Deserialize)]
pub struct SpeedRequest {
    #[serde(default)]
    speed: Option<SpeedValue>,
}

#[derive(Debug, Serialize)]
pub struct SpeedResponse {
    success: bool,
    new_speed: u8,
}

impl SpeedRequest {
    /// The requested speed, or `None` to keep the current one
    fn requested(&self) -> Result<Option<i64>, ApiError> {
        match &self.speed {
            None => Ok(None),
            Some(SpeedValue::Number(x)) if x.is_finite() => Ok(Some(x.trunc() as i64)),
            Some(SpeedValue::Number(x)) => Err(ApiError::bad_request(format!("invalid speed {x}"))),
            Some(SpeedValue::Text(s)) => s
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|e| ApiError::bad_request(format!("invalid speed {s:?}: {e}"))),
        }
    }
}

pub fn router(data: Arc<SharedRoverData>, camera: Option<CameraFeed>) -> Router {
    let mut router = Router::new()
        .route("/", get(dashboard))
        .route("/video_feed", get(video_feed))
        .route("/status", get(status))
        .route("/radar_data", get(radar_data))
        .route("/set_linear_speed", post(set_linear_speed))
        .route("/set_turn_speed", post(set_turn_speed))
        .route("/start_radar", post(start_radar))
        .route("/stop_radar", post(stop_radar));
    for command in DriveCommand::get_all() {
        router = router.route(
            &format!("/{}", command.route()),
            post(move |State(state): State<AppState>| drive(state, command)),
        );
    }
    router.with_state(AppState { data, camera })
}

async fn dashboard() -> Html<&'static str> {
    Html(include_str!("dashboard.html"))
}

async fn video_feed(State(state): State<AppState>) -> Result<Response, ApiError> {
    let camera = state
        .camera
        .ok_or_else(|| ApiError::unavailable("camera is not available"))?;
    let content_type = format!("multipart/x-mixed-replace; boundary={BOUNDARY}");
    Ok((
        [(header::CONTENT_TYPE, content_type)],
        Body::from_stream(camera.into_stream()),
    )
        .into_response())
}

async fn status(State(state): State<AppState>) -> Json<RoverStatus> {
    Json(state.data.status())
}

async fn radar_data(State(state): State<AppState>) -> Json<RadarData> {
    Json(state.data.radar_data())
}

async fn drive(state: AppState, command: DriveCommand) -> Json<RoverStatus> {
    state.data.manual_command(command).await;
    Json(state.data.status())
}

async fn set_linear_speed(
    State(state): State<AppState>,
    body: Result<Json<SpeedRequest>, JsonRejection>,
) -> Result<Json<SpeedResponse>, ApiError> {
    let Json(request) = body?;
    let new_speed = match request.requested()? {
        Some(speed) => state.data.set_linear_speed(speed).await,
        None => state.data.speeds().linear,
    };
    info!("Linear speed set to {new_speed}%");
    Ok(Json(SpeedResponse {
        success: true,
        new_speed,
    }))
}

async fn set_turn_speed(
    State(state): State<AppState>,
    body: Result<Json<SpeedRequest>, JsonRejection>,
) -> Result<Json<SpeedResponse>, ApiError> {
    let Json(request) = body?;
    let new_speed = match request.requested()? {
        Some(speed) => state.data.set_turn_speed(speed).await,
        None => state.data.speeds().turn,
    };
    info!("Turn speed set to {new_speed}%");
    Ok(Json(SpeedResponse {
        success: true,
        new_speed,
    }))
}

async fn start_radar(State(state): State<AppState>) -> Json<RoverStatus> {
    if !state.data.start_radar() {
        info!("Radar already running");
    }
    Json(state.data.status())
}

async fn stop_radar(State(state): State<AppState>) -> Json<RoverStatus> {
    state.data.stop_radar();
    Json(state.data.status())
}
