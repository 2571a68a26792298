//! Defines the Axum API routes and handlers.

use crate::motion::{MotionError, PenRequest, PenSnapshot};
use crate::plotter::{PlotterError, PlotterHandle};
use crate::web::models::{StatusResponse, ToolsResponse};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};

pub type AppState = PlotterHandle;

/// Creates the Axum router with all the API endpoints.
pub fn create_router(plotter: AppState) -> Router {
    Router::new()
        .route("/pen", get(get_pen).put(set_pen).delete(park_pen))
        .route("/motors", get(disable_motors).delete(disable_motors))
        .route("/tools", get(list_tools))
        .route("/tools/{tool}", put(change_tool))
        .with_state(plotter)
}

fn error_response(err: &PlotterError) -> Response {
    tracing::warn!("Request failed: {}", err);
    (StatusCode::INTERNAL_SERVER_ERROR, Json(StatusResponse::new("Error"))).into_response()
}

fn pen_response(status: StatusCode, snapshot: PenSnapshot) -> Response {
    (status, Json(snapshot)).into_response()
}

/// Handler to get the current pen state.
async fn get_pen(State(plotter): State<AppState>) -> Json<PenSnapshot> {
    Json(plotter.snapshot())
}

/// Handler to move, lift/lower the pen or reset its distance counter.
async fn set_pen(
    State(plotter): State<AppState>,
    request: Result<Json<PenRequest>, JsonRejection>,
) -> Response {
    let request = match request {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::warn!("Malformed pen request: {}", rejection.body_text());
            return (rejection.status(), Json(StatusResponse::new(rejection.body_text()))).into_response();
        }
    };
    // With ignoreTimeout the move has only been sent, not finished.
    let status = if request.ignore_timeout { StatusCode::ACCEPTED } else { StatusCode::OK };
    match plotter.set_pen(request).await {
        Ok(snapshot) => pen_response(status, snapshot),
        Err(e) if e.is_benign() => pen_response(status, plotter.snapshot()),
        Err(e) => error_response(&e),
    }
}

/// Handler to lift the pen and send it home.
async fn park_pen(State(plotter): State<AppState>) -> Response {
    match plotter.park_pen().await {
        Ok(snapshot) => pen_response(StatusCode::OK, snapshot),
        Err(e) if e.is_benign() => pen_response(StatusCode::OK, plotter.snapshot()),
        Err(e) => error_response(&e),
    }
}

/// Handler to release the steppers.
async fn disable_motors(State(plotter): State<AppState>) -> Response {
    match plotter.disable_motors().await {
        Ok(()) => (StatusCode::OK, Json(StatusResponse::new("Disabled"))).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn list_tools(State(plotter): State<AppState>) -> Json<ToolsResponse> {
    Json(ToolsResponse { tools: plotter.list_tools() })
}

/// Handler to dip the brush into a tool station.
async fn change_tool(State(plotter): State<AppState>, Path(tool): Path<String>) -> Response {
    match plotter.change_tool(&tool).await {
        Ok(message) => (StatusCode::OK, Json(StatusResponse::new(message))).into_response(),
        Err(PlotterError::Motion(MotionError::UnknownTool(_))) => {
            (StatusCode::NOT_FOUND, Json(StatusResponse::new("Tool not found"))).into_response()
        }
        Err(e) => error_response(&e),
    }
}
