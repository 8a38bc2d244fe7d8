use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::responses::JsonResponse;
use crate::state::AppState;
use crate::worker::process_due_workflows;

/// Runs one poll cycle on demand. Lets operators and tests drive the
/// poller without waiting for the background interval.
pub async fn run_poll_cycle(State(app_state): State<AppState>) -> Response {
    match process_due_workflows(&app_state).await {
        Ok(triggered) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "triggered": triggered
            })),
        )
            .into_response(),
        Err(e) => {
            eprintln!("DB error running poll cycle: {:?}", e);
            JsonResponse::server_error("Failed to run poll cycle").into_response()
        }
    }
}
