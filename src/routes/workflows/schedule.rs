use super::helpers::is_known_schedule_type;
use super::prelude::*;

pub async fn get_schedule(
    State(app_state): State<AppState>,
    Path(workflow_id): Path<Uuid>,
) -> Response {
    match app_state.workflow_repo.get_schedule(workflow_id).await {
        Ok(Some(schedule)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "schedule": schedule
            })),
        )
            .into_response(),
        Ok(None) => JsonResponse::not_found("Workflow has no schedule").into_response(),
        Err(e) => {
            eprintln!("DB error fetching schedule: {:?}", e);
            JsonResponse::server_error("Failed to fetch schedule").into_response()
        }
    }
}

pub async fn upsert_schedule(
    State(app_state): State<AppState>,
    Path(workflow_id): Path<Uuid>,
    Json(payload): Json<CreateWorkflowSchedule>,
) -> Response {
    if !is_known_schedule_type(&payload.schedule_type) {
        return JsonResponse::bad_request(&format!(
            "Unknown schedule type `{}`",
            payload.schedule_type
        ))
        .into_response();
    }

    match app_state.workflow_repo.find_workflow_by_id(workflow_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return JsonResponse::not_found("Workflow not found").into_response(),
        Err(e) => {
            eprintln!("DB error fetching workflow: {:?}", e);
            return JsonResponse::server_error("Failed to save schedule").into_response();
        }
    }

    // Editing the schedule recomputes next_run immediately. Cron schedules
    // are stored with no next_run and never become due.
    let next = next_run(&payload.schedule_type, &payload.schedule_config, Utc::now())
        .and_then(utc_to_offset);

    match app_state
        .workflow_repo
        .upsert_schedule(workflow_id, payload, next)
        .await
    {
        Ok(schedule) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "schedule": schedule
            })),
        )
            .into_response(),
        Err(e) => {
            eprintln!("DB error saving schedule: {:?}", e);
            JsonResponse::server_error("Failed to save schedule").into_response()
        }
    }
}

pub async fn delete_schedule(
    State(app_state): State<AppState>,
    Path(workflow_id): Path<Uuid>,
) -> Response {
    match app_state.workflow_repo.delete_schedule(workflow_id).await {
        Ok(true) => JsonResponse::success("Schedule deleted").into_response(),
        Ok(false) => JsonResponse::not_found("Workflow has no schedule").into_response(),
        Err(e) => {
            eprintln!("DB error deleting schedule: {:?}", e);
            JsonResponse::server_error("Failed to delete schedule").into_response()
        }
    }
}
