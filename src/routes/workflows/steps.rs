use super::prelude::*;

async fn workflow_exists(app_state: &AppState, workflow_id: Uuid) -> Result<bool, sqlx::Error> {
    Ok(app_state
        .workflow_repo
        .find_workflow_by_id(workflow_id)
        .await?
        .is_some())
}

pub async fn list_steps(
    State(app_state): State<AppState>,
    Path(workflow_id): Path<Uuid>,
) -> Response {
    match workflow_exists(&app_state, workflow_id).await {
        Ok(false) => return JsonResponse::not_found("Workflow not found").into_response(),
        Ok(true) => {}
        Err(e) => {
            eprintln!("DB error fetching workflow: {:?}", e);
            return JsonResponse::server_error("Failed to fetch steps").into_response();
        }
    }

    match app_state.workflow_repo.list_steps(workflow_id).await {
        Ok(steps) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "steps": steps
            })),
        )
            .into_response(),
        Err(e) => {
            eprintln!("DB error listing steps: {:?}", e);
            JsonResponse::server_error("Failed to fetch steps").into_response()
        }
    }
}

pub async fn add_step(
    State(app_state): State<AppState>,
    Path(workflow_id): Path<Uuid>,
    Json(payload): Json<CreateWorkflowStep>,
) -> Response {
    match workflow_exists(&app_state, workflow_id).await {
        Ok(false) => return JsonResponse::not_found("Workflow not found").into_response(),
        Ok(true) => {}
        Err(e) => {
            eprintln!("DB error fetching workflow: {:?}", e);
            return JsonResponse::server_error("Failed to add step").into_response();
        }
    }

    match app_state.workflow_repo.insert_step(workflow_id, payload).await {
        Ok(step) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "step": step
            })),
        )
            .into_response(),
        Err(e) => {
            eprintln!("DB error adding step: {:?}", e);
            if is_unique_violation(&e) {
                JsonResponse::conflict("An active step with this step_order already exists")
                    .into_response()
            } else {
                JsonResponse::server_error("Failed to add step").into_response()
            }
        }
    }
}

pub async fn replace_steps(
    State(app_state): State<AppState>,
    Path(workflow_id): Path<Uuid>,
    Json(payload): Json<Vec<CreateWorkflowStep>>,
) -> Response {
    if let Some(order) = duplicate_active_order(&payload) {
        return JsonResponse::bad_request(&format!("Active steps share step_order {}", order))
            .into_response();
    }

    match workflow_exists(&app_state, workflow_id).await {
        Ok(false) => return JsonResponse::not_found("Workflow not found").into_response(),
        Ok(true) => {}
        Err(e) => {
            eprintln!("DB error fetching workflow: {:?}", e);
            return JsonResponse::server_error("Failed to replace steps").into_response();
        }
    }

    match app_state
        .workflow_repo
        .replace_steps(workflow_id, payload)
        .await
    {
        Ok(steps) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "steps": steps
            })),
        )
            .into_response(),
        Err(e) => {
            eprintln!("DB error replacing steps: {:?}", e);
            JsonResponse::server_error("Failed to replace steps").into_response()
        }
    }
}

pub async fn update_step(
    State(app_state): State<AppState>,
    Path((workflow_id, step_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateWorkflowStep>,
) -> Response {
    match app_state
        .workflow_repo
        .update_step(workflow_id, step_id, payload)
        .await
    {
        Ok(Some(step)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "step": step
            })),
        )
            .into_response(),
        Ok(None) => JsonResponse::not_found("Step not found").into_response(),
        Err(e) => {
            eprintln!("DB error updating step: {:?}", e);
            if is_unique_violation(&e) {
                JsonResponse::conflict("An active step with this step_order already exists")
                    .into_response()
            } else {
                JsonResponse::server_error("Failed to update step").into_response()
            }
        }
    }
}

pub async fn delete_step(
    State(app_state): State<AppState>,
    Path((workflow_id, step_id)): Path<(Uuid, Uuid)>,
) -> Response {
    match app_state.workflow_repo.delete_step(workflow_id, step_id).await {
        Ok(true) => JsonResponse::success("Step deleted").into_response(),
        Ok(false) => JsonResponse::not_found("Step not found").into_response(),
        Err(e) => {
            eprintln!("DB error deleting step: {:?}", e);
            JsonResponse::server_error("Failed to delete step").into_response()
        }
    }
}
