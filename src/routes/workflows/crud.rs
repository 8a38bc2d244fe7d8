use super::prelude::*;
use crate::db::workflow_repository::WorkflowListFilter;

pub async fn create_workflow(
    State(app_state): State<AppState>,
    Json(payload): Json<CreateWorkflow>,
) -> Response {
    if payload.name.trim().is_empty() {
        return JsonResponse::bad_request("Workflow name is required").into_response();
    }
    if let Some(order) = duplicate_active_order(&payload.steps) {
        return JsonResponse::bad_request(&format!(
            "Active steps share step_order {}",
            order
        ))
        .into_response();
    }
    if let Some(schedule) = &payload.schedule {
        if !super::helpers::is_known_schedule_type(&schedule.schedule_type) {
            return JsonResponse::bad_request(&format!(
                "Unknown schedule type `{}`",
                schedule.schedule_type
            ))
            .into_response();
        }
    }

    let schedule_next_run = payload
        .schedule
        .as_ref()
        .and_then(|s| next_run(&s.schedule_type, &s.schedule_config, Utc::now()))
        .and_then(utc_to_offset);

    match app_state
        .workflow_repo
        .create_workflow(payload, schedule_next_run)
        .await
    {
        Ok(workflow) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "workflow": workflow
            })),
        )
            .into_response(),
        Err(e) => {
            eprintln!("DB error creating workflow: {:?}", e);
            if is_unique_violation(&e) {
                JsonResponse::conflict("A step with this step_order already exists")
                    .into_response()
            } else {
                JsonResponse::server_error("Failed to create workflow").into_response()
            }
        }
    }
}

#[derive(Deserialize)]
pub struct ListWorkflowsQuery {
    pub is_active: Option<bool>,
    #[serde(rename = "type")]
    pub workflow_type: Option<String>,
    pub created_by: Option<Uuid>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

pub async fn list_workflows(
    State(app_state): State<AppState>,
    Query(query): Query<ListWorkflowsQuery>,
) -> Response {
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(20).clamp(1, 100);

    let filter = WorkflowListFilter {
        is_active: query.is_active,
        workflow_type: query.workflow_type,
        created_by: query.created_by,
        search: query.search,
        limit: page_size,
        offset: (page - 1) * page_size,
    };

    match app_state.workflow_repo.list_workflows(filter).await {
        Ok((workflows, total)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "workflows": workflows,
                "total": total,
                "page": page,
                "page_size": page_size,
            })),
        )
            .into_response(),
        Err(e) => {
            eprintln!("DB error listing workflows: {:?}", e);
            JsonResponse::server_error("Failed to fetch workflows").into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct GetWorkflowQuery {
    #[serde(default)]
    pub include_steps: bool,
    #[serde(default)]
    pub include_schedule: bool,
    #[serde(default)]
    pub include_executions: bool,
}

pub async fn get_workflow(
    State(app_state): State<AppState>,
    Path(workflow_id): Path<Uuid>,
    Query(query): Query<GetWorkflowQuery>,
) -> Response {
    let workflow = match app_state.workflow_repo.find_workflow_by_id(workflow_id).await {
        Ok(Some(workflow)) => workflow,
        Ok(None) => return JsonResponse::not_found("Workflow not found").into_response(),
        Err(e) => {
            eprintln!("DB error fetching workflow: {:?}", e);
            return JsonResponse::server_error("Failed to fetch workflow").into_response();
        }
    };

    let mut payload = json!({
        "success": true,
        "workflow": workflow,
    });

    if query.include_steps {
        match app_state.workflow_repo.list_steps(workflow_id).await {
            Ok(steps) => payload["steps"] = json!(steps),
            Err(e) => {
                eprintln!("DB error fetching workflow steps: {:?}", e);
                return JsonResponse::server_error("Failed to fetch workflow").into_response();
            }
        }
    }

    if query.include_schedule {
        match app_state.workflow_repo.get_schedule(workflow_id).await {
            Ok(schedule) => payload["schedule"] = json!(schedule),
            Err(e) => {
                eprintln!("DB error fetching workflow schedule: {:?}", e);
                return JsonResponse::server_error("Failed to fetch workflow").into_response();
            }
        }
    }

    if query.include_executions {
        match app_state.workflow_repo.list_executions(workflow_id, 20, 0).await {
            Ok((executions, total)) => {
                payload["executions"] = json!(executions);
                payload["executions_total"] = json!(total);
            }
            Err(e) => {
                eprintln!("DB error fetching workflow executions: {:?}", e);
                return JsonResponse::server_error("Failed to fetch workflow").into_response();
            }
        }
    }

    (StatusCode::OK, Json(payload)).into_response()
}

pub async fn update_workflow(
    State(app_state): State<AppState>,
    Path(workflow_id): Path<Uuid>,
    Json(payload): Json<UpdateWorkflow>,
) -> Response {
    if payload.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return JsonResponse::bad_request("Workflow name cannot be empty").into_response();
    }

    match app_state
        .workflow_repo
        .update_workflow(workflow_id, payload)
        .await
    {
        Ok(Some(workflow)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "workflow": workflow
            })),
        )
            .into_response(),
        Ok(None) => JsonResponse::not_found("Workflow not found").into_response(),
        Err(e) => {
            eprintln!("DB error updating workflow: {:?}", e);
            JsonResponse::server_error("Failed to update workflow").into_response()
        }
    }
}

pub async fn delete_workflow(
    State(app_state): State<AppState>,
    Path(workflow_id): Path<Uuid>,
) -> Response {
    match app_state.workflow_repo.delete_workflow(workflow_id).await {
        Ok(true) => JsonResponse::success("Workflow deleted").into_response(),
        Ok(false) => JsonResponse::not_found("Workflow not found").into_response(),
        Err(e) => {
            eprintln!("DB error deleting workflow: {:?}", e);
            JsonResponse::server_error("Failed to delete workflow").into_response()
        }
    }
}
