use super::prelude::*;
use crate::engine::{execute_workflow, EngineError};

/// Force-runs a workflow right now, independent of its schedule. The
/// execution record is returned whatever its terminal status; engine-level
/// rejections map to HTTP errors.
pub async fn start_workflow_execution(
    State(app_state): State<AppState>,
    Path(workflow_id): Path<Uuid>,
) -> Response {
    match execute_workflow(&app_state, workflow_id).await {
        Ok(execution) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "execution": execution
            })),
        )
            .into_response(),
        Err(EngineError::WorkflowNotFound(_)) => {
            JsonResponse::not_found("Workflow not found").into_response()
        }
        Err(EngineError::WorkflowInactive(_)) => {
            JsonResponse::conflict("Cannot execute an inactive workflow").into_response()
        }
        Err(EngineError::AlreadyRunning(_)) => {
            JsonResponse::conflict("Workflow already has an execution in flight").into_response()
        }
        Err(EngineError::Db(e)) => {
            eprintln!("DB error executing workflow: {:?}", e);
            JsonResponse::server_error("Failed to execute workflow").into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct ListExecutionsQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

pub async fn list_executions(
    State(app_state): State<AppState>,
    Path(workflow_id): Path<Uuid>,
    Query(query): Query<ListExecutionsQuery>,
) -> Response {
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(20).clamp(1, 100);

    match app_state
        .workflow_repo
        .list_executions(workflow_id, page_size, (page - 1) * page_size)
        .await
    {
        Ok((executions, total)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "executions": executions,
                "total": total,
                "page": page,
                "page_size": page_size,
            })),
        )
            .into_response(),
        Err(e) => {
            eprintln!("DB error listing executions: {:?}", e);
            JsonResponse::server_error("Failed to fetch executions").into_response()
        }
    }
}

pub async fn get_execution(
    State(app_state): State<AppState>,
    Path((workflow_id, execution_id)): Path<(Uuid, Uuid)>,
) -> Response {
    let execution = match app_state
        .workflow_repo
        .get_execution(workflow_id, execution_id)
        .await
    {
        Ok(Some(execution)) => execution,
        Ok(None) => return JsonResponse::not_found("Execution not found").into_response(),
        Err(e) => {
            eprintln!("DB error fetching execution: {:?}", e);
            return JsonResponse::server_error("Failed to fetch execution").into_response();
        }
    };

    match app_state.workflow_repo.list_action_logs(execution_id).await {
        Ok(logs) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "execution": execution,
                "action_logs": logs,
            })),
        )
            .into_response(),
        Err(e) => {
            eprintln!("DB error fetching action logs: {:?}", e);
            JsonResponse::server_error("Failed to fetch execution").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::mock_db::InMemoryWorkflowRepository;
    use crate::engine::registry::StepHandlerRegistry;
    use crate::models::workflow::Workflow;
    use crate::models::workflow_step::WorkflowStep;
    use crate::services::conditions::MockConditionEvaluator;
    use crate::services::recipients::MockRecipientResolver;
    use crate::services::smtp_mailer::MockMailer;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::{get, post};
    use axum::Router;
    use serde_json::Value;
    use std::sync::Arc;
    use time::OffsetDateTime;
    use tower::ServiceExt;

    fn test_app(repo: Arc<InMemoryWorkflowRepository>) -> Router {
        let state = AppState {
            workflow_repo: repo,
            registry: Arc::new(StepHandlerRegistry::standard(
                Arc::new(MockMailer::default()),
                Arc::new(MockRecipientResolver::default()),
                Arc::new(MockConditionEvaluator::default()),
            )),
            config: Arc::new(Config {
                database_url: String::new(),
                frontend_origin: "http://localhost:5173".to_string(),
                port: 0,
                step_timeout_seconds: 5,
                poll_interval_seconds: 30,
            }),
        };
        Router::new()
            .route(
                "/api/workflows/{workflow_id}/execute",
                post(start_workflow_execution),
            )
            .route(
                "/api/workflows/{workflow_id}/executions/{execution_id}",
                get(get_execution),
            )
            .with_state(state)
    }

    fn seeded_workflow(repo: &InMemoryWorkflowRepository) -> Workflow {
        let workflow = Workflow {
            id: Uuid::new_v4(),
            name: "order reminder".to_string(),
            description: None,
            workflow_type: None,
            is_active: true,
            created_by: None,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        };
        repo.seed_workflow(workflow.clone());
        repo.seed_step(WorkflowStep {
            id: Uuid::new_v4(),
            workflow_id: workflow.id,
            step_order: 1,
            step_type: "create_order".to_string(),
            trigger_config: json!({}),
            action_config: json!({}),
            condition_config: json!({}),
            is_active: true,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        });
        workflow
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn force_execute_returns_the_terminal_execution() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let workflow = seeded_workflow(&repo);
        let app = test_app(repo.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/workflows/{}/execute", workflow.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["execution"]["status"], "completed");
    }

    #[tokio::test]
    async fn force_execute_unknown_workflow_is_404() {
        let app = test_app(Arc::new(InMemoryWorkflowRepository::default()));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/workflows/{}/execute", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn execution_detail_includes_action_logs() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let workflow = seeded_workflow(&repo);
        let app = test_app(repo.clone());

        let created = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/workflows/{}/execute", workflow.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let created_body = body_json(created).await;
        let execution_id = created_body["execution"]["id"].as_str().unwrap().to_string();

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!(
                        "/api/workflows/{}/executions/{}",
                        workflow.id, execution_id
                    ))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["action_logs"].as_array().unwrap().len(), 1);
        assert_eq!(body["action_logs"][0]["status"], "success");
    }
}
