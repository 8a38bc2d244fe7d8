use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::workflow_repository::WorkflowRepository;
use crate::models::workflow_action_log::{ACTION_STATUS_FAILED, ACTION_STATUS_SUCCESS};
use crate::models::workflow_execution::{
    WorkflowExecution, EXECUTION_STATUS_COMPLETED, EXECUTION_STATUS_FAILED,
};
use crate::state::AppState;
use crate::utils::schedule::{next_run, utc_to_offset};

pub const NO_ACTIVE_STEPS_ERROR: &str = "workflow has no active steps";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("workflow {0} not found")]
    WorkflowNotFound(Uuid),
    #[error("workflow {0} is inactive")]
    WorkflowInactive(Uuid),
    #[error("workflow {0} already has an execution in flight")]
    AlreadyRunning(Uuid),
    #[error("engine persistence failure: {0}")]
    Db(#[from] sqlx::Error),
}

/// Runs one workflow to a terminal status.
///
/// Walks the currently-active steps in ascending `step_order`, appending a
/// running action log before each handler call and settling it to
/// success/failed after. The first failure aborts the remaining steps and
/// fails the run; the failure is written before anything else happens.
/// Whatever the outcome, the owning schedule (if any) is recomputed last.
pub async fn execute_workflow(
    state: &AppState,
    workflow_id: Uuid,
) -> Result<WorkflowExecution, EngineError> {
    let repo = state.workflow_repo.as_ref();

    let workflow = repo
        .find_workflow_by_id(workflow_id)
        .await?
        .ok_or(EngineError::WorkflowNotFound(workflow_id))?;
    if !workflow.is_active {
        return Err(EngineError::WorkflowInactive(workflow_id));
    }

    let execution = repo
        .create_execution(workflow_id)
        .await?
        .ok_or(EngineError::AlreadyRunning(workflow_id))?;

    let steps = repo.list_active_steps(workflow_id).await?;
    if steps.is_empty() {
        // A run with nothing to do is an observable failure, not a no-op.
        repo.complete_execution(execution.id, EXECUTION_STATUS_FAILED, Some(NO_ACTIVE_STEPS_ERROR))
            .await?;
        finalize_schedule(repo, workflow_id, execution.started_at, Utc::now()).await?;
        return refreshed(repo, workflow_id, execution).await;
    }

    let step_timeout = Duration::from_secs(state.config.step_timeout_seconds);
    let mut failure: Option<String> = None;

    for step in &steps {
        repo.set_execution_current_step(execution.id, step.step_order)
            .await?;
        let log = repo
            .insert_action_log(execution.id, step.id, &step.step_type)
            .await?;

        debug!(
            workflow_id = %workflow_id,
            execution_id = %execution.id,
            step_order = step.step_order,
            step_type = %step.step_type,
            "Executing workflow step"
        );

        let outcome = match timeout(step_timeout, state.registry.execute(step)).await {
            Ok(result) => result,
            Err(_) => Err(crate::engine::registry::StepError::Action(format!(
                "step `{}` timed out after {}s",
                step.step_type,
                step_timeout.as_secs()
            ))),
        };

        match outcome {
            Ok(result_data) => {
                repo.finish_action_log(log.id, ACTION_STATUS_SUCCESS, Some(result_data), None)
                    .await?;
            }
            Err(err) => {
                let message = err.to_string();
                warn!(
                    workflow_id = %workflow_id,
                    execution_id = %execution.id,
                    step_order = step.step_order,
                    step_type = %step.step_type,
                    error = %message,
                    "Workflow step failed; aborting run"
                );
                repo.finish_action_log(log.id, ACTION_STATUS_FAILED, None, Some(message.as_str()))
                    .await?;
                failure = Some(message);
                break;
            }
        }
    }

    match &failure {
        Some(message) => {
            repo.complete_execution(execution.id, EXECUTION_STATUS_FAILED, Some(message.as_str()))
                .await?;
        }
        None => {
            repo.complete_execution(execution.id, EXECUTION_STATUS_COMPLETED, None)
                .await?;
        }
    }

    finalize_schedule(repo, workflow_id, execution.started_at, Utc::now()).await?;
    refreshed(repo, workflow_id, execution).await
}

async fn refreshed(
    repo: &dyn WorkflowRepository,
    workflow_id: Uuid,
    fallback: WorkflowExecution,
) -> Result<WorkflowExecution, EngineError> {
    Ok(repo
        .get_execution(workflow_id, fallback.id)
        .await?
        .unwrap_or(fallback))
}

/// Post-run schedule hook: stamps `last_run` with the execution start and
/// recomputes `next_run` from `now`, success or failure alike. No-op when
/// the workflow has no schedule. Returns the persisted `next_run`.
pub async fn finalize_schedule(
    repo: &dyn WorkflowRepository,
    workflow_id: Uuid,
    started_at: OffsetDateTime,
    now: DateTime<Utc>,
) -> Result<Option<OffsetDateTime>, sqlx::Error> {
    let Some(schedule) = repo.get_schedule(workflow_id).await? else {
        return Ok(None);
    };
    let next = next_run(&schedule.schedule_type, &schedule.schedule_config, now)
        .and_then(utc_to_offset);
    repo.mark_schedule_run(schedule.id, started_at, next).await?;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::mock_db::InMemoryWorkflowRepository;
    use crate::engine::registry::{StepError, StepHandler, StepHandlerRegistry};
    use crate::models::workflow::Workflow;
    use crate::models::workflow_action_log::{ACTION_STATUS_FAILED, ACTION_STATUS_SUCCESS};
    use crate::models::workflow_schedule::WorkflowSchedule;
    use crate::models::workflow_step::{
        WorkflowStep, STEP_TYPE_CHECK_CONDITION, STEP_TYPE_SEND_EMAIL,
    };
    use crate::services::conditions::MockConditionEvaluator;
    use crate::services::recipients::{MockRecipientResolver, Recipient};
    use crate::services::smtp_mailer::MockMailer;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn test_config() -> Arc<Config> {
        Arc::new(Config {
            database_url: String::new(),
            frontend_origin: "http://localhost:5173".to_string(),
            port: 0,
            step_timeout_seconds: 5,
            poll_interval_seconds: 30,
        })
    }

    fn state_with(
        repo: Arc<InMemoryWorkflowRepository>,
        registry: StepHandlerRegistry,
    ) -> AppState {
        AppState {
            workflow_repo: repo,
            registry: Arc::new(registry),
            config: test_config(),
        }
    }

    fn standard_registry(mailer: Arc<MockMailer>) -> StepHandlerRegistry {
        StepHandlerRegistry::standard(
            mailer,
            Arc::new(MockRecipientResolver::with_recipients(vec![Recipient {
                email: "ana@example.com".to_string(),
                name: "Ana".to_string(),
                identifier: None,
            }])),
            Arc::new(MockConditionEvaluator::returning(false, json!({}))),
        )
    }

    fn workflow(active: bool) -> Workflow {
        Workflow {
            id: Uuid::new_v4(),
            name: "lapsed customers".to_string(),
            description: None,
            workflow_type: Some("retention".to_string()),
            is_active: active,
            created_by: None,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    fn step(workflow_id: Uuid, order: i32, step_type: &str, active: bool) -> WorkflowStep {
        let (action_config, condition_config) = match step_type {
            STEP_TYPE_SEND_EMAIL => (
                json!({
                    "recipients": "all_active_customers",
                    "subject": "We miss you",
                    "body": "Come back",
                }),
                json!({}),
            ),
            STEP_TYPE_CHECK_CONDITION => (json!({}), json!({"check": "orders_missing"})),
            _ => (json!({}), json!({})),
        };
        WorkflowStep {
            id: Uuid::new_v4(),
            workflow_id,
            step_order: order,
            step_type: step_type.to_string(),
            trigger_config: json!({}),
            action_config,
            condition_config,
            is_active: active,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    fn daily_schedule(workflow_id: Uuid) -> WorkflowSchedule {
        WorkflowSchedule {
            id: Uuid::new_v4(),
            workflow_id,
            schedule_type: "daily".to_string(),
            schedule_config: json!({"time": "09:00"}),
            last_run: None,
            next_run: Some(OffsetDateTime::now_utc()),
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn successful_run_logs_every_step_and_completes() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let wf = workflow(true);
        repo.seed_workflow(wf.clone());
        repo.seed_step(step(wf.id, 1, STEP_TYPE_SEND_EMAIL, true));
        repo.seed_step(step(wf.id, 2, STEP_TYPE_CHECK_CONDITION, true));
        repo.seed_schedule(daily_schedule(wf.id));

        let state = state_with(repo.clone(), standard_registry(Arc::new(MockMailer::default())));
        let execution = execute_workflow(&state, wf.id).await.unwrap();

        assert_eq!(execution.status, EXECUTION_STATUS_COMPLETED);
        assert_eq!(execution.current_step, Some(2));
        assert!(execution.completed_at.is_some());
        assert!(execution.error_message.is_none());

        let logs = repo.logs_snapshot();
        assert_eq!(logs.len(), 2);
        assert!(logs.iter().all(|l| l.status == ACTION_STATUS_SUCCESS));
        assert_eq!(logs[0].action_type, STEP_TYPE_SEND_EMAIL);
        assert_eq!(logs[1].action_type, STEP_TYPE_CHECK_CONDITION);
        assert_eq!(logs[0].result_data.as_ref().unwrap()["sent_count"], 1);

        let schedule = &repo.schedules_snapshot()[0];
        assert_eq!(schedule.last_run, Some(execution.started_at));
        assert!(schedule.next_run.unwrap() > schedule.last_run.unwrap());
    }

    #[tokio::test]
    async fn failing_step_aborts_the_rest_and_fails_the_run() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let wf = workflow(true);
        repo.seed_workflow(wf.clone());
        repo.seed_step(step(wf.id, 1, STEP_TYPE_SEND_EMAIL, true));
        repo.seed_step(step(wf.id, 2, STEP_TYPE_CHECK_CONDITION, true));
        repo.seed_schedule(daily_schedule(wf.id));

        let state = state_with(repo.clone(), standard_registry(Arc::new(MockMailer::failing())));
        let execution = execute_workflow(&state, wf.id).await.unwrap();

        assert_eq!(execution.status, EXECUTION_STATUS_FAILED);
        let error = execution.error_message.unwrap();
        assert!(error.contains("mock transport failure"));

        // Fail-fast: exactly one log, the second step never attempted.
        let logs = repo.logs_snapshot();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, ACTION_STATUS_FAILED);
        assert!(logs[0].error_message.as_deref().unwrap().contains("mock transport failure"));

        // next_run is recomputed on failure too.
        let schedule = &repo.schedules_snapshot()[0];
        assert_eq!(schedule.last_run, Some(execution.started_at));
        assert!(schedule.next_run.is_some());
    }

    #[tokio::test]
    async fn zero_active_steps_is_an_explicit_failure() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let wf = workflow(true);
        repo.seed_workflow(wf.clone());

        let state = state_with(repo.clone(), standard_registry(Arc::new(MockMailer::default())));
        let execution = execute_workflow(&state, wf.id).await.unwrap();

        assert_eq!(execution.status, EXECUTION_STATUS_FAILED);
        assert_eq!(execution.error_message.as_deref(), Some(NO_ACTIVE_STEPS_ERROR));
        assert!(repo.logs_snapshot().is_empty());
    }

    #[tokio::test]
    async fn inactive_workflow_is_rejected_without_an_execution() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let wf = workflow(false);
        repo.seed_workflow(wf.clone());
        repo.seed_step(step(wf.id, 1, STEP_TYPE_SEND_EMAIL, true));

        let state = state_with(repo.clone(), standard_registry(Arc::new(MockMailer::default())));
        let err = execute_workflow(&state, wf.id).await.unwrap_err();

        assert!(matches!(err, EngineError::WorkflowInactive(id) if id == wf.id));
        assert!(repo.executions_snapshot().is_empty());
    }

    #[tokio::test]
    async fn missing_workflow_is_not_found() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let state = state_with(repo, standard_registry(Arc::new(MockMailer::default())));

        let missing = Uuid::new_v4();
        let err = execute_workflow(&state, missing).await.unwrap_err();
        assert!(matches!(err, EngineError::WorkflowNotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn unknown_step_type_fails_the_run() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let wf = workflow(true);
        repo.seed_workflow(wf.clone());
        repo.seed_step(step(wf.id, 1, "teleport_pallets", true));

        let state = state_with(repo.clone(), standard_registry(Arc::new(MockMailer::default())));
        let execution = execute_workflow(&state, wf.id).await.unwrap();

        assert_eq!(execution.status, EXECUTION_STATUS_FAILED);
        assert!(execution
            .error_message
            .unwrap()
            .contains("unknown step type"));
        assert_eq!(repo.logs_snapshot().len(), 1);
    }

    #[tokio::test]
    async fn steps_run_in_ascending_order_whatever_the_insertion_order() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let wf = workflow(true);
        repo.seed_workflow(wf.clone());
        let s3 = step(wf.id, 30, "create_order", true);
        let s1 = step(wf.id, 10, "create_order", true);
        let s2 = step(wf.id, 20, "create_order", true);
        repo.seed_step(s3.clone());
        repo.seed_step(s1.clone());
        repo.seed_step(s2.clone());

        let state = state_with(repo.clone(), standard_registry(Arc::new(MockMailer::default())));
        let execution = execute_workflow(&state, wf.id).await.unwrap();

        assert_eq!(execution.status, EXECUTION_STATUS_COMPLETED);
        let logged_step_ids: Vec<Uuid> = repo.logs_snapshot().iter().map(|l| l.step_id).collect();
        assert_eq!(logged_step_ids, vec![s1.id, s2.id, s3.id]);
    }

    #[tokio::test]
    async fn deactivated_steps_are_skipped() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let wf = workflow(true);
        repo.seed_workflow(wf.clone());
        let s1 = step(wf.id, 1, "create_order", true);
        let s2 = step(wf.id, 2, "create_order", false);
        let s3 = step(wf.id, 3, "create_order", true);
        repo.seed_step(s1.clone());
        repo.seed_step(s2);
        repo.seed_step(s3.clone());

        let state = state_with(repo.clone(), standard_registry(Arc::new(MockMailer::default())));
        execute_workflow(&state, wf.id).await.unwrap();

        let logged_step_ids: Vec<Uuid> = repo.logs_snapshot().iter().map(|l| l.step_id).collect();
        assert_eq!(logged_step_ids, vec![s1.id, s3.id]);
    }

    #[tokio::test]
    async fn one_execution_in_flight_per_workflow() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let wf = workflow(true);
        repo.seed_workflow(wf.clone());
        repo.seed_step(step(wf.id, 1, "create_order", true));

        // Simulate a run that is still in flight.
        repo.create_execution(wf.id).await.unwrap().unwrap();

        let state = state_with(repo.clone(), standard_registry(Arc::new(MockMailer::default())));
        let err = execute_workflow(&state, wf.id).await.unwrap_err();
        assert!(matches!(err, EngineError::AlreadyRunning(id) if id == wf.id));
    }

    struct SlowHandler;

    #[async_trait]
    impl StepHandler for SlowHandler {
        fn step_type(&self) -> &'static str {
            "slow"
        }

        async fn execute(&self, _step: &WorkflowStep) -> Result<Value, StepError> {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            Ok(json!({}))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_handler_times_out_and_fails_the_run() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let wf = workflow(true);
        repo.seed_workflow(wf.clone());
        repo.seed_step(step(wf.id, 1, "slow", true));

        let registry = StepHandlerRegistry::new().register(Arc::new(SlowHandler));
        let state = state_with(repo.clone(), registry);
        let execution = execute_workflow(&state, wf.id).await.unwrap();

        assert_eq!(execution.status, EXECUTION_STATUS_FAILED);
        assert!(execution.error_message.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn finalize_schedule_is_a_noop_without_a_schedule() {
        let repo = InMemoryWorkflowRepository::default();
        let next = finalize_schedule(&repo, Uuid::new_v4(), OffsetDateTime::now_utc(), Utc::now())
            .await
            .unwrap();
        assert_eq!(next, None);
    }

    #[tokio::test]
    async fn finalize_schedule_advances_next_run() {
        let repo = InMemoryWorkflowRepository::default();
        let wf = workflow(true);
        repo.seed_workflow(wf.clone());
        repo.seed_schedule(daily_schedule(wf.id));

        let started_at = OffsetDateTime::now_utc();
        let next = finalize_schedule(&repo, wf.id, started_at, Utc::now())
            .await
            .unwrap();

        let schedule = &repo.schedules_snapshot()[0];
        assert_eq!(schedule.next_run, next);
        assert_eq!(schedule.last_run, Some(started_at));
        assert!(next.unwrap() > started_at);
    }
}
