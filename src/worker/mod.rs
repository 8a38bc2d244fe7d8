use std::time::Duration;

use time::OffsetDateTime;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::engine::execute_workflow;
use crate::state::AppState;

const MAX_DUE_WORKFLOWS: i64 = 10;

/// Spawns the poller loop: every interval, run the workflows whose
/// schedule has elapsed.
pub async fn start_background_worker(state: AppState) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(state.config.poll_interval_seconds.max(1));
        loop {
            match process_due_workflows(&state).await {
                Ok(triggered) if triggered > 0 => {
                    debug!(triggered, "worker: poll cycle finished");
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(?err, "worker: error polling due workflows");
                }
            }
            sleep(interval).await;
        }
    });
}

/// One poll cycle. A failure in one workflow never blocks the rest of the
/// batch; each is logged and the loop moves on.
pub async fn process_due_workflows(state: &AppState) -> Result<usize, sqlx::Error> {
    let now = OffsetDateTime::now_utc();
    let due = state
        .workflow_repo
        .list_due_workflows(now, MAX_DUE_WORKFLOWS)
        .await?;

    let mut triggered = 0usize;
    for workflow in due {
        match execute_workflow(state, workflow.id).await {
            Ok(execution) => {
                triggered += 1;
                debug!(
                    workflow_id = %workflow.id,
                    execution_id = %execution.id,
                    status = %execution.status,
                    "worker: due workflow executed"
                );
            }
            Err(err) => {
                warn!(
                    workflow_id = %workflow.id,
                    ?err,
                    "worker: failed to execute due workflow"
                );
            }
        }
    }

    Ok(triggered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::mock_db::InMemoryWorkflowRepository;
    use crate::db::workflow_repository::WorkflowRepository;
    use crate::engine::registry::StepHandlerRegistry;
    use crate::models::workflow::Workflow;
    use crate::models::workflow_execution::EXECUTION_STATUS_COMPLETED;
    use crate::models::workflow_schedule::WorkflowSchedule;
    use crate::models::workflow_step::WorkflowStep;
    use serde_json::json;
    use std::sync::Arc;
    use time::Duration as TimeDuration;
    use uuid::Uuid;

    fn test_state(repo: Arc<InMemoryWorkflowRepository>) -> AppState {
        AppState {
            workflow_repo: repo,
            registry: Arc::new(StepHandlerRegistry::standard(
                Arc::new(crate::services::smtp_mailer::MockMailer::default()),
                Arc::new(crate::services::recipients::MockRecipientResolver::default()),
                Arc::new(crate::services::conditions::MockConditionEvaluator::default()),
            )),
            config: Arc::new(Config {
                database_url: String::new(),
                frontend_origin: "http://localhost:5173".to_string(),
                port: 0,
                step_timeout_seconds: 5,
                poll_interval_seconds: 30,
            }),
        }
    }

    fn seeded_workflow(repo: &InMemoryWorkflowRepository, active: bool) -> Workflow {
        let workflow = Workflow {
            id: Uuid::new_v4(),
            name: "weekly digest".to_string(),
            description: None,
            workflow_type: None,
            is_active: active,
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

    fn seed_schedule(
        repo: &InMemoryWorkflowRepository,
        workflow_id: Uuid,
        next_run: Option<OffsetDateTime>,
    ) {
        repo.seed_schedule(WorkflowSchedule {
            id: Uuid::new_v4(),
            workflow_id,
            schedule_type: "daily".to_string(),
            schedule_config: json!({"time": "09:00"}),
            last_run: None,
            next_run,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        });
    }

    #[tokio::test]
    async fn elapsed_schedules_are_triggered() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let workflow = seeded_workflow(&repo, true);
        seed_schedule(
            &repo,
            workflow.id,
            Some(OffsetDateTime::now_utc() - TimeDuration::minutes(5)),
        );

        let state = test_state(repo.clone());
        let triggered = process_due_workflows(&state).await.unwrap();

        assert_eq!(triggered, 1);
        let executions = repo.executions_snapshot();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].status, EXECUTION_STATUS_COMPLETED);
        // Completion recomputed next_run past now.
        let schedule = &repo.schedules_snapshot()[0];
        assert!(schedule.next_run.unwrap() > OffsetDateTime::now_utc());
    }

    #[tokio::test]
    async fn deactivated_workflows_are_never_due() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let workflow = seeded_workflow(&repo, false);
        seed_schedule(
            &repo,
            workflow.id,
            Some(OffsetDateTime::now_utc() - TimeDuration::minutes(5)),
        );

        let state = test_state(repo.clone());
        let triggered = process_due_workflows(&state).await.unwrap();

        assert_eq!(triggered, 0);
        assert!(repo.executions_snapshot().is_empty());
    }

    #[tokio::test]
    async fn workflows_without_next_run_are_never_due() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let scheduled_never = seeded_workflow(&repo, true);
        seed_schedule(&repo, scheduled_never.id, None);
        // A workflow with no schedule row at all is equally invisible.
        seeded_workflow(&repo, true);

        let state = test_state(repo.clone());
        let triggered = process_due_workflows(&state).await.unwrap();

        assert_eq!(triggered, 0);
        assert!(repo.executions_snapshot().is_empty());
    }

    #[tokio::test]
    async fn one_failing_workflow_does_not_block_the_batch() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let stuck = seeded_workflow(&repo, true);
        seed_schedule(
            &repo,
            stuck.id,
            Some(OffsetDateTime::now_utc() - TimeDuration::minutes(10)),
        );
        let healthy = seeded_workflow(&repo, true);
        seed_schedule(
            &repo,
            healthy.id,
            Some(OffsetDateTime::now_utc() - TimeDuration::minutes(5)),
        );

        // A leftover running execution makes the first workflow error out.
        repo.create_execution(stuck.id).await.unwrap().unwrap();

        let state = test_state(repo.clone());
        let triggered = process_due_workflows(&state).await.unwrap();

        assert_eq!(triggered, 1);
        let healthy_runs: Vec<_> = repo
            .executions_snapshot()
            .into_iter()
            .filter(|e| e.workflow_id == healthy.id)
            .collect();
        assert_eq!(healthy_runs.len(), 1);
        assert_eq!(healthy_runs[0].status, EXECUTION_STATUS_COMPLETED);
    }
}
