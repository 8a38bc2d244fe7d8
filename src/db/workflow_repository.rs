use async_trait::async_trait;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::workflow::{CreateWorkflow, UpdateWorkflow, Workflow};
use crate::models::workflow_action_log::WorkflowActionLog;
use crate::models::workflow_execution::WorkflowExecution;
use crate::models::workflow_schedule::{CreateWorkflowSchedule, WorkflowSchedule};
use crate::models::workflow_step::{CreateWorkflowStep, UpdateWorkflowStep, WorkflowStep};

/// Filters for the paged workflow listing. `limit`/`offset` bound the page;
/// the total count is computed independently of the window.
#[derive(Debug, Clone, Default)]
pub struct WorkflowListFilter {
    pub is_active: Option<bool>,
    pub workflow_type: Option<String>,
    pub created_by: Option<Uuid>,
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    // Workflow definitions
    /// One transaction: definition, steps, and (when present) the schedule
    /// with its caller-computed initial `next_run`.
    async fn create_workflow(
        &self,
        payload: CreateWorkflow,
        schedule_next_run: Option<OffsetDateTime>,
    ) -> Result<Workflow, sqlx::Error>;

    async fn find_workflow_by_id(
        &self,
        workflow_id: Uuid,
    ) -> Result<Option<Workflow>, sqlx::Error>;

    async fn list_workflows(
        &self,
        filter: WorkflowListFilter,
    ) -> Result<(Vec<Workflow>, i64), sqlx::Error>;

    async fn update_workflow(
        &self,
        workflow_id: Uuid,
        changes: UpdateWorkflow,
    ) -> Result<Option<Workflow>, sqlx::Error>;

    /// Deletes the definition and, through the store's cascade, its steps,
    /// schedule, executions, and action logs.
    async fn delete_workflow(&self, workflow_id: Uuid) -> Result<bool, sqlx::Error>;

    // Steps
    async fn list_steps(&self, workflow_id: Uuid) -> Result<Vec<WorkflowStep>, sqlx::Error>;

    /// Active steps only, ordered by ascending `step_order`. This is the
    /// exact sequence the engine walks.
    async fn list_active_steps(&self, workflow_id: Uuid)
        -> Result<Vec<WorkflowStep>, sqlx::Error>;

    async fn insert_step(
        &self,
        workflow_id: Uuid,
        step: CreateWorkflowStep,
    ) -> Result<WorkflowStep, sqlx::Error>;

    async fn update_step(
        &self,
        workflow_id: Uuid,
        step_id: Uuid,
        changes: UpdateWorkflowStep,
    ) -> Result<Option<WorkflowStep>, sqlx::Error>;

    async fn delete_step(&self, workflow_id: Uuid, step_id: Uuid) -> Result<bool, sqlx::Error>;

    /// Replaces the whole step list: delete-then-insert inside one
    /// transaction.
    async fn replace_steps(
        &self,
        workflow_id: Uuid,
        steps: Vec<CreateWorkflowStep>,
    ) -> Result<Vec<WorkflowStep>, sqlx::Error>;

    // Schedule (at most one per workflow)
    async fn get_schedule(
        &self,
        workflow_id: Uuid,
    ) -> Result<Option<WorkflowSchedule>, sqlx::Error>;

    async fn upsert_schedule(
        &self,
        workflow_id: Uuid,
        schedule: CreateWorkflowSchedule,
        next_run: Option<OffsetDateTime>,
    ) -> Result<WorkflowSchedule, sqlx::Error>;

    async fn delete_schedule(&self, workflow_id: Uuid) -> Result<bool, sqlx::Error>;

    async fn mark_schedule_run(
        &self,
        schedule_id: Uuid,
        last_run: OffsetDateTime,
        next_run: Option<OffsetDateTime>,
    ) -> Result<(), sqlx::Error>;

    // Poller
    async fn list_due_workflows(
        &self,
        now: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<Workflow>, sqlx::Error>;

    // Executions
    /// Creates a `running` execution. Returns `None` when the workflow
    /// already has one in flight (single-flight guard).
    async fn create_execution(
        &self,
        workflow_id: Uuid,
    ) -> Result<Option<WorkflowExecution>, sqlx::Error>;

    async fn set_execution_current_step(
        &self,
        execution_id: Uuid,
        step_order: i32,
    ) -> Result<(), sqlx::Error>;

    async fn complete_execution(
        &self,
        execution_id: Uuid,
        status: &str,
        error_message: Option<&str>,
    ) -> Result<(), sqlx::Error>;

    async fn get_execution(
        &self,
        workflow_id: Uuid,
        execution_id: Uuid,
    ) -> Result<Option<WorkflowExecution>, sqlx::Error>;

    async fn list_executions(
        &self,
        workflow_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<WorkflowExecution>, i64), sqlx::Error>;

    // Action logs (append-only; one running→terminal transition each)
    async fn insert_action_log(
        &self,
        execution_id: Uuid,
        step_id: Uuid,
        action_type: &str,
    ) -> Result<WorkflowActionLog, sqlx::Error>;

    async fn finish_action_log(
        &self,
        log_id: Uuid,
        status: &str,
        result_data: Option<Value>,
        error_message: Option<&str>,
    ) -> Result<(), sqlx::Error>;

    async fn list_action_logs(
        &self,
        execution_id: Uuid,
    ) -> Result<Vec<WorkflowActionLog>, sqlx::Error>;
}
