use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::workflow_repository::{WorkflowListFilter, WorkflowRepository};
use crate::models::workflow::{CreateWorkflow, UpdateWorkflow, Workflow};
use crate::models::workflow_action_log::{WorkflowActionLog, ACTION_STATUS_RUNNING};
use crate::models::workflow_execution::{WorkflowExecution, EXECUTION_STATUS_RUNNING};
use crate::models::workflow_schedule::{CreateWorkflowSchedule, WorkflowSchedule};
use crate::models::workflow_step::{CreateWorkflowStep, UpdateWorkflowStep, WorkflowStep};

fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

#[derive(Default)]
struct Inner {
    workflows: Vec<Workflow>,
    steps: Vec<WorkflowStep>,
    schedules: Vec<WorkflowSchedule>,
    executions: Vec<WorkflowExecution>,
    logs: Vec<WorkflowActionLog>,
}

/// In-memory stand-in for the Postgres store. Backs engine, worker, and
/// route tests without a database.
#[derive(Default)]
pub struct InMemoryWorkflowRepository {
    inner: Mutex<Inner>,
    pub should_fail: bool,
}

#[allow(dead_code)]
impl InMemoryWorkflowRepository {
    pub fn failing() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            should_fail: true,
        }
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, Inner>, sqlx::Error> {
        if self.should_fail {
            return Err(sqlx::Error::Protocol("mock store failure".into()));
        }
        Ok(self.inner.lock().unwrap())
    }

    /// Seeds a workflow directly, bypassing the create payload.
    pub fn seed_workflow(&self, workflow: Workflow) {
        self.inner.lock().unwrap().workflows.push(workflow);
    }

    pub fn seed_step(&self, step: WorkflowStep) {
        self.inner.lock().unwrap().steps.push(step);
    }

    pub fn seed_schedule(&self, schedule: WorkflowSchedule) {
        self.inner.lock().unwrap().schedules.push(schedule);
    }

    pub fn executions_snapshot(&self) -> Vec<WorkflowExecution> {
        self.inner.lock().unwrap().executions.clone()
    }

    pub fn logs_snapshot(&self) -> Vec<WorkflowActionLog> {
        self.inner.lock().unwrap().logs.clone()
    }

    pub fn schedules_snapshot(&self) -> Vec<WorkflowSchedule> {
        self.inner.lock().unwrap().schedules.clone()
    }
}

fn build_step(workflow_id: Uuid, step: &CreateWorkflowStep) -> WorkflowStep {
    WorkflowStep {
        id: Uuid::new_v4(),
        workflow_id,
        step_order: step.step_order,
        step_type: step.step_type.clone(),
        trigger_config: step.trigger_config.clone(),
        action_config: step.action_config.clone(),
        condition_config: step.condition_config.clone(),
        is_active: step.is_active,
        created_at: now(),
        updated_at: now(),
    }
}

#[async_trait]
impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn create_workflow(
        &self,
        payload: CreateWorkflow,
        schedule_next_run: Option<OffsetDateTime>,
    ) -> Result<Workflow, sqlx::Error> {
        let mut inner = self.guard()?;
        let workflow = Workflow {
            id: Uuid::new_v4(),
            name: payload.name,
            description: payload.description,
            workflow_type: payload.workflow_type,
            is_active: payload.is_active,
            created_by: payload.created_by,
            created_at: now(),
            updated_at: now(),
        };
        for step in &payload.steps {
            inner.steps.push(build_step(workflow.id, step));
        }
        if let Some(schedule) = &payload.schedule {
            inner.schedules.push(WorkflowSchedule {
                id: Uuid::new_v4(),
                workflow_id: workflow.id,
                schedule_type: schedule.schedule_type.clone(),
                schedule_config: schedule.schedule_config.clone(),
                last_run: None,
                next_run: schedule_next_run,
                created_at: now(),
                updated_at: now(),
            });
        }
        inner.workflows.push(workflow.clone());
        Ok(workflow)
    }

    async fn find_workflow_by_id(
        &self,
        workflow_id: Uuid,
    ) -> Result<Option<Workflow>, sqlx::Error> {
        let inner = self.guard()?;
        Ok(inner.workflows.iter().find(|w| w.id == workflow_id).cloned())
    }

    async fn list_workflows(
        &self,
        filter: WorkflowListFilter,
    ) -> Result<(Vec<Workflow>, i64), sqlx::Error> {
        let inner = self.guard()?;
        let mut matches: Vec<Workflow> = inner
            .workflows
            .iter()
            .filter(|w| filter.is_active.map_or(true, |v| w.is_active == v))
            .filter(|w| {
                filter
                    .workflow_type
                    .as_deref()
                    .map_or(true, |t| w.workflow_type.as_deref() == Some(t))
            })
            .filter(|w| filter.created_by.map_or(true, |c| w.created_by == Some(c)))
            .filter(|w| {
                filter.search.as_deref().map_or(true, |q| {
                    let q = q.to_lowercase();
                    w.name.to_lowercase().contains(&q)
                        || w.description
                            .as_deref()
                            .map_or(false, |d| d.to_lowercase().contains(&q))
                })
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        let total = matches.len() as i64;
        let items = matches
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect();
        Ok((items, total))
    }

    async fn update_workflow(
        &self,
        workflow_id: Uuid,
        changes: UpdateWorkflow,
    ) -> Result<Option<Workflow>, sqlx::Error> {
        let mut inner = self.guard()?;
        let Some(workflow) = inner.workflows.iter_mut().find(|w| w.id == workflow_id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            workflow.name = name;
        }
        if let Some(description) = changes.description {
            workflow.description = Some(description);
        }
        if let Some(workflow_type) = changes.workflow_type {
            workflow.workflow_type = Some(workflow_type);
        }
        if let Some(is_active) = changes.is_active {
            workflow.is_active = is_active;
        }
        workflow.updated_at = now();
        Ok(Some(workflow.clone()))
    }

    async fn delete_workflow(&self, workflow_id: Uuid) -> Result<bool, sqlx::Error> {
        let mut inner = self.guard()?;
        let before = inner.workflows.len();
        inner.workflows.retain(|w| w.id != workflow_id);
        if inner.workflows.len() == before {
            return Ok(false);
        }
        // Cascade the way the Postgres FKs do.
        inner.steps.retain(|s| s.workflow_id != workflow_id);
        inner.schedules.retain(|s| s.workflow_id != workflow_id);
        let execution_ids: Vec<Uuid> = inner
            .executions
            .iter()
            .filter(|e| e.workflow_id == workflow_id)
            .map(|e| e.id)
            .collect();
        inner.executions.retain(|e| e.workflow_id != workflow_id);
        inner.logs.retain(|l| !execution_ids.contains(&l.execution_id));
        Ok(true)
    }

    async fn list_steps(&self, workflow_id: Uuid) -> Result<Vec<WorkflowStep>, sqlx::Error> {
        let inner = self.guard()?;
        let mut steps: Vec<WorkflowStep> = inner
            .steps
            .iter()
            .filter(|s| s.workflow_id == workflow_id)
            .cloned()
            .collect();
        steps.sort_by_key(|s| s.step_order);
        Ok(steps)
    }

    async fn list_active_steps(
        &self,
        workflow_id: Uuid,
    ) -> Result<Vec<WorkflowStep>, sqlx::Error> {
        let inner = self.guard()?;
        let mut steps: Vec<WorkflowStep> = inner
            .steps
            .iter()
            .filter(|s| s.workflow_id == workflow_id && s.is_active)
            .cloned()
            .collect();
        steps.sort_by_key(|s| s.step_order);
        Ok(steps)
    }

    async fn insert_step(
        &self,
        workflow_id: Uuid,
        step: CreateWorkflowStep,
    ) -> Result<WorkflowStep, sqlx::Error> {
        let mut inner = self.guard()?;
        let created = build_step(workflow_id, &step);
        inner.steps.push(created.clone());
        Ok(created)
    }

    async fn update_step(
        &self,
        workflow_id: Uuid,
        step_id: Uuid,
        changes: UpdateWorkflowStep,
    ) -> Result<Option<WorkflowStep>, sqlx::Error> {
        let mut inner = self.guard()?;
        let Some(step) = inner
            .steps
            .iter_mut()
            .find(|s| s.workflow_id == workflow_id && s.id == step_id)
        else {
            return Ok(None);
        };
        if let Some(step_order) = changes.step_order {
            step.step_order = step_order;
        }
        if let Some(step_type) = changes.step_type {
            step.step_type = step_type;
        }
        if let Some(trigger_config) = changes.trigger_config {
            step.trigger_config = trigger_config;
        }
        if let Some(action_config) = changes.action_config {
            step.action_config = action_config;
        }
        if let Some(condition_config) = changes.condition_config {
            step.condition_config = condition_config;
        }
        if let Some(is_active) = changes.is_active {
            step.is_active = is_active;
        }
        step.updated_at = now();
        Ok(Some(step.clone()))
    }

    async fn delete_step(&self, workflow_id: Uuid, step_id: Uuid) -> Result<bool, sqlx::Error> {
        let mut inner = self.guard()?;
        let before = inner.steps.len();
        inner
            .steps
            .retain(|s| !(s.workflow_id == workflow_id && s.id == step_id));
        Ok(inner.steps.len() < before)
    }

    async fn replace_steps(
        &self,
        workflow_id: Uuid,
        steps: Vec<CreateWorkflowStep>,
    ) -> Result<Vec<WorkflowStep>, sqlx::Error> {
        let mut inner = self.guard()?;
        inner.steps.retain(|s| s.workflow_id != workflow_id);
        let mut created = Vec::with_capacity(steps.len());
        for step in &steps {
            let built = build_step(workflow_id, step);
            inner.steps.push(built.clone());
            created.push(built);
        }
        Ok(created)
    }

    async fn get_schedule(
        &self,
        workflow_id: Uuid,
    ) -> Result<Option<WorkflowSchedule>, sqlx::Error> {
        let inner = self.guard()?;
        Ok(inner
            .schedules
            .iter()
            .find(|s| s.workflow_id == workflow_id)
            .cloned())
    }

    async fn upsert_schedule(
        &self,
        workflow_id: Uuid,
        schedule: CreateWorkflowSchedule,
        next_run: Option<OffsetDateTime>,
    ) -> Result<WorkflowSchedule, sqlx::Error> {
        let mut inner = self.guard()?;
        if let Some(existing) = inner
            .schedules
            .iter_mut()
            .find(|s| s.workflow_id == workflow_id)
        {
            existing.schedule_type = schedule.schedule_type;
            existing.schedule_config = schedule.schedule_config;
            existing.next_run = next_run;
            existing.updated_at = now();
            return Ok(existing.clone());
        }
        let created = WorkflowSchedule {
            id: Uuid::new_v4(),
            workflow_id,
            schedule_type: schedule.schedule_type,
            schedule_config: schedule.schedule_config,
            last_run: None,
            next_run,
            created_at: now(),
            updated_at: now(),
        };
        inner.schedules.push(created.clone());
        Ok(created)
    }

    async fn delete_schedule(&self, workflow_id: Uuid) -> Result<bool, sqlx::Error> {
        let mut inner = self.guard()?;
        let before = inner.schedules.len();
        inner.schedules.retain(|s| s.workflow_id != workflow_id);
        Ok(inner.schedules.len() < before)
    }

    async fn mark_schedule_run(
        &self,
        schedule_id: Uuid,
        last_run: OffsetDateTime,
        next_run: Option<OffsetDateTime>,
    ) -> Result<(), sqlx::Error> {
        let mut inner = self.guard()?;
        if let Some(schedule) = inner.schedules.iter_mut().find(|s| s.id == schedule_id) {
            schedule.last_run = Some(last_run);
            schedule.next_run = next_run;
            schedule.updated_at = now();
        }
        Ok(())
    }

    async fn list_due_workflows(
        &self,
        now_ts: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<Workflow>, sqlx::Error> {
        let inner = self.guard()?;
        let mut due: Vec<(OffsetDateTime, Workflow)> = inner
            .schedules
            .iter()
            .filter_map(|s| {
                let next = s.next_run?;
                if next > now_ts {
                    return None;
                }
                inner
                    .workflows
                    .iter()
                    .find(|w| w.id == s.workflow_id && w.is_active)
                    .map(|w| (next, w.clone()))
            })
            .collect();
        due.sort_by_key(|(next, _)| *next);
        Ok(due
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|(_, w)| w)
            .collect())
    }

    async fn create_execution(
        &self,
        workflow_id: Uuid,
    ) -> Result<Option<WorkflowExecution>, sqlx::Error> {
        let mut inner = self.guard()?;
        let already_running = inner
            .executions
            .iter()
            .any(|e| e.workflow_id == workflow_id && e.status == EXECUTION_STATUS_RUNNING);
        if already_running {
            return Ok(None);
        }
        let execution = WorkflowExecution {
            id: Uuid::new_v4(),
            workflow_id,
            status: EXECUTION_STATUS_RUNNING.to_string(),
            current_step: None,
            error_message: None,
            started_at: now(),
            completed_at: None,
        };
        inner.executions.push(execution.clone());
        Ok(Some(execution))
    }

    async fn set_execution_current_step(
        &self,
        execution_id: Uuid,
        step_order: i32,
    ) -> Result<(), sqlx::Error> {
        let mut inner = self.guard()?;
        if let Some(execution) = inner.executions.iter_mut().find(|e| e.id == execution_id) {
            execution.current_step = Some(step_order);
        }
        Ok(())
    }

    async fn complete_execution(
        &self,
        execution_id: Uuid,
        status: &str,
        error_message: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        let mut inner = self.guard()?;
        if let Some(execution) = inner
            .executions
            .iter_mut()
            .find(|e| e.id == execution_id && e.status == EXECUTION_STATUS_RUNNING)
        {
            execution.status = status.to_string();
            execution.error_message = error_message.map(|s| s.to_string());
            execution.completed_at = Some(now());
        }
        Ok(())
    }

    async fn get_execution(
        &self,
        workflow_id: Uuid,
        execution_id: Uuid,
    ) -> Result<Option<WorkflowExecution>, sqlx::Error> {
        let inner = self.guard()?;
        Ok(inner
            .executions
            .iter()
            .find(|e| e.workflow_id == workflow_id && e.id == execution_id)
            .cloned())
    }

    async fn list_executions(
        &self,
        workflow_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<WorkflowExecution>, i64), sqlx::Error> {
        let inner = self.guard()?;
        let mut matches: Vec<WorkflowExecution> = inner
            .executions
            .iter()
            .filter(|e| e.workflow_id == workflow_id)
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        let total = matches.len() as i64;
        let items = matches
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((items, total))
    }

    async fn insert_action_log(
        &self,
        execution_id: Uuid,
        step_id: Uuid,
        action_type: &str,
    ) -> Result<WorkflowActionLog, sqlx::Error> {
        let mut inner = self.guard()?;
        let log = WorkflowActionLog {
            id: Uuid::new_v4(),
            execution_id,
            step_id,
            action_type: action_type.to_string(),
            status: ACTION_STATUS_RUNNING.to_string(),
            result_data: None,
            error_message: None,
            performed_at: now(),
        };
        inner.logs.push(log.clone());
        Ok(log)
    }

    async fn finish_action_log(
        &self,
        log_id: Uuid,
        status: &str,
        result_data: Option<Value>,
        error_message: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        let mut inner = self.guard()?;
        if let Some(log) = inner
            .logs
            .iter_mut()
            .find(|l| l.id == log_id && l.status == ACTION_STATUS_RUNNING)
        {
            log.status = status.to_string();
            log.result_data = result_data;
            log.error_message = error_message.map(|s| s.to_string());
        }
        Ok(())
    }

    async fn list_action_logs(
        &self,
        execution_id: Uuid,
    ) -> Result<Vec<WorkflowActionLog>, sqlx::Error> {
        let inner = self.guard()?;
        Ok(inner
            .logs
            .iter()
            .filter(|l| l.execution_id == execution_id)
            .cloned()
            .collect())
    }
}
