use crate::{
    db::workflow_repository::{WorkflowListFilter, WorkflowRepository},
    models::workflow::{CreateWorkflow, UpdateWorkflow, Workflow},
    models::workflow_action_log::WorkflowActionLog,
    models::workflow_execution::WorkflowExecution,
    models::workflow_schedule::{CreateWorkflowSchedule, WorkflowSchedule},
    models::workflow_step::{CreateWorkflowStep, UpdateWorkflowStep, WorkflowStep},
};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Postgres, Row, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

pub struct PostgresWorkflowRepository {
    pub pool: PgPool,
}

const WORKFLOW_COLUMNS: &str =
    "id, name, description, workflow_type, is_active, created_by, created_at, updated_at";

const STEP_COLUMNS: &str = "id, workflow_id, step_order, step_type, trigger_config, \
     action_config, condition_config, is_active, created_at, updated_at";

const SCHEDULE_COLUMNS: &str = "id, workflow_id, schedule_type, schedule_config, last_run, \
     next_run, created_at, updated_at";

const EXECUTION_COLUMNS: &str =
    "id, workflow_id, status, current_step, error_message, started_at, completed_at";

const ACTION_LOG_COLUMNS: &str =
    "id, execution_id, step_id, action_type, status, result_data, error_message, performed_at";

async fn insert_step_tx(
    tx: &mut Transaction<'_, Postgres>,
    workflow_id: Uuid,
    step: &CreateWorkflowStep,
) -> Result<WorkflowStep, sqlx::Error> {
    let sql = format!(
        r#"
        INSERT INTO workflow_steps
            (workflow_id, step_order, step_type, trigger_config, action_config, condition_config, is_active, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, now(), now())
        RETURNING {STEP_COLUMNS}
        "#
    );
    sqlx::query_as::<_, WorkflowStep>(&sql)
        .bind(workflow_id)
        .bind(step.step_order)
        .bind(&step.step_type)
        .bind(&step.trigger_config)
        .bind(&step.action_config)
        .bind(&step.condition_config)
        .bind(step.is_active)
        .fetch_one(&mut **tx)
        .await
}

async fn upsert_schedule_tx(
    tx: &mut Transaction<'_, Postgres>,
    workflow_id: Uuid,
    schedule: &CreateWorkflowSchedule,
    next_run: Option<OffsetDateTime>,
) -> Result<WorkflowSchedule, sqlx::Error> {
    let sql = format!(
        r#"
        INSERT INTO workflow_schedules
            (workflow_id, schedule_type, schedule_config, next_run, created_at, updated_at)
        VALUES ($1, $2, $3, $4, now(), now())
        ON CONFLICT (workflow_id) DO UPDATE
        SET schedule_type = EXCLUDED.schedule_type,
            schedule_config = EXCLUDED.schedule_config,
            next_run = EXCLUDED.next_run,
            updated_at = now()
        RETURNING {SCHEDULE_COLUMNS}
        "#
    );
    sqlx::query_as::<_, WorkflowSchedule>(&sql)
        .bind(workflow_id)
        .bind(&schedule.schedule_type)
        .bind(&schedule.schedule_config)
        .bind(next_run)
        .fetch_one(&mut **tx)
        .await
}

#[async_trait]
impl WorkflowRepository for PostgresWorkflowRepository {
    async fn create_workflow(
        &self,
        payload: CreateWorkflow,
        schedule_next_run: Option<OffsetDateTime>,
    ) -> Result<Workflow, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            INSERT INTO workflows (name, description, workflow_type, is_active, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, now(), now())
            RETURNING {WORKFLOW_COLUMNS}
            "#
        );
        let workflow = sqlx::query_as::<_, Workflow>(&sql)
            .bind(&payload.name)
            .bind(payload.description.as_deref())
            .bind(payload.workflow_type.as_deref())
            .bind(payload.is_active)
            .bind(payload.created_by)
            .fetch_one(&mut *tx)
            .await?;

        for step in &payload.steps {
            insert_step_tx(&mut tx, workflow.id, step).await?;
        }

        if let Some(schedule) = &payload.schedule {
            upsert_schedule_tx(&mut tx, workflow.id, schedule, schedule_next_run).await?;
        }

        tx.commit().await?;
        Ok(workflow)
    }

    async fn find_workflow_by_id(
        &self,
        workflow_id: Uuid,
    ) -> Result<Option<Workflow>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {WORKFLOW_COLUMNS}
            FROM workflows
            WHERE id = $1
            "#
        );
        sqlx::query_as::<_, Workflow>(&sql)
            .bind(workflow_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn list_workflows(
        &self,
        filter: WorkflowListFilter,
    ) -> Result<(Vec<Workflow>, i64), sqlx::Error> {
        let where_clause = r#"
            WHERE ($1::boolean IS NULL OR is_active = $1)
              AND ($2::text IS NULL OR workflow_type = $2)
              AND ($3::uuid IS NULL OR created_by = $3)
              AND ($4::text IS NULL
                   OR name ILIKE '%' || $4 || '%'
                   OR description ILIKE '%' || $4 || '%')
        "#;

        let page_sql = format!(
            r#"
            SELECT {WORKFLOW_COLUMNS}
            FROM workflows
            {where_clause}
            ORDER BY updated_at DESC
            LIMIT $5 OFFSET $6
            "#
        );
        let items = sqlx::query_as::<_, Workflow>(&page_sql)
            .bind(filter.is_active)
            .bind(filter.workflow_type.as_deref())
            .bind(filter.created_by)
            .bind(filter.search.as_deref())
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await?;

        let count_sql = format!("SELECT COUNT(*) AS total FROM workflows {where_clause}");
        let total: i64 = sqlx::query(&count_sql)
            .bind(filter.is_active)
            .bind(filter.workflow_type.as_deref())
            .bind(filter.created_by)
            .bind(filter.search.as_deref())
            .fetch_one(&self.pool)
            .await?
            .try_get("total")?;

        Ok((items, total))
    }

    async fn update_workflow(
        &self,
        workflow_id: Uuid,
        changes: UpdateWorkflow,
    ) -> Result<Option<Workflow>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE workflows
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                workflow_type = COALESCE($4, workflow_type),
                is_active = COALESCE($5, is_active),
                updated_at = now()
            WHERE id = $1
            RETURNING {WORKFLOW_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Workflow>(&sql)
            .bind(workflow_id)
            .bind(changes.name.as_deref())
            .bind(changes.description.as_deref())
            .bind(changes.workflow_type.as_deref())
            .bind(changes.is_active)
            .fetch_optional(&self.pool)
            .await
    }

    async fn delete_workflow(&self, workflow_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM workflows
            WHERE id = $1
            "#,
        )
        .bind(workflow_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_steps(&self, workflow_id: Uuid) -> Result<Vec<WorkflowStep>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {STEP_COLUMNS}
            FROM workflow_steps
            WHERE workflow_id = $1
            ORDER BY step_order ASC
            "#
        );
        sqlx::query_as::<_, WorkflowStep>(&sql)
            .bind(workflow_id)
            .fetch_all(&self.pool)
            .await
    }

    async fn list_active_steps(
        &self,
        workflow_id: Uuid,
    ) -> Result<Vec<WorkflowStep>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {STEP_COLUMNS}
            FROM workflow_steps
            WHERE workflow_id = $1 AND is_active = TRUE
            ORDER BY step_order ASC
            "#
        );
        sqlx::query_as::<_, WorkflowStep>(&sql)
            .bind(workflow_id)
            .fetch_all(&self.pool)
            .await
    }

    async fn insert_step(
        &self,
        workflow_id: Uuid,
        step: CreateWorkflowStep,
    ) -> Result<WorkflowStep, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let created = insert_step_tx(&mut tx, workflow_id, &step).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn update_step(
        &self,
        workflow_id: Uuid,
        step_id: Uuid,
        changes: UpdateWorkflowStep,
    ) -> Result<Option<WorkflowStep>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE workflow_steps
            SET step_order = COALESCE($3, step_order),
                step_type = COALESCE($4, step_type),
                trigger_config = COALESCE($5, trigger_config),
                action_config = COALESCE($6, action_config),
                condition_config = COALESCE($7, condition_config),
                is_active = COALESCE($8, is_active),
                updated_at = now()
            WHERE workflow_id = $1 AND id = $2
            RETURNING {STEP_COLUMNS}
            "#
        );
        sqlx::query_as::<_, WorkflowStep>(&sql)
            .bind(workflow_id)
            .bind(step_id)
            .bind(changes.step_order)
            .bind(changes.step_type.as_deref())
            .bind(changes.trigger_config.as_ref())
            .bind(changes.action_config.as_ref())
            .bind(changes.condition_config.as_ref())
            .bind(changes.is_active)
            .fetch_optional(&self.pool)
            .await
    }

    async fn delete_step(&self, workflow_id: Uuid, step_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM workflow_steps
            WHERE workflow_id = $1 AND id = $2
            "#,
        )
        .bind(workflow_id)
        .bind(step_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn replace_steps(
        &self,
        workflow_id: Uuid,
        steps: Vec<CreateWorkflowStep>,
    ) -> Result<Vec<WorkflowStep>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM workflow_steps
            WHERE workflow_id = $1
            "#,
        )
        .bind(workflow_id)
        .execute(&mut *tx)
        .await?;

        let mut created = Vec::with_capacity(steps.len());
        for step in &steps {
            created.push(insert_step_tx(&mut tx, workflow_id, step).await?);
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn get_schedule(
        &self,
        workflow_id: Uuid,
    ) -> Result<Option<WorkflowSchedule>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {SCHEDULE_COLUMNS}
            FROM workflow_schedules
            WHERE workflow_id = $1
            "#
        );
        sqlx::query_as::<_, WorkflowSchedule>(&sql)
            .bind(workflow_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn upsert_schedule(
        &self,
        workflow_id: Uuid,
        schedule: CreateWorkflowSchedule,
        next_run: Option<OffsetDateTime>,
    ) -> Result<WorkflowSchedule, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let saved = upsert_schedule_tx(&mut tx, workflow_id, &schedule, next_run).await?;
        tx.commit().await?;
        Ok(saved)
    }

    async fn delete_schedule(&self, workflow_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM workflow_schedules
            WHERE workflow_id = $1
            "#,
        )
        .bind(workflow_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_schedule_run(
        &self,
        schedule_id: Uuid,
        last_run: OffsetDateTime,
        next_run: Option<OffsetDateTime>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE workflow_schedules
            SET last_run = $2,
                next_run = $3,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(schedule_id)
        .bind(last_run)
        .bind(next_run)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_due_workflows(
        &self,
        now: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<Workflow>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT w.{cols}
            FROM workflows w
            JOIN workflow_schedules s ON s.workflow_id = w.id
            WHERE w.is_active = TRUE
              AND s.next_run IS NOT NULL
              AND s.next_run <= $1
            ORDER BY s.next_run ASC
            LIMIT $2
            "#,
            cols = WORKFLOW_COLUMNS.replace(", ", ", w.")
        );
        sqlx::query_as::<_, Workflow>(&sql)
            .bind(now)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
    }

    async fn create_execution(
        &self,
        workflow_id: Uuid,
    ) -> Result<Option<WorkflowExecution>, sqlx::Error> {
        // Single-flight: the insert only lands when no sibling execution is
        // still running.
        let sql = format!(
            r#"
            INSERT INTO workflow_executions (workflow_id, status, started_at)
            SELECT $1, 'running', now()
            WHERE NOT EXISTS (
                SELECT 1 FROM workflow_executions
                WHERE workflow_id = $1 AND status = 'running'
            )
            RETURNING {EXECUTION_COLUMNS}
            "#
        );
        sqlx::query_as::<_, WorkflowExecution>(&sql)
            .bind(workflow_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn set_execution_current_step(
        &self,
        execution_id: Uuid,
        step_order: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE workflow_executions
            SET current_step = $2
            WHERE id = $1
            "#,
        )
        .bind(execution_id)
        .bind(step_order)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn complete_execution(
        &self,
        execution_id: Uuid,
        status: &str,
        error_message: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE workflow_executions
            SET status = $2,
                error_message = $3,
                completed_at = now()
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(execution_id)
        .bind(status)
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_execution(
        &self,
        workflow_id: Uuid,
        execution_id: Uuid,
    ) -> Result<Option<WorkflowExecution>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {EXECUTION_COLUMNS}
            FROM workflow_executions
            WHERE workflow_id = $1 AND id = $2
            "#
        );
        sqlx::query_as::<_, WorkflowExecution>(&sql)
            .bind(workflow_id)
            .bind(execution_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn list_executions(
        &self,
        workflow_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<WorkflowExecution>, i64), sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {EXECUTION_COLUMNS}
            FROM workflow_executions
            WHERE workflow_id = $1
            ORDER BY started_at DESC
            LIMIT $2 OFFSET $3
            "#
        );
        let items = sqlx::query_as::<_, WorkflowExecution>(&sql)
            .bind(workflow_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let total: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) AS total
            FROM workflow_executions
            WHERE workflow_id = $1
            "#,
        )
        .bind(workflow_id)
        .fetch_one(&self.pool)
        .await?
        .try_get("total")?;

        Ok((items, total))
    }

    async fn insert_action_log(
        &self,
        execution_id: Uuid,
        step_id: Uuid,
        action_type: &str,
    ) -> Result<WorkflowActionLog, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO workflow_action_logs (execution_id, step_id, action_type, status, performed_at)
            VALUES ($1, $2, $3, 'running', now())
            RETURNING {ACTION_LOG_COLUMNS}
            "#
        );
        sqlx::query_as::<_, WorkflowActionLog>(&sql)
            .bind(execution_id)
            .bind(step_id)
            .bind(action_type)
            .fetch_one(&self.pool)
            .await
    }

    async fn finish_action_log(
        &self,
        log_id: Uuid,
        status: &str,
        result_data: Option<Value>,
        error_message: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE workflow_action_logs
            SET status = $2,
                result_data = $3,
                error_message = $4
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(log_id)
        .bind(status)
        .bind(result_data)
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_action_logs(
        &self,
        execution_id: Uuid,
    ) -> Result<Vec<WorkflowActionLog>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {ACTION_LOG_COLUMNS}
            FROM workflow_action_logs
            WHERE execution_id = $1
            ORDER BY performed_at ASC, id ASC
            "#
        );
        sqlx::query_as::<_, WorkflowActionLog>(&sql)
            .bind(execution_id)
            .fetch_all(&self.pool)
            .await
    }
}
