use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

pub const EXECUTION_STATUS_RUNNING: &str = "running";
pub const EXECUTION_STATUS_COMPLETED: &str = "completed";
pub const EXECUTION_STATUS_FAILED: &str = "failed";

#[derive(Debug, FromRow, Serialize, Deserialize, Clone)]
pub struct WorkflowExecution {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub status: String,
    pub current_step: Option<i32>,
    pub error_message: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}
