use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

pub const ACTION_STATUS_RUNNING: &str = "running";
pub const ACTION_STATUS_SUCCESS: &str = "success";
pub const ACTION_STATUS_FAILED: &str = "failed";

#[derive(Debug, FromRow, Serialize, Deserialize, Clone)]
pub struct WorkflowActionLog {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub step_id: Uuid,
    pub action_type: String,
    pub status: String,
    pub result_data: Option<Value>,
    pub error_message: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub performed_at: OffsetDateTime,
}
