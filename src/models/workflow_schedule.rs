use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

pub const SCHEDULE_TYPE_DAILY: &str = "daily";
pub const SCHEDULE_TYPE_WEEKLY: &str = "weekly";
pub const SCHEDULE_TYPE_MONTHLY: &str = "monthly";
pub const SCHEDULE_TYPE_CRON: &str = "cron";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowSchedule {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub schedule_type: String,
    pub schedule_config: Value,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_run: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub next_run: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CreateWorkflowSchedule {
    pub schedule_type: String,
    #[serde(default = "empty_config")]
    pub schedule_config: Value,
}

fn empty_config() -> Value {
    Value::Object(Default::default())
}
