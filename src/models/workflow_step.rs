use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

pub const STEP_TYPE_SEND_EMAIL: &str = "send_email";
pub const STEP_TYPE_CHECK_CONDITION: &str = "check_condition";
pub const STEP_TYPE_WAIT_UNTIL: &str = "wait_until";
pub const STEP_TYPE_CREATE_ORDER: &str = "create_order";

#[derive(Debug, FromRow, Serialize, Deserialize, Clone)]
pub struct WorkflowStep {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub step_order: i32,
    pub step_type: String,
    pub trigger_config: Value,
    pub action_config: Value,
    pub condition_config: Value,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CreateWorkflowStep {
    pub step_order: i32,
    pub step_type: String,
    #[serde(default = "empty_config")]
    pub trigger_config: Value,
    #[serde(default = "empty_config")]
    pub action_config: Value,
    #[serde(default = "empty_config")]
    pub condition_config: Value,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

fn empty_config() -> Value {
    Value::Object(Default::default())
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct UpdateWorkflowStep {
    pub step_order: Option<i32>,
    pub step_type: Option<String>,
    pub trigger_config: Option<Value>,
    pub action_config: Option<Value>,
    pub condition_config: Option<Value>,
    pub is_active: Option<bool>,
}
