use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, FromRow, Serialize, Deserialize, Clone)]
pub struct Workflow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub workflow_type: Option<String>,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateWorkflow {
    pub name: String,
    pub description: Option<String>,
    pub workflow_type: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    #[serde(default)]
    pub steps: Vec<crate::models::workflow_step::CreateWorkflowStep>,
    pub schedule: Option<crate::models::workflow_schedule::CreateWorkflowSchedule>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct UpdateWorkflow {
    pub name: Option<String>,
    pub description: Option<String>,
    pub workflow_type: Option<String>,
    pub is_active: Option<bool>,
}
