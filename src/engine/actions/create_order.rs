use async_trait::async_trait;
use serde_json::{json, Value};

use crate::engine::registry::{StepError, StepHandler};
use crate::models::workflow_step::{WorkflowStep, STEP_TYPE_CREATE_ORDER};

/// Extension point for a future domain action. Configured steps succeed
/// with a visible skipped marker so runs keep an audit of them.
pub struct CreateOrderHandler;

#[async_trait]
impl StepHandler for CreateOrderHandler {
    fn step_type(&self) -> &'static str {
        STEP_TYPE_CREATE_ORDER
    }

    async fn execute(&self, _step: &WorkflowStep) -> Result<Value, StepError> {
        Ok(json!({
            "skipped": true,
            "reason": "create_order is not implemented",
        }))
    }
}
