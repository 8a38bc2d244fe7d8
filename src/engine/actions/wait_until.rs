use async_trait::async_trait;
use serde_json::{json, Value};

use crate::engine::registry::{StepError, StepHandler};
use crate::models::workflow_step::{WorkflowStep, STEP_TYPE_WAIT_UNTIL};

/// Records the intended wait and returns immediately. The engine never
/// suspends mid-run; deferred continuation is not implemented.
pub struct WaitUntilHandler;

#[async_trait]
impl StepHandler for WaitUntilHandler {
    fn step_type(&self) -> &'static str {
        STEP_TYPE_WAIT_UNTIL
    }

    async fn execute(&self, step: &WorkflowStep) -> Result<Value, StepError> {
        let until = step
            .trigger_config
            .get("until")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let duration_minutes = step
            .trigger_config
            .get("duration_minutes")
            .and_then(|v| v.as_i64())
            .filter(|m| *m > 0);

        if until.is_none() && duration_minutes.is_none() {
            return Err(StepError::InvalidConfig(
                "wait_until needs `until` or `duration_minutes` in trigger config".to_string(),
            ));
        }

        Ok(json!({
            "waited": false,
            "until": until,
            "duration_minutes": duration_minutes,
        }))
    }
}
