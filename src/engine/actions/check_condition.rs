use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::engine::registry::{StepError, StepHandler};
use crate::models::workflow_step::{WorkflowStep, STEP_TYPE_CHECK_CONDITION};
use crate::services::conditions::ConditionEvaluator;

pub struct CheckConditionHandler {
    conditions: Arc<dyn ConditionEvaluator>,
}

impl CheckConditionHandler {
    pub fn new(conditions: Arc<dyn ConditionEvaluator>) -> Self {
        Self { conditions }
    }
}

#[async_trait]
impl StepHandler for CheckConditionHandler {
    fn step_type(&self) -> &'static str {
        STEP_TYPE_CHECK_CONDITION
    }

    async fn execute(&self, step: &WorkflowStep) -> Result<Value, StepError> {
        let check = step
            .condition_config
            .get("check")
            .and_then(|v| v.as_str())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                StepError::InvalidConfig("missing `check` in condition config".to_string())
            })?;
        let params = step
            .condition_config
            .get("params")
            .cloned()
            .unwrap_or_else(|| json!({}));

        let outcome = self
            .conditions
            .evaluate(check, &params)
            .await
            .map_err(|e| StepError::Action(e.to_string()))?;

        // Advisory only: a false outcome is recorded, never halts the run.
        Ok(json!({
            "check": check,
            "condition_met": outcome.condition_met,
            "details": outcome.details,
        }))
    }
}
