use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::engine::registry::{StepError, StepHandler};
use crate::models::workflow_step::{WorkflowStep, STEP_TYPE_SEND_EMAIL};
use crate::services::recipients::RecipientResolver;
use crate::services::smtp_mailer::Mailer;

pub struct SendEmailHandler {
    mailer: Arc<dyn Mailer>,
    recipients: Arc<dyn RecipientResolver>,
}

impl SendEmailHandler {
    pub fn new(mailer: Arc<dyn Mailer>, recipients: Arc<dyn RecipientResolver>) -> Self {
        Self { mailer, recipients }
    }
}

fn required_str<'a>(config: &'a Value, key: &str) -> Result<&'a str, StepError> {
    config
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| StepError::InvalidConfig(format!("missing `{}` in action config", key)))
}

#[async_trait]
impl StepHandler for SendEmailHandler {
    fn step_type(&self) -> &'static str {
        STEP_TYPE_SEND_EMAIL
    }

    async fn execute(&self, step: &WorkflowStep) -> Result<Value, StepError> {
        let spec = required_str(&step.action_config, "recipients")?;
        let subject = required_str(&step.action_config, "subject")?;
        let body = required_str(&step.action_config, "body")?;

        let recipients = self
            .recipients
            .resolve(spec)
            .await
            .map_err(|e| StepError::Action(e.to_string()))?;

        // An empty audience is a successful no-op, not a failure.
        if recipients.is_empty() {
            return Ok(json!({
                "sent_count": 0,
                "recipients_count": 0,
                "recipients_spec": spec,
            }));
        }

        let sent = self
            .mailer
            .send_bulk(&recipients, subject, body)
            .await
            .map_err(|e| StepError::Action(e.to_string()))?;

        Ok(json!({
            "sent_count": sent,
            "recipients_count": recipients.len(),
            "recipients_spec": spec,
        }))
    }
}
