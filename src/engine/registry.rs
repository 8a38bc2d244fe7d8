use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::models::workflow_step::WorkflowStep;
use crate::services::conditions::ConditionEvaluator;
use crate::services::recipients::RecipientResolver;
use crate::services::smtp_mailer::Mailer;

use super::actions::{
    CheckConditionHandler, CreateOrderHandler, SendEmailHandler, WaitUntilHandler,
};

#[derive(Debug, Error)]
pub enum StepError {
    #[error("unknown step type `{0}`")]
    UnknownStepType(String),
    #[error("invalid step configuration: {0}")]
    InvalidConfig(String),
    #[error("{0}")]
    Action(String),
}

/// One dispatch target per step type. Handlers validate their own config
/// payloads; the registry knows nothing about payload shapes.
#[async_trait]
pub trait StepHandler: Send + Sync {
    fn step_type(&self) -> &'static str;

    async fn execute(&self, step: &WorkflowStep) -> Result<Value, StepError>;
}

pub struct StepHandlerRegistry {
    handlers: HashMap<&'static str, Arc<dyn StepHandler>>,
}

impl StepHandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(mut self, handler: Arc<dyn StepHandler>) -> Self {
        self.handlers.insert(handler.step_type(), handler);
        self
    }

    pub fn get(&self, step_type: &str) -> Option<&Arc<dyn StepHandler>> {
        self.handlers.get(step_type)
    }

    pub async fn execute(&self, step: &WorkflowStep) -> Result<Value, StepError> {
        match self.get(&step.step_type) {
            Some(handler) => handler.execute(step).await,
            None => Err(StepError::UnknownStepType(step.step_type.clone())),
        }
    }

    /// The standard handler set: every step type the store accepts.
    pub fn standard(
        mailer: Arc<dyn Mailer>,
        recipients: Arc<dyn RecipientResolver>,
        conditions: Arc<dyn ConditionEvaluator>,
    ) -> Self {
        Self::new()
            .register(Arc::new(SendEmailHandler::new(mailer, recipients)))
            .register(Arc::new(CheckConditionHandler::new(conditions)))
            .register(Arc::new(WaitUntilHandler))
            .register(Arc::new(CreateOrderHandler))
    }
}

impl Default for StepHandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
