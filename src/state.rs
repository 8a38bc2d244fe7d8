use crate::config::Config;
use crate::db::workflow_repository::WorkflowRepository;
use crate::engine::registry::StepHandlerRegistry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub workflow_repo: Arc<dyn WorkflowRepository>,
    pub registry: Arc<StepHandlerRegistry>,
    pub config: Arc<Config>,
}
