pub mod workflow;
pub mod workflow_action_log;
pub mod workflow_execution;
pub mod workflow_schedule;
pub mod workflow_step;
