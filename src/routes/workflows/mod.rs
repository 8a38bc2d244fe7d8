mod crud;
mod executions;
mod helpers;
mod prelude;
mod schedule;
mod steps;

pub use crud::{create_workflow, delete_workflow, get_workflow, list_workflows, update_workflow};
pub use executions::{get_execution, list_executions, start_workflow_execution};
pub use schedule::{delete_schedule, get_schedule, upsert_schedule};
pub use steps::{add_step, delete_step, list_steps, replace_steps, update_step};
