use std::collections::HashSet;

use crate::models::workflow_schedule::{
    SCHEDULE_TYPE_CRON, SCHEDULE_TYPE_DAILY, SCHEDULE_TYPE_MONTHLY, SCHEDULE_TYPE_WEEKLY,
};
use crate::models::workflow_step::CreateWorkflowStep;

pub(crate) fn is_known_schedule_type(schedule_type: &str) -> bool {
    matches!(
        schedule_type,
        SCHEDULE_TYPE_DAILY | SCHEDULE_TYPE_WEEKLY | SCHEDULE_TYPE_MONTHLY | SCHEDULE_TYPE_CRON
    )
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code == "23505";
        }
    }
    false
}

/// Active steps must carry distinct `step_order` values. Returns the first
/// colliding order, if any.
pub(crate) fn duplicate_active_order(steps: &[CreateWorkflowStep]) -> Option<i32> {
    let mut seen = HashSet::new();
    for step in steps.iter().filter(|s| s.is_active) {
        if !seen.insert(step.step_order) {
            return Some(step.step_order);
        }
    }
    None
}
