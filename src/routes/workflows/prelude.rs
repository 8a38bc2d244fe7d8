pub(crate) use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
pub(crate) use chrono::Utc;
pub(crate) use serde::Deserialize;
pub(crate) use serde_json::json;
pub(crate) use uuid::Uuid;

pub(crate) use crate::{
    models::workflow::{CreateWorkflow, UpdateWorkflow},
    models::workflow_schedule::CreateWorkflowSchedule,
    models::workflow_step::{CreateWorkflowStep, UpdateWorkflowStep},
    responses::JsonResponse,
    state::AppState,
    utils::schedule::{next_run, utc_to_offset},
};

pub(crate) use super::helpers::{duplicate_active_order, is_unique_violation};
