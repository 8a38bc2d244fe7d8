pub mod actions;
pub mod executor;
pub mod registry;

pub use executor::{execute_workflow, finalize_schedule, EngineError};
pub use registry::{StepError, StepHandler, StepHandlerRegistry};
