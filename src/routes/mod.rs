pub mod worker;
pub mod workflows;
