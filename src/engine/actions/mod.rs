mod check_condition;
mod create_order;
mod send_email;
mod wait_until;

pub use check_condition::CheckConditionHandler;
pub use create_order::CreateOrderHandler;
pub use send_email::SendEmailHandler;
pub use wait_until::WaitUntilHandler;
