pub mod conditions;
pub mod recipients;
pub mod smtp_mailer;
