pub mod health_handlers;
pub mod scale_handlers;
