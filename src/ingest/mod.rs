pub mod handler;
pub mod queue;
