//! Background jobs.

pub mod scheduler;
pub mod sweep;

pub use scheduler::Scheduler;
