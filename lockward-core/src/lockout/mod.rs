mod info;
mod service;
pub mod store;

pub use info::{BackendStatus, CleanupStats, LockoutDecision, LockoutInfo};
pub use service::{calculate_lockout_duration, LockoutService};
