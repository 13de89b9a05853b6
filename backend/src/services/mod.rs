//! Domain rules.
//!
//! Modules here are mostly pure functions over the models: they never touch
//! storage. `crate::db::services` loads the data, calls into these rules and
//! persists the outcome. `maintenance` and `job_tracker` are the exception;
//! they drive background work over a repository.

pub mod bot_detection;
pub mod capacity;
pub mod chatbot;
pub mod commissions;
pub mod consent;
pub mod error;
pub mod evidence;
pub mod job_tracker;
pub mod lifecycle;
pub mod maintenance;
pub mod matcher;
pub mod payments;
pub mod products;
pub mod roles;
pub mod validation;
pub mod verification;

pub use error::{DomainError, DomainResult, FieldErrors};
pub use job_tracker::JobTracker;
pub use maintenance::MaintenanceTask;
