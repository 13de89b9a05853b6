//! Application state for the HTTP server.

use std::sync::Arc;

use super::rate_limit::RateLimiter;
use crate::config::AppConfig;
use crate::db::repository::FullRepository;
use crate::services::JobTracker;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Repository instance for database operations
    pub repository: Arc<dyn FullRepository>,
    /// Background maintenance jobs
    pub job_tracker: JobTracker,
    pub config: Arc<AppConfig>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// State with default configuration.
    pub fn new(repository: Arc<dyn FullRepository>) -> Self {
        Self::with_config(repository, AppConfig::default())
    }

    pub fn with_config(repository: Arc<dyn FullRepository>, config: AppConfig) -> Self {
        Self {
            repository,
            job_tracker: JobTracker::new(),
            config: Arc::new(config),
            rate_limiter: Arc::new(RateLimiter::new()),
        }
    }

    /// Beta cap applied to purchases and availability checks.
    pub fn total_cap(&self) -> u32 {
        self.config.beta.total_cap
    }
}
