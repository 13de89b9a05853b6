//! Persistence for the WEEK-CHAIN backend.
//!
//! Storage sits behind the Repository pattern so the in-memory and the
//! Postgres backends can be swapped without touching business code.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Application Layer (REST API, maintenance jobs)         │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Service Layer (services.rs)                            │
//! │  - purchases, reservations, commissions                 │
//! │  - capacity snapshots, consent, evidence                │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Repository Traits (repository/)                        │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//!     ┌───────────────┴──────────────────┐
//!     │  LocalRepository │ PostgresRepository │
//!     └──────────────────────────────────┘
//! ```
//!
//! # Recommended Usage
//!
//! ```ignore
//! use weekchain::db::{services, RepositoryFactory};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let repo = RepositoryFactory::from_env().await?;
//!     let snapshot = services::recalculate_capacity(repo.as_ref()).await?;
//!     println!("{}", snapshot.system_status);
//!     Ok(())
//! }
//! ```

// Feature flag priority: postgres > local
#[cfg(not(any(feature = "postgres-repo", feature = "local-repo")))]
compile_error!("Enable at least one repository backend feature.");

pub mod factory;
pub mod repo_config;
pub mod repositories;
pub mod repository;
pub mod services;

pub use factory::{RepositoryBuilder, RepositoryFactory, RepositoryType};
pub use repo_config::{PostgresSettings, RepositoryConfig};
pub use repositories::LocalRepository;
#[cfg(feature = "postgres-repo")]
pub use repositories::PostgresRepository;
pub use repository::{
    BrokerRepository, CertificateRepository, ComplianceRepository, ErrorContext, FullRepository,
    RepositoryError, RepositoryResult, SupplyRepository,
};

use anyhow::{Context, Result};
use std::sync::{Arc, OnceLock};

/// Global repository instance initialized once per process.
static REPOSITORY: OnceLock<Arc<dyn FullRepository>> = OnceLock::new();

/// Initialize the global repository singleton from defaults plus the
/// `REPOSITORY_TYPE`, `DATABASE_URL` and `PG_*` environment variables.
///
/// Must be called from within a Tokio runtime. Calling it again is a no-op.
pub async fn init_repository() -> Result<()> {
    if REPOSITORY.get().is_some() {
        return Ok(());
    }
    let repo = RepositoryFactory::from_env()
        .await
        .context("Failed to create repository")?;
    let _ = REPOSITORY.set(repo);
    Ok(())
}

/// Install an already-built repository as the global instance.
///
/// Returns `false` when a repository was installed before.
pub fn install_repository(repo: Arc<dyn FullRepository>) -> bool {
    REPOSITORY.set(repo).is_ok()
}

/// Get a reference to the global repository instance.
pub fn get_repository() -> Result<&'static Arc<dyn FullRepository>> {
    REPOSITORY
        .get()
        .context("Repository not initialized. Call init_repository() first.")
}
