//! Repository factory and builder.
//!
//! Picks a backend from a [`RepositoryConfig`] (file plus environment
//! overrides) and, optionally, seeds the PAX catalog into a fresh store.

use std::str::FromStr;
use std::sync::Arc;

use super::repo_config::{PostgresSettings, RepositoryConfig};
use super::repositories::LocalRepository;
#[cfg(feature = "postgres-repo")]
use super::repositories::PostgresRepository;
use super::repository::{FullRepository, RepositoryError, RepositoryResult};
use super::services;

/// Repository backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryType {
    /// Postgres + Diesel implementation
    Postgres,
    /// In-memory local repository
    Local,
}

impl FromStr for RepositoryType {
    type Err = String;

    /// Accepts `postgres`, `pg`, `local` and `memory`, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "pg" => Ok(Self::Postgres),
            "local" | "memory" => Ok(Self::Local),
            _ => Err(format!("Unknown repository type: {}", s)),
        }
    }
}

#[cfg(not(feature = "postgres-repo"))]
fn postgres_disabled() -> RepositoryError {
    RepositoryError::configuration("Postgres repository feature not enabled")
}

pub struct RepositoryFactory;

impl RepositoryFactory {
    /// Create a repository of the given type.
    ///
    /// `postgres` settings are required for [`RepositoryType::Postgres`].
    pub async fn create(
        repo_type: RepositoryType,
        postgres: Option<&PostgresSettings>,
    ) -> RepositoryResult<Arc<dyn FullRepository>> {
        match repo_type {
            RepositoryType::Local => Ok(Self::create_local()),
            RepositoryType::Postgres => {
                let settings = postgres.ok_or_else(|| {
                    RepositoryError::configuration("Postgres repository requires a database URL")
                })?;
                #[cfg(feature = "postgres-repo")]
                {
                    let pg = Self::create_postgres(settings).await?;
                    Ok(pg as Arc<dyn FullRepository>)
                }
                #[cfg(not(feature = "postgres-repo"))]
                {
                    let _ = settings;
                    Err(postgres_disabled())
                }
            }
        }
    }

    #[cfg(feature = "postgres-repo")]
    pub async fn create_postgres(
        settings: &PostgresSettings,
    ) -> RepositoryResult<Arc<PostgresRepository>> {
        let settings = settings.clone();
        // Pool creation and migrations block.
        let repo = tokio::task::spawn_blocking(move || PostgresRepository::new(&settings))
            .await
            .map_err(|e| RepositoryError::internal(format!("Task join error: {}", e)))??;
        Ok(Arc::new(repo))
    }

    pub fn create_local() -> Arc<dyn FullRepository> {
        Arc::new(LocalRepository::new())
    }

    /// Default settings overlaid with `REPOSITORY_TYPE`, `DATABASE_URL` and
    /// the `PG_*` variables.
    pub async fn from_env() -> RepositoryResult<Arc<dyn FullRepository>> {
        let mut config = RepositoryConfig::default();
        config.apply_env_overrides();
        Self::from_config(&config).await
    }

    /// Create a repository from the `[repository]`/`[postgres]` tables of a
    /// configuration file.
    pub async fn from_config(
        config: &RepositoryConfig,
    ) -> RepositoryResult<Arc<dyn FullRepository>> {
        RepositoryBuilder::new().from_config(config)?.build().await
    }
}

/// Fluent repository construction.
///
/// ```ignore
/// use weekchain::db::{RepositoryBuilder, RepositoryType};
///
/// let repo = RepositoryBuilder::new()
///     .repository_type(RepositoryType::Local)
///     .seed_catalog(true)
///     .build()
///     .await?;
/// ```
pub struct RepositoryBuilder {
    repo_type: RepositoryType,
    postgres: Option<PostgresSettings>,
    seed_catalog: bool,
}

impl RepositoryBuilder {
    /// Local backend, no seeding.
    pub fn new() -> Self {
        Self {
            repo_type: RepositoryType::Local,
            postgres: None,
            seed_catalog: false,
        }
    }

    pub fn repository_type(mut self, repo_type: RepositoryType) -> Self {
        self.repo_type = repo_type;
        self
    }

    pub fn postgres_settings(mut self, settings: PostgresSettings) -> Self {
        self.postgres = Some(settings);
        self
    }

    /// Insert the 16-product catalog after building if the store has none.
    pub fn seed_catalog(mut self, seed: bool) -> Self {
        self.seed_catalog = seed;
        self
    }

    pub fn from_config(mut self, config: &RepositoryConfig) -> RepositoryResult<Self> {
        self.repo_type = config.repository_type().map_err(|e| {
            RepositoryError::configuration(format!("Invalid repository type: {}", e))
        })?;
        self.postgres = config.postgres_settings()?.cloned();
        self.seed_catalog = config.repository.seed_catalog;
        Ok(self)
    }

    pub async fn build(self) -> RepositoryResult<Arc<dyn FullRepository>> {
        let repo = RepositoryFactory::create(self.repo_type, self.postgres.as_ref()).await?;
        if self.seed_catalog {
            services::seed_catalog_if_empty(repo.as_ref())
                .await
                .map_err(|e| RepositoryError::internal(format!("Catalog seeding failed: {}", e)))?;
        }
        log::info!("Repository ready: {:?}", self.repo_type);
        Ok(repo)
    }
}

impl Default for RepositoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
