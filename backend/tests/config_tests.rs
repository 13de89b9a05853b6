//! Configuration loading from `weekchain.toml` plus environment overrides.

mod support;

use std::io::Write;

use weekchain::config::AppConfig;
use weekchain::db::{RepositoryBuilder, RepositoryType};

use support::with_scoped_env;

const SAMPLE: &str = r#"
[server]
host = "127.0.0.1"
port = 9000

[rate_limit]
enabled = false
api = 30

[beta]
total_cap = 12

[repository]
type = "local"
seed_catalog = true
"#;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_from_file_reads_all_sections() {
    let file = write_config(SAMPLE);
    let config = AppConfig::from_file(file.path()).unwrap();

    assert_eq!(config.bind_address(), "127.0.0.1:9000");
    assert!(!config.rate_limit.enabled);
    assert_eq!(config.rate_limit.api, 30);
    assert_eq!(config.rate_limit.payment, 10);
    assert_eq!(config.beta.total_cap, 12);
    assert_eq!(
        config.storage.repository_type().unwrap(),
        RepositoryType::Local
    );
}

#[test]
fn test_missing_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = AppConfig::from_file(dir.path().join("weekchain.toml"));
    assert!(result.is_err());
}

#[test]
fn test_env_overrides_host_and_port() {
    let file = write_config(SAMPLE);
    let config = with_scoped_env(&[("HOST", Some("10.0.0.5")), ("PORT", Some("7070"))], || {
        let mut config = AppConfig::from_file(file.path()).unwrap();
        config.apply_env_overrides();
        config
    });
    assert_eq!(config.bind_address(), "10.0.0.5:7070");
}

#[test]
fn test_unparseable_port_is_ignored() {
    let file = write_config(SAMPLE);
    let config = with_scoped_env(&[("HOST", None), ("PORT", Some("eighty"))], || {
        let mut config = AppConfig::from_file(file.path()).unwrap();
        config.apply_env_overrides();
        config
    });
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.server.host, "127.0.0.1");
}

fn load_with_env(env: &[(&str, Option<&str>)]) -> AppConfig {
    let file = write_config(SAMPLE);
    with_scoped_env(env, || {
        let mut config = AppConfig::from_file(file.path()).unwrap();
        config.apply_env_overrides();
        config
    })
}

const STORAGE_VARS: [&str; 5] = [
    "REPOSITORY_TYPE",
    "DATABASE_URL",
    "PG_DATABASE_URL",
    "PG_POOL_MAX",
    "PG_RETRY_DELAY_MS",
];

fn storage_env<'a>(set: &[(&'a str, &'a str)]) -> Vec<(&'a str, Option<&'a str>)> {
    STORAGE_VARS
        .iter()
        .map(|key| (*key, set.iter().find(|(k, _)| k == key).map(|(_, v)| *v)))
        .collect()
}

#[test]
fn test_env_selects_postgres_with_url_and_pool_settings() {
    let config = load_with_env(&storage_env(&[
        ("REPOSITORY_TYPE", "postgres"),
        ("DATABASE_URL", "postgres://wc:secret@db:5432/weekchain"),
        ("PG_POOL_MAX", "25"),
        ("PG_RETRY_DELAY_MS", "not-a-number"),
    ]));

    assert_eq!(
        config.storage.repository_type().unwrap(),
        RepositoryType::Postgres
    );
    assert_eq!(
        config.storage.postgres.database_url,
        "postgres://wc:secret@db:5432/weekchain"
    );
    assert_eq!(config.storage.postgres.max_connections, 25);
    assert_eq!(config.storage.postgres.retry_delay_ms, 100);
}

#[test]
fn test_database_url_alone_implies_postgres() {
    let config = load_with_env(&storage_env(&[(
        "PG_DATABASE_URL",
        "postgres://localhost/weekchain",
    )]));
    assert_eq!(
        config.storage.repository_type().unwrap(),
        RepositoryType::Postgres
    );
    assert_eq!(
        config.storage.postgres.database_url,
        "postgres://localhost/weekchain"
    );
}

#[test]
fn test_explicit_repository_type_wins_over_url() {
    let config = load_with_env(&storage_env(&[
        ("REPOSITORY_TYPE", "memory"),
        ("DATABASE_URL", "postgres://localhost/weekchain"),
    ]));
    assert_eq!(
        config.storage.repository_type().unwrap(),
        RepositoryType::Local
    );
    assert!(config.storage.postgres_settings().unwrap().is_none());
}

#[test]
fn test_without_storage_env_file_settings_stand() {
    let config = load_with_env(&storage_env(&[]));
    assert_eq!(
        config.storage.repository_type().unwrap(),
        RepositoryType::Local
    );
    assert!(config.storage.postgres.database_url.is_empty());
}

#[test]
fn test_admin_email_override_is_normalized() {
    let config = load_with_env(&[("ADMIN_EMAIL", Some("  Ops@Week-Chain.com "))]);
    assert_eq!(config.admin.email, "ops@week-chain.com");
}

#[tokio::test]
async fn test_builder_seeds_catalog_from_config() {
    let config = AppConfig::from_toml_str(SAMPLE).unwrap();
    let repo = RepositoryBuilder::new()
        .from_config(&config.storage)
        .unwrap()
        .build()
        .await
        .unwrap();
    assert_eq!(repo.list_products().await.unwrap().len(), 16);
}
