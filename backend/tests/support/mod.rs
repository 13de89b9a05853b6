#![allow(dead_code)]

use chrono::Utc;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use weekchain::db::repository::FullRepository;
use weekchain::db::services::{self, RegisterBroker};
use weekchain::db::LocalRepository;
use weekchain::models::{
    PaxCategory, PropertyCategory, PropertyId, PropertyStatus, ProductSpec, SupplyProperty,
    UserAccount, UserId, UserRole,
};

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Runs `f` with environment variables temporarily modified.
///
/// This is panic-safe (restores variables on unwind) and also serializes access to
/// process-global env vars to avoid flaky tests when Rust runs tests in parallel.
///
/// `changes` is a list of `(key, value)` pairs:
/// - `Some(v)` sets the variable to `v`
/// - `None` removes the variable
pub fn with_scoped_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let _guard = ScopedEnv::new(changes);
    f()
}

struct ScopedEnv {
    snapshot: Vec<(String, Option<String>)>,
}

impl ScopedEnv {
    fn new(changes: &[(&str, Option<&str>)]) -> Self {
        let keys: HashSet<&str> = changes.iter().map(|(k, _)| *k).collect();
        let snapshot = keys
            .into_iter()
            .map(|k| (k.to_string(), std::env::var(k).ok()))
            .collect::<Vec<_>>();

        for (k, v) in changes {
            match v {
                Some(val) => std::env::set_var(k, val),
                None => std::env::remove_var(k),
            }
        }

        Self { snapshot }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (k, v) in self.snapshot.drain(..) {
            match v {
                Some(val) => std::env::set_var(&k, val),
                None => std::env::remove_var(&k),
            }
        }
    }
}

/// In-memory repository with the 16-product catalog loaded.
pub async fn seeded_repo() -> Arc<dyn FullRepository> {
    let repo: Arc<dyn FullRepository> = Arc::new(LocalRepository::new());
    services::seed_catalog_if_empty(repo.as_ref())
        .await
        .expect("seed catalog");
    repo
}

pub async fn create_user(repo: &dyn FullRepository, email: &str, name: &str) -> UserId {
    let user = UserAccount {
        id: UserId::generate(),
        email: email.to_string(),
        full_name: name.to_string(),
        role: UserRole::User,
        wallet_address: Some("0x1234567890abcdef1234567890abcdef12345678".to_string()),
        referrals_this_month: 0,
        created_at: Utc::now(),
    };
    repo.upsert_user(&user).await.expect("insert user");
    user.id
}

/// Account with an explicit role, such as an admin acting on the API.
pub async fn create_role_user(repo: &dyn FullRepository, email: &str, role: UserRole) -> UserId {
    let user = UserAccount {
        id: UserId::generate(),
        email: email.to_string(),
        full_name: "Equipo WEEK-CHAIN".to_string(),
        role,
        wallet_address: None,
        referrals_this_month: 0,
        created_at: Utc::now(),
    };
    repo.upsert_user(&user).await.expect("insert role user");
    user.id
}

pub async fn create_broker(repo: &dyn FullRepository, email: &str, code: &str) -> UserId {
    let id = create_user(repo, email, "Broker Demo").await;
    services::register_broker(
        repo,
        RegisterBroker {
            user_id: id,
            referral_code: code.to_string(),
        },
    )
    .await
    .expect("register broker");
    id
}

pub async fn create_property(
    repo: &dyn FullRepository,
    name: &str,
    city: &str,
    category: PropertyCategory,
    max_occupancy: u32,
) -> PropertyId {
    let property = SupplyProperty {
        id: PropertyId::generate(),
        name: name.to_string(),
        country: "México".to_string(),
        city: city.to_string(),
        category,
        max_occupancy,
        bedrooms: 2,
        bathrooms: 2.0,
        supply_weeks_per_year: Some(48),
        blackout_weeks: 0,
        status: PropertyStatus::Active,
        amenities: vec!["pool".to_string()],
        seasonal_pricing: Vec::new(),
    };
    repo.upsert_property(&property).await.expect("insert property");
    property.id
}

pub fn spec(max_pax: PaxCategory, estancias: u8) -> ProductSpec {
    ProductSpec { max_pax, estancias }
}
