//! # WEEK-CHAIN Backend
//!
//! Smart Vacational Certificates: beta capacity control, certificate sales,
//! reservation requests, broker commissions and legal evidence.
//!
//! ## Architecture
//!
//! - [`models`]: Domain entities and UUID identifiers
//! - [`services`]: Pure business rules (capacity, pricing, commissions,
//!   lifecycle, matching, payments, evidence hashing) and background jobs
//! - [`db`]: Repository pattern with in-memory and PostgreSQL backends, plus
//!   the async service layer that ties rules to storage
//! - [`config`]: `weekchain.toml` loading with environment overrides
//! - [`http`]: Axum-based REST API (feature `http-server`)

// Allow large error types - RepositoryError contains rich context for debugging
#![allow(clippy::result_large_err)]

pub mod config;
pub mod db;
pub mod models;
pub mod services;

#[cfg(feature = "http-server")]
pub mod http;
