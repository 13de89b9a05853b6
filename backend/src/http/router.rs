//! Router configuration for the HTTP API.
//!
//! This module sets up all routes, middleware (rate limiting, CORS,
//! compression, tracing), and creates the axum router ready for serving.

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::rate_limit::rate_limit;
use super::state::AppState;

/// Any origin when none are configured, otherwise the configured list.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return cors.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    cors.allow_origin(allowed)
}

/// Create the main application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    let api_v1 = Router::new()
        // Capacity & catalog
        .route("/capacity/status", get(handlers::capacity_status))
        .route("/capacity/recalculate", post(handlers::recalculate_capacity))
        .route("/products", get(handlers::list_products))
        .route("/products/recommend", get(handlers::recommend_product))
        .route("/products/{id}/availability", get(handlers::product_availability))
        .route("/waitlist", post(handlers::join_waitlist))
        // Certificates & reservations
        .route("/certificates/purchase", post(handlers::purchase_certificate))
        .route("/certificates/{id}/eligibility", get(handlers::certificate_eligibility))
        .route("/reservations/requests", post(handlers::submit_reservation_request))
        .route("/reservations/requests/{id}/offer", post(handlers::offer_request))
        .route("/reservations/requests/{id}/confirm", post(handlers::confirm_request))
        .route("/reservations/requests/{id}/cancel", post(handlers::cancel_request))
        .route("/reservations/match", post(handlers::match_properties))
        .route("/verify/{id}", get(handlers::verify_certificate))
        // Brokers & referrals
        .route("/brokers", post(handlers::register_broker))
        .route("/brokers/{id}/level", get(handlers::broker_level))
        .route("/brokers/{id}/commissions", get(handlers::broker_commissions))
        .route("/brokers/{id}/retirement-bonus", get(handlers::broker_retirement_bonus))
        .route("/referrals/attributions", post(handlers::create_attribution))
        // Legal & compliance
        .route("/consents", post(handlers::record_consent))
        .route("/users/{id}/consents/{consent_type}", get(handlers::check_consent))
        .route("/evidence", post(handlers::log_evidence))
        .route("/evidence/{id}/verify", get(handlers::verify_evidence))
        .route("/contact", post(handlers::submit_contact).get(handlers::list_contacts))
        .route("/compliance/bot-check", post(handlers::bot_check))
        // Payments
        .route("/payments/checkout", post(handlers::create_checkout))
        .route("/payments/oxxo/plan", post(handlers::oxxo_plan))
        .route("/webhooks/conekta", post(handlers::payment_webhook))
        // Testimonials
        .route(
            "/testimonials",
            post(handlers::submit_testimonial).get(handlers::list_testimonials),
        )
        // Administration
        .route("/admin/users", post(handlers::admin_create_user))
        .route("/admin/properties", post(handlers::admin_create_property))
        .route("/admin/capacity/toggle-sales", post(handlers::admin_toggle_sales))
        .route("/admin/testimonials", get(handlers::admin_list_testimonials))
        .route(
            "/admin/testimonials/{id}/review",
            post(handlers::admin_review_testimonial),
        )
        // Assistant & roles
        .route("/chatbot/ask", post(handlers::chatbot_ask))
        .route("/chatbot/quick-actions", get(handlers::chatbot_quick_actions))
        .route("/roles/{role}/dashboard", get(handlers::role_dashboard))
        // Maintenance & job management
        .route("/maintenance/{task}", post(handlers::start_maintenance))
        .route("/jobs", get(handlers::list_jobs))
        .route("/jobs/{job_id}", get(handlers::get_job_status))
        .route("/jobs/{job_id}/logs", get(handlers::stream_job_logs));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/v1", api_v1)
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
