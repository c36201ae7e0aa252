use axum::{
    Router,
    routing::{get, post},
};

pub mod accounts;
pub mod cash_registers;
pub mod events;
pub mod guest;
pub mod inscriptions;
pub mod payment_links;
pub mod payments;
pub mod regions;
pub mod reports;
pub mod system;
pub mod tickets;
pub mod webhooks;

/// Endpoints reachable without a token.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/payment-links/:link", get(payment_links::resolve_link))
        .route("/payment-links/:link/checkout", post(payment_links::checkout))
        .route("/guest/inscriptions", post(guest::create_guest))
        .route("/webhooks/gateway", post(webhooks::gateway_webhook))
}

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/regions", regions::router())
        .nest("/accounts", accounts::router())
        .nest("/events", events::router())
        .nest("/inscriptions", inscriptions::router())
        .nest("/payments", payments::router())
        .merge(payment_links::router())
        .nest("/tickets", tickets::router())
        .nest("/cash-registers", cash_registers::router())
        .nest("/reports", reports::router())
}
