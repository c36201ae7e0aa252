use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::{patch, post},
};

use regdesk_app::{ActorContext, AppServices, CheckoutRequest};
use regdesk_payments::PaymentLinkId;

use crate::app::{dto, errors};

/// Authenticated link management. Resolve and checkout are public, see [`super::public_router`].
pub fn router() -> Router {
    Router::new()
        .route("/payment-links/create", post(create_link))
        .route("/payment-links/:link/revoke", patch(revoke_link))
}

pub async fn create_link(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::CreatePaymentLinkRequest>,
) -> Response {
    errors::respond(
        StatusCode::CREATED,
        services.create_payment_link(&actor, body.inscription_id).await,
    )
}

pub async fn revoke_link(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(link): Path<String>,
) -> Response {
    let id: PaymentLinkId = match dto::parse_id(&link) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.revoke_payment_link(&actor, id).await)
}

/// Public: what the link holder is about to pay.
pub async fn resolve_link(Extension(services): Extension<Arc<AppServices>>, Path(link): Path<String>) -> Response {
    errors::respond(StatusCode::OK, services.resolve_payment_link(&link).await)
}

/// Public: opens the gateway charge for the link.
pub async fn checkout(
    Extension(services): Extension<Arc<AppServices>>,
    Path(link): Path<String>,
    Json(body): Json<CheckoutRequest>,
) -> Response {
    errors::respond(StatusCode::CREATED, services.checkout(&link, body).await)
}
