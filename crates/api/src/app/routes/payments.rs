use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};

use regdesk_app::{ActorContext, AppServices, PaymentRequest};
use regdesk_events::EventId;
use regdesk_payments::PaymentId;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/create", post(create_payment))
        .route("/event/:event_id", get(list_by_event))
        .route("/:id", get(get_payment).delete(delete_payment))
        .route("/:id/approve", patch(approve_payment))
        .route("/:id/reject", patch(reject_payment))
        .route("/:id/revert", patch(revert_payment))
}

fn payment_id(raw: &str) -> Result<PaymentId, Response> {
    dto::parse_id(raw)
}

pub async fn create_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<PaymentRequest>,
) -> Response {
    errors::respond(StatusCode::CREATED, services.create_payment(&actor, body).await)
}

pub async fn list_by_event(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(event_id): Path<String>,
) -> Response {
    let event_id: EventId = match dto::parse_id(&event_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    errors::respond_items(services.list_event_payments(&actor, event_id).await)
}

pub async fn get_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id = match payment_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.find_payment(&actor, id).await)
}

pub async fn approve_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id = match payment_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.approve_payment(&actor, id).await)
}

pub async fn reject_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RejectPaymentRequest>,
) -> Response {
    let id = match payment_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.reject_payment(&actor, id, &body.reason).await)
}

pub async fn revert_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id = match payment_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.revert_payment(&actor, id).await)
}

pub async fn delete_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id = match payment_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.delete_payment(&actor, id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::usecase_error(e),
    }
}
