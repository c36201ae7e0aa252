use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Query},
    http::StatusCode,
    response::Response,
};

use regdesk_app::{AppServices, GuestInscription};

use crate::app::{dto, errors};

/// Public: registers without an account and answers with a payment link when there is something to pay.
pub async fn create_guest(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::EventQuery>,
    Json(body): Json<GuestInscription>,
) -> Response {
    errors::respond(StatusCode::CREATED, services.create_guest(query.event_id, body).await)
}
