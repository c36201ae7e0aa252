use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::{delete, get, patch, post},
};
use serde_json::json;

use regdesk_app::{ActorContext, AppServices, CashTransfer, ManualMovement, NewCashRegister};
use regdesk_events::EventId;
use regdesk_finance::CashRegisterId;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_register).get(list_registers))
        .route("/transfer", post(transfer))
        .route("/:id", get(get_register))
        .route("/:id/events", post(allocate_event))
        .route("/:id/events/:event_id", delete(deallocate_event))
        .route("/:id/movements", post(create_movement).get(list_movements))
        .route("/:id/close", patch(close_register))
}

fn register_id(raw: &str) -> Result<CashRegisterId, Response> {
    dto::parse_id(raw)
}

pub async fn create_register(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<NewCashRegister>,
) -> Response {
    errors::respond(StatusCode::CREATED, services.create_register(&actor, body).await)
}

pub async fn list_registers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
) -> Response {
    errors::respond_items(services.list_registers(&actor).await)
}

pub async fn get_register(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id = match register_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.find_register(&actor, id).await)
}

pub async fn allocate_event(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AllocateEventRequest>,
) -> Response {
    let id = match register_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.allocate_event(&actor, id, body.event_id).await)
}

pub async fn deallocate_event(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path((id, event_id)): Path<(String, String)>,
) -> Response {
    let id = match register_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let event_id: EventId = match dto::parse_id(&event_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.deallocate_event(&actor, id, event_id).await)
}

pub async fn create_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<ManualMovement>,
) -> Response {
    let id = match register_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::CREATED, services.create_movement(&actor, id, body).await)
}

pub async fn list_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id = match register_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    errors::respond_items(services.list_movements(&actor, id).await)
}

pub async fn transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<CashTransfer>,
) -> Response {
    errors::respond(
        StatusCode::CREATED,
        services
            .transfer(&actor, body)
            .await
            .map(|(expense, income)| json!({ "expense": expense, "income": income })),
    )
}

pub async fn close_register(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id = match register_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.close_register(&actor, id).await)
}
