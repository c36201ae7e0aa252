use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
};

use regdesk_app::{ActorContext, AppServices};
use regdesk_events::{EventId, NewEvent, NewEventTicket, NewTypeInscription, TypeInscriptionId, UpdateEvent};

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_events))
        .route("/create", post(create_event))
        .route("/:id", get(get_event).delete(delete_event))
        .route("/:id/update", patch(update_event))
        .route("/:id/update/payments", patch(toggle_payments))
        .route("/:id/status", patch(change_status))
        .route("/:id/types", post(create_type).get(list_types))
        .route("/:id/types/:type_id", delete(delete_type))
        .route("/:id/tickets", post(create_ticket).get(list_tickets))
}

fn event_id(raw: &str) -> Result<EventId, Response> {
    dto::parse_id(raw)
}

pub async fn create_event(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<NewEvent>,
) -> Response {
    errors::respond(StatusCode::CREATED, services.create_event(&actor, body).await)
}

pub async fn list_events(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
) -> Response {
    errors::respond_items(services.list_events(&actor).await)
}

pub async fn get_event(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id = match event_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.find_event(&actor, id).await)
}

pub async fn update_event(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<UpdateEvent>,
) -> Response {
    let id = match event_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.update_event(&actor, id, body).await)
}

pub async fn toggle_payments(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::TogglePaymentsRequest>,
) -> Response {
    let id = match event_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.set_event_payments(&actor, id, body.enabled).await)
}

pub async fn change_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::EventStatusRequest>,
) -> Response {
    let id = match event_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.change_event_status(&actor, id, body.status).await)
}

pub async fn delete_event(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id = match event_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.delete_event(&actor, id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::usecase_error(e),
    }
}

pub async fn create_type(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<NewTypeInscription>,
) -> Response {
    let id = match event_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::CREATED, services.create_type_inscription(&actor, id, body).await)
}

pub async fn list_types(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id = match event_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    errors::respond_items(services.list_type_inscriptions(&actor, id).await)
}

pub async fn delete_type(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path((id, type_id)): Path<(String, String)>,
) -> Response {
    let id = match event_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let type_id: TypeInscriptionId = match dto::parse_id(&type_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.delete_type_inscription(&actor, id, type_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::usecase_error(e),
    }
}

pub async fn create_ticket(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<NewEventTicket>,
) -> Response {
    let id = match event_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::CREATED, services.create_ticket(&actor, id, body).await)
}

pub async fn list_tickets(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id = match event_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    errors::respond_items(services.list_tickets(&actor, id).await)
}
