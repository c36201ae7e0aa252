use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};

use regdesk_app::{ActorContext, AppServices, GroupResponsible, IndividualInscription};
use regdesk_events::EventId;
use regdesk_inscriptions::InscriptionId;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/individual", post(stage_individual))
        .route("/group/upload", post(upload_group))
        .route("/cache/:key", get(get_cache).delete(cancel_cache))
        .route("/cache/:key/confirm", post(confirm_cache))
        .route("/mine", get(list_mine))
        .route("/event/:event_id", get(list_by_event))
        .route("/:id", get(get_inscription).delete(delete_inscription))
        .route("/:id/cancel", patch(cancel_inscription))
}

fn inscription_id(raw: &str) -> Result<InscriptionId, Response> {
    dto::parse_id(raw)
}

/// Stages the inscription; `POST /cache/:key/confirm` persists it.
pub async fn stage_individual(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Query(query): Query<dto::EventQuery>,
    Json(body): Json<IndividualInscription>,
) -> Response {
    errors::respond(
        StatusCode::CREATED,
        services.stage_individual(&actor, query.event_id, body).await,
    )
}

/// CSV body; contact data of the group's responsible in the query string.
pub async fn upload_group(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Query(query): Query<dto::GroupUploadQuery>,
    body: Bytes,
) -> Response {
    let contact = GroupResponsible {
        responsible: query.responsible,
        email: query.email,
        phone: query.phone,
    };
    errors::respond(
        StatusCode::CREATED,
        services.upload_group(&actor, query.event_id, contact, &body).await,
    )
}

pub async fn get_cache(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(key): Path<String>,
) -> Response {
    errors::respond(StatusCode::OK, services.find_cache(&actor, &key).await)
}

pub async fn confirm_cache(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(key): Path<String>,
) -> Response {
    errors::respond(StatusCode::CREATED, services.confirm_cache(&actor, &key).await)
}

pub async fn cancel_cache(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(key): Path<String>,
) -> Response {
    match services.cancel_cache(&actor, &key).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::usecase_error(e),
    }
}

pub async fn list_mine(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
) -> Response {
    errors::respond_items(services.list_my_inscriptions(&actor).await)
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
    errors::respond_items(services.list_event_inscriptions(&actor, event_id).await)
}

pub async fn get_inscription(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id = match inscription_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.find_inscription(&actor, id).await)
}

pub async fn cancel_inscription(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id = match inscription_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.cancel_inscription(&actor, id).await)
}

pub async fn delete_inscription(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id = match inscription_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.delete_inscription(&actor, id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::usecase_error(e),
    }
}
