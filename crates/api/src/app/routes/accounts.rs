use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};

use regdesk_accounts::{AccountParticipantId, NewAccount, NewAccountParticipant, UpdateAccountParticipant};
use regdesk_app::{ActorContext, AppServices};
use regdesk_core::AccountId;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_account).get(list_accounts))
        .route("/participants", post(create_participant).get(list_participants))
        .route("/participants/:id", patch(update_participant).delete(delete_participant))
        .route("/:id", get(get_account))
        .route("/:id/deactivate", patch(deactivate_account))
}

pub async fn create_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<NewAccount>,
) -> Response {
    errors::respond(StatusCode::CREATED, services.create_account(&actor, body).await)
}

pub async fn list_accounts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
) -> Response {
    errors::respond_items(services.list_accounts(&actor).await)
}

pub async fn get_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id: AccountId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.find_account(&actor, id).await)
}

pub async fn deactivate_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id: AccountId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.deactivate_account(&actor, id).await)
}

pub async fn create_participant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<NewAccountParticipant>,
) -> Response {
    errors::respond(StatusCode::CREATED, services.create_participant(&actor, body).await)
}

pub async fn list_participants(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
) -> Response {
    errors::respond_items(services.list_participants(&actor).await)
}

pub async fn update_participant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<UpdateAccountParticipant>,
) -> Response {
    let id: AccountParticipantId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.update_participant(&actor, id, body).await)
}

pub async fn delete_participant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id: AccountParticipantId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.delete_participant(&actor, id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::usecase_error(e),
    }
}
