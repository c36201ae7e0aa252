use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::Response,
    routing::post,
};

use regdesk_app::{ActorContext, AppServices};

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/", post(create_region).get(list_regions))
}

pub async fn create_region(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::CreateRegionRequest>,
) -> Response {
    errors::respond(StatusCode::CREATED, services.create_region(&actor, &body.name).await)
}

pub async fn list_regions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
) -> Response {
    errors::respond_items(services.list_regions(&actor).await)
}
