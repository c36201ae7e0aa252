use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use regdesk_app::ActorContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(actor): Extension<ActorContext>) -> impl IntoResponse {
    Json(serde_json::json!({
        "account_id": actor.account_id().to_string(),
        "role": actor.role().as_str(),
        "region_id": actor.region_id().map(|id| id.to_string()),
        "permissions": actor.permissions().iter().map(|p| p.as_str()).collect::<Vec<_>>(),
    }))
}
