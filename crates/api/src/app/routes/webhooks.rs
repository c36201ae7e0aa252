use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::Response,
};
use serde_json::json;

use regdesk_app::AppServices;
use regdesk_infra::GatewayWebhook;

use crate::app::errors;

/// Shared secret the gateway sends with every notification.
pub const WEBHOOK_TOKEN_HEADER: &str = "x-webhook-token";

pub async fn gateway_webhook(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    Json(body): Json<GatewayWebhook>,
) -> Response {
    let token = headers.get(WEBHOOK_TOKEN_HEADER).and_then(|v| v.to_str().ok());
    errors::respond(
        StatusCode::OK,
        services
            .handle_webhook(token, body)
            .await
            .map(|outcome| json!({ "outcome": outcome })),
    )
}
