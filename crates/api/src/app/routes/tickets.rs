use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::{get, patch, post},
};

use regdesk_app::{ActorContext, AppServices, SellTicket};
use regdesk_events::EventId;
use regdesk_tickets::TicketSaleId;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/sales", post(sell_ticket))
        .route("/sales/event/:event_id", get(list_sales))
        .route("/sales/:id/cancel", patch(cancel_sale))
}

pub async fn sell_ticket(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<SellTicket>,
) -> Response {
    errors::respond(StatusCode::CREATED, services.sell_ticket(&actor, body).await)
}

pub async fn list_sales(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(event_id): Path<String>,
) -> Response {
    let event_id: EventId = match dto::parse_id(&event_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    errors::respond_items(services.list_sales(&actor, event_id).await)
}

pub async fn cancel_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id: TicketSaleId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    errors::respond(StatusCode::OK, services.cancel_sale(&actor, id).await)
}
