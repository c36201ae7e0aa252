//! PDF reports.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path},
    response::Response,
    routing::get,
};

use regdesk_app::{ActorContext, AppServices};
use regdesk_events::EventId;
use regdesk_finance::CashRegisterId;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/events/:id/inscriptions", get(event_inscriptions))
        .route("/events/:id/financial", get(event_financial))
        .route("/cash-registers/:id/statement", get(cash_statement))
}

pub async fn event_inscriptions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id: EventId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.event_inscriptions_report(&actor, id).await {
        Ok(report) => errors::pdf_response(report.to_pdf(), &format!("inscricoes-{id}.pdf")),
        Err(e) => errors::usecase_error(e),
    }
}

pub async fn event_financial(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id: EventId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.event_financial_report(&actor, id).await {
        Ok(report) => errors::pdf_response(report.to_pdf(), &format!("financeiro-{id}.pdf")),
        Err(e) => errors::usecase_error(e),
    }
}

pub async fn cash_statement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id: CashRegisterId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.cash_statement_report(&actor, id).await {
        Ok(report) => errors::pdf_response(report.to_pdf(), &format!("extrato-{id}.pdf")),
        Err(e) => errors::usecase_error(e),
    }
}
