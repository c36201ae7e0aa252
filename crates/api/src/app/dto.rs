use std::str::FromStr;

use axum::http::StatusCode;
use serde::Deserialize;

use regdesk_events::{EventId, EventStatus};
use regdesk_inscriptions::InscriptionId;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateRegionRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct EventStatusRequest {
    pub status: EventStatus,
}

#[derive(Debug, Deserialize)]
pub struct TogglePaymentsRequest {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct RejectPaymentRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentLinkRequest {
    pub inscription_id: InscriptionId,
}

#[derive(Debug, Deserialize)]
pub struct AllocateEventRequest {
    pub event_id: EventId,
}

/// Query of `POST /inscriptions/group/upload`; the CSV travels as the body.
#[derive(Debug, Deserialize)]
pub struct GroupUploadQuery {
    pub event_id: EventId,
    pub responsible: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EventQuery {
    pub event_id: EventId,
}

// -------------------------
// Path parsing
// -------------------------

/// Parses a path segment into a typed id, answering 400 on failure.
pub fn parse_id<T: FromStr>(raw: &str) -> Result<T, axum::response::Response> {
    raw.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid id: {raw}")))
}
