//! Use-case error model.
//!
//! Every failure a use case reports carries a stable machine `code`, a
//! technical `message` for logs and a `user_message` safe to show to end
//! users. The HTTP layer maps [`ErrorKind`] to a status code.

use core::fmt;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::error;

use regdesk_auth::AuthzError;
use regdesk_core::DomainError;
use regdesk_infra::{CacheError, GatewayError, StoreError};
use regdesk_inscriptions::GroupUploadError;

pub type UsecaseResult<T> = Result<T, UsecaseError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Validation,
    Conflict,
    Gateway,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{code}: {message}")]
pub struct UsecaseError {
    pub kind: ErrorKind,
    pub code: &'static str,
    pub message: String,
    pub user_message: String,
    pub context: Map<String, Value>,
}

pub const INVARIANT_VIOLATION: &str = "invariant_violation";

impl UsecaseError {
    pub fn new(
        kind: ErrorKind,
        code: &'static str,
        message: impl Into<String>,
        user_message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
            user_message: user_message.into(),
            context: Map::new(),
        }
    }

    pub fn with_context(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }

    /// Business rule rejections that the API reports as 422.
    pub fn is_invariant(&self) -> bool {
        self.code == INVARIANT_VIOLATION
    }

    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorKind::Validation, "validation_error", message.clone(), message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Forbidden,
            "forbidden",
            message,
            "Você não tem permissão para executar esta ação.",
        )
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorKind::Conflict, INVARIANT_VIOLATION, message.clone(), message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Internal,
            "internal_error",
            message,
            "Erro interno. Tente novamente mais tarde.",
        )
    }

    fn not_found(code: &'static str, entity: &str, id: impl fmt::Display, user_message: &str) -> Self {
        Self::new(ErrorKind::NotFound, code, format!("{entity} {id} not found"), user_message)
            .with_context("id", id.to_string())
    }

    pub fn region_not_found(id: impl fmt::Display) -> Self {
        Self::not_found("region_not_found", "region", id, "Região não encontrada.")
    }

    pub fn account_not_found(id: impl fmt::Display) -> Self {
        Self::not_found("account_not_found", "account", id, "Conta não encontrada.")
    }

    pub fn participant_not_found(id: impl fmt::Display) -> Self {
        Self::not_found("participant_not_found", "participant", id, "Participante não encontrado.")
    }

    pub fn event_not_found(id: impl fmt::Display) -> Self {
        Self::not_found("event_not_found", "event", id, "Evento não encontrado.")
    }

    pub fn type_inscription_not_found(id: impl fmt::Display) -> Self {
        Self::not_found(
            "type_inscription_not_found",
            "inscription type",
            id,
            "Tipo de inscrição não encontrado.",
        )
    }

    pub fn ticket_not_found(id: impl fmt::Display) -> Self {
        Self::not_found("ticket_not_found", "ticket", id, "Ingresso não encontrado.")
    }

    pub fn ticket_sale_not_found(id: impl fmt::Display) -> Self {
        Self::not_found("ticket_sale_not_found", "ticket sale", id, "Venda de ingresso não encontrada.")
    }

    pub fn inscription_not_found(id: impl fmt::Display) -> Self {
        Self::not_found("inscription_not_found", "inscription", id, "Inscrição não encontrada.")
    }

    pub fn payment_not_found(id: impl fmt::Display) -> Self {
        Self::not_found("payment_not_found", "payment", id, "Pagamento não encontrado.")
    }

    pub fn payment_link_not_found(id: impl fmt::Display) -> Self {
        Self::not_found("payment_link_not_found", "payment link", id, "Link de pagamento não encontrado.")
    }

    pub fn cash_register_not_found(id: impl fmt::Display) -> Self {
        Self::not_found("cash_register_not_found", "cash register", id, "Caixa não encontrado.")
    }

    pub fn cache_record_not_found(key: &str) -> Self {
        Self::new(
            ErrorKind::NotFound,
            "cache_record_not_found",
            format!("cache record {key} not found"),
            "Pré-inscrição não encontrada ou já confirmada.",
        )
        .with_context("key", key)
    }

    pub fn cache_record_expired(key: &str) -> Self {
        Self::new(
            ErrorKind::Validation,
            "cache_record_expired",
            format!("cache record {key} expired"),
            "A pré-inscrição expirou. Envie os dados novamente.",
        )
        .with_context("key", key)
    }

    pub fn cache_record_forbidden(key: &str) -> Self {
        Self::new(
            ErrorKind::Forbidden,
            "cache_record_forbidden",
            format!("cache record {key} belongs to another account"),
            "Esta pré-inscrição pertence a outra conta.",
        )
        .with_context("key", key)
    }

    pub fn event_not_accepting_inscriptions(id: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::Conflict,
            INVARIANT_VIOLATION,
            format!("event {id} is not accepting inscriptions"),
            "O evento não está aceitando inscrições.",
        )
        .with_context("event_id", id.to_string())
    }

    pub fn payments_disabled(id: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::Conflict,
            INVARIANT_VIOLATION,
            format!("payments are disabled for event {id}"),
            "Os pagamentos estão desabilitados para este evento.",
        )
        .with_context("event_id", id.to_string())
    }

    pub fn tickets_disabled(id: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::Conflict,
            INVARIANT_VIOLATION,
            format!("ticket sales are disabled for event {id}"),
            "A venda de ingressos está desabilitada para este evento.",
        )
        .with_context("event_id", id.to_string())
    }

    pub fn payment_link_unusable(token: &str, status: &str) -> Self {
        Self::new(
            ErrorKind::Conflict,
            INVARIANT_VIOLATION,
            format!("payment link is {status}"),
            "Este link de pagamento não está mais disponível.",
        )
        .with_context("token", token)
        .with_context("status", status)
    }

    pub fn webhook_unauthorized() -> Self {
        Self::new(
            ErrorKind::Forbidden,
            "webhook_unauthorized",
            "webhook token mismatch",
            "Acesso negado.",
        )
    }
}

impl From<DomainError> for UsecaseError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => Self::validation(msg),
            DomainError::InvariantViolation(msg) => Self::invariant(msg),
            DomainError::InvalidId(msg) => {
                Self::new(ErrorKind::Validation, "invalid_id", msg, "Identificador inválido.")
            }
            DomainError::NotFound => {
                Self::new(ErrorKind::NotFound, "not_found", "not found", "Registro não encontrado.")
            }
            DomainError::Conflict(msg) => {
                let user = msg.clone();
                Self::new(ErrorKind::Conflict, "conflict", msg, user)
            }
            DomainError::Forbidden(msg) => Self::forbidden(msg),
        }
    }
}

impl From<StoreError> for UsecaseError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => {
                Self::new(ErrorKind::NotFound, "not_found", "row not found", "Registro não encontrado.")
            }
            StoreError::Conflict(msg) => Self::new(
                ErrorKind::Conflict,
                "conflict",
                msg,
                "O registro entra em conflito com um já existente.",
            ),
            StoreError::Backend(msg) | StoreError::Serialization(msg) => {
                error!(error = %msg, "store failure");
                Self::new(ErrorKind::Internal, "store_error", msg, "Erro interno. Tente novamente mais tarde.")
            }
        }
    }
}

impl From<CacheError> for UsecaseError {
    fn from(err: CacheError) -> Self {
        error!(error = %err, "cache failure");
        Self::new(
            ErrorKind::Internal,
            "cache_error",
            err.to_string(),
            "Erro interno. Tente novamente mais tarde.",
        )
    }
}

impl From<GatewayError> for UsecaseError {
    fn from(err: GatewayError) -> Self {
        let user_message = match &err {
            GatewayError::Rejected(_) => "O pagamento foi recusado pela operadora.",
            GatewayError::Unavailable(_) | GatewayError::InvalidResponse(_) => {
                "Serviço de pagamento indisponível. Tente novamente mais tarde."
            }
        };
        Self::new(ErrorKind::Gateway, "gateway_error", err.to_string(), user_message)
    }
}

impl From<AuthzError> for UsecaseError {
    fn from(err: AuthzError) -> Self {
        Self::forbidden(err.to_string())
    }
}

impl From<GroupUploadError> for UsecaseError {
    fn from(err: GroupUploadError) -> Self {
        let base = Self::new(
            ErrorKind::Validation,
            "group_upload_invalid",
            err.to_string(),
            "O arquivo enviado contém erros.",
        );
        match err {
            GroupUploadError::Lines(lines) => {
                let lines = lines
                    .into_iter()
                    .map(|l| serde_json::json!({ "line": l.line, "message": l.message }))
                    .collect::<Vec<_>>();
                base.with_context("lines", lines)
            }
            GroupUploadError::InvalidHeader(msg) => base.with_context("header", msg),
            GroupUploadError::Empty => base,
        }
    }
}
