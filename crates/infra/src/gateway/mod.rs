//! Payment gateway client and webhook payloads.

mod http;

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use regdesk_core::Money;
use regdesk_payments::{InstallmentId, PaymentId, PaymentMethod};

pub use http::HttpPaymentGateway;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("gateway rejected the charge: {0}")]
    Rejected(String),

    #[error("gateway unavailable: {0}")]
    Unavailable(String),

    #[error("unexpected gateway response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChargeInstallment {
    pub installment_id: InstallmentId,
    pub number: u32,
    pub value: Money,
    pub due_on: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChargeRequest {
    pub payment_id: PaymentId,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub method: PaymentMethod,
    pub total: Money,
    pub description: String,
    pub installments: Vec<ChargeInstallment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChargeResponse {
    pub charge_reference: String,
    pub checkout_url: String,
    /// One reference per requested installment, in the same order.
    pub installment_references: Vec<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_charge(&self, request: ChargeRequest) -> Result<ChargeResponse, GatewayError>;
}

/// Gateway stand-in used when no gateway URL is configured, and in tests.
#[derive(Default)]
pub struct FakePaymentGateway {
    charges: Mutex<Vec<ChargeRequest>>,
}

impl FakePaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests received so far.
    pub fn charges(&self) -> Vec<ChargeRequest> {
        self.charges.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PaymentGateway for FakePaymentGateway {
    async fn create_charge(&self, request: ChargeRequest) -> Result<ChargeResponse, GatewayError> {
        let charge_reference = format!("fake_{}", request.payment_id.as_uuid().simple());
        let installment_references = request
            .installments
            .iter()
            .map(|i| format!("{charge_reference}_{}", i.number))
            .collect();
        info!(
            payment_id = %request.payment_id,
            total = request.total.cents(),
            installments = request.installments.len(),
            "fake gateway charge created"
        );
        self.charges
            .lock()
            .map_err(|_| GatewayError::Unavailable("fake gateway lock poisoned".to_string()))?
            .push(request);
        Ok(ChargeResponse {
            checkout_url: format!("https://checkout.example.invalid/{charge_reference}"),
            charge_reference,
            installment_references,
        })
    }
}

/// Notification body posted by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayWebhook {
    pub event: String,
    pub payment: WebhookPayment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayment {
    /// Installment reference as returned in [`ChargeResponse::installment_references`].
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    Confirmed,
    Received,
    Overdue,
    Refunded,
    Other(String),
}

impl GatewayWebhook {
    pub fn kind(&self) -> WebhookEvent {
        match self.event.as_str() {
            "PAYMENT_CONFIRMED" => WebhookEvent::Confirmed,
            "PAYMENT_RECEIVED" => WebhookEvent::Received,
            "PAYMENT_OVERDUE" => WebhookEvent::Overdue,
            "PAYMENT_REFUNDED" => WebhookEvent::Refunded,
            other => WebhookEvent::Other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_events_are_classified() {
        let body = r#"{"event":"PAYMENT_RECEIVED","payment":{"id":"pay_1"}}"#;
        let webhook: GatewayWebhook = serde_json::from_str(body).unwrap();
        assert_eq!(webhook.kind(), WebhookEvent::Received);
        assert_eq!(webhook.payment.id, "pay_1");
        assert!(webhook.payment.status.is_none());

        let other = GatewayWebhook {
            event: "PAYMENT_CREATED".to_string(),
            payment: webhook.payment,
        };
        assert_eq!(other.kind(), WebhookEvent::Other("PAYMENT_CREATED".to_string()));
    }

    #[tokio::test]
    async fn fake_gateway_returns_one_reference_per_installment() {
        let gateway = FakePaymentGateway::new();
        let payment_id = PaymentId::new();
        let installments = (1..=3)
            .map(|number| ChargeInstallment {
                installment_id: InstallmentId::new(),
                number,
                value: Money::from_cents(1_000),
                due_on: NaiveDate::from_ymd_opt(2026, number, 10).unwrap(),
            })
            .collect();
        let response = gateway
            .create_charge(ChargeRequest {
                payment_id,
                customer_name: "Ana".to_string(),
                customer_email: None,
                method: PaymentMethod::CreditCard,
                total: Money::from_cents(3_000),
                description: "Inscrição".to_string(),
                installments,
            })
            .await
            .unwrap();

        assert_eq!(response.installment_references.len(), 3);
        assert!(response.installment_references[2].ends_with("_3"));
        assert_eq!(gateway.charges().len(), 1);
    }
}
