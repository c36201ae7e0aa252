use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use super::{ChargeRequest, ChargeResponse, GatewayError, PaymentGateway};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// JSON-over-HTTP gateway client (`POST {base_url}/charges`).
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ChargeBody {
    id: String,
    checkout_url: String,
    #[serde(default)]
    installments: Vec<InstallmentBody>,
}

#[derive(Debug, Deserialize)]
struct InstallmentBody {
    id: String,
}

impl HttpPaymentGateway {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self, request), fields(payment_id = %request.payment_id, total = request.total.cents()), err)]
    async fn create_charge(&self, request: ChargeRequest) -> Result<ChargeResponse, GatewayError> {
        let expected = request.installments.len();
        let response = self
            .client
            .post(format!("{}/charges", self.base_url))
            .header("access_token", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "gateway refused charge");
            return Err(if status.is_client_error() {
                GatewayError::Rejected(body)
            } else {
                GatewayError::Unavailable(format!("status {status}"))
            });
        }

        let body: ChargeBody = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        if body.installments.len() != expected {
            return Err(GatewayError::InvalidResponse(format!(
                "expected {expected} installment references, got {}",
                body.installments.len()
            )));
        }

        info!(charge = %body.id, "gateway charge created");
        Ok(ChargeResponse {
            charge_reference: body.id,
            checkout_url: body.checkout_url,
            installment_references: body.installments.into_iter().map(|i| i.id).collect(),
        })
    }
}
