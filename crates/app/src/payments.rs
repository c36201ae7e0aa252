//! Payments: manual receipts, review, payment links and the card gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use regdesk_auth::Permission;
use regdesk_core::Money;
use regdesk_events::EventId;
use regdesk_finance::{MovementKind, MovementOrigin};
use regdesk_infra::gateway::{ChargeInstallment, ChargeRequest};
use regdesk_infra::{GatewayError, GatewayWebhook, WebhookEvent};
use regdesk_inscriptions::{Inscription, InscriptionId, InscriptionStatus};
use regdesk_payments::{
    NewPayment, Payment, PaymentId, PaymentInstallment, PaymentLink, PaymentLinkId, PaymentLinkStatus, PaymentMethod,
    PaymentOrigin, PaymentStatus, split_installments,
};

use crate::context::ActorContext;
use crate::error::{UsecaseError, UsecaseResult};
use crate::services::AppServices;

#[derive(Debug, Clone, Deserialize)]
pub struct AllocationRequest {
    pub inscription_id: InscriptionId,
    pub value: Money,
}

/// Manual payment with an uploaded receipt, split across inscriptions.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRequest {
    pub event_id: EventId,
    pub method: PaymentMethod,
    #[serde(default)]
    pub receipt_url: Option<String>,
    pub allocations: Vec<AllocationRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub method: PaymentMethod,
    #[serde(default = "single_installment")]
    pub installments: u32,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
}

fn single_installment() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResult {
    pub payment_id: PaymentId,
    pub checkout_url: String,
    pub installments: Vec<PaymentInstallment>,
}

/// What a payment link shows to whoever holds its token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentLinkSummary {
    pub token: String,
    pub status: PaymentLinkStatus,
    pub value: Money,
    pub expires_at: DateTime<Utc>,
    pub event_id: EventId,
    pub event_name: String,
    pub inscription_id: InscriptionId,
    pub responsible: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    Ignored,
    Duplicate,
    InstallmentUpdated,
    PaymentApproved,
    PaymentReverted,
}

impl AppServices {
    #[instrument(skip(self, actor, input), fields(event_id = %input.event_id), err)]
    pub async fn create_payment(&self, actor: &ActorContext, input: PaymentRequest) -> UsecaseResult<Payment> {
        actor.require(&Permission::PAYMENTS_CREATE)?;
        let event = self.load_event(input.event_id).await?;
        if !event.payment_enabled() {
            return Err(UsecaseError::payments_disabled(input.event_id));
        }
        if actor.is_staff() {
            actor.ensure_region(event.region_id())?;
        }

        let mut inscriptions = Vec::with_capacity(input.allocations.len());
        let mut total = Money::zero();
        for allocation in &input.allocations {
            let inscription = self.load_inscription(allocation.inscription_id).await?;
            if inscription.event_id() != input.event_id {
                return Err(UsecaseError::validation("inscription belongs to another event")
                    .with_context("inscription_id", allocation.inscription_id.to_string()));
            }
            if !actor.is_staff() && !inscription.is_owned_by(actor.account_id()) {
                return Err(UsecaseError::forbidden("inscription belongs to another account")
                    .with_context("inscription_id", allocation.inscription_id.to_string()));
            }
            ensure_payable(&inscription, allocation.value)?;
            total = total.checked_add(allocation.value)?;
            inscriptions.push(inscription);
        }

        let payment = Payment::create(
            NewPayment {
                event_id: input.event_id,
                account_id: Some(actor.account_id()),
                method: input.method,
                origin: PaymentOrigin::Manual,
                total_value: total,
                receipt_url: input.receipt_url,
                gateway_reference: None,
                allocations: input
                    .allocations
                    .iter()
                    .map(|a| (a.inscription_id, a.value))
                    .collect(),
            },
            self.now(),
        )?;

        for inscription in &mut inscriptions {
            inscription.mark_under_review()?;
        }
        self.stores.payments.insert_payment(&payment).await?;
        for inscription in &inscriptions {
            self.stores.inscriptions.update_inscription(inscription).await?;
        }
        info!(
            payment_id = %payment.id_typed(),
            total = total.cents(),
            method = payment.method().as_str(),
            "payment submitted for review"
        );
        Ok(payment)
    }

    pub async fn approve_payment(&self, actor: &ActorContext, id: PaymentId) -> UsecaseResult<Payment> {
        let mut payment = self.load_payment_for_review(actor, id).await?;
        self.settle_approval(&mut payment).await?;
        Ok(payment)
    }

    pub async fn reject_payment(&self, actor: &ActorContext, id: PaymentId, reason: &str) -> UsecaseResult<Payment> {
        let mut payment = self.load_payment_for_review(actor, id).await?;
        payment.reject(reason, self.now())?;
        self.stores.payments.update_payment(&payment).await?;
        self.release_review(&payment).await?;
        info!(payment_id = %id, reason, "payment refused");
        Ok(payment)
    }

    pub async fn revert_payment(&self, actor: &ActorContext, id: PaymentId) -> UsecaseResult<Payment> {
        let mut payment = self.load_payment_for_review(actor, id).await?;
        self.settle_reversal(&mut payment).await?;
        Ok(payment)
    }

    /// Submitter or reviewer; approved payments must be reverted first.
    pub async fn delete_payment(&self, actor: &ActorContext, id: PaymentId) -> UsecaseResult<()> {
        let payment = self.load_visible_payment(actor, id).await?;
        if payment.account_id() != Some(actor.account_id()) {
            actor.require(&Permission::PAYMENTS_REVIEW)?;
        }
        payment.ensure_deletable()?;

        self.stores.payments.delete_payment(id).await?;
        if payment.status() == PaymentStatus::UnderReview {
            self.release_review(&payment).await?;
        }
        info!(payment_id = %id, "payment deleted");
        Ok(())
    }

    pub async fn list_event_payments(&self, actor: &ActorContext, event_id: EventId) -> UsecaseResult<Vec<Payment>> {
        self.load_event_for_staff(actor, event_id, &Permission::PAYMENTS_REVIEW)
            .await?;
        Ok(self.stores.payments.list_payments_by_event(event_id).await?)
    }

    pub async fn find_payment(&self, actor: &ActorContext, id: PaymentId) -> UsecaseResult<Payment> {
        self.load_visible_payment(actor, id).await
    }

    /// Link for the inscription's outstanding balance.
    pub async fn create_payment_link(
        &self,
        actor: &ActorContext,
        inscription_id: InscriptionId,
    ) -> UsecaseResult<PaymentLink> {
        actor.require(&Permission::PAYMENTS_CREATE)?;
        let inscription = self.load_visible_inscription(actor, inscription_id).await?;
        let event = self.load_event(inscription.event_id()).await?;
        if !event.payment_enabled() {
            return Err(UsecaseError::payments_disabled(event.id_typed()));
        }
        if !inscription.accepts_payments() || !inscription.remaining().is_positive() {
            return Err(UsecaseError::invariant(format!(
                "inscription is {} with {} outstanding",
                inscription.status().as_str(),
                inscription.remaining()
            ))
            .with_context("inscription_id", inscription_id.to_string()));
        }

        let link = PaymentLink::create(
            event.id_typed(),
            inscription_id,
            inscription.remaining(),
            self.settings.link_ttl,
            self.now(),
        )?;
        self.stores.links.insert_link(&link).await?;
        info!(
            link_id = %link.id_typed(),
            inscription_id = %inscription_id,
            value = link.value().cents(),
            "payment link created"
        );
        Ok(link)
    }

    pub async fn resolve_payment_link(&self, token: &str) -> UsecaseResult<PaymentLinkSummary> {
        let link = self.load_link_by_token(token).await?;
        let inscription = self.load_inscription(link.inscription_id()).await?;
        let event = self.load_event(link.event_id()).await?;
        Ok(PaymentLinkSummary {
            token: link.token().to_string(),
            status: link.effective_status(self.now()),
            value: link.value(),
            expires_at: link.expires_at(),
            event_id: event.id_typed(),
            event_name: event.name().to_string(),
            inscription_id: inscription.id_typed(),
            responsible: inscription.responsible().to_string(),
        })
    }

    pub async fn revoke_payment_link(&self, actor: &ActorContext, id: PaymentLinkId) -> UsecaseResult<PaymentLink> {
        let mut link = self
            .stores
            .links
            .get_link(id)
            .await?
            .ok_or_else(|| UsecaseError::payment_link_not_found(id))?;
        let inscription = self.load_visible_inscription(actor, link.inscription_id()).await?;
        if !inscription.is_owned_by(actor.account_id()) {
            actor.require(&Permission::PAYMENTS_REVIEW)?;
        }
        link.revoke()?;
        self.stores.links.update_link(&link).await?;
        info!(link_id = %id, "payment link revoked");
        Ok(link)
    }

    /// Open a gateway charge for the link's value. The link is consumed.
    #[instrument(skip(self, token, request), fields(method = request.method.as_str()), err)]
    pub async fn checkout(&self, token: &str, request: CheckoutRequest) -> UsecaseResult<CheckoutResult> {
        let now = self.now();
        let mut link = self.load_link_by_token(token).await?;
        if !link.is_usable(now) {
            return Err(UsecaseError::payment_link_unusable(
                token,
                link.effective_status(now).as_str(),
            ));
        }
        if request.installments != 1 && !request.method.allows_installments() {
            return Err(UsecaseError::validation(format!(
                "{} payments are charged in a single installment",
                request.method.as_str()
            )));
        }

        let mut inscription = self.load_inscription(link.inscription_id()).await?;
        let event = self.load_event(link.event_id()).await?;
        if !event.payment_enabled() {
            return Err(UsecaseError::payments_disabled(event.id_typed()));
        }
        ensure_payable(&inscription, link.value())?;

        let mut payment = Payment::create(
            NewPayment {
                event_id: event.id_typed(),
                account_id: inscription.account_id(),
                method: request.method,
                origin: PaymentOrigin::Gateway,
                total_value: link.value(),
                receipt_url: None,
                gateway_reference: None,
                allocations: vec![(inscription.id_typed(), link.value())],
            },
            now,
        )?;
        let mut installments = split_installments(
            payment.id_typed(),
            link.value(),
            request.installments,
            self.settings.max_installments,
            now.date_naive(),
            self.settings.fee_bps,
        )?;

        let charge = self
            .gateway
            .create_charge(ChargeRequest {
                payment_id: payment.id_typed(),
                customer_name: request
                    .customer_name
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| inscription.responsible().to_string()),
                customer_email: request.customer_email.or_else(|| inscription.email().map(str::to_string)),
                method: request.method,
                total: link.value(),
                description: format!("Inscrição {}", event.name()),
                installments: installments
                    .iter()
                    .map(|i| ChargeInstallment {
                        installment_id: i.id_typed(),
                        number: i.number(),
                        value: i.value(),
                        due_on: i.due_on(),
                    })
                    .collect(),
            })
            .await?;
        if charge.installment_references.len() != installments.len() {
            return Err(GatewayError::InvalidResponse(format!(
                "expected {} installment references, got {}",
                installments.len(),
                charge.installment_references.len()
            ))
            .into());
        }

        for (installment, reference) in installments.iter_mut().zip(&charge.installment_references) {
            installment.set_gateway_reference(reference.as_str());
        }
        payment.attach_installments(installments)?;
        payment.link_gateway_charge(charge.charge_reference.as_str())?;
        inscription.mark_under_review()?;
        link.mark_used(now)?;

        self.stores.payments.insert_payment(&payment).await?;
        self.stores.inscriptions.update_inscription(&inscription).await?;
        self.stores.links.update_link(&link).await?;
        info!(
            payment_id = %payment.id_typed(),
            charge = charge.charge_reference.as_str(),
            installments = payment.installments().len(),
            "gateway checkout opened"
        );
        Ok(CheckoutResult {
            payment_id: payment.id_typed(),
            checkout_url: charge.checkout_url,
            installments: payment.installments().to_vec(),
        })
    }

    /// Apply a gateway notification. Repeated notifications are no-ops.
    #[instrument(
        skip(self, token, webhook),
        fields(event = webhook.event.as_str(), reference = webhook.payment.id.as_str()),
        err
    )]
    pub async fn handle_webhook(&self, token: Option<&str>, webhook: GatewayWebhook) -> UsecaseResult<WebhookOutcome> {
        match (self.settings.webhook_token.as_deref(), token) {
            (Some(expected), Some(given)) if expected == given => {}
            (None, _) => {
                warn!("webhook received but no webhook token is configured");
                return Err(UsecaseError::webhook_unauthorized());
            }
            _ => return Err(UsecaseError::webhook_unauthorized()),
        }

        let reference = webhook.payment.id.as_str();
        let Some(mut payment) = self
            .stores
            .payments
            .find_payment_by_installment_reference(reference)
            .await?
        else {
            warn!("webhook for unknown installment reference");
            return Ok(WebhookOutcome::Ignored);
        };

        let now = self.now();
        let kind = webhook.kind();
        let changed = {
            let Some(installment) = payment.installment_by_reference_mut(reference) else {
                return Ok(WebhookOutcome::Ignored);
            };
            match &kind {
                WebhookEvent::Confirmed | WebhookEvent::Received => installment.mark_paid(now)?,
                WebhookEvent::Overdue => installment.mark_overdue(),
                WebhookEvent::Refunded => installment.mark_refunded(),
                WebhookEvent::Other(name) => {
                    info!(event = name.as_str(), "webhook event ignored");
                    return Ok(WebhookOutcome::Ignored);
                }
            }
        };
        if !changed {
            return Ok(WebhookOutcome::Duplicate);
        }

        let outcome = match kind {
            WebhookEvent::Confirmed | WebhookEvent::Received
                if payment.all_installments_paid() && payment.status() == PaymentStatus::UnderReview =>
            {
                self.settle_approval(&mut payment).await?;
                WebhookOutcome::PaymentApproved
            }
            WebhookEvent::Refunded if payment.status() == PaymentStatus::Approved => {
                self.settle_reversal(&mut payment).await?;
                WebhookOutcome::PaymentReverted
            }
            _ => {
                self.stores.payments.update_payment(&payment).await?;
                WebhookOutcome::InstallmentUpdated
            }
        };
        info!(payment_id = %payment.id_typed(), outcome = ?outcome, "webhook applied");
        Ok(outcome)
    }

    /// Approve and credit inscriptions, event and cash register.
    async fn settle_approval(&self, payment: &mut Payment) -> UsecaseResult<()> {
        payment.approve(self.now())?;

        let mut inscriptions = Vec::with_capacity(payment.allocations().len());
        for allocation in payment.allocations() {
            let mut inscription = self.load_inscription(allocation.inscription_id).await?;
            inscription.register_payment(allocation.value)?;
            if inscription.status() == InscriptionStatus::Pending
                && self.under_other_review(allocation.inscription_id, payment.id_typed()).await?
            {
                inscription.mark_under_review()?;
            }
            inscriptions.push(inscription);
        }
        let mut event = self.load_event(payment.event_id()).await?;
        event.add_collected(payment.total_value())?;

        self.post_event_movement(
            payment.event_id(),
            MovementKind::Income,
            MovementOrigin::InscriptionPayment,
            payment.total_value(),
            format!("Pagamento {}", payment.id_typed()),
            *payment.id_typed().as_uuid(),
        )
        .await?;

        for inscription in &inscriptions {
            self.stores.inscriptions.update_inscription(inscription).await?;
        }
        self.stores.events.update_event(&event).await?;
        self.stores.payments.update_payment(payment).await?;
        info!(
            payment_id = %payment.id_typed(),
            total = payment.total_value().cents(),
            inscriptions = inscriptions.len(),
            "payment approved"
        );
        Ok(())
    }

    /// Undo an approval: inscriptions, event total and a reversal movement.
    async fn settle_reversal(&self, payment: &mut Payment) -> UsecaseResult<()> {
        payment.revert(self.now())?;

        let mut inscriptions = Vec::with_capacity(payment.allocations().len());
        for allocation in payment.allocations() {
            let mut inscription = self.load_inscription(allocation.inscription_id).await?;
            inscription.revert_payment(allocation.value)?;
            inscriptions.push(inscription);
        }
        let mut event = self.load_event(payment.event_id()).await?;
        event.subtract_collected(payment.total_value())?;

        self.post_event_movement(
            payment.event_id(),
            MovementKind::Expense,
            MovementOrigin::Reversal,
            payment.total_value(),
            format!("Estorno do pagamento {}", payment.id_typed()),
            *payment.id_typed().as_uuid(),
        )
        .await?;

        for inscription in &inscriptions {
            self.stores.inscriptions.update_inscription(inscription).await?;
        }
        self.stores.events.update_event(&event).await?;
        self.stores.payments.update_payment(payment).await?;
        info!(payment_id = %payment.id_typed(), total = payment.total_value().cents(), "payment reverted");
        Ok(())
    }

    /// Inscriptions left without any payment under review go back to pending.
    async fn release_review(&self, payment: &Payment) -> UsecaseResult<()> {
        for allocation in payment.allocations() {
            if self.under_other_review(allocation.inscription_id, payment.id_typed()).await? {
                continue;
            }
            let Some(mut inscription) = self
                .stores
                .inscriptions
                .get_inscription(allocation.inscription_id)
                .await?
            else {
                continue;
            };
            inscription.return_to_pending();
            self.stores.inscriptions.update_inscription(&inscription).await?;
        }
        Ok(())
    }

    /// Whether a payment other than `payment_id` still awaits review for the inscription.
    async fn under_other_review(&self, inscription_id: InscriptionId, payment_id: PaymentId) -> UsecaseResult<bool> {
        let others = self.stores.payments.list_payments_by_inscription(inscription_id).await?;
        Ok(others
            .iter()
            .any(|p| p.id_typed() != payment_id && p.status() == PaymentStatus::UnderReview))
    }

    async fn load_payment(&self, id: PaymentId) -> UsecaseResult<Payment> {
        self.stores
            .payments
            .get_payment(id)
            .await?
            .ok_or_else(|| UsecaseError::payment_not_found(id))
    }

    async fn load_payment_for_review(&self, actor: &ActorContext, id: PaymentId) -> UsecaseResult<Payment> {
        actor.require(&Permission::PAYMENTS_REVIEW)?;
        let payment = self.load_payment(id).await?;
        let event = self.load_event(payment.event_id()).await?;
        actor.ensure_region(event.region_id())?;
        Ok(payment)
    }

    /// Submitters see their own payments; staff those of events in reach.
    async fn load_visible_payment(&self, actor: &ActorContext, id: PaymentId) -> UsecaseResult<Payment> {
        let payment = self.load_payment(id).await?;
        if payment.account_id() == Some(actor.account_id()) {
            return Ok(payment);
        }
        if !actor.is_staff() {
            return Err(UsecaseError::payment_not_found(id));
        }
        let event = self.load_event(payment.event_id()).await?;
        actor.ensure_region(event.region_id())?;
        Ok(payment)
    }

    async fn load_link_by_token(&self, token: &str) -> UsecaseResult<PaymentLink> {
        self.stores
            .links
            .get_link_by_token(token)
            .await?
            .ok_or_else(|| UsecaseError::payment_link_not_found(token))
    }
}

fn ensure_payable(inscription: &Inscription, value: Money) -> UsecaseResult<()> {
    if !inscription.accepts_payments() {
        return Err(UsecaseError::invariant(format!(
            "inscription is {} and cannot receive payments",
            inscription.status().as_str()
        ))
        .with_context("inscription_id", inscription.id_typed().to_string()));
    }
    if value > inscription.remaining() {
        return Err(UsecaseError::invariant(format!(
            "payment of {value} exceeds the {} still owed",
            inscription.remaining()
        ))
        .with_context("inscription_id", inscription.id_typed().to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use regdesk_finance::CashRegisterStatus;
    use regdesk_infra::gateway::WebhookPayment;
    use regdesk_inscriptions::InscriptionStatus;
    use regdesk_payments::InstallmentStatus;

    use crate::error::ErrorKind;
    use crate::testkit::{self, Harness};

    use super::*;

    fn webhook(event: &str, reference: &str) -> GatewayWebhook {
        GatewayWebhook {
            event: event.to_string(),
            payment: WebhookPayment {
                id: reference.to_string(),
                status: None,
            },
        }
    }

    fn card(installments: u32) -> CheckoutRequest {
        CheckoutRequest {
            method: PaymentMethod::CreditCard,
            installments,
            customer_name: None,
            customer_email: Some("guest@example.com".to_string()),
        }
    }

    #[tokio::test]
    async fn approval_credits_inscription_event_and_register() {
        let Harness { services, .. } = testkit::harness();
        let event = testkit::seed_paid_event(&services, None).await;
        let register = testkit::seed_register(&services, &event).await;
        let kind = testkit::seed_type(&services, event.id_typed(), "Adulto", 10_000).await;
        let user = testkit::user();
        let detail = testkit::confirm_individual(&services, &user, &event, &kind).await;

        let payment = testkit::submit_payment(&services, &user, &event, &[(&detail.inscription, 10_000)]).await;
        let stored = services.load_inscription(detail.inscription.id_typed()).await.unwrap();
        assert_eq!(stored.status(), InscriptionStatus::UnderReview);

        let admin = testkit::admin();
        let approved = services.approve_payment(&admin, payment.id_typed()).await.unwrap();
        assert_eq!(approved.status(), PaymentStatus::Approved);

        let stored = services.load_inscription(detail.inscription.id_typed()).await.unwrap();
        assert_eq!(stored.status(), InscriptionStatus::Paid);
        let event = services.load_event(event.id_typed()).await.unwrap();
        assert_eq!(event.amount_collected(), Money::from_cents(10_000));

        let movements = services.list_movements(&admin, register.id_typed()).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].origin(), MovementOrigin::InscriptionPayment);
        assert_eq!(movements[0].reference_id(), Some(*payment.id_typed().as_uuid()));

        assert!(
            services
                .approve_payment(&admin, payment.id_typed())
                .await
                .unwrap_err()
                .is_invariant()
        );
    }

    #[tokio::test]
    async fn partial_payments_leave_the_rest_outstanding() {
        let Harness { services, .. } = testkit::harness();
        let event = testkit::seed_paid_event(&services, None).await;
        let kind = testkit::seed_type(&services, event.id_typed(), "Adulto", 10_000).await;
        let user = testkit::user();
        let detail = testkit::confirm_individual(&services, &user, &event, &kind).await;

        let payment = testkit::submit_payment(&services, &user, &event, &[(&detail.inscription, 4_000)]).await;
        services.approve_payment(&testkit::admin(), payment.id_typed()).await.unwrap();

        let stored = services.load_inscription(detail.inscription.id_typed()).await.unwrap();
        assert_eq!(stored.status(), InscriptionStatus::Pending);
        assert_eq!(stored.remaining(), Money::from_cents(6_000));

        let err = services
            .create_payment(
                &user,
                PaymentRequest {
                    event_id: event.id_typed(),
                    method: PaymentMethod::Pix,
                    receipt_url: None,
                    allocations: vec![AllocationRequest {
                        inscription_id: stored.id_typed(),
                        value: Money::from_cents(6_001),
                    }],
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_invariant());
    }

    #[tokio::test]
    async fn partially_paid_inscriptions_survive_the_expiry_sweep() {
        let Harness { services, clock, .. } = testkit::harness();
        let event = testkit::seed_paid_event(&services, None).await;
        let kind = testkit::seed_type(&services, event.id_typed(), "Adulto", 10_000).await;
        let user = testkit::user();
        let detail = testkit::confirm_individual(&services, &user, &event, &kind).await;
        let first = testkit::submit_payment(&services, &user, &event, &[(&detail.inscription, 4_000)]).await;
        let second = testkit::submit_payment(&services, &user, &event, &[(&detail.inscription, 6_000)]).await;

        let admin = testkit::admin();
        services.approve_payment(&admin, first.id_typed()).await.unwrap();
        let stored = services.load_inscription(detail.inscription.id_typed()).await.unwrap();
        assert_eq!(stored.status(), InscriptionStatus::UnderReview);
        assert_eq!(stored.expires_at(), None);

        clock.advance(services.settings().pending_ttl + chrono::Duration::minutes(1));
        assert_eq!(services.cancel_expired().await.unwrap(), 0);
        let stored = services.load_inscription(detail.inscription.id_typed()).await.unwrap();
        assert_eq!(stored.status(), InscriptionStatus::UnderReview);

        services.approve_payment(&admin, second.id_typed()).await.unwrap();
        let stored = services.load_inscription(detail.inscription.id_typed()).await.unwrap();
        assert_eq!(stored.status(), InscriptionStatus::Paid);
        assert_eq!(stored.total_paid(), Money::from_cents(10_000));
    }

    #[tokio::test]
    async fn users_only_pay_their_own_inscriptions() {
        let Harness { services, .. } = testkit::harness();
        let event = testkit::seed_paid_event(&services, None).await;
        let kind = testkit::seed_type(&services, event.id_typed(), "Adulto", 10_000).await;
        let detail = testkit::confirm_individual(&services, &testkit::user(), &event, &kind).await;

        let err = services
            .create_payment(
                &testkit::user(),
                PaymentRequest {
                    event_id: event.id_typed(),
                    method: PaymentMethod::Pix,
                    receipt_url: None,
                    allocations: vec![AllocationRequest {
                        inscription_id: detail.inscription.id_typed(),
                        value: Money::from_cents(1_000),
                    }],
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn payments_require_the_event_to_accept_them() {
        let Harness { services, .. } = testkit::harness();
        let event = testkit::seed_event(&services, None).await;
        let kind = testkit::seed_type(&services, event.id_typed(), "Adulto", 10_000).await;
        let user = testkit::user();
        let detail = testkit::confirm_individual(&services, &user, &event, &kind).await;

        let err = services
            .create_payment(
                &user,
                PaymentRequest {
                    event_id: event.id_typed(),
                    method: PaymentMethod::Cash,
                    receipt_url: None,
                    allocations: vec![AllocationRequest {
                        inscription_id: detail.inscription.id_typed(),
                        value: Money::from_cents(1_000),
                    }],
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_invariant());
        assert_eq!(err.context.get("event_id").and_then(|v| v.as_str()), Some(event.id_typed().to_string().as_str()));
    }

    #[tokio::test]
    async fn rejection_returns_inscriptions_to_pending() {
        let Harness { services, .. } = testkit::harness();
        let event = testkit::seed_paid_event(&services, None).await;
        let kind = testkit::seed_type(&services, event.id_typed(), "Adulto", 10_000).await;
        let user = testkit::user();
        let detail = testkit::confirm_individual(&services, &user, &event, &kind).await;
        let first = testkit::submit_payment(&services, &user, &event, &[(&detail.inscription, 3_000)]).await;
        let second = testkit::submit_payment(&services, &user, &event, &[(&detail.inscription, 3_000)]).await;

        let admin = testkit::admin();
        assert_eq!(
            services.reject_payment(&admin, first.id_typed(), "  ").await.unwrap_err().kind,
            ErrorKind::Validation
        );
        let refused = services
            .reject_payment(&admin, first.id_typed(), "comprovante ilegível")
            .await
            .unwrap();
        assert_eq!(refused.rejection_reason(), Some("comprovante ilegível"));
        let stored = services.load_inscription(detail.inscription.id_typed()).await.unwrap();
        assert_eq!(stored.status(), InscriptionStatus::UnderReview);

        services.reject_payment(&admin, second.id_typed(), "duplicado").await.unwrap();
        let stored = services.load_inscription(detail.inscription.id_typed()).await.unwrap();
        assert_eq!(stored.status(), InscriptionStatus::Pending);
    }

    #[tokio::test]
    async fn reverting_writes_a_reversal_movement() {
        let Harness { services, .. } = testkit::harness();
        let event = testkit::seed_paid_event(&services, None).await;
        let register = testkit::seed_register(&services, &event).await;
        let kind = testkit::seed_type(&services, event.id_typed(), "Adulto", 10_000).await;
        let user = testkit::user();
        let detail = testkit::confirm_individual(&services, &user, &event, &kind).await;
        let payment = testkit::submit_payment(&services, &user, &event, &[(&detail.inscription, 10_000)]).await;
        let admin = testkit::admin();
        services.approve_payment(&admin, payment.id_typed()).await.unwrap();

        let reverted = services.revert_payment(&admin, payment.id_typed()).await.unwrap();
        assert_eq!(reverted.status(), PaymentStatus::UnderReview);

        let stored = services.load_inscription(detail.inscription.id_typed()).await.unwrap();
        assert_eq!(stored.status(), InscriptionStatus::UnderReview);
        assert_eq!(stored.total_paid(), Money::zero());
        let event = services.load_event(event.id_typed()).await.unwrap();
        assert_eq!(event.amount_collected(), Money::zero());

        let register = services.find_register(&admin, register.id_typed()).await.unwrap();
        assert_eq!(register.balance(), Money::zero());
        let movements = services.list_movements(&admin, register.id_typed()).await.unwrap();
        assert_eq!(movements.len(), 2);
        assert_eq!(movements[1].origin(), MovementOrigin::Reversal);
    }

    #[tokio::test]
    async fn reversal_is_refused_when_the_register_cannot_cover_it() {
        let Harness { services, .. } = testkit::harness();
        let event = testkit::seed_paid_event(&services, None).await;
        let register = testkit::seed_register(&services, &event).await;
        let kind = testkit::seed_type(&services, event.id_typed(), "Adulto", 10_000).await;
        let user = testkit::user();
        let detail = testkit::confirm_individual(&services, &user, &event, &kind).await;
        let payment = testkit::submit_payment(&services, &user, &event, &[(&detail.inscription, 10_000)]).await;
        let admin = testkit::admin();
        services.approve_payment(&admin, payment.id_typed()).await.unwrap();
        services
            .create_movement(
                &admin,
                register.id_typed(),
                crate::finance::ManualMovement {
                    kind: MovementKind::Expense,
                    value: Money::from_cents(9_000),
                    description: "Aluguel do salão".to_string(),
                },
            )
            .await
            .unwrap();

        let err = services.revert_payment(&admin, payment.id_typed()).await.unwrap_err();
        assert!(err.is_invariant());

        let stored = services.find_payment(&admin, payment.id_typed()).await.unwrap();
        assert_eq!(stored.status(), PaymentStatus::Approved);
        let inscription = services.load_inscription(detail.inscription.id_typed()).await.unwrap();
        assert_eq!(inscription.status(), InscriptionStatus::Paid);
        assert_eq!(inscription.total_paid(), Money::from_cents(10_000));
        let event = services.load_event(event.id_typed()).await.unwrap();
        assert_eq!(event.amount_collected(), Money::from_cents(10_000));
        let register = services.find_register(&admin, register.id_typed()).await.unwrap();
        assert_eq!(register.balance(), Money::from_cents(1_000));
    }

    #[tokio::test]
    async fn closed_registers_do_not_block_approval() {
        let Harness { services, .. } = testkit::harness();
        let event = testkit::seed_paid_event(&services, None).await;
        let register = testkit::seed_register(&services, &event).await;
        let admin = testkit::admin();
        let closed = services.close_register(&admin, register.id_typed()).await.unwrap();
        assert_eq!(closed.status(), CashRegisterStatus::Closed);

        let kind = testkit::seed_type(&services, event.id_typed(), "Adulto", 10_000).await;
        let user = testkit::user();
        let detail = testkit::confirm_individual(&services, &user, &event, &kind).await;
        let payment = testkit::submit_payment(&services, &user, &event, &[(&detail.inscription, 10_000)]).await;

        services.approve_payment(&admin, payment.id_typed()).await.unwrap();
        assert!(services.list_movements(&admin, register.id_typed()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_unapproved_payments_can_be_deleted() {
        let Harness { services, .. } = testkit::harness();
        let event = testkit::seed_paid_event(&services, None).await;
        let kind = testkit::seed_type(&services, event.id_typed(), "Adulto", 10_000).await;
        let user = testkit::user();
        let detail = testkit::confirm_individual(&services, &user, &event, &kind).await;
        let approved = testkit::submit_payment(&services, &user, &event, &[(&detail.inscription, 2_000)]).await;
        services.approve_payment(&testkit::admin(), approved.id_typed()).await.unwrap();
        let pending = testkit::submit_payment(&services, &user, &event, &[(&detail.inscription, 2_000)]).await;

        assert!(
            services
                .delete_payment(&user, approved.id_typed())
                .await
                .unwrap_err()
                .is_invariant()
        );
        assert_eq!(
            services.find_payment(&testkit::user(), pending.id_typed()).await.unwrap_err().code,
            "payment_not_found"
        );

        services.delete_payment(&user, pending.id_typed()).await.unwrap();
        let stored = services.load_inscription(detail.inscription.id_typed()).await.unwrap();
        assert_eq!(stored.status(), InscriptionStatus::Pending);
        assert_eq!(services.list_event_payments(&testkit::admin(), event.id_typed()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn payment_links_can_be_resolved_and_revoked() {
        let Harness { services, clock, .. } = testkit::harness();
        let event = testkit::seed_paid_event(&services, None).await;
        let kind = testkit::seed_type(&services, event.id_typed(), "Adulto", 10_000).await;
        let user = testkit::user();
        let detail = testkit::confirm_individual(&services, &user, &event, &kind).await;

        let link = services
            .create_payment_link(&user, detail.inscription.id_typed())
            .await
            .unwrap();
        let summary = services.resolve_payment_link(link.token()).await.unwrap();
        assert_eq!(summary.status, PaymentLinkStatus::Active);
        assert_eq!(summary.value, Money::from_cents(10_000));
        assert_eq!(summary.event_name, event.name());

        clock.advance(services.settings().link_ttl);
        let summary = services.resolve_payment_link(link.token()).await.unwrap();
        assert_eq!(summary.status, PaymentLinkStatus::Expired);

        let revoked = services.revoke_payment_link(&user, link.id_typed()).await.unwrap();
        assert_eq!(revoked.status(), PaymentLinkStatus::Revoked);
        assert_eq!(
            services.revoke_payment_link(&user, link.id_typed()).await.unwrap_err().kind,
            ErrorKind::Conflict
        );
        assert_eq!(
            services.resolve_payment_link("missing").await.unwrap_err().code,
            "payment_link_not_found"
        );
    }

    #[tokio::test]
    async fn checkout_opens_a_gateway_charge_and_consumes_the_link() {
        let Harness { services, gateway, .. } = testkit::harness();
        let event = testkit::seed_paid_event(&services, Some(10)).await;
        let kind = testkit::seed_type(&services, event.id_typed(), "Adulto", 10_000).await;
        let receipt = services
            .create_guest(event.id_typed(), testkit::guest_input(&kind, 1))
            .await
            .unwrap();
        let token = receipt.payment_link.unwrap().token().to_string();

        let err = services
            .checkout(
                &token,
                CheckoutRequest {
                    method: PaymentMethod::Pix,
                    installments: 2,
                    customer_name: None,
                    customer_email: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);

        let result = services.checkout(&token, card(3)).await.unwrap();
        assert_eq!(result.installments.len(), 3);
        assert!(result.checkout_url.starts_with("https://"));
        assert!(result.installments.iter().all(|i| i.gateway_reference().is_some()));

        let charges = gateway.charges();
        assert_eq!(charges.len(), 1);
        assert_eq!(charges[0].customer_name, "Responsável Teste");
        assert_eq!(charges[0].total, Money::from_cents(10_000));

        let payment = services.load_payment(result.payment_id).await.unwrap();
        assert_eq!(payment.origin(), PaymentOrigin::Gateway);
        assert!(payment.gateway_reference().is_some());
        let stored = services.load_inscription(receipt.inscription.id_typed()).await.unwrap();
        assert_eq!(stored.status(), InscriptionStatus::UnderReview);

        let err = services.checkout(&token, card(1)).await.unwrap_err();
        assert!(err.is_invariant());
        assert_eq!(err.context.get("status").and_then(|v| v.as_str()), Some("used"));
    }

    #[tokio::test]
    async fn checkout_respects_the_installment_limit() {
        let Harness { services, .. } = testkit::harness();
        let event = testkit::seed_paid_event(&services, Some(10)).await;
        let kind = testkit::seed_type(&services, event.id_typed(), "Adulto", 10_000).await;
        let receipt = services
            .create_guest(event.id_typed(), testkit::guest_input(&kind, 1))
            .await
            .unwrap();
        let token = receipt.payment_link.unwrap().token().to_string();

        let too_many = services.settings().max_installments + 1;
        let err = services.checkout(&token, card(too_many)).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        let summary = services.resolve_payment_link(&token).await.unwrap();
        assert_eq!(summary.status, PaymentLinkStatus::Active);
    }

    #[tokio::test]
    async fn webhooks_settle_installments_and_approve_when_complete() {
        let Harness { services, .. } = testkit::harness();
        let event = testkit::seed_paid_event(&services, Some(10)).await;
        let register = testkit::seed_register(&services, &event).await;
        let kind = testkit::seed_type(&services, event.id_typed(), "Adulto", 10_000).await;
        let receipt = services
            .create_guest(event.id_typed(), testkit::guest_input(&kind, 1))
            .await
            .unwrap();
        let token = receipt.payment_link.unwrap().token().to_string();
        let result = services.checkout(&token, card(2)).await.unwrap();
        let first = result.installments[0].gateway_reference().unwrap().to_string();
        let second = result.installments[1].gateway_reference().unwrap().to_string();
        let secret = Some(testkit::WEBHOOK_TOKEN);

        assert_eq!(
            services
                .handle_webhook(Some("wrong"), webhook("PAYMENT_CONFIRMED", &first))
                .await
                .unwrap_err()
                .kind,
            ErrorKind::Forbidden
        );
        assert_eq!(
            services.handle_webhook(secret, webhook("PAYMENT_CONFIRMED", &first)).await.unwrap(),
            WebhookOutcome::InstallmentUpdated
        );
        assert_eq!(
            services.handle_webhook(secret, webhook("PAYMENT_RECEIVED", &first)).await.unwrap(),
            WebhookOutcome::Duplicate
        );
        assert_eq!(
            services.handle_webhook(secret, webhook("PAYMENT_CONFIRMED", &second)).await.unwrap(),
            WebhookOutcome::PaymentApproved
        );
        assert_eq!(
            services.handle_webhook(secret, webhook("PAYMENT_CONFIRMED", "unknown")).await.unwrap(),
            WebhookOutcome::Ignored
        );

        let payment = services.load_payment(result.payment_id).await.unwrap();
        assert_eq!(payment.status(), PaymentStatus::Approved);
        assert!(payment.installments().iter().all(|i| i.status() == InstallmentStatus::Paid));
        let stored = services.load_inscription(receipt.inscription.id_typed()).await.unwrap();
        assert_eq!(stored.status(), InscriptionStatus::Paid);
        let register = services.find_register(&testkit::admin(), register.id_typed()).await.unwrap();
        assert_eq!(register.balance(), Money::from_cents(10_000));

        assert_eq!(
            services.handle_webhook(secret, webhook("PAYMENT_REFUNDED", &second)).await.unwrap(),
            WebhookOutcome::PaymentReverted
        );
        let payment = services.load_payment(result.payment_id).await.unwrap();
        assert_eq!(payment.status(), PaymentStatus::UnderReview);
        let event = services.load_event(event.id_typed()).await.unwrap();
        assert_eq!(event.amount_collected(), Money::zero());
    }

    #[tokio::test]
    async fn webhooks_are_rejected_without_a_configured_token() {
        let Harness { services, .. } = testkit::harness();
        let services = services.with_settings(Default::default());
        let err = services
            .handle_webhook(Some(testkit::WEBHOOK_TOKEN), webhook("PAYMENT_CONFIRMED", "x"))
            .await
            .unwrap_err();
        assert_eq!(err.code, "webhook_unauthorized");
    }

    #[tokio::test]
    async fn overdue_notifications_only_flag_the_installment() {
        let Harness { services, .. } = testkit::harness();
        let event = testkit::seed_paid_event(&services, Some(10)).await;
        let kind = testkit::seed_type(&services, event.id_typed(), "Adulto", 10_000).await;
        let receipt = services
            .create_guest(event.id_typed(), testkit::guest_input(&kind, 1))
            .await
            .unwrap();
        let token = receipt.payment_link.unwrap().token().to_string();
        let result = services.checkout(&token, card(1)).await.unwrap();
        let reference = result.installments[0].gateway_reference().unwrap().to_string();
        let secret = Some(testkit::WEBHOOK_TOKEN);

        assert_eq!(
            services.handle_webhook(secret, webhook("PAYMENT_OVERDUE", &reference)).await.unwrap(),
            WebhookOutcome::InstallmentUpdated
        );
        assert_eq!(
            services.handle_webhook(secret, webhook("PAYMENT_OVERDUE", &reference)).await.unwrap(),
            WebhookOutcome::Duplicate
        );
        assert_eq!(
            services.handle_webhook(secret, webhook("PAYMENT_CREATED", &reference)).await.unwrap(),
            WebhookOutcome::Ignored
        );
        let payment = services.load_payment(result.payment_id).await.unwrap();
        assert_eq!(payment.installments()[0].status(), InstallmentStatus::Overdue);
        assert_eq!(payment.status(), PaymentStatus::UnderReview);
    }
}
