//! Report assembly. Callers render with `to_pdf`.

use tracing::debug;

use regdesk_auth::Permission;
use regdesk_events::EventId;
use regdesk_finance::CashRegisterId;
use regdesk_reports::{CashStatementReport, EventFinancialReport, EventInscriptionsReport};

use crate::context::ActorContext;
use crate::error::UsecaseResult;
use crate::services::AppServices;

impl AppServices {
    pub async fn event_inscriptions_report(
        &self,
        actor: &ActorContext,
        event_id: EventId,
    ) -> UsecaseResult<EventInscriptionsReport> {
        let event = self.load_event_for_staff(actor, event_id, &Permission::REPORTS_READ).await?;
        let inscriptions = self.stores.inscriptions.list_inscriptions_by_event(event_id).await?;

        let mut rows = Vec::with_capacity(inscriptions.len());
        for inscription in inscriptions {
            let participants = self
                .stores
                .inscriptions
                .list_participants(inscription.id_typed())
                .await?;
            rows.push((inscription, participants));
        }
        debug!(event_id = %event_id, rows = rows.len(), "inscriptions report assembled");
        Ok(EventInscriptionsReport::build(&event, &rows, self.now()))
    }

    pub async fn event_financial_report(
        &self,
        actor: &ActorContext,
        event_id: EventId,
    ) -> UsecaseResult<EventFinancialReport> {
        let event = self.load_event_for_staff(actor, event_id, &Permission::REPORTS_READ).await?;
        let payments = self.stores.payments.list_payments_by_event(event_id).await?;
        let sales = self.stores.sales.list_sales_by_event(event_id).await?;
        Ok(EventFinancialReport::build(&event, &payments, &sales, self.now()))
    }

    pub async fn cash_statement_report(
        &self,
        actor: &ActorContext,
        register_id: CashRegisterId,
    ) -> UsecaseResult<CashStatementReport> {
        actor.require(&Permission::REPORTS_READ)?;
        let register = self.find_register(actor, register_id).await?;
        let movements = self.stores.registers.list_movements(register_id).await?;
        Ok(CashStatementReport::build(&register, &movements, self.now()))
    }
}

#[cfg(test)]
mod tests {
    use regdesk_core::Money;

    use crate::error::ErrorKind;
    use crate::testkit::{self, Harness};

    #[tokio::test]
    async fn inscription_report_lists_every_inscription() {
        let Harness { services, .. } = testkit::harness();
        let event = testkit::seed_event(&services, None).await;
        let kind = testkit::seed_type(&services, event.id_typed(), "Adulto", 10_000).await;
        testkit::confirm_individual(&services, &testkit::user(), &event, &kind).await;
        testkit::confirm_individual(&services, &testkit::user(), &event, &kind).await;

        let manager = testkit::manager(event.region_id());
        let report = services.event_inscriptions_report(&manager, event.id_typed()).await.unwrap();
        assert_eq!(report.summary.inscriptions, 2);
        assert_eq!(report.summary.pending, 2);
        assert_eq!(report.summary.total_value, Money::from_cents(20_000));
        assert!(report.to_pdf().starts_with(b"%PDF-1.4"));

        assert_eq!(
            services
                .event_inscriptions_report(&testkit::user(), event.id_typed())
                .await
                .unwrap_err()
                .kind,
            ErrorKind::Forbidden
        );
    }

    #[tokio::test]
    async fn financial_report_totals_approved_payments() {
        let Harness { services, .. } = testkit::harness();
        let event = testkit::seed_paid_event(&services, None).await;
        let kind = testkit::seed_type(&services, event.id_typed(), "Adulto", 10_000).await;
        let user = testkit::user();
        let detail = testkit::confirm_individual(&services, &user, &event, &kind).await;
        let approved = testkit::submit_payment(&services, &user, &event, &[(&detail.inscription, 6_000)]).await;
        services.approve_payment(&testkit::admin(), approved.id_typed()).await.unwrap();
        testkit::submit_payment(&services, &user, &event, &[(&detail.inscription, 4_000)]).await;

        let report = services
            .event_financial_report(&testkit::admin(), event.id_typed())
            .await
            .unwrap();
        assert_eq!(report.summary.approved_total, Money::from_cents(6_000));
        assert_eq!(report.summary.under_review_total, Money::from_cents(4_000));
        assert_eq!(report.summary.amount_collected, Money::from_cents(6_000));
    }

    #[tokio::test]
    async fn cash_statement_follows_the_running_balance() {
        let Harness { services, .. } = testkit::harness();
        let event = testkit::seed_event(&services, None).await;
        let register = testkit::seed_register(&services, &event).await;
        let admin = testkit::admin();
        services
            .create_movement(
                &admin,
                register.id_typed(),
                crate::finance::ManualMovement {
                    kind: regdesk_finance::MovementKind::Income,
                    value: Money::from_cents(1_000),
                    description: "Abertura".to_string(),
                },
            )
            .await
            .unwrap();

        let report = services.cash_statement_report(&admin, register.id_typed()).await.unwrap();
        assert_eq!(report.lines.len(), 1);
        assert_eq!(report.final_balance, Money::from_cents(1_000));
    }
}
