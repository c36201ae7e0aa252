//! Door ticket sales.

use serde::Deserialize;
use tracing::info;

use regdesk_auth::Permission;
use regdesk_events::{EventId, EventTicketId};
use regdesk_finance::{MovementKind, MovementOrigin};
use regdesk_payments::PaymentMethod;
use regdesk_tickets::{NewTicketSale, TicketSale, TicketSaleId};

use crate::context::ActorContext;
use crate::error::{UsecaseError, UsecaseResult};
use crate::services::AppServices;

#[derive(Debug, Clone, Deserialize)]
pub struct SellTicket {
    pub ticket_id: EventTicketId,
    pub buyer_name: String,
    pub quantity: u32,
    pub method: PaymentMethod,
}

impl AppServices {
    pub async fn sell_ticket(&self, actor: &ActorContext, input: SellTicket) -> UsecaseResult<TicketSale> {
        actor.require(&Permission::TICKETS_SELL)?;
        let mut ticket = self
            .stores
            .tickets
            .get_ticket(input.ticket_id)
            .await?
            .ok_or_else(|| UsecaseError::ticket_not_found(input.ticket_id))?;
        let event = self.load_event(ticket.event_id()).await?;
        actor.ensure_region(event.region_id())?;
        if !event.ticket_enabled() {
            return Err(UsecaseError::tickets_disabled(event.id_typed()));
        }

        let sale = TicketSale::create(
            &ticket,
            NewTicketSale {
                buyer_name: input.buyer_name,
                quantity: input.quantity,
                method: input.method,
            },
            actor.account_id(),
            self.now(),
        )?;
        ticket.reserve(sale.quantity())?;

        self.post_event_movement(
            event.id_typed(),
            MovementKind::Income,
            MovementOrigin::TicketSale,
            sale.total_value(),
            format!("{} x {} ({})", sale.quantity(), ticket.name(), sale.buyer_name()),
            *sale.id_typed().as_uuid(),
        )
        .await?;
        self.stores.tickets.update_ticket(&ticket).await?;
        self.stores.sales.insert_sale(&sale).await?;
        info!(
            sale_id = %sale.id_typed(),
            ticket_id = %ticket.id_typed(),
            quantity = sale.quantity(),
            total = sale.total_value().cents(),
            "ticket sold"
        );
        Ok(sale)
    }

    /// Cancelling returns the stock and reverses the register income.
    pub async fn cancel_sale(&self, actor: &ActorContext, id: TicketSaleId) -> UsecaseResult<TicketSale> {
        actor.require(&Permission::TICKETS_SELL)?;
        let mut sale = self
            .stores
            .sales
            .get_sale(id)
            .await?
            .ok_or_else(|| UsecaseError::ticket_sale_not_found(id))?;
        let event = self.load_event(sale.event_id()).await?;
        actor.ensure_region(event.region_id())?;
        let mut ticket = self
            .stores
            .tickets
            .get_ticket(sale.ticket_id())
            .await?
            .ok_or_else(|| UsecaseError::ticket_not_found(sale.ticket_id()))?;

        sale.cancel()?;
        ticket.release(sale.quantity());

        self.post_event_movement(
            event.id_typed(),
            MovementKind::Expense,
            MovementOrigin::Reversal,
            sale.total_value(),
            format!("Cancelamento: {} x {}", sale.quantity(), ticket.name()),
            *sale.id_typed().as_uuid(),
        )
        .await?;
        self.stores.tickets.update_ticket(&ticket).await?;
        self.stores.sales.update_sale(&sale).await?;
        info!(sale_id = %id, quantity = sale.quantity(), "ticket sale cancelled");
        Ok(sale)
    }

    pub async fn list_sales(&self, actor: &ActorContext, event_id: EventId) -> UsecaseResult<Vec<TicketSale>> {
        self.load_event_for_staff(actor, event_id, &Permission::TICKETS_SELL)
            .await?;
        Ok(self.stores.sales.list_sales_by_event(event_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use regdesk_core::Money;
    use regdesk_events::{EventTicket, NewEventTicket, UpdateEvent};
    use regdesk_tickets::TicketSaleStatus;

    use crate::error::ErrorKind;
    use crate::testkit::{self, Harness};

    use super::*;

    async fn seed_ticket(services: &AppServices, event_id: EventId, quantity: u32) -> EventTicket {
        services
            .create_ticket(
                &testkit::admin(),
                event_id,
                NewEventTicket {
                    name: "Jantar".to_string(),
                    price: Money::from_cents(2_500),
                    quantity,
                },
            )
            .await
            .unwrap()
    }

    async fn enable_tickets(services: &AppServices, event_id: EventId) {
        services
            .update_event(
                &testkit::admin(),
                event_id,
                UpdateEvent {
                    ticket_enabled: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    fn sale(ticket: &EventTicket, quantity: u32) -> SellTicket {
        SellTicket {
            ticket_id: ticket.id_typed(),
            buyer_name: "Carlos".to_string(),
            quantity,
            method: PaymentMethod::Cash,
        }
    }

    #[tokio::test]
    async fn sales_need_tickets_enabled_on_the_event() {
        let Harness { services, .. } = testkit::harness();
        let event = testkit::seed_event(&services, None).await;
        let ticket = seed_ticket(&services, event.id_typed(), 10).await;
        let manager = testkit::manager(event.region_id());

        let err = services.sell_ticket(&manager, sale(&ticket, 1)).await.unwrap_err();
        assert!(err.is_invariant());
        assert_eq!(
            services.sell_ticket(&testkit::user(), sale(&ticket, 1)).await.unwrap_err().kind,
            ErrorKind::Forbidden
        );
    }

    #[tokio::test]
    async fn selling_takes_stock_and_credits_the_register() {
        let Harness { services, .. } = testkit::harness();
        let event = testkit::seed_event(&services, None).await;
        let register = testkit::seed_register(&services, &event).await;
        enable_tickets(&services, event.id_typed()).await;
        let ticket = seed_ticket(&services, event.id_typed(), 5).await;
        let manager = testkit::manager(event.region_id());

        let sold = services.sell_ticket(&manager, sale(&ticket, 3)).await.unwrap();
        assert_eq!(sold.total_value(), Money::from_cents(7_500));

        let err = services.sell_ticket(&manager, sale(&ticket, 3)).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);

        let tickets = services.list_tickets(&manager, event.id_typed()).await.unwrap();
        assert_eq!(tickets[0].quantity_available(), 2);
        let register = services.find_register(&manager, register.id_typed()).await.unwrap();
        assert_eq!(register.balance(), Money::from_cents(7_500));
        assert_eq!(services.list_sales(&manager, event.id_typed()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cancelling_a_sale_restores_stock_and_balance() {
        let Harness { services, .. } = testkit::harness();
        let event = testkit::seed_event(&services, None).await;
        let register = testkit::seed_register(&services, &event).await;
        enable_tickets(&services, event.id_typed()).await;
        let ticket = seed_ticket(&services, event.id_typed(), 5).await;
        let admin = testkit::admin();

        let sold = services.sell_ticket(&admin, sale(&ticket, 2)).await.unwrap();
        let cancelled = services.cancel_sale(&admin, sold.id_typed()).await.unwrap();
        assert_eq!(cancelled.status(), TicketSaleStatus::Cancelled);

        let tickets = services.list_tickets(&admin, event.id_typed()).await.unwrap();
        assert_eq!(tickets[0].quantity_available(), 5);
        let movements = services.list_movements(&admin, register.id_typed()).await.unwrap();
        assert_eq!(movements.len(), 2);
        assert_eq!(movements[1].origin(), MovementOrigin::Reversal);
        assert_eq!(
            services.find_register(&admin, register.id_typed()).await.unwrap().balance(),
            Money::zero()
        );

        assert_eq!(
            services.cancel_sale(&admin, sold.id_typed()).await.unwrap_err().kind,
            ErrorKind::Conflict
        );
    }

    #[tokio::test]
    async fn cancellation_is_refused_when_the_register_cannot_cover_it() {
        let Harness { services, .. } = testkit::harness();
        let event = testkit::seed_event(&services, None).await;
        let register = testkit::seed_register(&services, &event).await;
        enable_tickets(&services, event.id_typed()).await;
        let ticket = seed_ticket(&services, event.id_typed(), 5).await;
        let admin = testkit::admin();

        let sold = services.sell_ticket(&admin, sale(&ticket, 2)).await.unwrap();
        services
            .create_movement(
                &admin,
                register.id_typed(),
                crate::finance::ManualMovement {
                    kind: MovementKind::Expense,
                    value: Money::from_cents(5_000),
                    description: "Decoração".to_string(),
                },
            )
            .await
            .unwrap();

        let err = services.cancel_sale(&admin, sold.id_typed()).await.unwrap_err();
        assert!(err.is_invariant());

        let sales = services.list_sales(&admin, event.id_typed()).await.unwrap();
        assert_eq!(sales[0].status(), TicketSaleStatus::Active);
        let tickets = services.list_tickets(&admin, event.id_typed()).await.unwrap();
        assert_eq!(tickets[0].quantity_available(), 3);
        assert_eq!(
            services.find_register(&admin, register.id_typed()).await.unwrap().balance(),
            Money::zero()
        );
    }
}
