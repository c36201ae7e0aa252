//! Events, their inscription types and door tickets.

use tracing::info;

use regdesk_auth::Permission;
use regdesk_events::{
    Event, EventId, EventStatus, EventTicket, NewEvent, NewEventTicket, NewTypeInscription, TypeInscription,
    TypeInscriptionId, UpdateEvent,
};

use crate::context::ActorContext;
use crate::error::{UsecaseError, UsecaseResult};
use crate::services::AppServices;

impl AppServices {
    pub async fn create_event(&self, actor: &ActorContext, input: NewEvent) -> UsecaseResult<Event> {
        actor.require(&Permission::EVENTS_WRITE)?;
        actor.ensure_region(input.region_id)?;
        self.load_region(input.region_id).await?;

        let event = Event::create(input, self.now())?;
        self.stores.events.insert_event(&event).await?;
        info!(event_id = %event.id_typed(), region_id = %event.region_id(), name = event.name(), "event created");
        Ok(event)
    }

    pub async fn update_event(&self, actor: &ActorContext, id: EventId, changes: UpdateEvent) -> UsecaseResult<Event> {
        let mut event = self.load_event_for_staff(actor, id, &Permission::EVENTS_WRITE).await?;
        event.update(changes)?;
        self.stores.events.update_event(&event).await?;
        Ok(event)
    }

    pub async fn set_event_payments(&self, actor: &ActorContext, id: EventId, enabled: bool) -> UsecaseResult<Event> {
        let mut event = self.load_event_for_staff(actor, id, &Permission::EVENTS_WRITE).await?;
        event.set_payment_enabled(enabled)?;
        self.stores.events.update_event(&event).await?;
        info!(event_id = %id, enabled, "event payments toggled");
        Ok(event)
    }

    pub async fn change_event_status(
        &self,
        actor: &ActorContext,
        id: EventId,
        status: EventStatus,
    ) -> UsecaseResult<Event> {
        let mut event = self.load_event_for_staff(actor, id, &Permission::EVENTS_WRITE).await?;
        event.change_status(status)?;
        self.stores.events.update_event(&event).await?;
        info!(event_id = %id, status = status.as_str(), "event status changed");
        Ok(event)
    }

    pub async fn list_events(&self, actor: &ActorContext) -> UsecaseResult<Vec<Event>> {
        Ok(self.stores.events.list_events(actor.region_filter()).await?)
    }

    pub async fn find_event(&self, actor: &ActorContext, id: EventId) -> UsecaseResult<Event> {
        let event = self.load_event(id).await?;
        if actor.role().is_region_scoped() && actor.region_id() != Some(event.region_id()) {
            return Err(UsecaseError::event_not_found(id));
        }
        Ok(event)
    }

    /// Only events nobody registered into can be deleted.
    pub async fn delete_event(&self, actor: &ActorContext, id: EventId) -> UsecaseResult<()> {
        self.load_event_for_staff(actor, id, &Permission::EVENTS_WRITE).await?;
        let inscriptions = self.stores.inscriptions.count_inscriptions_by_event(id).await?;
        if inscriptions > 0 {
            return Err(
                UsecaseError::invariant(format!("event has {inscriptions} inscription(s) and cannot be deleted"))
                    .with_context("event_id", id.to_string()),
            );
        }
        self.stores.events.delete_event(id).await?;
        info!(event_id = %id, "event deleted");
        Ok(())
    }

    pub async fn create_type_inscription(
        &self,
        actor: &ActorContext,
        event_id: EventId,
        input: NewTypeInscription,
    ) -> UsecaseResult<TypeInscription> {
        self.load_event_for_staff(actor, event_id, &Permission::EVENTS_WRITE).await?;
        let existing = self.stores.types.list_types(event_id).await?;
        if existing.iter().any(|t| t.matches_description(&input.description)) {
            return Err(UsecaseError::new(
                crate::error::ErrorKind::Conflict,
                "conflict",
                format!("inscription type '{}' already exists", input.description.trim()),
                "Já existe um tipo de inscrição com esta descrição.",
            ));
        }

        let kind = TypeInscription::create(event_id, input)?;
        self.stores.types.insert_type(&kind).await?;
        Ok(kind)
    }

    pub async fn list_type_inscriptions(
        &self,
        actor: &ActorContext,
        event_id: EventId,
    ) -> UsecaseResult<Vec<TypeInscription>> {
        self.find_event(actor, event_id).await?;
        Ok(self.stores.types.list_types(event_id).await?)
    }

    /// Types already used by a participant cannot be removed.
    pub async fn delete_type_inscription(
        &self,
        actor: &ActorContext,
        event_id: EventId,
        type_id: TypeInscriptionId,
    ) -> UsecaseResult<()> {
        self.load_event_for_staff(actor, event_id, &Permission::EVENTS_WRITE).await?;
        let kind = self
            .stores
            .types
            .get_type(type_id)
            .await?
            .filter(|t| t.event_id() == event_id)
            .ok_or_else(|| UsecaseError::type_inscription_not_found(type_id))?;

        if self.stores.inscriptions.type_in_use(type_id).await? {
            return Err(UsecaseError::invariant(format!(
                "inscription type '{}' is in use",
                kind.description()
            ))
            .with_context("type_id", type_id.to_string()));
        }
        self.stores.types.delete_type(type_id).await?;
        Ok(())
    }

    pub async fn create_ticket(
        &self,
        actor: &ActorContext,
        event_id: EventId,
        input: NewEventTicket,
    ) -> UsecaseResult<EventTicket> {
        self.load_event_for_staff(actor, event_id, &Permission::EVENTS_WRITE).await?;
        let ticket = EventTicket::create(event_id, input, self.now())?;
        self.stores.tickets.insert_ticket(&ticket).await?;
        Ok(ticket)
    }

    pub async fn list_tickets(&self, actor: &ActorContext, event_id: EventId) -> UsecaseResult<Vec<EventTicket>> {
        self.find_event(actor, event_id).await?;
        Ok(self.stores.tickets.list_tickets(event_id).await?)
    }

    pub(crate) async fn load_event(&self, id: EventId) -> UsecaseResult<Event> {
        self.stores
            .events
            .get_event(id)
            .await?
            .ok_or_else(|| UsecaseError::event_not_found(id))
    }

    /// Load an event the staff actor may manage with `permission`.
    pub(crate) async fn load_event_for_staff(
        &self,
        actor: &ActorContext,
        id: EventId,
        permission: &Permission,
    ) -> UsecaseResult<Event> {
        actor.require(permission)?;
        let event = self.load_event(id).await?;
        actor.ensure_region(event.region_id())?;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use regdesk_core::Money;

    use crate::error::ErrorKind;
    use crate::testkit::{self, Harness};

    use super::*;

    #[tokio::test]
    async fn managers_only_manage_events_in_their_region() {
        let Harness { services, .. } = testkit::harness();
        let region = testkit::seed_region(&services).await;
        let other = services.create_region(&testkit::admin(), "Sul").await.unwrap();

        let manager = testkit::manager(region.id_typed());
        let err = services
            .create_event(&manager, testkit::new_event(other.id_typed(), None))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Forbidden);

        let event = services
            .create_event(&manager, testkit::new_event(region.id_typed(), Some(10)))
            .await
            .unwrap();
        assert!(!event.payment_enabled());

        let foreign = services
            .create_event(&testkit::admin(), testkit::new_event(other.id_typed(), None))
            .await
            .unwrap();
        assert_eq!(services.list_events(&manager).await.unwrap().len(), 1);
        assert_eq!(
            services.find_event(&manager, foreign.id_typed()).await.unwrap_err().code,
            "event_not_found"
        );
        assert_eq!(services.list_events(&testkit::user()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn payments_toggle_and_status_changes_are_persisted() {
        let Harness { services, .. } = testkit::harness();
        let region = testkit::seed_region(&services).await;
        let admin = testkit::admin();
        let event = services
            .create_event(&admin, testkit::new_event(region.id_typed(), None))
            .await
            .unwrap();

        services.set_event_payments(&admin, event.id_typed(), true).await.unwrap();
        services
            .change_event_status(&admin, event.id_typed(), EventStatus::Closed)
            .await
            .unwrap();

        let stored = services.find_event(&admin, event.id_typed()).await.unwrap();
        assert!(stored.payment_enabled());
        assert_eq!(stored.status(), EventStatus::Closed);

        services
            .change_event_status(&admin, event.id_typed(), EventStatus::Finalized)
            .await
            .unwrap();
        let err = services
            .change_event_status(&admin, event.id_typed(), EventStatus::Open)
            .await
            .unwrap_err();
        assert!(err.is_invariant());
    }

    #[tokio::test]
    async fn events_with_inscriptions_cannot_be_deleted() {
        let Harness { services, .. } = testkit::harness();
        let admin = testkit::admin();
        let event = testkit::seed_event(&services, Some(10)).await;
        let kind = testkit::seed_type(&services, event.id_typed(), "Adulto", 10_000).await;
        testkit::confirm_individual(&services, &testkit::user(), &event, &kind).await;

        let err = services.delete_event(&admin, event.id_typed()).await.unwrap_err();
        assert!(err.is_invariant());

        let empty = testkit::seed_event(&services, None).await;
        services.delete_event(&admin, empty.id_typed()).await.unwrap();
        assert_eq!(
            services.find_event(&admin, empty.id_typed()).await.unwrap_err().code,
            "event_not_found"
        );
    }

    #[tokio::test]
    async fn used_inscription_types_cannot_be_deleted() {
        let Harness { services, .. } = testkit::harness();
        let admin = testkit::admin();
        let event = testkit::seed_event(&services, None).await;
        let used = testkit::seed_type(&services, event.id_typed(), "Adulto", 10_000).await;
        let unused = testkit::seed_type(&services, event.id_typed(), "Criança", 5_000).await;
        testkit::confirm_individual(&services, &testkit::user(), &event, &used).await;

        let err = services
            .delete_type_inscription(&admin, event.id_typed(), used.id_typed())
            .await
            .unwrap_err();
        assert!(err.is_invariant());

        services
            .delete_type_inscription(&admin, event.id_typed(), unused.id_typed())
            .await
            .unwrap();
        let remaining = services.list_type_inscriptions(&admin, event.id_typed()).await.unwrap();
        assert_eq!(remaining.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_type_descriptions_are_rejected() {
        let Harness { services, .. } = testkit::harness();
        let event = testkit::seed_event(&services, None).await;
        testkit::seed_type(&services, event.id_typed(), "Adulto", 10_000).await;

        let err = services
            .create_type_inscription(
                &testkit::admin(),
                event.id_typed(),
                NewTypeInscription {
                    description: "adulto".to_string(),
                    value: Money::from_cents(1),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn tickets_are_listed_per_event() {
        let Harness { services, .. } = testkit::harness();
        let admin = testkit::admin();
        let event = testkit::seed_event(&services, None).await;
        services
            .create_ticket(
                &admin,
                event.id_typed(),
                NewEventTicket {
                    name: "Jantar".to_string(),
                    price: Money::from_cents(4_000),
                    quantity: 50,
                },
            )
            .await
            .unwrap();

        let tickets = services.list_tickets(&admin, event.id_typed()).await.unwrap();
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].quantity_available(), 50);
    }
}
