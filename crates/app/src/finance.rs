//! Cash registers: event allocation, manual movements and transfers.

use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use regdesk_auth::Permission;
use regdesk_core::{Money, RegionId};
use regdesk_events::EventId;
use regdesk_finance::{
    CashMovement, CashRegister, CashRegisterId, CashRegisterStatus, MovementKind, MovementOrigin, NewCashMovement,
};

use crate::context::ActorContext;
use crate::error::{UsecaseError, UsecaseResult};
use crate::services::AppServices;

#[derive(Debug, Clone, Deserialize)]
pub struct NewCashRegister {
    pub name: String,
    pub region_id: RegionId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManualMovement {
    pub kind: MovementKind,
    pub value: Money,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CashTransfer {
    pub from: CashRegisterId,
    pub to: CashRegisterId,
    pub value: Money,
    #[serde(default)]
    pub description: Option<String>,
}

impl AppServices {
    pub async fn create_register(&self, actor: &ActorContext, input: NewCashRegister) -> UsecaseResult<CashRegister> {
        actor.require(&Permission::FINANCE_WRITE)?;
        actor.ensure_region(input.region_id)?;
        self.load_region(input.region_id).await?;

        let register = CashRegister::create(&input.name, input.region_id, self.now())?;
        self.stores.registers.insert_register(&register).await?;
        info!(register_id = %register.id_typed(), region_id = %input.region_id, "cash register created");
        Ok(register)
    }

    pub async fn list_registers(&self, actor: &ActorContext) -> UsecaseResult<Vec<CashRegister>> {
        actor.require(&Permission::FINANCE_READ)?;
        Ok(self.stores.registers.list_registers(actor.region_filter()).await?)
    }

    pub async fn find_register(&self, actor: &ActorContext, id: CashRegisterId) -> UsecaseResult<CashRegister> {
        self.load_register(actor, id, &Permission::FINANCE_READ).await
    }

    /// An event is served by at most one register, of the event's region.
    pub async fn allocate_event(
        &self,
        actor: &ActorContext,
        register_id: CashRegisterId,
        event_id: EventId,
    ) -> UsecaseResult<CashRegister> {
        let mut register = self.load_register(actor, register_id, &Permission::FINANCE_WRITE).await?;
        let event = self.load_event(event_id).await?;
        if event.region_id() != register.region_id() {
            return Err(UsecaseError::invariant("event and cash register belong to different regions")
                .with_context("event_id", event_id.to_string()));
        }
        if let Some(current) = self.stores.registers.find_register_by_event(event_id).await? {
            if current.id_typed() != register_id {
                return Err(UsecaseError::new(
                    crate::error::ErrorKind::Conflict,
                    "conflict",
                    format!("event {event_id} is already allocated to cash register {}", current.id_typed()),
                    "O evento já está vinculado a outro caixa.",
                ));
            }
        }

        register.allocate_event(event_id)?;
        self.stores.registers.save_register(&register).await?;
        info!(register_id = %register_id, event_id = %event_id, "event allocated to cash register");
        Ok(register)
    }

    pub async fn deallocate_event(
        &self,
        actor: &ActorContext,
        register_id: CashRegisterId,
        event_id: EventId,
    ) -> UsecaseResult<CashRegister> {
        let mut register = self.load_register(actor, register_id, &Permission::FINANCE_WRITE).await?;
        register.deallocate_event(event_id)?;
        self.stores.registers.save_register(&register).await?;
        info!(register_id = %register_id, event_id = %event_id, "event deallocated from cash register");
        Ok(register)
    }

    pub async fn create_movement(
        &self,
        actor: &ActorContext,
        register_id: CashRegisterId,
        input: ManualMovement,
    ) -> UsecaseResult<CashMovement> {
        let mut register = self.load_register(actor, register_id, &Permission::FINANCE_WRITE).await?;
        let movement = register.apply(
            NewCashMovement {
                kind: input.kind,
                origin: MovementOrigin::Manual,
                value: input.value,
                description: input.description,
                reference_id: None,
            },
            self.now(),
        )?;
        self.stores
            .registers
            .record_movements(std::slice::from_ref(&register), std::slice::from_ref(&movement))
            .await?;
        info!(
            register_id = %register_id,
            kind = movement.kind().as_str(),
            value = movement.value().cents(),
            balance = register.balance().cents(),
            "manual cash movement"
        );
        Ok(movement)
    }

    pub async fn list_movements(
        &self,
        actor: &ActorContext,
        register_id: CashRegisterId,
    ) -> UsecaseResult<Vec<CashMovement>> {
        self.load_register(actor, register_id, &Permission::FINANCE_READ).await?;
        Ok(self.stores.registers.list_movements(register_id).await?)
    }

    /// Expense on the source register plus income on the destination, stored together.
    pub async fn transfer(
        &self,
        actor: &ActorContext,
        input: CashTransfer,
    ) -> UsecaseResult<(CashMovement, CashMovement)> {
        if input.from == input.to {
            return Err(UsecaseError::validation("cannot transfer to the same cash register"));
        }
        let mut from = self.load_register(actor, input.from, &Permission::FINANCE_WRITE).await?;
        let mut to = self.load_register(actor, input.to, &Permission::FINANCE_WRITE).await?;
        let now = self.now();

        let description = input
            .description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| format!("Transferência entre {} e {}", from.name(), to.name()));
        let outgoing = from.apply(
            NewCashMovement {
                kind: MovementKind::Expense,
                origin: MovementOrigin::Transfer,
                value: input.value,
                description: description.clone(),
                reference_id: Some(*to.id_typed().as_uuid()),
            },
            now,
        )?;
        let incoming = to.apply(
            NewCashMovement {
                kind: MovementKind::Income,
                origin: MovementOrigin::Transfer,
                value: input.value,
                description,
                reference_id: Some(*from.id_typed().as_uuid()),
            },
            now,
        )?;

        self.stores
            .registers
            .record_movements(&[from, to], &[outgoing.clone(), incoming.clone()])
            .await?;
        info!(
            from = %input.from,
            to = %input.to,
            value = input.value.cents(),
            "cash transferred between registers"
        );
        Ok((outgoing, incoming))
    }

    pub async fn close_register(&self, actor: &ActorContext, id: CashRegisterId) -> UsecaseResult<CashRegister> {
        let mut register = self.load_register(actor, id, &Permission::FINANCE_WRITE).await?;
        register.close()?;
        self.stores.registers.save_register(&register).await?;
        info!(register_id = %id, balance = register.balance().cents(), "cash register closed");
        Ok(register)
    }

    /// Post a movement on the register serving `event_id`, if any.
    ///
    /// Events without a register, or whose register is closed, are skipped.
    pub(crate) async fn post_event_movement(
        &self,
        event_id: EventId,
        kind: MovementKind,
        origin: MovementOrigin,
        value: Money,
        description: String,
        reference_id: Uuid,
    ) -> UsecaseResult<Option<CashMovement>> {
        let Some(mut register) = self.stores.registers.find_register_by_event(event_id).await? else {
            debug!(event_id = %event_id, "no cash register for event");
            return Ok(None);
        };
        if register.status() == CashRegisterStatus::Closed {
            warn!(
                event_id = %event_id,
                register_id = %register.id_typed(),
                "cash register is closed; movement not recorded"
            );
            return Ok(None);
        }

        let movement = register.apply(
            NewCashMovement {
                kind,
                origin,
                value,
                description,
                reference_id: Some(reference_id),
            },
            self.now(),
        )?;
        self.stores
            .registers
            .record_movements(std::slice::from_ref(&register), std::slice::from_ref(&movement))
            .await?;
        debug!(
            register_id = %register.id_typed(),
            kind = kind.as_str(),
            origin = origin.as_str(),
            value = value.cents(),
            "event movement recorded"
        );
        Ok(Some(movement))
    }

    async fn load_register(
        &self,
        actor: &ActorContext,
        id: CashRegisterId,
        permission: &Permission,
    ) -> UsecaseResult<CashRegister> {
        actor.require(permission)?;
        let register = self
            .stores
            .registers
            .get_register(id)
            .await?
            .ok_or_else(|| UsecaseError::cash_register_not_found(id))?;
        actor.ensure_region(register.region_id())?;
        Ok(register)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::testkit::{self, Harness};

    use super::*;

    async fn register(services: &AppServices, region_id: RegionId, name: &str) -> CashRegister {
        services
            .create_register(
                &testkit::admin(),
                NewCashRegister {
                    name: name.to_string(),
                    region_id,
                },
            )
            .await
            .unwrap()
    }

    fn deposit(cents: i64) -> ManualMovement {
        ManualMovement {
            kind: MovementKind::Income,
            value: Money::from_cents(cents),
            description: "Troco inicial".to_string(),
        }
    }

    #[tokio::test]
    async fn manual_movements_update_the_balance() {
        let Harness { services, .. } = testkit::harness();
        let region = testkit::seed_region(&services).await;
        let cash = register(&services, region.id_typed(), "Secretaria").await;
        let manager = testkit::manager(region.id_typed());

        services.create_movement(&manager, cash.id_typed(), deposit(10_000)).await.unwrap();
        services
            .create_movement(
                &manager,
                cash.id_typed(),
                ManualMovement {
                    kind: MovementKind::Expense,
                    value: Money::from_cents(2_500),
                    description: "Material".to_string(),
                },
            )
            .await
            .unwrap();

        let err = services
            .create_movement(
                &manager,
                cash.id_typed(),
                ManualMovement {
                    kind: MovementKind::Expense,
                    value: Money::from_cents(100_000),
                    description: "Excesso".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_invariant());

        let stored = services.find_register(&manager, cash.id_typed()).await.unwrap();
        assert_eq!(stored.balance(), Money::from_cents(7_500));
        assert_eq!(services.list_movements(&manager, cash.id_typed()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn transfers_move_money_between_registers() {
        let Harness { services, .. } = testkit::harness();
        let region = testkit::seed_region(&services).await;
        let a = register(&services, region.id_typed(), "A").await;
        let b = register(&services, region.id_typed(), "B").await;
        let admin = testkit::admin();
        services.create_movement(&admin, a.id_typed(), deposit(5_000)).await.unwrap();

        let (out, inc) = services
            .transfer(
                &admin,
                CashTransfer {
                    from: a.id_typed(),
                    to: b.id_typed(),
                    value: Money::from_cents(3_000),
                    description: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(out.kind(), MovementKind::Expense);
        assert_eq!(inc.origin(), MovementOrigin::Transfer);

        assert_eq!(
            services.find_register(&admin, a.id_typed()).await.unwrap().balance(),
            Money::from_cents(2_000)
        );
        assert_eq!(
            services.find_register(&admin, b.id_typed()).await.unwrap().balance(),
            Money::from_cents(3_000)
        );

        let err = services
            .transfer(
                &admin,
                CashTransfer {
                    from: a.id_typed(),
                    to: a.id_typed(),
                    value: Money::from_cents(1),
                    description: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn events_belong_to_at_most_one_register() {
        let Harness { services, .. } = testkit::harness();
        let event = testkit::seed_event(&services, None).await;
        let a = register(&services, event.region_id(), "A").await;
        let b = register(&services, event.region_id(), "B").await;
        let admin = testkit::admin();

        services.allocate_event(&admin, a.id_typed(), event.id_typed()).await.unwrap();
        let err = services
            .allocate_event(&admin, b.id_typed(), event.id_typed())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);

        services.deallocate_event(&admin, a.id_typed(), event.id_typed()).await.unwrap();
        let b = services.allocate_event(&admin, b.id_typed(), event.id_typed()).await.unwrap();
        assert!(b.holds_event(event.id_typed()));
    }

    #[tokio::test]
    async fn closed_registers_reject_movements() {
        let Harness { services, .. } = testkit::harness();
        let region = testkit::seed_region(&services).await;
        let cash = register(&services, region.id_typed(), "Caixa").await;
        let admin = testkit::admin();

        services.close_register(&admin, cash.id_typed()).await.unwrap();
        assert!(
            services
                .create_movement(&admin, cash.id_typed(), deposit(100))
                .await
                .unwrap_err()
                .is_invariant()
        );
        assert_eq!(
            services.close_register(&admin, cash.id_typed()).await.unwrap_err().kind,
            ErrorKind::Conflict
        );
    }

    #[tokio::test]
    async fn registers_are_region_scoped() {
        let Harness { services, .. } = testkit::harness();
        let north = testkit::seed_region(&services).await;
        let south = services.create_region(&testkit::admin(), "Sul").await.unwrap();
        register(&services, north.id_typed(), "Norte").await;
        let southern = register(&services, south.id_typed(), "Sul").await;

        let manager = testkit::manager(north.id_typed());
        assert_eq!(services.list_registers(&manager).await.unwrap().len(), 1);
        assert_eq!(
            services.find_register(&manager, southern.id_typed()).await.unwrap_err().kind,
            ErrorKind::Forbidden
        );
        assert_eq!(
            services.list_registers(&testkit::user()).await.unwrap_err().kind,
            ErrorKind::Forbidden
        );
    }
}
