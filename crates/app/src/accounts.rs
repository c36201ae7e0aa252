//! Regions, accounts and the caller's reusable participant profiles.

use tracing::info;

use regdesk_accounts::{
    Account, AccountParticipant, AccountParticipantId, NewAccount, NewAccountParticipant, Region,
    UpdateAccountParticipant,
};
use regdesk_auth::{Permission, Role};
use regdesk_core::{AccountId, RegionId};

use crate::context::ActorContext;
use crate::error::{UsecaseError, UsecaseResult};
use crate::services::AppServices;

impl AppServices {
    pub async fn create_region(&self, actor: &ActorContext, name: &str) -> UsecaseResult<Region> {
        actor.require(&Permission::REGIONS_WRITE)?;
        let region = Region::create(name, self.now())?;
        self.stores.regions.insert_region(&region).await?;
        info!(region_id = %region.id_typed(), name = region.name(), "region created");
        Ok(region)
    }

    pub async fn list_regions(&self, _actor: &ActorContext) -> UsecaseResult<Vec<Region>> {
        Ok(self.stores.regions.list_regions().await?)
    }

    pub(crate) async fn load_region(&self, id: RegionId) -> UsecaseResult<Region> {
        self.stores
            .regions
            .get_region(id)
            .await?
            .ok_or_else(|| UsecaseError::region_not_found(id))
    }

    pub async fn create_account(&self, actor: &ActorContext, input: NewAccount) -> UsecaseResult<Account> {
        actor.require(&Permission::ACCOUNTS_WRITE)?;
        if input.role == Role::Super && actor.role() != Role::Super {
            return Err(UsecaseError::forbidden("only super accounts may create super accounts"));
        }
        if let Some(region_id) = input.region_id {
            self.load_region(region_id).await?;
        }

        let account = Account::create(input, self.now())?;
        self.stores.accounts.insert_account(&account).await?;
        info!(
            account_id = %account.id_typed(),
            username = account.username(),
            role = %account.role(),
            "account created"
        );
        Ok(account)
    }

    pub async fn list_accounts(&self, actor: &ActorContext) -> UsecaseResult<Vec<Account>> {
        if !actor.is_staff() {
            return Err(UsecaseError::forbidden("only staff may list accounts"));
        }
        Ok(self.stores.accounts.list_accounts(actor.region_filter()).await?)
    }

    /// Staff see accounts in their reach; everyone else only their own.
    pub async fn find_account(&self, actor: &ActorContext, id: AccountId) -> UsecaseResult<Account> {
        let account = self
            .stores
            .accounts
            .get_account(id)
            .await?
            .ok_or_else(|| UsecaseError::account_not_found(id))?;

        if account.id_typed() == actor.account_id() {
            return Ok(account);
        }
        if !actor.is_staff() {
            return Err(UsecaseError::account_not_found(id));
        }
        if actor.role().is_region_scoped() && account.region_id() != actor.region_id() {
            return Err(UsecaseError::account_not_found(id));
        }
        Ok(account)
    }

    pub async fn deactivate_account(&self, actor: &ActorContext, id: AccountId) -> UsecaseResult<Account> {
        actor.require(&Permission::ACCOUNTS_WRITE)?;
        if id == actor.account_id() {
            return Err(UsecaseError::invariant("accounts cannot deactivate themselves"));
        }
        let mut account = self
            .stores
            .accounts
            .get_account(id)
            .await?
            .ok_or_else(|| UsecaseError::account_not_found(id))?;

        account.deactivate()?;
        self.stores.accounts.update_account(&account).await?;
        info!(account_id = %id, "account deactivated");
        Ok(account)
    }

    pub async fn create_participant(
        &self,
        actor: &ActorContext,
        input: NewAccountParticipant,
    ) -> UsecaseResult<AccountParticipant> {
        let now = self.now();
        if input.birth_date > now.date_naive() {
            return Err(UsecaseError::validation("birth date cannot be in the future"));
        }
        let participant = AccountParticipant::create(actor.account_id(), input, now)?;
        self.stores
            .account_participants
            .insert_account_participant(&participant)
            .await?;
        Ok(participant)
    }

    pub async fn list_participants(&self, actor: &ActorContext) -> UsecaseResult<Vec<AccountParticipant>> {
        Ok(self
            .stores
            .account_participants
            .list_account_participants(actor.account_id())
            .await?)
    }

    pub async fn update_participant(
        &self,
        actor: &ActorContext,
        id: AccountParticipantId,
        changes: UpdateAccountParticipant,
    ) -> UsecaseResult<AccountParticipant> {
        let mut participant = self.load_own_participant(actor, id).await?;
        participant.update(changes, self.now().date_naive())?;
        self.stores
            .account_participants
            .update_account_participant(&participant)
            .await?;
        Ok(participant)
    }

    pub async fn delete_participant(&self, actor: &ActorContext, id: AccountParticipantId) -> UsecaseResult<()> {
        self.load_own_participant(actor, id).await?;
        self.stores.account_participants.delete_account_participant(id).await?;
        info!(participant_id = %id, "account participant deleted");
        Ok(())
    }

    pub(crate) async fn load_own_participant(
        &self,
        actor: &ActorContext,
        id: AccountParticipantId,
    ) -> UsecaseResult<AccountParticipant> {
        let participant = self
            .stores
            .account_participants
            .get_account_participant(id)
            .await?
            .ok_or_else(|| UsecaseError::participant_not_found(id))?;
        if participant.account_id() != actor.account_id() {
            return Err(UsecaseError::forbidden("participant belongs to another account")
                .with_context("participant_id", id.to_string()));
        }
        Ok(participant)
    }
}
