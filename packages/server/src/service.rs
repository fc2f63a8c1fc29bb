use std::sync::Arc;

use common::Region;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::{Access, AuthGate, Credential, Principal};
use crate::entity::account::Model as Account;
use crate::error::AppError;
use crate::identity::{IdentityLinker, LoginOutcome};
use crate::models::spotted::{NewSpotted, Spotted, SpottedView};

/// Whose spotteds to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    /// The caller, anonymous posts included.
    Me,
    /// Someone's public posts.
    Account(Uuid),
}

/// The operations a transport exposes. Every call carries its credential.
pub struct SpottedService {
    gate: Arc<AuthGate>,
    linker: Arc<IdentityLinker>,
}

impl SpottedService {
    pub fn new(gate: Arc<AuthGate>, linker: Arc<IdentityLinker>) -> Self {
        Self { gate, linker }
    }

    pub fn linker(&self) -> &Arc<IdentityLinker> {
        &self.linker
    }

    async fn member(&self, credential: &Credential) -> Result<Account, AppError> {
        match self.gate.authorize(credential, Access::Member).await? {
            Principal::Member { account, .. } => Ok(account),
            Principal::Guest => Err(AppError::Unauthorized(
                "guests cannot perform this operation".into(),
            )),
        }
    }

    /// Sign in, creating the account on first login.
    #[instrument(skip_all, fields(scheme = %credential.scheme))]
    pub async fn login(&self, credential: &Credential) -> Result<LoginOutcome, AppError> {
        let claims = self.gate.authenticate_login(credential).await?;
        self.linker.login_or_create(&claims).await
    }

    /// Attach the identity proven by `secondary` to the caller's account.
    #[instrument(skip_all, fields(scheme = %credential.scheme, secondary = %secondary.scheme))]
    pub async fn link(
        &self,
        credential: &Credential,
        secondary: &Credential,
    ) -> Result<Account, AppError> {
        let account = self.member(credential).await?;
        if secondary.scheme == credential.scheme {
            return Err(AppError::LinkConflict(
                "the linked identity must come from the other provider".into(),
            ));
        }
        let claims = self.gate.verify_credential(secondary).await?;
        self.linker.link_identity(account.id, &claims).await
    }

    /// Fold the account owning `secondary`'s identity into the caller's.
    #[instrument(skip_all, fields(scheme = %credential.scheme, secondary = %secondary.scheme))]
    pub async fn merge(
        &self,
        credential: &Credential,
        secondary: &Credential,
    ) -> Result<Account, AppError> {
        let survivor = self.member(credential).await?;
        if secondary.scheme == credential.scheme {
            return Err(AppError::MergeConflict(
                "the merged identity must come from the other provider".into(),
            ));
        }
        let claims = self.gate.verify_credential(secondary).await?;
        let absorbed = self
            .linker
            .resolve_identity(claims.provider, &claims.external_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("No account holds this {} identity", claims.provider))
            })?;
        self.linker.merge_accounts(survivor.id, absorbed.id).await
    }

    #[instrument(skip_all, fields(scheme = %credential.scheme))]
    pub async fn create_spotted(
        &self,
        credential: &Credential,
        spotted: NewSpotted,
    ) -> Result<Uuid, AppError> {
        let account = self.member(credential).await?;
        let id = self.linker.content().create(account.id, spotted).await?;
        info!(spotted_id = %id, account_id = %account.id, "Spotted created");
        Ok(id)
    }

    #[instrument(skip(self, credential), fields(scheme = %credential.scheme))]
    pub async fn spotted(&self, credential: &Credential, id: Uuid) -> Result<Spotted, AppError> {
        self.gate.authorize(credential, Access::Public).await?;
        self.linker
            .content()
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Spotted not found".into()))
    }

    #[instrument(skip(self, credential, region), fields(scheme = %credential.scheme))]
    pub async fn spotteds_in_region(
        &self,
        credential: &Credential,
        region: &Region,
        location_only: bool,
    ) -> Result<Vec<SpottedView>, AppError> {
        self.gate.authorize(credential, Access::Public).await?;
        self.linker
            .content()
            .get_in_region(region, location_only)
            .await
    }

    #[instrument(skip(self, credential), fields(scheme = %credential.scheme))]
    pub async fn spotteds_by_owner(
        &self,
        credential: &Credential,
        owner: Owner,
    ) -> Result<Vec<Spotted>, AppError> {
        let caller = self.member(credential).await?;
        let content = self.linker.content();
        match owner {
            Owner::Me => content.get_by_owner(caller.id, true).await,
            Owner::Account(id) => {
                let account = self
                    .linker
                    .resolve_account(id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Account not found".into()))?;
                content.get_by_owner(account.id, false).await
            }
        }
    }

    /// Disable the caller's account and hide its spotteds.
    #[instrument(skip_all, fields(scheme = %credential.scheme))]
    pub async fn disable_account(&self, credential: &Credential) -> Result<Account, AppError> {
        let account = self.member(credential).await?;
        self.linker.set_disabled(account.id, true).await
    }
}
