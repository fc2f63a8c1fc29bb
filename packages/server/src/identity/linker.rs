use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use common::{Provider, RetryPolicy};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::entity::account::Model as Account;
use crate::error::AppError;
use crate::provider::VerifiedClaims;
use crate::store::{AccountStore, ContentStore, NewAccount};

/// Longest successor chain followed before giving up.
pub const MAX_SUCCESSOR_HOPS: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct LoginOutcome {
    pub account: Account,
    /// True when this login created the account.
    pub created: bool,
}

pub struct IdentityLinker {
    accounts: Arc<dyn AccountStore>,
    content: Arc<dyn ContentStore>,
    cascade: RetryPolicy,
}

impl IdentityLinker {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        content: Arc<dyn ContentStore>,
        cascade: RetryPolicy,
    ) -> Self {
        Self {
            accounts,
            content,
            cascade,
        }
    }

    pub fn accounts(&self) -> &Arc<dyn AccountStore> {
        &self.accounts
    }

    pub fn content(&self) -> &Arc<dyn ContentStore> {
        &self.content
    }

    /// Account answering for `(provider, external_id)`.
    ///
    /// An identity retired by a merge resolves to the account that absorbed it.
    pub async fn resolve_identity(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<Account>, AppError> {
        if let Some(account) = self
            .accounts
            .find_by_external_id(provider, external_id)
            .await?
        {
            return Ok(Some(account));
        }
        match self
            .accounts
            .find_by_retired_id(provider, external_id)
            .await?
        {
            Some(retired) => self.follow_successors(retired).await.map(Some),
            None => Ok(None),
        }
    }

    /// Account `id`, or the account it was merged into.
    pub async fn resolve_account(&self, id: Uuid) -> Result<Option<Account>, AppError> {
        match self.accounts.find_by_id(id).await? {
            Some(account) => self.follow_successors(account).await.map(Some),
            None => Ok(None),
        }
    }

    pub(super) async fn follow_successors(&self, mut account: Account) -> Result<Account, AppError> {
        for _ in 0..MAX_SUCCESSOR_HOPS {
            let Some(next) = account.successor_id else {
                return Ok(account);
            };
            account = self.accounts.find_by_id(next).await?.ok_or_else(|| {
                AppError::Internal(format!(
                    "Account {} points at missing successor {}",
                    account.id, next
                ))
            })?;
        }
        Err(AppError::Internal(format!(
            "Successor chain from account {} exceeds {} hops",
            account.id, MAX_SUCCESSOR_HOPS
        )))
    }

    /// Return the account for these claims, creating it on first login.
    #[instrument(skip(self, claims), fields(provider = %claims.provider))]
    pub async fn login_or_create(&self, claims: &VerifiedClaims) -> Result<LoginOutcome, AppError> {
        claims.validate()?;

        if let Some(account) = self
            .resolve_identity(claims.provider, &claims.external_id)
            .await?
        {
            return Ok(LoginOutcome {
                account,
                created: false,
            });
        }

        match self.accounts.create(NewAccount::from_claims(claims)).await {
            Ok(id) => {
                let account = self.accounts.find_by_id(id).await?.ok_or_else(|| {
                    AppError::Internal(format!("Account {id} vanished after insert"))
                })?;
                info!(account_id = %id, "Account created on first login");
                Ok(LoginOutcome {
                    account,
                    created: true,
                })
            }
            // A concurrent login created it first.
            Err(AppError::DuplicateIdentity) => {
                let account = self
                    .resolve_identity(claims.provider, &claims.external_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::Internal("Identity conflict but no owning account".into())
                    })?;
                Ok(LoginOutcome {
                    account,
                    created: false,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Attach a second provider identity to an existing account. Never
    /// overwrites an identity already in place.
    #[instrument(skip(self, claims), fields(account_id = %account_id, provider = %claims.provider))]
    pub async fn link_identity(
        &self,
        account_id: Uuid,
        claims: &VerifiedClaims,
    ) -> Result<Account, AppError> {
        claims.validate()?;
        let provider = claims.provider;

        let target = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| AppError::LinkConflict("account does not exist".into()))?;
        if target.disabled || target.is_superseded() {
            return Err(AppError::LinkConflict("account is not active".into()));
        }
        if target.identity(provider).is_some() {
            warn!("Account already holds an identity for this provider");
            return Err(AppError::LinkConflict(format!(
                "account already has a {provider} identity"
            )));
        }
        if self
            .accounts
            .find_by_external_id(provider, &claims.external_id)
            .await?
            .is_some()
            || self
                .accounts
                .find_by_retired_id(provider, &claims.external_id)
                .await?
                .is_some()
        {
            warn!("Identity already belongs to another account");
            return Err(AppError::LinkConflict(format!(
                "{provider} identity belongs to another account"
            )));
        }

        match self
            .accounts
            .update_identity(account_id, provider, &claims.external_id, Utc::now())
            .await
        {
            Ok(0) => {
                return Err(AppError::LinkConflict(
                    "account changed while linking".into(),
                ));
            }
            Ok(_) => {}
            Err(AppError::DuplicateIdentity) => {
                return Err(AppError::LinkConflict(format!(
                    "{provider} identity belongs to another account"
                )));
            }
            Err(e) => return Err(e),
        }

        info!("Identity linked");
        self.accounts
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Account {account_id} vanished after link")))
    }

    /// Fold `absorbed` into `survivor`.
    ///
    /// Both accounts must hold exactly one identity, from different providers.
    /// The survivor gains the absorbed identity and content and keeps its own
    /// profile fields; the absorbed account is disabled and points at the
    /// survivor.
    #[instrument(skip(self), fields(survivor = %survivor_id, absorbed = %absorbed_id))]
    pub async fn merge_accounts(
        &self,
        survivor_id: Uuid,
        absorbed_id: Uuid,
    ) -> Result<Account, AppError> {
        if survivor_id == absorbed_id {
            return Err(AppError::MergeConflict(
                "cannot merge an account with itself".into(),
            ));
        }
        let survivor = self
            .accounts
            .find_by_id(survivor_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Survivor account not found".into()))?;
        let absorbed = self
            .accounts
            .find_by_id(absorbed_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Account to merge not found".into()))?;

        if absorbed.is_superseded() {
            return Err(AppError::MergeConflict(
                "account was already merged".into(),
            ));
        }
        if survivor.is_superseded() || survivor.disabled || absorbed.disabled {
            return Err(AppError::MergeConflict(
                "both accounts must be active".into(),
            ));
        }
        let (Some(kept), Some(moved)) = (survivor.sole_provider(), absorbed.sole_provider()) else {
            return Err(AppError::MergeConflict(
                "each account must hold exactly one identity".into(),
            ));
        };
        if kept == moved {
            return Err(AppError::MergeConflict(format!(
                "both accounts use {kept}"
            )));
        }
        let external_id = absorbed
            .identity(moved)
            .map(str::to_owned)
            .ok_or_else(|| AppError::Internal("Sole provider without identity".into()))?;

        // 1. Retire the identity on the absorbed account.
        let superseded = self
            .accounts
            .supersede(absorbed_id, moved, &external_id, survivor_id)
            .await?;
        if superseded == 0 {
            return Err(AppError::MergeConflict(
                "account changed while merging".into(),
            ));
        }

        // 2. Hand it to the survivor.
        let attached = self
            .accounts
            .update_identity(survivor_id, moved, &external_id, Utc::now())
            .await;
        let failure = match attached {
            Ok(0) => Some(AppError::MergeConflict(format!(
                "survivor gained a {moved} identity while merging"
            ))),
            Ok(_) => None,
            Err(AppError::DuplicateIdentity) => Some(AppError::MergeConflict(format!(
                "{moved} identity was claimed while merging"
            ))),
            Err(e) => Some(e),
        };
        if let Some(err) = failure {
            match self
                .accounts
                .restore_superseded(absorbed_id, moved, &external_id, absorbed.disabled)
                .await
            {
                Ok(_) => warn!(error = %err, "Merge rolled back"),
                Err(e) => error!(error = %e, "Failed to roll back merge; left for reconcile"),
            }
            return Err(err);
        }

        // 3. Move content. A failure here is finished by reconcile.
        match self
            .with_retries("content reassignment", || {
                self.content.reassign_owner(absorbed_id, survivor_id)
            })
            .await
        {
            Ok(moved_count) => info!(moved = moved_count, "Accounts merged"),
            Err(e) => error!(error = %e, "Merged, but content reassignment is pending reconcile"),
        }

        self.accounts
            .find_by_id(survivor_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Account {survivor_id} vanished after merge")))
    }

    /// Flip the account flag, then cascade it onto the account's content.
    ///
    /// Between the two writes the content may briefly disagree with the
    /// account. If the cascade keeps failing the flag is put back and the
    /// store error returned.
    #[instrument(skip(self), fields(account_id = %account_id))]
    pub async fn set_disabled(&self, account_id: Uuid, disabled: bool) -> Result<Account, AppError> {
        let mut account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Account not found".into()))?;
        if !disabled && account.is_superseded() {
            return Err(AppError::MergeConflict(
                "a merged account cannot be re-enabled".into(),
            ));
        }
        let previous = account.disabled;

        if self.accounts.update_disabled(account_id, disabled).await? == 0 {
            return Err(AppError::NotFound("Account not found".into()));
        }

        match self
            .with_retries("archival cascade", || {
                self.content.set_archived_for_owner(account_id, disabled)
            })
            .await
        {
            Ok(count) => {
                info!(disabled, archived = count, "Account flag cascaded");
                account.disabled = disabled;
                Ok(account)
            }
            Err(e) => {
                error!(error = %e, "Archival cascade failed, restoring account flag");
                if let Err(rollback) = self.accounts.update_disabled(account_id, previous).await {
                    error!(error = %rollback, "Failed to restore account flag; left for reconcile");
                }
                Err(e)
            }
        }
    }

    async fn with_retries<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut attempt = 0u8;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.cascade.max_retries => {
                    attempt += 1;
                    let delay = self.cascade.delay(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "{} failed, retrying",
                        what
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
