use common::Provider;
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::IdentityLinker;
use crate::entity::account::Model as Account;
use crate::error::AppError;

/// What a reconcile pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Spotteds moved from superseded accounts to their successor.
    pub reassigned: u64,
    /// Superseded accounts whose merge never completed and were restored.
    pub identities_restored: u64,
    pub archived: u64,
    pub unarchived: u64,
}

impl IdentityLinker {
    /// Converge state left behind by interrupted merges and cascades.
    ///
    /// Safe to run repeatedly. A merge caught between its first two steps is
    /// treated as abandoned and undone. If that merge attaches the identity
    /// meanwhile, the restore hits the unique index and the account's content
    /// is reassigned as for a finished merge.
    #[instrument(skip(self))]
    pub async fn reconcile(&self) -> Result<ReconcileReport, AppError> {
        let mut report = ReconcileReport::default();

        for absorbed in self.accounts().list_superseded().await? {
            if self.restore_if_unfinished(&absorbed).await? {
                report.identities_restored += 1;
                continue;
            }
            let target = self.follow_successors(absorbed.clone()).await?;
            report.reassigned += self
                .content()
                .reassign_owner(absorbed.id, target.id)
                .await?;
        }

        for owner in self.content().owners_with_archived(false).await? {
            match self.accounts().find_by_id(owner).await? {
                Some(account) if account.disabled => {
                    report.archived += self
                        .content()
                        .set_archived_for_owner(owner, true)
                        .await?;
                }
                Some(_) => {}
                None => warn!(owner = %owner, "Spotteds reference a missing account"),
            }
        }
        for owner in self.content().owners_with_archived(true).await? {
            if let Some(account) = self.accounts().find_by_id(owner).await?
                && !account.disabled
            {
                report.unarchived += self
                    .content()
                    .set_archived_for_owner(owner, false)
                    .await?;
            }
        }

        info!(
            reassigned = report.reassigned,
            identities_restored = report.identities_restored,
            archived = report.archived,
            unarchived = report.unarchived,
            "Reconcile pass finished"
        );
        Ok(report)
    }

    /// Undo a merge whose retired identity never reached the successor.
    async fn restore_if_unfinished(&self, absorbed: &Account) -> Result<bool, AppError> {
        let Some(successor_id) = absorbed.successor_id else {
            return Ok(false);
        };
        let successor = self.accounts().find_by_id(successor_id).await?;

        for &provider in Provider::ALL {
            let Some(retired) = absorbed.retired_identity(provider) else {
                continue;
            };
            let landed = successor
                .as_ref()
                .is_some_and(|s| s.identity(provider) == Some(retired));
            if landed {
                continue;
            }
            if self
                .accounts()
                .find_by_external_id(provider, retired)
                .await?
                .is_some()
            {
                warn!(account_id = %absorbed.id, %provider, "Retired identity is held elsewhere");
                continue;
            }
            match self
                .accounts()
                .restore_superseded(absorbed.id, provider, retired, false)
                .await
            {
                Ok(0) => {}
                Ok(_) => {
                    info!(account_id = %absorbed.id, %provider, "Unfinished merge restored");
                    return Ok(true);
                }
                Err(AppError::DuplicateIdentity) => {
                    warn!(account_id = %absorbed.id, %provider, "Identity claimed during restore");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(false)
    }
}
