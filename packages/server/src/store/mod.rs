//! Persistence capabilities consumed by the identity and content logic.
//!
//! Every mutation is a single-row or bulk conditional update that reports the
//! number of rows it touched. Invariants are held by unique indexes and those
//! conditions, never by in-process locks.

pub mod account;
pub mod content;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{GeoPoint, Provider, Region};
use uuid::Uuid;

use crate::entity::account::Model as Account;
use crate::error::AppError;
use crate::models::spotted::{NewSpotted, Spotted, SpottedView};
use crate::provider::VerifiedClaims;

pub use account::DbAccountStore;
pub use content::DbContentStore;

/// Fields for a brand-new account holding a single identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub provider: Provider,
    pub external_id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

impl NewAccount {
    pub fn from_claims(claims: &VerifiedClaims) -> Self {
        Self {
            provider: claims.provider,
            external_id: claims.external_id.clone(),
            display_name: claims.display_name.clone(),
            avatar_url: claims.avatar_url.clone(),
        }
    }
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Account currently holding `(provider, external_id)`.
    async fn find_by_external_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<Account>, AppError>;

    /// Superseded account that held `(provider, external_id)` before a merge.
    async fn find_by_retired_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<Account>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError>;

    /// Insert an account. Fails with `DuplicateIdentity` if the identity is taken.
    async fn create(&self, account: NewAccount) -> Result<Uuid, AppError>;

    /// Attach an identity, only if the account's slot for `provider` is empty
    /// and the account is active. A unique index hit yields `DuplicateIdentity`.
    async fn update_identity(
        &self,
        id: Uuid,
        provider: Provider,
        external_id: &str,
        linked_at: DateTime<Utc>,
    ) -> Result<u64, AppError>;

    async fn update_disabled(&self, id: Uuid, disabled: bool) -> Result<u64, AppError>;

    /// Retire `absorbed`'s identity, disable it and point it at `successor`.
    ///
    /// Conditional on `absorbed` still holding that identity, being active and
    /// not already having a successor.
    async fn supersede(
        &self,
        absorbed: Uuid,
        provider: Provider,
        external_id: &str,
        successor: Uuid,
    ) -> Result<u64, AppError>;

    /// Undo [`AccountStore::supersede`], restoring the identity and the
    /// account's previous `disabled` flag.
    async fn restore_superseded(
        &self,
        absorbed: Uuid,
        provider: Provider,
        external_id: &str,
        disabled: bool,
    ) -> Result<u64, AppError>;

    async fn list_superseded(&self) -> Result<Vec<Account>, AppError>;
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Insert a spotted. The location is validated before anything is written.
    async fn create(&self, owner_account_id: Uuid, spotted: NewSpotted) -> Result<Uuid, AppError>;

    /// Fetch a spotted unless it is archived.
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Spotted>, AppError>;

    /// Public, non-archived spotteds inside `region`.
    async fn get_in_region(
        &self,
        region: &Region,
        location_only: bool,
    ) -> Result<Vec<SpottedView>, AppError>;

    /// Non-archived spotteds of one owner.
    async fn get_by_owner(
        &self,
        owner_account_id: Uuid,
        include_anonymous: bool,
    ) -> Result<Vec<Spotted>, AppError>;

    async fn reassign_owner(&self, from: Uuid, to: Uuid) -> Result<u64, AppError>;

    async fn set_archived_for_owner(
        &self,
        owner_account_id: Uuid,
        archived: bool,
    ) -> Result<u64, AppError>;

    /// Distinct owners with at least one spotted whose flag equals `archived`.
    async fn owners_with_archived(&self, archived: bool) -> Result<Vec<Uuid>, AppError>;
}

pub(crate) fn point(latitude: f64, longitude: f64) -> GeoPoint {
    GeoPoint {
        latitude,
        longitude,
    }
}
