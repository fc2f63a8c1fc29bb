use common::Provider;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// An internal account. Provider identities live in one nullable, unique
/// column per provider so the store enforces "one account per identity".
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "account")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub facebook_id: Option<String>,
    pub facebook_linked_at: Option<DateTimeUtc>,

    #[sea_orm(unique)]
    pub google_id: Option<String>,
    pub google_linked_at: Option<DateTimeUtc>,

    /// Copied from the provider profile at creation time. May be stale.
    pub display_name: String,
    pub avatar_url: Option<String>,

    #[sea_orm(default_value = false, indexed)]
    pub disabled: bool,

    /// Set once this account has been absorbed by a merge.
    #[sea_orm(indexed)]
    pub successor_id: Option<Uuid>,

    /// Identities this account held before it was superseded.
    #[sea_orm(indexed)]
    pub retired_facebook_id: Option<String>,
    #[sea_orm(indexed)]
    pub retired_google_id: Option<String>,

    #[sea_orm(has_many)]
    pub spotteds: HasMany<super::spotted::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// External id registered for `provider`, if any.
    pub fn identity(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Facebook => self.facebook_id.as_deref(),
            Provider::Google => self.google_id.as_deref(),
        }
    }

    pub fn retired_identity(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Facebook => self.retired_facebook_id.as_deref(),
            Provider::Google => self.retired_google_id.as_deref(),
        }
    }

    /// Providers this account can currently sign in with.
    pub fn providers(&self) -> Vec<Provider> {
        Provider::ALL
            .iter()
            .copied()
            .filter(|p| self.identity(*p).is_some())
            .collect()
    }

    /// The provider if the account holds exactly one identity.
    pub fn sole_provider(&self) -> Option<Provider> {
        match self.providers().as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    pub fn is_superseded(&self) -> bool {
        self.successor_id.is_some()
    }
}

pub fn identity_column(provider: Provider) -> Column {
    match provider {
        Provider::Facebook => Column::FacebookId,
        Provider::Google => Column::GoogleId,
    }
}

pub fn linked_at_column(provider: Provider) -> Column {
    match provider {
        Provider::Facebook => Column::FacebookLinkedAt,
        Provider::Google => Column::GoogleLinkedAt,
    }
}

pub fn retired_column(provider: Provider) -> Column {
    match provider {
        Provider::Facebook => Column::RetiredFacebookId,
        Provider::Google => Column::RetiredGoogleId,
    }
}
