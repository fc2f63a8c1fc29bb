use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::Provider;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set, SqlErr,
};
use tracing::debug;
use uuid::Uuid;

use super::{AccountStore, NewAccount};
use crate::entity::account::{self, identity_column, linked_at_column, retired_column};
use crate::error::AppError;

/// [`AccountStore`] over a SeaORM connection.
#[derive(Clone)]
pub struct DbAccountStore {
    db: DatabaseConnection,
}

impl DbAccountStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[async_trait]
impl AccountStore for DbAccountStore {
    async fn find_by_external_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<account::Model>, AppError> {
        let found = account::Entity::find()
            .filter(identity_column(provider).eq(external_id))
            .one(&self.db)
            .await?;
        Ok(found)
    }

    async fn find_by_retired_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<account::Model>, AppError> {
        let found = account::Entity::find()
            .filter(retired_column(provider).eq(external_id))
            .filter(account::Column::SuccessorId.is_not_null())
            .one(&self.db)
            .await?;
        Ok(found)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<account::Model>, AppError> {
        Ok(account::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn create(&self, new: NewAccount) -> Result<Uuid, AppError> {
        let now = Utc::now();
        let mut model = account::ActiveModel {
            id: Set(Uuid::now_v7()),
            display_name: Set(new.display_name),
            avatar_url: Set(new.avatar_url),
            disabled: Set(false),
            created_at: Set(now),
            ..Default::default()
        };
        match new.provider {
            Provider::Facebook => {
                model.facebook_id = Set(Some(new.external_id));
                model.facebook_linked_at = Set(Some(now));
            }
            Provider::Google => {
                model.google_id = Set(Some(new.external_id));
                model.google_linked_at = Set(Some(now));
            }
        }

        match model.insert(&self.db).await {
            Ok(inserted) => {
                debug!(account_id = %inserted.id, provider = %new.provider, "Account inserted");
                Ok(inserted.id)
            }
            Err(e) if is_unique_violation(&e) => Err(AppError::DuplicateIdentity),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_identity(
        &self,
        id: Uuid,
        provider: Provider,
        external_id: &str,
        linked_at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let result = account::Entity::update_many()
            .col_expr(identity_column(provider), Expr::value(external_id))
            .col_expr(linked_at_column(provider), Expr::value(linked_at))
            .filter(account::Column::Id.eq(id))
            .filter(identity_column(provider).is_null())
            .filter(account::Column::Disabled.eq(false))
            .filter(account::Column::SuccessorId.is_null())
            .exec(&self.db)
            .await;

        match result {
            Ok(res) => Ok(res.rows_affected),
            Err(e) if is_unique_violation(&e) => Err(AppError::DuplicateIdentity),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_disabled(&self, id: Uuid, disabled: bool) -> Result<u64, AppError> {
        let result = account::Entity::update_many()
            .col_expr(account::Column::Disabled, Expr::value(disabled))
            .filter(account::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn supersede(
        &self,
        absorbed: Uuid,
        provider: Provider,
        external_id: &str,
        successor: Uuid,
    ) -> Result<u64, AppError> {
        let result = account::Entity::update_many()
            .col_expr(identity_column(provider), Expr::value(Option::<String>::None))
            .col_expr(retired_column(provider), Expr::value(external_id))
            .col_expr(account::Column::Disabled, Expr::value(true))
            .col_expr(account::Column::SuccessorId, Expr::value(successor))
            .filter(account::Column::Id.eq(absorbed))
            .filter(identity_column(provider).eq(external_id))
            .filter(account::Column::Disabled.eq(false))
            .filter(account::Column::SuccessorId.is_null())
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn restore_superseded(
        &self,
        absorbed: Uuid,
        provider: Provider,
        external_id: &str,
        disabled: bool,
    ) -> Result<u64, AppError> {
        let result = account::Entity::update_many()
            .col_expr(identity_column(provider), Expr::value(external_id))
            .col_expr(retired_column(provider), Expr::value(Option::<String>::None))
            .col_expr(account::Column::Disabled, Expr::value(disabled))
            .col_expr(account::Column::SuccessorId, Expr::value(Option::<Uuid>::None))
            .filter(account::Column::Id.eq(absorbed))
            .filter(retired_column(provider).eq(external_id))
            .filter(identity_column(provider).is_null())
            .exec(&self.db)
            .await;

        match result {
            Ok(res) => Ok(res.rows_affected),
            Err(e) if is_unique_violation(&e) => Err(AppError::DuplicateIdentity),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_superseded(&self) -> Result<Vec<account::Model>, AppError> {
        let accounts = account::Entity::find()
            .filter(account::Column::SuccessorId.is_not_null())
            .all(&self.db)
            .await?;
        Ok(accounts)
    }
}
