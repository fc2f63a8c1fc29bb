use async_trait::async_trait;
use chrono::Utc;
use common::Region;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, Set,
};
use tracing::debug;
use uuid::Uuid;

use super::{ContentStore, point};
use crate::entity::spotted;
use crate::error::AppError;
use crate::models::spotted::{NewSpotted, Spotted, SpottedPin, SpottedView};

/// [`ContentStore`] over a SeaORM connection.
///
/// Region queries narrow rows with the region's bounding box in SQL, then
/// apply the exact polygon test here.
#[derive(Clone)]
pub struct DbContentStore {
    db: DatabaseConnection,
}

impl DbContentStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ContentStore for DbContentStore {
    async fn create(&self, owner_account_id: Uuid, new: NewSpotted) -> Result<Uuid, AppError> {
        new.location.validate()?;

        let model = spotted::ActiveModel {
            id: Set(Uuid::now_v7()),
            owner_account_id: Set(owner_account_id),
            anonymous: Set(new.anonymous),
            archived: Set(false),
            latitude: Set(new.location.latitude),
            longitude: Set(new.location.longitude),
            message: Set(new.message),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        let inserted = model.insert(&self.db).await?;
        debug!(spotted_id = %inserted.id, owner = %owner_account_id, "Spotted inserted");
        Ok(inserted.id)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Spotted>, AppError> {
        let found = spotted::Entity::find_by_id(id)
            .filter(spotted::Column::Archived.eq(false))
            .one(&self.db)
            .await?;
        Ok(found.map(Spotted::from))
    }

    async fn get_in_region(
        &self,
        region: &Region,
        location_only: bool,
    ) -> Result<Vec<SpottedView>, AppError> {
        let bounds = region.bounds();
        let query = spotted::Entity::find()
            .filter(spotted::Column::Archived.eq(false))
            .filter(spotted::Column::Anonymous.eq(false))
            .filter(spotted::Column::Latitude.between(bounds.min_latitude, bounds.max_latitude))
            .filter(spotted::Column::Longitude.between(bounds.min_longitude, bounds.max_longitude));

        if location_only {
            let rows: Vec<(Uuid, f64, f64)> = query
                .select_only()
                .column(spotted::Column::Id)
                .column(spotted::Column::Latitude)
                .column(spotted::Column::Longitude)
                .into_tuple()
                .all(&self.db)
                .await?;

            return Ok(rows
                .into_iter()
                .map(|(id, lat, lng)| SpottedPin {
                    id,
                    location: point(lat, lng),
                })
                .filter(|pin| region.contains(pin.location))
                .map(SpottedView::Pin)
                .collect());
        }

        let rows = query.all(&self.db).await?;
        Ok(rows
            .into_iter()
            .map(Spotted::from)
            .filter(|s| region.contains(s.location))
            .map(SpottedView::Full)
            .collect())
    }

    async fn get_by_owner(
        &self,
        owner_account_id: Uuid,
        include_anonymous: bool,
    ) -> Result<Vec<Spotted>, AppError> {
        let mut query = spotted::Entity::find()
            .filter(spotted::Column::OwnerAccountId.eq(owner_account_id))
            .filter(spotted::Column::Archived.eq(false));
        if !include_anonymous {
            query = query.filter(spotted::Column::Anonymous.eq(false));
        }

        let rows = query.all(&self.db).await?;
        Ok(rows.into_iter().map(Spotted::from).collect())
    }

    async fn reassign_owner(&self, from: Uuid, to: Uuid) -> Result<u64, AppError> {
        let result = spotted::Entity::update_many()
            .col_expr(spotted::Column::OwnerAccountId, Expr::value(to))
            .filter(spotted::Column::OwnerAccountId.eq(from))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn set_archived_for_owner(
        &self,
        owner_account_id: Uuid,
        archived: bool,
    ) -> Result<u64, AppError> {
        let result = spotted::Entity::update_many()
            .col_expr(spotted::Column::Archived, Expr::value(archived))
            .filter(spotted::Column::OwnerAccountId.eq(owner_account_id))
            .filter(spotted::Column::Archived.ne(archived))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn owners_with_archived(&self, archived: bool) -> Result<Vec<Uuid>, AppError> {
        let owners: Vec<Uuid> = spotted::Entity::find()
            .select_only()
            .column(spotted::Column::OwnerAccountId)
            .filter(spotted::Column::Archived.eq(archived))
            .distinct()
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(owners)
    }
}
