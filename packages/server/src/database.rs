use std::time::Duration;

use sea_orm::sea_query::{Index, IndexCreateStatement, PostgresQueryBuilder, SqliteQueryBuilder};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr};
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::entity::spotted;

pub async fn init_db(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(config.url.to_owned());

    // Set connection pool options
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .sqlx_logging(config.sqlx_logging);
    if let Some(secs) = config.idle_timeout_secs {
        opt.idle_timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = config.max_lifetime_secs {
        opt.max_lifetime(Duration::from_secs(secs));
    }

    let db = Database::connect(opt).await?;
    db.get_schema_registry("spotted::entity::*")
        .sync(&db)
        .await?;
    ensure_indexes(&db).await?;

    Ok(db)
}

/// Ensure composite indexes used by content queries exist.
///
/// SeaORM's schema-sync doesn't support composite non-unique indexes,
/// so we create them manually on startup.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Region queries: visible rows inside a latitude/longitude box.
    let region = Index::create()
        .if_not_exists()
        .name("idx_spotted_visible_location")
        .table(spotted::Entity)
        .col(spotted::Column::Archived)
        .col(spotted::Column::Anonymous)
        .col(spotted::Column::Latitude)
        .col(spotted::Column::Longitude)
        .to_owned();
    create_index(db, "idx_spotted_visible_location", region).await;

    // Owner listings and the archival cascade.
    let owner = Index::create()
        .if_not_exists()
        .name("idx_spotted_owner_archived")
        .table(spotted::Entity)
        .col(spotted::Column::OwnerAccountId)
        .col(spotted::Column::Archived)
        .to_owned();
    create_index(db, "idx_spotted_owner_archived", owner).await;

    Ok(())
}

async fn create_index(db: &DatabaseConnection, name: &str, stmt: IndexCreateStatement) {
    let sql = match db.get_database_backend() {
        DbBackend::Sqlite => stmt.to_string(SqliteQueryBuilder),
        _ => stmt.to_string(PostgresQueryBuilder),
    };

    match db.execute_unprepared(&sql).await {
        Ok(_) => info!("Ensured index {} exists", name),
        Err(e) => warn!("Failed to create index {}: {}", name, e),
    }
}
