use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use sea_orm::DatabaseConnection;

use crate::auth::{AuthGate, ProviderEntry};
use crate::config::AppConfig;
use crate::database::init_db;
use crate::error::AppError;
use crate::identity::IdentityLinker;
use crate::provider::{FacebookVerifier, GoogleVerifier};
use crate::service::SpottedService;
use crate::store::{DbAccountStore, DbContentStore};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DatabaseConnection,
    pub linker: Arc<IdentityLinker>,
    pub service: Arc<SpottedService>,
}

impl AppState {
    /// Connect to the database and wire up the real provider verifiers.
    pub async fn init(config: AppConfig) -> Result<Self, AppError> {
        let db = init_db(&config.database).await?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.auth.verification_timeout_ms))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))?;

        let facebook = &config.providers.facebook;
        let google = &config.providers.google;
        let providers = vec![
            ProviderEntry {
                verifier: Arc::new(FacebookVerifier::new(client.clone(), facebook)),
                audience: facebook.app_id.clone(),
                accepted_issuers: facebook.accepted_issuers.clone(),
            },
            ProviderEntry {
                verifier: Arc::new(GoogleVerifier::new(client, google)),
                audience: google.client_id.clone(),
                accepted_issuers: google.accepted_issuers.clone(),
            },
        ];

        Ok(Self::assemble(config, db, providers))
    }

    /// Wire stores, linker, gate and service over an open connection.
    pub fn assemble(config: AppConfig, db: DatabaseConnection, providers: Vec<ProviderEntry>) -> Self {
        let linker = Arc::new(IdentityLinker::new(
            Arc::new(DbAccountStore::new(db.clone())),
            Arc::new(DbContentStore::new(db.clone())),
            config.cascade,
        ));
        let gate = providers
            .into_iter()
            .fold(AuthGate::new(&config.auth, linker.clone()), AuthGate::with_provider);
        let service = Arc::new(SpottedService::new(Arc::new(gate), linker.clone()));

        Self {
            config,
            db,
            linker,
            service,
        }
    }
}
