use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Provider, Region, RetryPolicy};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use spotted::auth::{AuthGate, Credential, ProviderEntry};
use spotted::config::{
    AppConfig, AuthConfig, DatabaseConfig, FacebookConfig, GoogleConfig, ProvidersConfig,
};
use spotted::entity::account;
use spotted::error::AppError;
use spotted::identity::IdentityLinker;
use spotted::models::spotted::{NewSpotted, Spotted, SpottedView};
use spotted::provider::{ProviderVerifier, StaticVerifier, VerifiedClaims};
use spotted::service::SpottedService;
use spotted::state::AppState;
use spotted::store::{AccountStore, ContentStore, DbAccountStore, DbContentStore, NewAccount};

pub const FACEBOOK_APP_ID: &str = "test-app";
pub const GOOGLE_CLIENT_ID: &str = "test-client.apps.googleusercontent.com";
pub const GUEST_ID: &str = "guest";
pub const GUEST_TOKEN: &str = "guest-secret";

/// Facebook users the stub verifier knows: (external id, name).
pub const FACEBOOK_USERS: &[(&str, &str)] = &[("fb1", "Ann"), ("fb2", "Bob"), ("fb3", "Cleo")];
/// Google users the stub verifier knows: (external id, name).
pub const GOOGLE_USERS: &[(&str, &str)] = &[("g1", "Gail"), ("g2", "Gus"), ("g3", "Gwen")];
/// A Google user whose tokens come from an issuer we do not trust.
pub const UNTRUSTED_GOOGLE_USER: &str = "g-untrusted";

/// The token the stubs accept for `external_id`.
pub fn token(external_id: &str) -> String {
    format!("token-{external_id}")
}

pub fn facebook(external_id: &str) -> Credential {
    Credential::provider(Provider::Facebook, external_id, token(external_id))
}

pub fn google(external_id: &str) -> Credential {
    Credential::provider(Provider::Google, external_id, token(external_id))
}

pub fn guest() -> Credential {
    Credential::guest(GUEST_ID, GUEST_TOKEN)
}

pub fn claims(provider: Provider, external_id: &str) -> VerifiedClaims {
    let users = match provider {
        Provider::Facebook => FACEBOOK_USERS,
        Provider::Google => GOOGLE_USERS,
    };
    let name = users
        .iter()
        .find(|(id, _)| *id == external_id)
        .map(|(_, name)| *name)
        .unwrap_or("Someone");
    VerifiedClaims::new(provider, external_id, name)
        .with_avatar_url(format!("https://avatars.test/{external_id}.png"))
}

pub fn facebook_verifier() -> StaticVerifier {
    FACEBOOK_USERS
        .iter()
        .fold(StaticVerifier::new(Provider::Facebook), |v, (id, _)| {
            v.with_token(token(id), claims(Provider::Facebook, id))
        })
}

pub fn google_verifier() -> StaticVerifier {
    GOOGLE_USERS
        .iter()
        .fold(StaticVerifier::new(Provider::Google), |v, (id, _)| {
            v.with_token(
                token(id),
                claims(Provider::Google, id).with_issuer("https://accounts.google.com"),
            )
        })
        .with_token(
            token(UNTRUSTED_GOOGLE_USER),
            claims(Provider::Google, UNTRUSTED_GOOGLE_USER).with_issuer("https://evil.example"),
        )
}

pub fn facebook_entry(verifier: impl ProviderVerifier + 'static) -> ProviderEntry {
    ProviderEntry {
        verifier: Arc::new(verifier),
        audience: FACEBOOK_APP_ID.into(),
        accepted_issuers: vec![],
    }
}

pub fn google_entry(verifier: impl ProviderVerifier + 'static) -> ProviderEntry {
    ProviderEntry {
        verifier: Arc::new(verifier),
        audience: GOOGLE_CLIENT_ID.into(),
        accepted_issuers: vec![
            "accounts.google.com".into(),
            "https://accounts.google.com".into(),
        ],
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database: DatabaseConfig {
            url: "sqlite::memory:".into(),
            // Each in-memory SQLite connection is its own database.
            max_connections: 1,
            min_connections: 1,
            idle_timeout_secs: None,
            max_lifetime_secs: None,
            sqlx_logging: false,
        },
        auth: AuthConfig {
            guest_id: GUEST_ID.into(),
            guest_token: GUEST_TOKEN.into(),
            verification_timeout_ms: 1000,
        },
        providers: ProvidersConfig {
            facebook: FacebookConfig {
                app_id: FACEBOOK_APP_ID.into(),
                app_access_token: "unused".into(),
                graph_url: "http://127.0.0.1:9".into(),
                accepted_issuers: vec![],
            },
            google: GoogleConfig {
                client_id: GOOGLE_CLIENT_ID.into(),
                tokeninfo_url: "http://127.0.0.1:9/tokeninfo".into(),
                accepted_issuers: vec![
                    "accounts.google.com".into(),
                    "https://accounts.google.com".into(),
                ],
            },
        },
        cascade: RetryPolicy {
            max_retries: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
        },
    }
}

/// A fresh in-memory database with the full service wired over stub verifiers.
pub struct TestApp {
    pub db: DatabaseConnection,
    pub config: AppConfig,
    pub linker: Arc<IdentityLinker>,
    pub service: Arc<SpottedService>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let config = test_config();
        let db = spotted::database::init_db(&config.database)
            .await
            .expect("Failed to initialize test database");

        let state = AppState::assemble(
            config,
            db,
            vec![
                facebook_entry(facebook_verifier()),
                google_entry(google_verifier()),
            ],
        );

        Self {
            db: state.db,
            config: state.config,
            linker: state.linker,
            service: state.service,
        }
    }

    pub fn accounts(&self) -> &Arc<dyn AccountStore> {
        self.linker.accounts()
    }

    pub fn content(&self) -> &Arc<dyn ContentStore> {
        self.linker.content()
    }

    /// Linker over the same database whose content store is `content`.
    pub fn linker_with(&self, content: Arc<dyn ContentStore>, cascade: RetryPolicy) -> IdentityLinker {
        IdentityLinker::new(Arc::new(DbAccountStore::new(self.db.clone())), content, cascade)
    }

    /// Linker over the same database whose account store is `accounts`.
    pub fn linker_over(&self, accounts: Arc<dyn AccountStore>) -> IdentityLinker {
        IdentityLinker::new(
            accounts,
            Arc::new(DbContentStore::new(self.db.clone())),
            self.config.cascade,
        )
    }

    /// Gate over this app's linker with custom providers and timeout.
    pub fn gate_with(&self, providers: Vec<ProviderEntry>, timeout_ms: u64) -> AuthGate {
        let mut auth = self.config.auth.clone();
        auth.verification_timeout_ms = timeout_ms;
        providers
            .into_iter()
            .fold(AuthGate::new(&auth, self.linker.clone()), AuthGate::with_provider)
    }

    /// First login for a known stub user.
    pub async fn login(&self, provider: Provider, external_id: &str) -> account::Model {
        self.linker
            .login_or_create(&claims(provider, external_id))
            .await
            .expect("Login failed")
            .account
    }

    pub async fn account(&self, id: Uuid) -> account::Model {
        self.accounts()
            .find_by_id(id)
            .await
            .expect("Account lookup failed")
            .expect("Account missing")
    }

    pub async fn post(&self, owner: Uuid, anonymous: bool, latitude: f64, longitude: f64) -> Uuid {
        self.content()
            .create(owner, new_spotted(anonymous, latitude, longitude))
            .await
            .expect("Failed to create spotted")
    }

    pub async fn owned(&self, owner: Uuid) -> Vec<Spotted> {
        self.content()
            .get_by_owner(owner, true)
            .await
            .expect("Owner listing failed")
    }

    pub async fn in_region(&self, region: &Region) -> Vec<SpottedView> {
        self.content()
            .get_in_region(region, false)
            .await
            .expect("Region query failed")
    }
}

pub fn new_spotted(anonymous: bool, latitude: f64, longitude: f64) -> NewSpotted {
    NewSpotted {
        anonymous,
        location: common::GeoPoint {
            latitude,
            longitude,
        },
        message: format!("seen at {latitude},{longitude}"),
    }
}

pub fn unit_square() -> Region {
    Region::from_bounds(0.0, 0.0, 1.0, 1.0).expect("Unit square is a valid region")
}

/// Content store that fails the archival cascade a set number of times.
pub struct FlakyContentStore {
    inner: DbContentStore,
    failures_left: AtomicU32,
    pub cascade_calls: AtomicU32,
}

impl FlakyContentStore {
    pub fn new(db: DatabaseConnection, failures: u32) -> Self {
        Self {
            inner: DbContentStore::new(db),
            failures_left: AtomicU32::new(failures),
            cascade_calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl ContentStore for FlakyContentStore {
    async fn create(&self, owner: Uuid, spotted: NewSpotted) -> Result<Uuid, AppError> {
        self.inner.create(owner, spotted).await
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Spotted>, AppError> {
        self.inner.get_by_id(id).await
    }

    async fn get_in_region(
        &self,
        region: &Region,
        location_only: bool,
    ) -> Result<Vec<SpottedView>, AppError> {
        self.inner.get_in_region(region, location_only).await
    }

    async fn get_by_owner(&self, owner: Uuid, include_anonymous: bool) -> Result<Vec<Spotted>, AppError> {
        self.inner.get_by_owner(owner, include_anonymous).await
    }

    async fn reassign_owner(&self, from: Uuid, to: Uuid) -> Result<u64, AppError> {
        self.inner.reassign_owner(from, to).await
    }

    async fn set_archived_for_owner(&self, owner: Uuid, archived: bool) -> Result<u64, AppError> {
        self.cascade_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AppError::Internal("store unavailable".into()));
        }
        self.inner.set_archived_for_owner(owner, archived).await
    }

    async fn owners_with_archived(&self, archived: bool) -> Result<Vec<Uuid>, AppError> {
        self.inner.owners_with_archived(archived).await
    }
}

/// Account store that lets a test interfere with a merge in flight.
pub struct MeddlingAccountStore {
    inner: DbAccountStore,
    /// Disable the absorbed account just before it is superseded, as a
    /// concurrent `set_disabled` would.
    pub disable_before_supersede: AtomicBool,
    /// Report that no row took the identity.
    pub refuse_identity_update: AtomicBool,
}

impl MeddlingAccountStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            inner: DbAccountStore::new(db),
            disable_before_supersede: AtomicBool::new(false),
            refuse_identity_update: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl AccountStore for MeddlingAccountStore {
    async fn find_by_external_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<account::Model>, AppError> {
        self.inner.find_by_external_id(provider, external_id).await
    }

    async fn find_by_retired_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<account::Model>, AppError> {
        self.inner.find_by_retired_id(provider, external_id).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<account::Model>, AppError> {
        self.inner.find_by_id(id).await
    }

    async fn create(&self, account: NewAccount) -> Result<Uuid, AppError> {
        self.inner.create(account).await
    }

    async fn update_identity(
        &self,
        id: Uuid,
        provider: Provider,
        external_id: &str,
        linked_at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        if self.refuse_identity_update.load(Ordering::SeqCst) {
            return Ok(0);
        }
        self.inner
            .update_identity(id, provider, external_id, linked_at)
            .await
    }

    async fn update_disabled(&self, id: Uuid, disabled: bool) -> Result<u64, AppError> {
        self.inner.update_disabled(id, disabled).await
    }

    async fn supersede(
        &self,
        absorbed: Uuid,
        provider: Provider,
        external_id: &str,
        successor: Uuid,
    ) -> Result<u64, AppError> {
        if self.disable_before_supersede.load(Ordering::SeqCst) {
            self.inner.update_disabled(absorbed, true).await?;
        }
        self.inner
            .supersede(absorbed, provider, external_id, successor)
            .await
    }

    async fn restore_superseded(
        &self,
        absorbed: Uuid,
        provider: Provider,
        external_id: &str,
        disabled: bool,
    ) -> Result<u64, AppError> {
        self.inner
            .restore_superseded(absorbed, provider, external_id, disabled)
            .await
    }

    async fn list_superseded(&self) -> Result<Vec<account::Model>, AppError> {
        self.inner.list_superseded().await
    }
}
