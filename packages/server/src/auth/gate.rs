use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::Provider;
use tracing::{instrument, warn};

use super::{Credential, Scheme};
use crate::config::AuthConfig;
use crate::entity::account::Model as Account;
use crate::error::AppError;
use crate::identity::IdentityLinker;
use crate::provider::{ProviderVerifier, VerifiedClaims};

/// Who may call an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// An active account is required.
    Member,
    /// Members and the shared guest credential.
    Public,
}

/// The authorized caller of an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Principal {
    Guest,
    Member {
        account: Account,
        claims: VerifiedClaims,
    },
}

impl Principal {
    pub fn account(&self) -> Option<&Account> {
        match self {
            Principal::Guest => None,
            Principal::Member { account, .. } => Some(account),
        }
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, Principal::Guest)
    }
}

/// A configured provider: its verifier, our audience id with it, and the
/// issuers we trust. An empty issuer list skips the issuer check; otherwise
/// an answer without an issuer is rejected.
pub struct ProviderEntry {
    pub verifier: Arc<dyn ProviderVerifier>,
    pub audience: String,
    pub accepted_issuers: Vec<String>,
}

pub struct AuthGate {
    providers: HashMap<Provider, ProviderEntry>,
    guest_id: String,
    guest_token: String,
    linker: Arc<IdentityLinker>,
    timeout: Duration,
}

impl AuthGate {
    pub fn new(config: &AuthConfig, linker: Arc<IdentityLinker>) -> Self {
        Self {
            providers: HashMap::new(),
            guest_id: config.guest_id.clone(),
            guest_token: config.guest_token.clone(),
            linker,
            timeout: Duration::from_millis(config.verification_timeout_ms),
        }
    }

    pub fn with_provider(mut self, entry: ProviderEntry) -> Self {
        self.providers.insert(entry.verifier.provider(), entry);
        self
    }

    /// Verify a credential for initial login. No account is required yet.
    pub async fn authenticate_login(&self, credential: &Credential) -> Result<VerifiedClaims, AppError> {
        self.verify_credential(credential).await
    }

    /// Resolve a credential into a principal allowed to perform `access`.
    #[instrument(skip(self, credential), fields(scheme = %credential.scheme))]
    pub async fn authorize(&self, credential: &Credential, access: Access) -> Result<Principal, AppError> {
        if credential.scheme == Scheme::Guest {
            return self.authorize_guest(credential, access);
        }

        let claims = self.verify_credential(credential).await?;
        let account = self
            .linker
            .resolve_identity(claims.provider, &claims.external_id)
            .await?
            .filter(|a| !a.disabled);
        match account {
            Some(account) => Ok(Principal::Member { account, claims }),
            None => {
                warn!("Verified identity has no active account");
                Err(AppError::Unauthorized(
                    "no active account for this identity".into(),
                ))
            }
        }
    }

    fn authorize_guest(&self, credential: &Credential, access: Access) -> Result<Principal, AppError> {
        if access != Access::Public {
            warn!("Guest credential used for a member operation");
            return Err(AppError::Unauthorized(
                "guests cannot perform this operation".into(),
            ));
        }
        if self.guest_token.is_empty()
            || credential.username != self.guest_id
            || credential.secret != self.guest_token
        {
            warn!("Guest credential rejected");
            return Err(AppError::Unauthorized("invalid guest credential".into()));
        }
        Ok(Principal::Guest)
    }

    /// `ProviderSelected -> Verified`: call the provider, then check the
    /// answer belongs to the claimed username and a trusted issuer.
    ///
    /// Also used for secondary credentials presented while linking or merging.
    #[instrument(skip(self, credential), fields(scheme = %credential.scheme))]
    pub async fn verify_credential(&self, credential: &Credential) -> Result<VerifiedClaims, AppError> {
        let Scheme::Provider(provider) = credential.scheme else {
            return Err(AppError::Unauthorized(
                "guest credentials carry no identity".into(),
            ));
        };
        let entry = self
            .providers
            .get(&provider)
            .ok_or_else(|| AppError::Unauthorized(format!("{provider} sign-in is not configured")))?;

        let claims = tokio::time::timeout(
            self.timeout,
            entry.verifier.verify(&credential.secret, &entry.audience),
        )
        .await
        .map_err(|_| {
            warn!(timeout_ms = self.timeout.as_millis() as u64, "Provider verification timed out");
            AppError::VerificationFailure(format!("{provider} verification timed out"))
        })?
        .inspect_err(|e| warn!(error = %e, "Provider rejected the credential"))?;

        if claims.provider != provider {
            return Err(AppError::VerificationFailure(format!(
                "{provider} verifier answered for {}",
                claims.provider
            )));
        }
        claims.validate()?;

        if !entry.accepted_issuers.is_empty() {
            let trusted = claims
                .issuer
                .as_ref()
                .is_some_and(|issuer| entry.accepted_issuers.iter().any(|i| i == issuer));
            if !trusted {
                warn!(issuer = ?claims.issuer, "Untrusted token issuer");
                return Err(AppError::VerificationFailure(format!(
                    "untrusted {provider} issuer"
                )));
            }
        }

        if claims.external_id != credential.username {
            warn!("Token subject does not match the claimed username");
            return Err(AppError::Unauthorized(
                "token does not belong to this user".into(),
            ));
        }

        Ok(claims)
    }
}
