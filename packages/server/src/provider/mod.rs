//! Identity provider verification.
//!
//! Each provider turns a raw bearer credential into [`VerifiedClaims`]. Raw
//! provider payloads are parsed into fixed per-provider structs and converted
//! at this boundary, so nothing downstream handles loosely-typed claims.

pub mod facebook;
pub mod google;
pub mod stub;

use async_trait::async_trait;
use common::Provider;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub use facebook::FacebookVerifier;
pub use google::GoogleVerifier;
pub use stub::StaticVerifier;

/// Attributes a provider vouches for about the token's subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedClaims {
    pub provider: Provider,
    /// Stable provider-scoped subject id.
    pub external_id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    /// Token issuer, for providers that report one.
    pub issuer: Option<String>,
}

impl VerifiedClaims {
    pub fn new(
        provider: Provider,
        external_id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            external_id: external_id.into(),
            display_name: display_name.into(),
            avatar_url: None,
            issuer: None,
        }
    }

    pub fn with_avatar_url(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Reject claims without a usable external id.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.external_id.trim().is_empty() {
            return Err(AppError::ProviderClaimInvalid(format!(
                "{} claims carry no subject id",
                self.provider
            )));
        }
        Ok(())
    }
}

/// Exchanges a raw credential for verified claims.
#[async_trait]
pub trait ProviderVerifier: Send + Sync {
    fn provider(&self) -> Provider;

    /// Verify `raw_token` was issued for `expected_audience`.
    async fn verify(
        &self,
        raw_token: &str,
        expected_audience: &str,
    ) -> Result<VerifiedClaims, AppError>;
}

/// Unwrap a required string claim, treating blank values as missing.
pub(crate) fn required(
    provider: Provider,
    field: &str,
    value: Option<String>,
) -> Result<String, AppError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| {
            AppError::ProviderClaimInvalid(format!("{provider} response is missing `{field}`"))
        })
}
