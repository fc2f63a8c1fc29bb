use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use common::Provider;

use super::{ProviderVerifier, VerifiedClaims};
use crate::error::AppError;

/// Verifier backed by a fixed token table, for tests and local development.
pub struct StaticVerifier {
    provider: Provider,
    tokens: HashMap<String, VerifiedClaims>,
    latency: Option<Duration>,
}

impl StaticVerifier {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            tokens: HashMap::new(),
            latency: None,
        }
    }

    /// Accept `token` as proof of `claims`.
    pub fn with_token(mut self, token: impl Into<String>, claims: VerifiedClaims) -> Self {
        self.tokens.insert(token.into(), claims);
        self
    }

    /// Delay every answer, to exercise caller timeouts.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }
}

#[async_trait]
impl ProviderVerifier for StaticVerifier {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn verify(
        &self,
        raw_token: &str,
        _expected_audience: &str,
    ) -> Result<VerifiedClaims, AppError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.tokens.get(raw_token).cloned().ok_or_else(|| {
            AppError::VerificationFailure(format!("{} rejected the token", self.provider))
        })
    }
}
