use async_trait::async_trait;
use common::Provider;
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use super::{ProviderVerifier, VerifiedClaims, required};
use crate::config::GoogleConfig;
use crate::error::AppError;

/// Verifies Google ID tokens with the `tokeninfo` endpoint, which checks the
/// signature and expiry server-side and echoes the decoded claims.
pub struct GoogleVerifier {
    client: Client,
    tokeninfo_url: String,
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    iss: Option<String>,
    aud: Option<String>,
    sub: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

impl GoogleVerifier {
    pub fn new(client: Client, config: &GoogleConfig) -> Self {
        Self {
            client,
            tokeninfo_url: config.tokeninfo_url.clone(),
        }
    }
}

fn into_claims(info: TokenInfo, expected_audience: &str) -> Result<VerifiedClaims, AppError> {
    if info.aud.as_deref() != Some(expected_audience) {
        return Err(AppError::VerificationFailure(
            "Google token was issued to another client".into(),
        ));
    }
    let sub = required(Provider::Google, "sub", info.sub)?;
    let name = required(Provider::Google, "name", info.name)?;

    let mut claims = VerifiedClaims::new(Provider::Google, sub, name);
    if let Some(picture) = info.picture {
        claims = claims.with_avatar_url(picture);
    }
    if let Some(iss) = info.iss {
        claims = claims.with_issuer(iss);
    }
    Ok(claims)
}

#[async_trait]
impl ProviderVerifier for GoogleVerifier {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    #[instrument(skip_all)]
    async fn verify(
        &self,
        raw_token: &str,
        expected_audience: &str,
    ) -> Result<VerifiedClaims, AppError> {
        let info: TokenInfo = self
            .client
            .get(&self.tokeninfo_url)
            .query(&[("id_token", raw_token)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        into_claims(info, expected_audience)
    }
}
