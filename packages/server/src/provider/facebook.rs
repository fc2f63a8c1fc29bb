use async_trait::async_trait;
use common::Provider;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{ProviderVerifier, VerifiedClaims, required};
use crate::config::FacebookConfig;
use crate::error::AppError;

/// Verifies Facebook user access tokens through the Graph API.
///
/// `debug_token` proves the token is live and was issued to our app; a second
/// call fetches the profile fields copied onto new accounts.
pub struct FacebookVerifier {
    client: Client,
    graph_url: String,
    app_access_token: String,
}

#[derive(Debug, Deserialize)]
struct DebugTokenEnvelope {
    data: DebugTokenData,
}

#[derive(Debug, Deserialize)]
struct DebugTokenData {
    #[serde(default)]
    is_valid: bool,
    app_id: Option<String>,
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FacebookProfile {
    name: Option<String>,
    picture: Option<FacebookPicture>,
}

#[derive(Debug, Deserialize)]
struct FacebookPicture {
    data: FacebookPictureData,
}

#[derive(Debug, Deserialize)]
struct FacebookPictureData {
    url: Option<String>,
}

impl FacebookVerifier {
    pub fn new(client: Client, config: &FacebookConfig) -> Self {
        Self {
            client,
            graph_url: config.graph_url.trim_end_matches('/').to_string(),
            app_access_token: config.app_access_token.clone(),
        }
    }

    async fn inspect(&self, raw_token: &str) -> Result<DebugTokenData, AppError> {
        let envelope: DebugTokenEnvelope = self
            .client
            .get(format!("{}/debug_token", self.graph_url))
            .query(&[
                ("input_token", raw_token),
                ("access_token", self.app_access_token.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(envelope.data)
    }

    async fn profile(&self, user_id: &str, raw_token: &str) -> Result<FacebookProfile, AppError> {
        let profile = self
            .client
            .get(format!("{}/{}", self.graph_url, user_id))
            .query(&[("fields", "name,picture"), ("access_token", raw_token)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(profile)
    }
}

/// Check the inspected token against our app id and extract its subject.
fn check_token(data: DebugTokenData, expected_audience: &str) -> Result<String, AppError> {
    if !data.is_valid {
        return Err(AppError::VerificationFailure(
            "Facebook reports the token as invalid".into(),
        ));
    }
    if data.app_id.as_deref() != Some(expected_audience) {
        return Err(AppError::VerificationFailure(
            "Facebook token was issued to another app".into(),
        ));
    }
    required(Provider::Facebook, "user_id", data.user_id)
}

fn into_claims(user_id: String, profile: FacebookProfile) -> Result<VerifiedClaims, AppError> {
    let name = required(Provider::Facebook, "name", profile.name)?;
    let mut claims = VerifiedClaims::new(Provider::Facebook, user_id, name);
    if let Some(url) = profile.picture.and_then(|p| p.data.url) {
        claims = claims.with_avatar_url(url);
    }
    Ok(claims)
}

#[async_trait]
impl ProviderVerifier for FacebookVerifier {
    fn provider(&self) -> Provider {
        Provider::Facebook
    }

    #[instrument(skip_all)]
    async fn verify(
        &self,
        raw_token: &str,
        expected_audience: &str,
    ) -> Result<VerifiedClaims, AppError> {
        let user_id = check_token(self.inspect(raw_token).await?, expected_audience)?;
        debug!(user_id = %user_id, "Facebook token inspected");
        let profile = self.profile(&user_id, raw_token).await?;
        into_claims(user_id, profile)
    }
}
