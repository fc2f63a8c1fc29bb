use std::fmt;
use std::str::FromStr;

use common::Provider;

use crate::error::AppError;

/// How a credential declares it should be checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Provider(Provider),
    /// The shared guest id and secret.
    Guest,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Provider(p) => p.fmt(f),
            Scheme::Guest => f.write_str("Guest"),
        }
    }
}

impl FromStr for Scheme {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "Guest" {
            return Ok(Scheme::Guest);
        }
        s.parse::<Provider>()
            .map(Scheme::Provider)
            .map_err(|e| AppError::Unauthorized(e.to_string()))
    }
}

/// A presented credential: declared scheme, claimed username and secret.
///
/// For providers the username is the external id the caller claims to be and
/// the secret is the raw provider token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub scheme: Scheme,
    pub username: String,
    pub secret: String,
}

impl Credential {
    pub fn provider(
        provider: Provider,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            scheme: Scheme::Provider(provider),
            username: username.into(),
            secret: secret.into(),
        }
    }

    pub fn guest(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            scheme: Scheme::Guest,
            username: username.into(),
            secret: secret.into(),
        }
    }

    /// Build from a scheme name as declared by the transport.
    pub fn parse(
        scheme: &str,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Result<Self, AppError> {
        Ok(Self {
            scheme: scheme.parse()?,
            username: username.into(),
            secret: secret.into(),
        })
    }

    pub fn provider_scheme(&self) -> Option<Provider> {
        match self.scheme {
            Scheme::Provider(p) => Some(p),
            Scheme::Guest => None,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("scheme", &self.scheme)
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}
