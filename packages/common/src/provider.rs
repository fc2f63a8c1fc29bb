use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// External identity provider an account can sign in with.
///
/// An account holds at most one identity per provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Provider {
    Facebook,
    Google,
}

impl Provider {
    /// All supported providers.
    pub const ALL: &'static [Provider] = &[Self::Facebook, Self::Google];

    /// Returns the string representation (PascalCase), as sent in the
    /// `Service-Provider` declaration of a credential.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Facebook => "Facebook",
            Self::Google => "Google",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when parsing an unknown provider name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown provider '{invalid}'. Valid values: Facebook, Google")]
pub struct ParseProviderError {
    invalid: String,
}

impl FromStr for Provider {
    type Err = ParseProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Facebook" => Ok(Self::Facebook),
            "Google" => Ok(Self::Google),
            _ => Err(ParseProviderError {
                invalid: s.to_string(),
            }),
        }
    }
}
