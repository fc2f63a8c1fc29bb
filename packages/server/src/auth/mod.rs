//! Request-level authentication.
//!
//! A credential moves `Unauthenticated -> ProviderSelected -> Verified ->
//! Authorized`. Any failed step ends in an error; nothing is cached between
//! requests.

mod credential;
mod gate;

pub use credential::{Credential, Scheme};
pub use gate::{Access, AuthGate, Principal, ProviderEntry};
