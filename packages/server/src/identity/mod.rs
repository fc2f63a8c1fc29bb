//! Identity reconciliation: mapping provider identities onto accounts, and
//! the link, merge and enable/disable transitions between them.

mod linker;
mod reconcile;

pub use linker::{IdentityLinker, LoginOutcome, MAX_SUCCESSOR_HOPS};
pub use reconcile::ReconcileReport;
