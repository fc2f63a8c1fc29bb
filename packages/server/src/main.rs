use tracing::{Level, info};

use spotted::config::AppConfig;
use spotted::state::AppState;

/// Runs one reconcile pass: finishes interrupted merges and brings every
/// spotted's archived flag back in line with its owner.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = AppConfig::load()?;
    let state = AppState::init(config).await?;
    info!("Connected to database");

    let report = state.linker.reconcile().await?;
    info!(
        reassigned = report.reassigned,
        identities_restored = report.identities_restored,
        archived = report.archived,
        unarchived = report.unarchived,
        "Reconcile complete"
    );

    Ok(())
}
