//! `cutover execute`

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tokio_util::sync::CancellationToken;

use cutover_migration::{ExecuteOptions, JsonFileStore, Migration, MigrationError, StateStore};

use super::{clients, CredentialArgs};

/// Arguments for `cutover execute`
#[derive(Args, Debug)]
pub struct ExecuteArgs {
    /// Migration to run
    #[arg(long)]
    pub migration_id: String,

    /// A partition lagging by this many messages or more is not caught up (0 demands zero lag)
    #[arg(long, default_value_t = 0)]
    pub lag_threshold: u64,

    /// Seconds to wait for lag to drain, and again for promotion to finish
    #[arg(long, default_value_t = 600)]
    pub max_wait_secs: u64,

    #[command(flatten)]
    pub credentials: CredentialArgs,
}

impl ExecuteArgs {
    /// Options handed to the migration
    pub fn options(&self) -> ExecuteOptions {
        ExecuteOptions {
            lag_threshold: self.lag_threshold,
            max_wait: Duration::from_secs(self.max_wait_secs),
            api_key: self.credentials.api_key.clone(),
            api_secret: self.credentials.api_secret.clone(),
        }
    }
}

/// Resume a migration and walk it to `switched`
pub async fn run(
    args: ExecuteArgs,
    state_file: &Path,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let store = Arc::new(JsonFileStore::new(state_file));
    let kubeconfig = store
        .load()?
        .get(&args.migration_id)
        .map(|m| m.gateway_config.kube_config_path.clone())
        .ok_or_else(|| MigrationError::NotFound(args.migration_id.clone()))?;

    let (gateway, link) = clients(kubeconfig.as_deref()).await?;
    let mut migration = Migration::load(&args.migration_id, gateway, link, store)?;
    migration.execute(cancel, &args.options()).await?;

    println!("{}\t{}", migration.id(), migration.current_state());
    Ok(())
}
