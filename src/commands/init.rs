//! `cutover init`

use std::path::Path;
use std::sync::Arc;

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;

use cutover_migration::{JsonFileStore, Migration, MigrationConfig};

use super::{clients, CredentialArgs, GatewayArgs, LinkArgs};

/// Arguments for `cutover init`
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Id of the new migration
    #[arg(long)]
    pub migration_id: String,

    #[command(flatten)]
    pub gateway: GatewayArgs,

    #[command(flatten)]
    pub link: LinkArgs,

    #[command(flatten)]
    pub credentials: CredentialArgs,
}

impl InitArgs {
    /// Assemble the migration config
    pub fn into_config(self) -> MigrationConfig {
        MigrationConfig {
            migration_id: self.migration_id,
            gateway: self.gateway.into_config(),
            cluster_link: self.link.into_config(self.credentials),
        }
    }
}

/// Record a new migration and run its initialization checks
pub async fn run(
    args: InitArgs,
    state_file: &Path,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let config = args.into_config();
    let (gateway, link) = clients(config.gateway.kube_config_path.as_deref()).await?;
    let store = Arc::new(JsonFileStore::new(state_file));

    let mut migration = Migration::new(config, gateway, link, store)?;
    migration.initialize(cancel).await?;

    info!(
        migration = %migration.id(),
        topics = migration.record().topics().len(),
        state_file = %state_file.display(),
        "migration initialized"
    );
    println!("{}\t{}", migration.id(), migration.current_state());
    Ok(())
}
