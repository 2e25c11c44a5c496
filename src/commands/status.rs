//! `cutover status` and `cutover list`

use std::path::Path;

use clap::Args;

use cutover_migration::{JsonFileStore, MigrationError, MigrationRecord, StateStore};

/// Arguments for `cutover status`
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Migration to show
    #[arg(long)]
    pub migration_id: String,
}

/// Print one migration
pub fn status(args: StatusArgs, state_file: &Path) -> anyhow::Result<()> {
    let state = JsonFileStore::new(state_file).load()?;
    let record = state
        .get(&args.migration_id)
        .ok_or_else(|| MigrationError::NotFound(args.migration_id.clone()))?;
    print!("{}", describe(record));
    Ok(())
}

/// Print every migration, one per line
pub fn list(state_file: &Path) -> anyhow::Result<()> {
    let state = JsonFileStore::new(state_file).load()?;
    if state.list().is_empty() {
        println!("no migrations in {}", state_file.display());
        return Ok(());
    }
    for record in state.list() {
        println!("{}\t{}", record.migration_id, record.current_state);
    }
    Ok(())
}

fn describe(record: &MigrationRecord) -> String {
    let gw = &record.gateway_config;
    let link = &record.cluster_link_config;
    format!(
        "migration:  {}\nstate:      {}\ngateway:    {}/{} ({} -> {}, {})\nlink:       {} on {}\ntopics:     {}\n",
        record.migration_id,
        record.current_state,
        gw.namespace,
        gw.crd_name,
        gw.source_route_name,
        gw.switchover_domain_name(),
        gw.auth_mode,
        link.link_name,
        link.cluster_id,
        if record.topics().is_empty() {
            "<all mirror topics>".to_string()
        } else {
            record.topics().join(", ")
        },
    )
}
