//! `ipamsync fetch`: dump the Bluecat snapshot without touching Nautobot.

use tracing::debug;

use ipamsync_core::{FetchScheduler, connect_source};

use super::{report_warnings, with_fetch_progress};
use crate::cli::{GlobalOpts, PlanArgs};
use crate::config;
use crate::error::CliError;
use crate::output::{self, EntityRow};

pub async fn handle(args: PlanArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let sync_config = config::resolve_sync_config(global, &args)?;
    let policy = sync_config.options.dataset.traversal();

    let (client, root) = connect_source(&sync_config.source).await?;
    let scheduler = FetchScheduler::new(sync_config.options.fetch);

    let snapshot =
        with_fetch_progress(&scheduler, global, scheduler.run(&client, root, &policy)).await?;
    if let Err(e) = client.logout().await {
        debug!(error = %e, "bluecat logout failed");
    }
    report_warnings(&snapshot.warnings, global);

    let mut entities = snapshot.entities;
    entities.sort_by_key(|e| e.id);

    let out = output::render_list(
        global.output,
        &entities,
        |e| EntityRow::from(e),
        |e| e.id.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
