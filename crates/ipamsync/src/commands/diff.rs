//! `ipamsync diff`: print the changeset a sync would apply.

use ipamsync_core::SyncManager;

use super::{report_warnings, with_fetch_progress};
use crate::cli::{GlobalOpts, PlanArgs};
use crate::config;
use crate::error::CliError;
use crate::output::{self, ChangeRow};

pub async fn handle(args: PlanArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let sync_config = config::resolve_sync_config(global, &args)?;
    let manager = SyncManager::connect(sync_config).await?;

    let plan = with_fetch_progress(manager.scheduler(), global, manager.plan()).await?;
    report_warnings(&plan.warnings, global);

    let rows = output::changeset_rows(&plan.changeset);
    if rows.is_empty() && !global.quiet {
        eprintln!(
            "No changes: {} records already in sync",
            plan.changeset.unchanged.len()
        );
        return Ok(());
    }

    let out = output::render_list(
        global.output,
        &rows,
        ChangeRow::clone,
        |r| format!("{} {}", r.action, r.key),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
