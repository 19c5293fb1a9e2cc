//! Command dispatch and the plumbing shared by network-bound commands.

pub mod config_cmd;
pub mod diff;
pub mod fetch;
pub mod sync;

use std::future::Future;
use std::io::IsTerminal;
use std::time::Duration;

use clap::CommandFactory;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use ipamsync_core::{CanaryWarning, CoreError, FetchProgress, FetchScheduler};

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a parsed command to its handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Sync(args) => sync::handle(args, global).await,
        Command::Diff(args) => diff::handle(args, global).await,
        Command::Fetch(args) => fetch::handle(args, global).await,

        // Neither needs a connection
        Command::Config(args) => config_cmd::handle(args, global),
        Command::Completions(args) => {
            let mut cmd = Cli::command();
            clap_complete::generate(args.shell, &mut cmd, "ipamsync", &mut std::io::stdout());
            Ok(())
        }
    }
}

// ── Fetch plumbing ──────────────────────────────────────────────────

fn progress_message(p: &FetchProgress) -> String {
    format!(
        "Fetching from Bluecat: {} entities, {} jobs done, {} running, {} queued",
        p.entities, p.jobs_completed, p.jobs_in_flight, p.jobs_queued
    )
}

fn spinner(global: &GlobalOpts) -> Option<ProgressBar> {
    if global.quiet || !std::io::stderr().is_terminal() {
        return None;
    }
    let bar = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    bar.set_style(style);
    bar.set_message("Connecting");
    bar.enable_steady_tick(Duration::from_millis(100));
    Some(bar)
}

/// Drive `work` while rendering fetch progress and honouring Ctrl-C.
///
/// Ctrl-C cancels the scheduler's token; the fetch then fails with
/// `Cancelled` and nothing has been written.
pub async fn with_fetch_progress<T, F>(
    scheduler: &FetchScheduler,
    global: &GlobalOpts,
    work: F,
) -> Result<T, CoreError>
where
    F: Future<Output = Result<T, CoreError>>,
{
    let token = scheduler.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling fetch");
            token.cancel();
        }
    });

    let bar = spinner(global);
    let ticker = bar.clone().map(|bar| {
        let mut progress = scheduler.subscribe();
        tokio::spawn(async move {
            while progress.changed().await.is_ok() {
                let snapshot = *progress.borrow_and_update();
                bar.set_message(progress_message(&snapshot));
            }
        })
    });

    let result = work.await;

    interrupt.abort();
    if let Some(ticker) = ticker {
        ticker.abort();
    }
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    result
}

fn canary_message(w: &CanaryWarning) -> String {
    format!(
        "⚠ all {} addresses on the page at offset {} under container {} are DHCP-managed; \
         add {} to the DHCP-only list to skip it",
        w.count, w.offset, w.parent_id, w.parent_id
    )
}

/// Surface canary warnings on stderr; they do not fail the run.
pub fn report_warnings(warnings: &[CanaryWarning], global: &GlobalOpts) {
    if global.quiet {
        return;
    }
    for w in warnings {
        eprintln!("{}", canary_message(w));
    }
}

#[cfg(test)]
mod tests {
    use ipamsync_core::{EntityId, EntityType};

    use super::*;

    #[test]
    fn canary_message_points_at_dhcp_only_list() {
        let msg = canary_message(&CanaryWarning {
            parent_id: EntityId(4711),
            object_type: EntityType::Ip4Address,
            offset: 200,
            count: 100,
        });
        assert!(msg.contains("all 100 addresses"), "{msg}");
        assert!(msg.contains("DHCP-managed"), "{msg}");
        assert!(msg.contains("add 4711 to the DHCP-only list"), "{msg}");
        assert!(!msg.contains("page limit"), "{msg}");
    }

    #[test]
    fn progress_message_lists_counters() {
        let msg = progress_message(&FetchProgress {
            jobs_queued: 3,
            jobs_in_flight: 2,
            jobs_completed: 10,
            entities: 420,
        });
        assert_eq!(
            msg,
            "Fetching from Bluecat: 420 entities, 10 jobs done, 2 running, 3 queued"
        );
    }
}
