//! `ipamsync sync`: fetch, reconcile, apply.

use std::io::IsTerminal;

use chrono::{DateTime, Utc};
use dialoguer::Select;
use serde::Serialize;
use tracing::info;

use ipamsync_core::{ApplyOptions, ApplyReport, OrphanPolicy, SyncManager, SyncPlan};

use super::{report_warnings, with_fetch_progress};
use crate::cli::{GlobalOpts, OrphanChoice, SyncArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

/// Flat, printable result of one sync run.
#[derive(Debug, Serialize)]
pub struct SyncSummary {
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub entities: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub orphans: usize,
    pub orphan_policy: Option<OrphanPolicy>,
    pub skipped: usize,
    pub flagged: usize,
    pub already_flagged: usize,
    pub deleted: usize,
    pub warnings: usize,
}

impl SyncSummary {
    fn planned(plan: &SyncPlan) -> Self {
        let changes = &plan.changeset;
        Self {
            finished_at: Utc::now(),
            dry_run: true,
            entities: plan.entities,
            created: changes.create.len(),
            updated: changes.update.len(),
            unchanged: changes.unchanged.len(),
            orphans: changes.orphans.len(),
            orphan_policy: None,
            skipped: 0,
            flagged: 0,
            already_flagged: 0,
            deleted: 0,
            warnings: plan.warnings.len(),
        }
    }

    fn applied(plan: &SyncPlan, report: &ApplyReport, policy: OrphanPolicy) -> Self {
        Self {
            dry_run: false,
            created: report.created,
            updated: report.updated,
            unchanged: report.unchanged,
            orphan_policy: Some(policy),
            skipped: report.orphans.skipped,
            flagged: report.orphans.flagged,
            already_flagged: report.orphans.already_flagged,
            deleted: report.orphans.deleted,
            ..Self::planned(plan)
        }
    }

    fn render_table(&self, color: bool) -> String {
        let mut pairs = vec![
            ("created", self.created),
            ("updated", self.updated),
            ("unchanged", self.unchanged),
        ];
        if self.dry_run {
            pairs.push(("orphans", self.orphans));
        } else {
            pairs.extend([
                ("flagged", self.flagged + self.already_flagged),
                ("skipped", self.skipped),
                ("deleted", self.deleted),
            ]);
        }
        let prefix = if self.dry_run { "(dry-run) " } else { "" };
        format!(
            "{prefix}{} entities fetched\n{}",
            self.entities,
            output::summary_line(&pairs, color)
        )
    }
}

/// Fold the command-line flags into the profile's apply options.
///
/// Returns `true` when the policy is to be chosen interactively.
fn apply_overrides(options: &mut ApplyOptions, args: &SyncArgs) -> bool {
    if args.allow_delete {
        options.allow_delete = true;
    }
    if let Some(ref job) = args.job_name {
        options.job_name.clone_from(job);
    }
    match args.on_orphan.map(OrphanChoice::policy) {
        Some(Some(policy)) => {
            options.orphan_policy = policy;
            false
        }
        // Nothing touches orphans until the operator has answered.
        Some(None) => {
            options.orphan_policy = OrphanPolicy::Skip;
            true
        }
        None => false,
    }
}

fn prompt_orphan_policy(orphans: usize) -> Result<OrphanPolicy, CliError> {
    let choices = [
        "Flag for deletion (deprecate, tag, note)",
        "Skip (report only)",
        "Delete from Nautobot",
    ];
    let selection = Select::new()
        .with_prompt(format!("{orphans} Nautobot records are missing from Bluecat"))
        .items(&choices)
        .default(0)
        .interact()
        .map_err(|e| CliError::Validation {
            field: "interactive".into(),
            reason: format!("prompt failed: {e}"),
        })?;

    Ok(match selection {
        0 => OrphanPolicy::Flag,
        1 => OrphanPolicy::Skip,
        _ => OrphanPolicy::Delete,
    })
}

pub async fn handle(args: SyncArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut sync_config = config::resolve_sync_config(global, &args.plan)?;
    let prompt = apply_overrides(&mut sync_config.options.apply, &args);

    // Reject bad option combinations before any network traffic.
    sync_config.options.apply.validate()?;
    if prompt && !args.dry_run && !global.yes && !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractive {
            action: "on-orphan".into(),
        });
    }

    let mut manager = SyncManager::connect(sync_config).await?;
    let plan = with_fetch_progress(manager.scheduler(), global, manager.plan()).await?;
    report_warnings(&plan.warnings, global);

    let color = output::should_color(global.color);

    if args.dry_run {
        let summary = SyncSummary::planned(&plan);
        let out = output::render_single(
            global.output,
            &summary,
            |s| s.render_table(color),
            |s| s.created.to_string(),
        )?;
        output::print_output(&out, global.quiet);
        return Ok(());
    }

    if prompt && !plan.changeset.orphans.is_empty() {
        // --yes takes the prompt's default answer.
        let policy = if global.yes {
            OrphanPolicy::Flag
        } else {
            prompt_orphan_policy(plan.changeset.orphans.len())?
        };
        let options = manager.apply_options_mut();
        options.orphan_policy = policy;
        // Choosing delete at the prompt is the explicit opt-in.
        if policy == OrphanPolicy::Delete {
            options.allow_delete = true;
        }
    }

    let applied = manager.apply(&plan).await?;
    let policy = manager.apply_options().orphan_policy;
    info!(
        created = applied.created,
        updated = applied.updated,
        flagged = applied.orphans.flagged,
        deleted = applied.orphans.deleted,
        "sync complete"
    );

    let summary = SyncSummary::applied(&plan, &applied, policy);
    let out = output::render_single(
        global.output,
        &summary,
        |s| s.render_table(color),
        |s| s.created.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::{Cli, Command};

    fn sync_args(argv: &[&str]) -> SyncArgs {
        let cli = Cli::try_parse_from(argv).unwrap_or_else(|e| panic!("{e}"));
        match cli.command {
            Command::Sync(args) => args,
            other => panic!("expected sync, got {other:?}"),
        }
    }

    #[test]
    fn explicit_policy_overrides_profile() {
        let args = sync_args(&["ipamsync", "sync", "--on-orphan", "skip", "--job-name", "nightly"]);
        let mut options = ApplyOptions::default();

        assert!(!apply_overrides(&mut options, &args));
        assert_eq!(options.orphan_policy, OrphanPolicy::Skip);
        assert_eq!(options.job_name, "nightly");
    }

    #[test]
    fn prompt_defers_with_harmless_policy() {
        let args = sync_args(&["ipamsync", "sync", "--on-orphan", "prompt"]);
        let mut options = ApplyOptions {
            orphan_policy: OrphanPolicy::Delete,
            ..ApplyOptions::default()
        };

        assert!(apply_overrides(&mut options, &args));
        assert_eq!(options.orphan_policy, OrphanPolicy::Skip);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn delete_without_opt_in_fails_validation() {
        let args = sync_args(&["ipamsync", "sync", "--on-orphan", "delete"]);
        let mut options = ApplyOptions::default();
        apply_overrides(&mut options, &args);
        assert!(options.validate().is_err());

        let args = sync_args(&["ipamsync", "sync", "--on-orphan", "delete", "--allow-delete"]);
        let mut options = ApplyOptions::default();
        apply_overrides(&mut options, &args);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn dry_run_summary_counts_plan() {
        let mut plan = SyncPlan::default();
        let key = ipamsync_core::RecordKey::prefix("10.0.0.0/8");
        plan.changeset.create.insert(
            key.clone(),
            ipamsync_core::SyncRecord::new(key, "", ipamsync_core::Status::Container),
        );
        plan.entities = 7;

        let summary = SyncSummary::planned(&plan);
        assert!(summary.dry_run);
        assert_eq!(summary.created, 1);
        assert!(summary.render_table(false).starts_with("(dry-run) 7 entities fetched"));
    }
}
