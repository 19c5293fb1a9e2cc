//! CLI configuration -- thin wrapper around `ipamsync_config`.
//!
//! Loads the file named by `--config` (or the platform default) and layers
//! command-line overrides on top of the resolved profile.

use std::path::PathBuf;
use std::time::Duration;

use ipamsync_core::{Dataset, EntityId, SyncConfig, TlsVerification};

use crate::cli::{GlobalOpts, PlanArgs};
use crate::error::CliError;

pub use ipamsync_config::{Config, Profile, SecretKind};

/// Path of the config file in effect.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(ipamsync_config::config_path)
}

pub fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(ipamsync_config::load_config_from(&config_path(global))?)
}

pub fn save_config(cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    Ok(ipamsync_config::save_config_to(cfg, &config_path(global))?)
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build the `SyncConfig` for the active profile, then apply flag overrides.
///
/// Flags win over the profile; the profile wins over `[defaults]`.
pub fn resolve_sync_config(global: &GlobalOpts, plan: &PlanArgs) -> Result<SyncConfig, CliError> {
    let cfg = load_config(global)?;
    let name = active_profile_name(global, &cfg);
    let profile = cfg.profile(&name)?;

    let mut sync = ipamsync_config::profile_to_sync_config(profile, &name, &cfg.defaults)?;

    if global.insecure {
        sync.source.tls = TlsVerification::DangerAcceptInvalid;
        sync.target.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        sync.source.timeout = Duration::from_secs(secs);
        sync.target.timeout = Duration::from_secs(secs);
    }

    apply_plan_overrides(&mut sync, plan)?;
    Ok(sync)
}

fn apply_plan_overrides(sync: &mut SyncConfig, plan: &PlanArgs) -> Result<(), CliError> {
    let fetch = &mut sync.options.fetch;
    if let Some(workers) = plan.workers {
        if workers == 0 {
            return Err(CliError::Validation {
                field: "workers".into(),
                reason: "must be at least 1".into(),
            });
        }
        fetch.workers = workers;
    }
    if let Some(page_size) = plan.page_size {
        if page_size == 0 {
            return Err(CliError::Validation {
                field: "page-size".into(),
                reason: "must be at least 1".into(),
            });
        }
        fetch.page_size = page_size;
    }
    if let Some(ref deadline) = plan.deadline {
        fetch.deadline = Some(ipamsync_config::parse_deadline(deadline)?);
    }
    fetch
        .dhcp_only
        .extend(plan.dhcp_only.iter().copied().map(EntityId));
    if plan.include_addresses {
        sync.options.dataset = Dataset::PrefixesAndAddresses;
    }
    Ok(())
}
