//! Config subcommand handlers.

use dialoguer::{Confirm, Input, Select};

use ipamsync_config::{BluecatProfile, NautobotProfile, SyncProfile};
use ipamsync_core::OrphanPolicy;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, SecretArg};
use crate::config::{self, Config, Profile, SecretKind};
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

// ── Helpers ─────────────────────────────────────────────────────────

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn secret_kind(arg: SecretArg) -> SecretKind {
    match arg {
        SecretArg::BluecatPassword => SecretKind::BluecatPassword,
        SecretArg::NautobotToken => SecretKind::NautobotToken,
    }
}

fn prompt_label(kind: SecretKind) -> &'static str {
    match kind {
        SecretKind::BluecatPassword => "Bluecat password: ",
        SecretKind::NautobotToken => "Nautobot API token: ",
    }
}

/// Read a secret without echo and either store it in the keyring
/// (returns `None`) or hand it back for the config file.
fn read_secret(profile_name: &str, kind: SecretKind) -> Result<Option<String>, CliError> {
    let secret = rpassword::prompt_password(prompt_label(kind)).map_err(prompt_err)?;
    if secret.is_empty() {
        return Err(CliError::Validation {
            field: kind.to_string(),
            reason: "value cannot be empty".into(),
        });
    }

    let store_choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let store_selection = Select::new()
        .with_prompt(format!("Where to store the {kind}?"))
        .items(store_choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if store_selection == 0 {
        ipamsync_config::store_secret(profile_name, kind, &secret)?;
        eprintln!("   ✓ {kind} stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(secret))
    }
}

/// Copy of the config with plaintext secrets masked.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.bluecat.password.is_some() {
            profile.bluecat.password = Some(REDACTED.into());
        }
        if profile.nautobot.token.is_some() {
            profile.nautobot.token = Some(REDACTED.into());
        }
    }
    cfg
}

fn profile_not_found(cfg: &Config, name: String) -> CliError {
    let available: Vec<_> = cfg.profiles.keys().cloned().collect();
    CliError::ProfileNotFound {
        name,
        available: if available.is_empty() {
            "(none)".into()
        } else {
            available.join(", ")
        },
    }
}

// ── Init wizard ─────────────────────────────────────────────────────

fn init(global: &GlobalOpts) -> Result<(), CliError> {
    let config_path = config::config_path(global);
    eprintln!("ipamsync: configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    let mut cfg = config::load_config(global)?;

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    // Bluecat
    let bluecat_url: String = Input::new()
        .with_prompt("Bluecat Address Manager URL")
        .default("https://bam.example.com".into())
        .interact_text()
        .map_err(prompt_err)?;
    let username: String = Input::new()
        .with_prompt("Bluecat API username")
        .interact_text()
        .map_err(prompt_err)?;
    let configuration: String = Input::new()
        .with_prompt("Bluecat configuration (empty = first one)")
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_err)?;
    let password = read_secret(&profile_name, SecretKind::BluecatPassword)?;

    // Nautobot
    let nautobot_url: String = Input::new()
        .with_prompt("Nautobot URL")
        .default("https://nautobot.example.com".into())
        .interact_text()
        .map_err(prompt_err)?;
    let token = read_secret(&profile_name, SecretKind::NautobotToken)?;

    // Sync behavior
    let policy_choices = &["flag", "skip", "delete"];
    let policy_selection = Select::new()
        .with_prompt("Default handling of records missing from Bluecat")
        .items(policy_choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;
    let orphan_policy = match policy_selection {
        0 => OrphanPolicy::Flag,
        1 => OrphanPolicy::Skip,
        _ => OrphanPolicy::Delete,
    };
    let allow_delete = orphan_policy == OrphanPolicy::Delete
        && Confirm::new()
            .with_prompt("Allow hard deletes without --allow-delete?")
            .default(false)
            .interact()
            .map_err(prompt_err)?;

    let include_addresses = Confirm::new()
        .with_prompt("Sync individual IP addresses too?")
        .default(false)
        .interact()
        .map_err(prompt_err)?;

    let insecure = Confirm::new()
        .with_prompt("Accept self-signed certificates?")
        .default(false)
        .interact()
        .map_err(prompt_err)?;

    let profile = Profile {
        bluecat: BluecatProfile {
            url: bluecat_url,
            username: Some(username),
            password,
            configuration: (!configuration.is_empty()).then_some(configuration),
            insecure: insecure.then_some(true),
            ..BluecatProfile::default()
        },
        nautobot: NautobotProfile {
            url: nautobot_url,
            token,
            insecure: insecure.then_some(true),
            ..NautobotProfile::default()
        },
        sync: SyncProfile {
            orphan_policy: Some(orphan_policy),
            allow_delete,
            include_addresses,
            ..SyncProfile::default()
        },
    };

    cfg.profiles.insert(profile_name.clone(), profile);
    cfg.default_profile = Some(profile_name.clone());
    config::save_config(&cfg, global)?;

    eprintln!("\n✓ Configuration written to {}", config_path.display());
    eprintln!("  Active profile: {profile_name}");
    eprintln!("\n  Preview it: ipamsync sync --dry-run");
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(global),

        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config(global)?);
            let out = output::render_single(
                global.output,
                &cfg,
                |c| toml::to_string_pretty(c).unwrap_or_else(|_| format!("{c:#?}")),
                |_| config::config_path(global).display().to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config(global)?;
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: ipamsync config init");
            } else {
                for name in cfg.profiles.keys() {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config(global)?;
            if !cfg.profiles.contains_key(&name) {
                return Err(profile_not_found(&cfg, name));
            }
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg, global)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }

        ConfigCommand::SetSecret { kind } => {
            let cfg = config::load_config(global)?;
            let profile_name = config::active_profile_name(global, &cfg);
            if !cfg.profiles.contains_key(&profile_name) {
                return Err(profile_not_found(&cfg, profile_name));
            }

            let kind = secret_kind(kind);
            let secret = rpassword::prompt_password(prompt_label(kind)).map_err(prompt_err)?;
            if secret.is_empty() {
                return Err(CliError::Validation {
                    field: kind.to_string(),
                    reason: "value cannot be empty".into(),
                });
            }
            ipamsync_config::store_secret(&profile_name, kind, &secret)?;

            eprintln!("✓ {kind} stored in system keyring for profile '{profile_name}'");
            Ok(())
        }
    }
}
