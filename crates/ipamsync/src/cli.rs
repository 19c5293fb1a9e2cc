//! Clap derive structures for the `ipamsync` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use ipamsync_core::OrphanPolicy;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// ipamsync -- one-way sync from Bluecat Address Manager into Nautobot
#[derive(Debug, Parser)]
#[command(
    name = "ipamsync",
    version,
    about = "Sync Bluecat Address Manager prefixes and addresses into Nautobot",
    long_about = "Walks the Bluecat container tree below one configuration, reconciles \
        it against Nautobot IPAM and applies the difference.\n\n\
        Records missing from Bluecat are flagged for deletion by default; \
        hard deletes need --allow-delete.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
#[allow(clippy::struct_excessive_bools)]
pub struct GlobalOpts {
    /// Profile to use
    #[arg(long, short = 'p', env = "IPAMSYNC_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Config file (defaults to the platform config dir)
    #[arg(long, env = "IPAMSYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "IPAMSYNC_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates on both ends
    #[arg(long, short = 'k', env = "IPAMSYNC_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "IPAMSYNC_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one key per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch, reconcile and apply in one run
    Sync(SyncArgs),

    /// Show what a sync would change without writing
    Diff(PlanArgs),

    /// Dump the Bluecat snapshot
    Fetch(PlanArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Shared plan arguments ────────────────────────────────────────────

/// Fetch and dataset tuning shared by every command that reads Bluecat.
#[derive(Debug, Args)]
pub struct PlanArgs {
    /// Also sync pools and individual IP addresses
    #[arg(long)]
    pub include_addresses: bool,

    /// Concurrent Bluecat workers
    #[arg(long, short = 'w')]
    pub workers: Option<usize>,

    /// Entities per Bluecat page
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Abort the fetch after this long (e.g. "10m")
    #[arg(long)]
    pub deadline: Option<String>,

    /// Bluecat network id whose addresses are DHCP-managed (repeatable)
    #[arg(long = "dhcp-only", value_name = "ID")]
    pub dhcp_only: Vec<u64>,
}

// ── Sync ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SyncArgs {
    #[command(flatten)]
    pub plan: PlanArgs,

    /// Stop after reconciling; print counts without writing
    #[arg(long, short = 'n')]
    pub dry_run: bool,

    /// What to do with Nautobot records missing from Bluecat
    #[arg(long, value_name = "POLICY")]
    pub on_orphan: Option<OrphanChoice>,

    /// Permit hard deletes of orphaned records
    #[arg(long)]
    pub allow_delete: bool,

    /// Job name written into safe-delete notes
    #[arg(long)]
    pub job_name: Option<String>,
}

/// Orphan handling as chosen on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OrphanChoice {
    /// Report only
    Skip,
    /// Deprecate, tag and annotate
    Flag,
    /// Hard delete (needs --allow-delete)
    Delete,
    /// Ask once orphans are known
    Prompt,
}

impl OrphanChoice {
    /// Fixed policy, or `None` when the operator decides interactively.
    pub fn policy(self) -> Option<OrphanPolicy> {
        match self {
            Self::Skip => Some(OrphanPolicy::Skip),
            Self::Flag => Some(OrphanPolicy::Flag),
            Self::Delete => Some(OrphanPolicy::Delete),
            Self::Prompt => None,
        }
    }
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactive profile wizard
    Init,

    /// Print the effective configuration
    Show,

    /// List configured profiles
    Profiles,

    /// Make a profile the default
    Use {
        /// Profile name
        name: String,
    },

    /// Store a secret of the active profile in the system keyring
    SetSecret {
        /// Which secret to store
        #[arg(value_enum)]
        kind: SecretArg,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SecretArg {
    /// Bluecat API user password
    BluecatPassword,
    /// Nautobot API token
    NautobotToken,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
