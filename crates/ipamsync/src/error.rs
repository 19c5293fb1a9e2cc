//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use ipamsync_config::ConfigError;
use ipamsync_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const FETCH: i32 = 9;
    pub const DATA_QUALITY: i32 = 10;
    pub const APPLY: i32 = 11;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to {url}")]
    #[diagnostic(
        code(ipamsync::connection_failed),
        help(
            "Check that the host is reachable: {reason}\n\
             Self-signed certificate? Try --insecure or set ca_cert in the profile."
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(ipamsync::auth_failed),
        help(
            "Verify the Bluecat API user and the Nautobot token.\n\
             Run: ipamsync config set-secret bluecat-password"
        )
    )]
    AuthFailed { message: String },

    #[error("No {secret} configured for profile '{profile}'")]
    #[diagnostic(
        code(ipamsync::no_credentials),
        help(
            "Store it with: ipamsync --profile {profile} config set-secret <KIND>\n\
             Or set password_env / token_env in the profile."
        )
    )]
    NoCredentials { profile: String, secret: String },

    #[error("Request timed out")]
    #[diagnostic(
        code(ipamsync::timeout),
        help("Increase timeout with --timeout or check server responsiveness.")
    )]
    Timeout,

    // ── Fetch ────────────────────────────────────────────────────────
    #[error("Bluecat fetch failed")]
    #[diagnostic(
        code(ipamsync::fetch_failed),
        help("Nothing was written to Nautobot. Re-run with -vv for per-request logs.")
    )]
    FetchFailed {
        #[source]
        source: CoreError,
    },

    // ── Data quality ─────────────────────────────────────────────────
    #[error("Source data rejected")]
    #[diagnostic(
        code(ipamsync::data_quality),
        help("Fix the offending Bluecat object or exclude its network with --dhcp-only.")
    )]
    DataQuality {
        #[source]
        source: CoreError,
    },

    // ── Apply ────────────────────────────────────────────────────────
    #[error("Apply failed after {created} creates and {updated} updates")]
    #[diagnostic(
        code(ipamsync::apply_failed),
        help("Nautobot has no transactions; re-running the sync converges the remainder.")
    )]
    ApplyFailed {
        created: usize,
        updated: usize,
        #[source]
        source: CoreError,
    },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(ipamsync::validation))]
    Validation { field: String, reason: String },

    #[error("Orphan policy violation: {message}")]
    #[diagnostic(
        code(ipamsync::orphan_policy),
        help("Pass --allow-delete to permit hard deletes, or use --on-orphan flag.")
    )]
    OrphanPolicy { message: String },

    #[error("Interactive prompt '{action}' needs a terminal")]
    #[diagnostic(
        code(ipamsync::non_interactive),
        help("Choose a fixed policy with --on-orphan skip|flag|delete.")
    )]
    NonInteractive { action: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(ipamsync::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: ipamsync config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(ipamsync::config))]
    Config(ConfigError),

    // ── Interrupted ──────────────────────────────────────────────────
    #[error("Interrupted")]
    #[diagnostic(code(ipamsync::cancelled))]
    Cancelled,

    // ── Other core errors ────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(ipamsync::core))]
    Core(CoreError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Output serialization failed: {0}")]
    Serialize(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::Timeout => exit_code::TIMEOUT,
            Self::FetchFailed { .. } => exit_code::FETCH,
            Self::DataQuality { .. } => exit_code::DATA_QUALITY,
            Self::ApplyFailed { .. } => exit_code::APPLY,
            Self::Validation { .. }
            | Self::OrphanPolicy { .. }
            | Self::NonInteractive { .. }
            | Self::ProfileNotFound { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => {
                CliError::ConnectionFailed { url, reason }
            }
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::Timeout => CliError::Timeout,
            CoreError::Cancelled => CliError::Cancelled,
            CoreError::OrphanPolicyViolation { message } => CliError::OrphanPolicy { message },
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::FetchFailed { .. }
            | CoreError::SnapshotIncomplete { .. }
            | CoreError::DeadlineExceeded { .. } => {
                // Authentication lapses mid-fetch still surface as auth errors.
                if matches!(err.root_cause(), CoreError::AuthenticationFailed { .. }) {
                    return CliError::AuthFailed {
                        message: err.root_cause().to_string(),
                    };
                }
                if matches!(err.root_cause(), CoreError::Cancelled) {
                    return CliError::Cancelled;
                }
                CliError::FetchFailed { source: err }
            }

            CoreError::SchemaMismatch { .. } | CoreError::UnmappedStatus { .. } => {
                CliError::DataQuality { source: err }
            }

            CoreError::ApplyFailed {
                created,
                updated,
                source,
            } => CliError::ApplyFailed {
                created,
                updated,
                source: *source,
            },

            other => CliError::Core(other),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile, secret } => CliError::NoCredentials {
                profile,
                secret: secret.to_string(),
            },
            ConfigError::ProfileNotFound { name, available } => CliError::ProfileNotFound {
                name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            },
            other => CliError::Config(other),
        }
    }
}
