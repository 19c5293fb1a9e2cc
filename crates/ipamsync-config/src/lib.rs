//! Configuration for the ipamsync CLI.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext), and
//! translation to `ipamsync_core::SyncConfig`. The CLI layers its flag
//! overrides on top of what this crate resolves.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use ipamsync_core::{
    ApplyOptions, Dataset, EntityId, FetchOptions, OrphanPolicy, SourceConfig, SyncConfig,
    SyncOptions, TargetConfig, TlsVerification,
};

/// Service name under which secrets live in the system keyring.
pub const KEYRING_SERVICE: &str = "ipamsync";

/// Prefix of environment variables merged over the config file.
pub const ENV_PREFIX: &str = "IPAMSYNC_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no {secret} configured for profile '{profile}'")]
    NoCredentials { profile: String, secret: SecretKind },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String, available: Vec<String> },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named source/target pairs.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound {
                name: name.into(),
                available: self.profiles.keys().cloned().collect(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            timeout: default_timeout(),
            workers: default_workers(),
            page_size: default_page_size(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_workers() -> usize {
    FetchOptions::DEFAULT_WORKERS
}
fn default_page_size() -> u32 {
    FetchOptions::DEFAULT_PAGE_SIZE
}

/// One Bluecat → Nautobot pairing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    pub bluecat: BluecatProfile,
    pub nautobot: NautobotProfile,
    #[serde(default)]
    pub sync: SyncProfile,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BluecatProfile {
    /// Address Manager base URL (e.g. "https://bam.example.com").
    pub url: String,

    pub username: Option<String>,

    /// Password (plaintext -- prefer keyring or `password_env`).
    pub password: Option<String>,

    /// Environment variable holding the password.
    pub password_env: Option<String>,

    /// Configuration to sync; the first one listed when unset.
    pub configuration: Option<String>,

    pub ca_cert: Option<PathBuf>,

    pub insecure: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct NautobotProfile {
    /// Nautobot base URL (e.g. "https://nautobot.example.com").
    pub url: String,

    /// API token (plaintext -- prefer keyring or `token_env`).
    pub token: Option<String>,

    /// Environment variable holding the API token.
    pub token_env: Option<String>,

    pub ca_cert: Option<PathBuf>,

    pub insecure: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SyncProfile {
    /// Bluecat ids of networks whose addresses are DHCP-managed.
    #[serde(default)]
    pub dhcp_only: Vec<u64>,

    pub workers: Option<usize>,

    pub page_size: Option<u32>,

    /// Whole-fetch deadline, e.g. "10m".
    pub deadline: Option<String>,

    pub orphan_policy: Option<OrphanPolicy>,

    #[serde(default)]
    pub allow_delete: bool,

    #[serde(default)]
    pub include_addresses: bool,

    /// Job name written into safe-delete notes.
    pub job_name: Option<String>,

    pub timeout: Option<u64>,
}

// ── Secrets ─────────────────────────────────────────────────────────

/// The two secrets a profile needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    BluecatPassword,
    NautobotToken,
}

impl SecretKind {
    /// Keyring account name for this secret of `profile`.
    pub fn keyring_account(self, profile: &str) -> String {
        match self {
            Self::BluecatPassword => format!("{profile}/bluecat-password"),
            Self::NautobotToken => format!("{profile}/nautobot-token"),
        }
    }
}

impl std::fmt::Display for SecretKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::BluecatPassword => "Bluecat password",
            Self::NautobotToken => "Nautobot API token",
        })
    }
}

/// Store a secret in the system keyring.
pub fn store_secret(profile: &str, kind: SecretKind, secret: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &kind.keyring_account(profile))?;
    entry.set_password(secret)?;
    Ok(())
}

fn keyring_secret(profile: &str, kind: SecretKind) -> Option<SecretString> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &kind.keyring_account(profile)).ok()?;
    entry.get_password().ok().map(SecretString::from)
}

/// Credential chain: named env var, then keyring, then plaintext.
fn resolve_secret(
    env_name: Option<&str>,
    plaintext: Option<&str>,
    profile_name: &str,
    kind: SecretKind,
) -> Result<SecretString, ConfigError> {
    // 1. Env var named by the profile
    if let Some(name) = env_name {
        if let Ok(val) = std::env::var(name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Some(secret) = keyring_secret(profile_name, kind) {
        return Ok(secret);
    }

    // 3. Plaintext in config
    if let Some(val) = plaintext {
        return Ok(SecretString::from(val.to_owned()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
        secret: kind,
    })
}

pub fn resolve_bluecat_password(
    profile: &Profile,
    profile_name: &str,
) -> Result<SecretString, ConfigError> {
    resolve_secret(
        profile.bluecat.password_env.as_deref(),
        profile.bluecat.password.as_deref(),
        profile_name,
        SecretKind::BluecatPassword,
    )
}

pub fn resolve_nautobot_token(
    profile: &Profile,
    profile_name: &str,
) -> Result<SecretString, ConfigError> {
    resolve_secret(
        profile.nautobot.token_env.as_deref(),
        profile.nautobot.token.as_deref(),
        profile_name,
        SecretKind::NautobotToken,
    )
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "ipamsync", "ipamsync").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("ipamsync");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Loading / saving ────────────────────────────────────────────────

/// Load the config from `path`, with defaults underneath and
/// `IPAMSYNC_*` environment variables on top.
///
/// Nested keys use a double underscore: `IPAMSYNC_DEFAULTS__WORKERS=12`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    Ok(figment.extract()?)
}

/// Load the config from the canonical path.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config, returning a default if it is missing or unreadable.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(cfg)?)?;
    Ok(())
}

/// Serialize config to TOML and write it to the canonical path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

// ── Translation to core types ───────────────────────────────────────

fn parse_url(field: &str, value: &str) -> Result<Url, ConfigError> {
    value.parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {value:?}"),
    })
}

fn tls_for(insecure: Option<bool>, ca_cert: Option<&PathBuf>) -> TlsVerification {
    if insecure.unwrap_or(false) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(path) = ca_cert {
        TlsVerification::CustomCa(path.clone())
    } else {
        TlsVerification::SystemDefaults
    }
}

/// Parse a human duration such as `"90s"` or `"10m"`.
pub fn parse_deadline(value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value).map_err(|e| ConfigError::Validation {
        field: "deadline".into(),
        reason: format!("{value:?}: {e}"),
    })
}

/// Build a `SyncConfig` from a profile, with no CLI overrides.
pub fn profile_to_sync_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<SyncConfig, ConfigError> {
    let timeout = Duration::from_secs(profile.sync.timeout.unwrap_or(defaults.timeout));

    let username = profile
        .bluecat
        .username
        .clone()
        .ok_or_else(|| ConfigError::Validation {
            field: "bluecat.username".into(),
            reason: format!("not set for profile '{profile_name}'"),
        })?;

    let source = SourceConfig {
        url: parse_url("bluecat.url", &profile.bluecat.url)?,
        username,
        password: resolve_bluecat_password(profile, profile_name)?,
        configuration: profile.bluecat.configuration.clone(),
        tls: tls_for(profile.bluecat.insecure, profile.bluecat.ca_cert.as_ref()),
        timeout,
    };

    let page_size = profile.sync.page_size.unwrap_or(defaults.page_size);
    let target = TargetConfig {
        url: parse_url("nautobot.url", &profile.nautobot.url)?,
        token: resolve_nautobot_token(profile, profile_name)?,
        tls: tls_for(profile.nautobot.insecure, profile.nautobot.ca_cert.as_ref()),
        timeout,
        page_size,
    };

    let fetch = FetchOptions {
        workers: profile.sync.workers.unwrap_or(defaults.workers),
        page_size,
        deadline: profile
            .sync
            .deadline
            .as_deref()
            .map(parse_deadline)
            .transpose()?,
        dhcp_only: profile
            .sync
            .dhcp_only
            .iter()
            .copied()
            .map(EntityId)
            .collect::<BTreeSet<_>>(),
        ..FetchOptions::default()
    };

    let mut apply = ApplyOptions {
        orphan_policy: profile.sync.orphan_policy.unwrap_or_default(),
        allow_delete: profile.sync.allow_delete,
        ..ApplyOptions::default()
    };
    if let Some(ref job) = profile.sync.job_name {
        apply.job_name.clone_from(job);
    }

    let dataset = if profile.sync.include_addresses {
        Dataset::PrefixesAndAddresses
    } else {
        Dataset::Prefixes
    };

    Ok(SyncConfig {
        source,
        target,
        options: SyncOptions {
            dataset,
            fetch,
            apply,
        },
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    const SAMPLE: &str = r#"
default_profile = "lab"

[defaults]
workers = 4

[profiles.lab.bluecat]
url = "https://bam.example.com"
username = "api"
password = "plain-pass"
configuration = "Production"
insecure = true

[profiles.lab.nautobot]
url = "https://nautobot.example.com"
token = "plain-token"

[profiles.lab.sync]
dhcp_only = [4021, 4022]
deadline = "10m"
orphan_policy = "skip"
include_addresses = true
"#;

    fn write_sample() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_profiles_from_toml() {
        let file = write_sample();
        let cfg = load_config_from(file.path()).unwrap();

        assert_eq!(cfg.default_profile.as_deref(), Some("lab"));
        assert_eq!(cfg.defaults.workers, 4);
        assert_eq!(cfg.defaults.page_size, 1000);

        let profile = cfg.profile("lab").unwrap();
        assert_eq!(profile.bluecat.configuration.as_deref(), Some("Production"));
        assert_eq!(profile.sync.dhcp_only, vec![4021, 4022]);
        assert_eq!(profile.sync.orphan_policy, Some(OrphanPolicy::Skip));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn unknown_profile_lists_available() {
        let file = write_sample();
        let cfg = load_config_from(file.path()).unwrap();

        let err = cfg.profile("prod").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ProfileNotFound { ref available, .. } if available == &["lab".to_owned()]
        ));
    }

    #[test]
    fn profile_translates_to_sync_config() {
        let file = write_sample();
        let cfg = load_config_from(file.path()).unwrap();
        let profile = cfg.profile("lab").unwrap();

        let sync = profile_to_sync_config(profile, "lab", &cfg.defaults).unwrap();

        assert_eq!(sync.source.url.as_str(), "https://bam.example.com/");
        assert_eq!(sync.source.tls, TlsVerification::DangerAcceptInvalid);
        assert_eq!(sync.target.tls, TlsVerification::SystemDefaults);
        assert_eq!(sync.target.token.expose_secret(), "plain-token");
        assert_eq!(sync.options.fetch.workers, 4);
        assert_eq!(sync.options.fetch.deadline, Some(Duration::from_secs(600)));
        assert!(sync.options.fetch.is_excluded(EntityId(4021)));
        assert_eq!(sync.options.dataset, Dataset::PrefixesAndAddresses);
        assert_eq!(sync.options.apply.orphan_policy, OrphanPolicy::Skip);
    }

    #[test]
    fn missing_token_is_reported() {
        let mut profile = Profile {
            bluecat: BluecatProfile {
                url: "https://bam.example.com".into(),
                username: Some("api".into()),
                password: Some("pw".into()),
                ..BluecatProfile::default()
            },
            nautobot: NautobotProfile {
                url: "https://nautobot.example.com".into(),
                ..NautobotProfile::default()
            },
            sync: SyncProfile::default(),
        };
        profile.nautobot.token_env = Some("IPAMSYNC_TEST_TOKEN_THAT_IS_NEVER_SET".into());

        let err = profile_to_sync_config(&profile, "ci-nonexistent-profile", &Defaults::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NoCredentials {
                secret: SecretKind::NautobotToken,
                ..
            }
        ));
    }

    #[test]
    fn bad_deadline_is_validation_error() {
        let err = parse_deadline("soon").unwrap_err();
        assert!(err.to_string().contains("deadline"));
    }

    #[test]
    fn save_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let file = write_sample();
        let cfg = load_config_from(file.path()).unwrap();

        save_config_to(&cfg, &path).unwrap();
        let reloaded = load_config_from(&path).unwrap();
        assert_eq!(reloaded, cfg);
    }
}
