// ── Runtime sync configuration ──
//
// These types describe *where* to sync from and to and *how* to fetch.
// They carry credential data and tuning, but never touch disk.
// The CLI constructs a `SyncConfig` and hands it in.

use std::collections::BTreeSet;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::apply::ApplyOptions;
use crate::fetch::TraversalPolicy;
use crate::model::{EntityId, RecordKind};

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (lab appliances with self-signed certs).
    DangerAcceptInvalid,
}

impl TlsVerification {
    pub(crate) fn transport(&self, timeout: Duration) -> ipamsync_api::TransportConfig {
        let tls = match self {
            Self::SystemDefaults => ipamsync_api::TlsMode::System,
            Self::CustomCa(path) => ipamsync_api::TlsMode::CustomCa(path.clone()),
            Self::DangerAcceptInvalid => ipamsync_api::TlsMode::DangerAcceptInvalid,
        };
        ipamsync_api::TransportConfig { tls, timeout }
    }
}

/// Connection to the Bluecat Address Manager.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub url: Url,
    pub username: String,
    pub password: SecretString,
    /// Configuration to walk; the first one listed when unset.
    pub configuration: Option<String>,
    pub tls: TlsVerification,
    pub timeout: Duration,
}

/// Connection to the Nautobot instance.
#[derive(Debug, Clone)]
pub struct TargetConfig {
    pub url: Url,
    pub token: SecretString,
    pub tls: TlsVerification,
    pub timeout: Duration,
    /// Page size used when loading the target snapshot.
    pub page_size: u32,
}

/// Retry policy for transient page-fetch failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further attempt.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const NONE: Self = Self {
        max_retries: 0,
        base_delay: Duration::ZERO,
    };

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Tuning for the concurrent fetch engine.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Number of concurrent workers (each owns one client).
    pub workers: usize,
    /// Entities requested per page.
    pub page_size: u32,
    /// Overall deadline for the whole snapshot.
    pub deadline: Option<Duration>,
    /// Containers whose addresses are DHCP-managed and never fetched.
    pub dhcp_only: BTreeSet<EntityId>,
    pub retry: RetryPolicy,
}

impl FetchOptions {
    pub const DEFAULT_WORKERS: usize = 6;
    pub const DEFAULT_PAGE_SIZE: u32 = 1000;

    pub fn is_excluded(&self, parent: EntityId) -> bool {
        self.dhcp_only.contains(&parent)
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            workers: Self::DEFAULT_WORKERS,
            page_size: Self::DEFAULT_PAGE_SIZE,
            deadline: None,
            dhcp_only: BTreeSet::new(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Which record kinds a sync covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Dataset {
    /// Blocks, networks (the prefix hierarchy).
    #[default]
    Prefixes,
    /// Prefixes plus pools and individual addresses.
    PrefixesAndAddresses,
}

impl Dataset {
    pub fn traversal(self) -> TraversalPolicy {
        match self {
            Self::Prefixes => TraversalPolicy::prefixes(),
            Self::PrefixesAndAddresses => TraversalPolicy::with_addresses(),
        }
    }

    pub fn kinds(self) -> &'static [RecordKind] {
        match self {
            Self::Prefixes => &[RecordKind::Prefix],
            Self::PrefixesAndAddresses => &[RecordKind::Prefix, RecordKind::Address],
        }
    }
}

/// Everything a sync run needs besides the connections.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub dataset: Dataset,
    pub fetch: FetchOptions,
    pub apply: ApplyOptions,
}

/// Full configuration of one sync run.
///
/// Built by the CLI, passed to `SyncManager::connect` -- core never reads
/// config files.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub source: SourceConfig,
    pub target: TargetConfig,
    pub options: SyncOptions,
}
