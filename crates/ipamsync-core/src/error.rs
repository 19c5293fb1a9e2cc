// ── Core error types ──
//
// Domain errors from ipamsync-core. Transport failures reach callers only
// wrapped in fetch or apply context; the `From<ipamsync_api::Error>` impl
// translates the rest into domain-appropriate variants.

use thiserror::Error;

use crate::model::{EntityId, EntityType, RecordKey};

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Request timed out")]
    Timeout,

    // ── Fetch errors ─────────────────────────────────────────────────
    /// One page fetch failed after retries.
    #[error(
        "Fetch failed for {object_type} under parent {parent_id} at offset {offset}: {source}"
    )]
    FetchFailed {
        parent_id: EntityId,
        object_type: EntityType,
        offset: u32,
        #[source]
        source: Box<CoreError>,
    },

    /// The snapshot was abandoned; carries how far it got.
    #[error(
        "Snapshot incomplete after {jobs_completed} jobs and {entities_fetched} entities: {source}"
    )]
    SnapshotIncomplete {
        jobs_completed: usize,
        entities_fetched: usize,
        #[source]
        source: Box<CoreError>,
    },

    #[error("Fetch exceeded its {seconds}s deadline")]
    DeadlineExceeded { seconds: u64 },

    #[error("Fetch cancelled")]
    Cancelled,

    // ── Data errors ──────────────────────────────────────────────────
    /// A remote entity lacks a field the normalizer requires.
    #[error("Entity {entity_id} ({object_type}) does not match the expected schema: {reason}")]
    SchemaMismatch {
        entity_id: EntityId,
        object_type: String,
        reason: String,
    },

    /// A status string outside the closed mapping table.
    #[error("Unmapped status {value:?} on {context}")]
    UnmappedStatus { value: String, context: String },

    #[error("Record not found in target: {key}")]
    NotFound { key: RecordKey },

    // ── Apply errors ─────────────────────────────────────────────────
    #[error("Orphan policy violation: {message}")]
    OrphanPolicyViolation { message: String },

    /// An apply run failed and its writes were rolled back.
    #[error("Apply failed after {created} creates and {updated} updates: {source}")]
    ApplyFailed {
        created: usize,
        updated: usize,
        #[source]
        source: Box<CoreError>,
    },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
        transient: bool,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` if retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout => true,
            Self::ConnectionFailed { .. } => true,
            Self::Api { transient, .. } => *transient,
            _ => false,
        }
    }

    /// The innermost error, unwrapping fetch/snapshot/apply context.
    pub fn root_cause(&self) -> &CoreError {
        match self {
            Self::FetchFailed { source, .. }
            | Self::SnapshotIncomplete { source, .. }
            | Self::ApplyFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<ipamsync_api::Error> for CoreError {
    fn from(err: ipamsync_api::Error) -> Self {
        let transient = err.is_transient();
        match err {
            ipamsync_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            ipamsync_api::Error::NotLoggedIn => CoreError::AuthenticationFailed {
                message: "Not logged in".into(),
            },
            ipamsync_api::Error::SessionExpired => CoreError::AuthenticationFailed {
                message: "Session expired -- re-authentication required".into(),
            },
            ipamsync_api::Error::InvalidApiToken => CoreError::AuthenticationFailed {
                message: "Invalid API token".into(),
            },
            ipamsync_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                        transient,
                    }
                }
            }
            ipamsync_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            ipamsync_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            ipamsync_api::Error::RateLimited { retry_after_secs } => CoreError::Api {
                message: format!("Rate limited -- retry after {retry_after_secs}s"),
                status: Some(429),
                transient,
            },
            ipamsync_api::Error::Bluecat { status, message }
            | ipamsync_api::Error::Nautobot { status, message } => CoreError::Api {
                message,
                status: Some(status),
                transient,
            },
            ipamsync_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            ipamsync_api::Error::MalformedProperties(message) => {
                CoreError::Internal(format!("Malformed properties: {message}"))
            }
        }
    }
}
