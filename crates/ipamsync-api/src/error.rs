use thiserror::Error;

/// Top-level error type for the `ipamsync-api` crate.
///
/// Covers every failure mode of both remote systems: authentication,
/// transport, Bluecat REST faults, and Nautobot REST faults.
/// `ipamsync-core` maps these into domain errors with fetch context.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login failed (wrong credentials, account locked, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// A request was issued before `login` produced a session token.
    #[error("Not logged in -- call login() first")]
    NotLoggedIn,

    /// Session token was rejected (expired or revoked).
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    /// Nautobot rejected the API token.
    #[error("Invalid API token")]
    InvalidApiToken,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Rate limited by the remote API.
    #[error("Rate limited -- retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    // ── Bluecat ─────────────────────────────────────────────────────
    /// Fault raised by the Bluecat REST service (plain text body).
    #[error("Bluecat API error (HTTP {status}): {message}")]
    Bluecat { status: u16, message: String },

    // ── Nautobot ────────────────────────────────────────────────────
    /// Error returned by the Nautobot REST API (`{"detail": ...}` or a field map).
    #[error("Nautobot API error (HTTP {status}): {message}")]
    Nautobot { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// A Bluecat properties string could not be decoded.
    #[error("Malformed properties string: {0}")]
    MalformedProperties(String),
}

impl Error {
    /// Returns `true` if this error indicates auth has expired
    /// and re-authentication might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. } | Self::SessionExpired | Self::NotLoggedIn
        )
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::RateLimited { .. } => true,
            Self::Bluecat { status, .. } | Self::Nautobot { status, .. } => {
                *status >= 500 || *status == 429
            }
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Bluecat { status: 404, .. } | Self::Nautobot { status: 404, .. } => true,
            _ => false,
        }
    }

    /// HTTP status attached to the error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Bluecat { status, .. } | Self::Nautobot { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
