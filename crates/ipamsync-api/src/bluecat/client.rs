// Async HTTP client for the Bluecat Address Manager v1 REST API.
//
// Base path: /Services/REST/v1/
// Auth: `Authorization: BAMAuthToken: ...` header obtained from `login`

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

const REST_PREFIX: &str = "Services/REST/v1/";

/// Async client for the Bluecat Address Manager v1 REST API.
///
/// A client is bound to one session token. Worker pools obtain their own
/// instance through [`fork`](Self::fork), which builds an independent
/// connection pool carrying the same token.
#[derive(Debug)]
pub struct BluecatClient {
    http: reqwest::Client,
    base_url: Url,
    transport: TransportConfig,
    token: Option<SecretString>,
}

impl BluecatClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build an unauthenticated client. Only `login` may be called on it.
    pub fn new(base_url: &str, transport: TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        let base_url = Self::normalize_base_url(base_url)?;

        Ok(Self {
            http,
            base_url,
            transport,
            token: None,
        })
    }

    /// Build a client around an existing session token.
    ///
    /// The token is the full header value returned by `login`,
    /// e.g. `BAMAuthToken: vcP5ZMTQ...`.
    pub fn with_token(
        base_url: &str,
        token: SecretString,
        transport: TransportConfig,
    ) -> Result<Self, Error> {
        let http = Self::session_client(&transport, &token)?;
        let base_url = Self::normalize_base_url(base_url)?;

        Ok(Self {
            http,
            base_url,
            transport,
            token: Some(token),
        })
    }

    /// Create an independent client sharing this client's session.
    ///
    /// The new instance has its own connection pool, so concurrent workers
    /// never contend on one client.
    pub fn fork(&self) -> Result<Self, Error> {
        let token = self.token.clone().ok_or(Error::NotLoggedIn)?;
        let http = Self::session_client(&self.transport, &token)?;

        Ok(Self {
            http,
            base_url: self.base_url.clone(),
            transport: self.transport.clone(),
            token: Some(token),
        })
    }

    fn session_client(
        transport: &TransportConfig,
        token: &SecretString,
    ) -> Result<reqwest::Client, Error> {
        let mut headers = HeaderMap::new();
        let mut value =
            HeaderValue::from_str(token.expose_secret()).map_err(|e| Error::Authentication {
                message: format!("invalid session token header value: {e}"),
            })?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
        transport.build_client_with_headers(headers)
    }

    /// Append `/Services/REST/v1/` unless the caller already included it.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        let path = url.path().trim_end_matches('/').to_owned();

        if path.ends_with("/Services/REST/v1") {
            url.set_path(&format!("{path}/"));
        } else {
            url.set_path(&format!("{path}/{REST_PREFIX}"));
        }

        Ok(url)
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn set_session(&mut self, token: SecretString) -> Result<(), Error> {
        self.http = Self::session_client(&self.transport, &token)?;
        self.token = Some(token);
        Ok(())
    }

    pub(crate) fn url(&self, method: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(method)?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T, Error> {
        if self.token.is_none() {
            return Err(Error::NotLoggedIn);
        }

        let url = self.url(method)?;
        debug!("GET {url} params={params:?}");

        let resp = self.http.get(url).query(params).send().await?;
        let body = Self::read_body(resp).await?;

        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body,
            }
        })
    }

    /// Read the response body, converting non-2xx replies into errors.
    ///
    /// Bluecat reports faults as plain text (sometimes a JSON string)
    /// with a 4xx/5xx status.
    pub(crate) async fn read_body(resp: reqwest::Response) -> Result<String, Error> {
        let status = resp.status();
        let body = resp.text().await?;

        if status.is_success() {
            return Ok(body);
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::SessionExpired);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited {
                retry_after_secs: 5,
            });
        }

        let message = serde_json::from_str::<String>(&body).unwrap_or(body);
        Err(Error::Bluecat {
            status: status.as_u16(),
            message: if message.is_empty() {
                status.to_string()
            } else {
                message
            },
        })
    }
}
