// Bluecat session authentication
//
// `login` answers with a human-readable sentence that embeds the token:
//   "Session Token-> BAMAuthToken: vcP5ZM... <- for User : admin"
// The token part is sent verbatim as the `Authorization` header afterwards.

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::bluecat::client::BluecatClient;
use crate::error::Error;

const TOKEN_START: &str = "Session Token->";
const TOKEN_END: &str = "<- for User :";

impl BluecatClient {
    /// Authenticate with username/password and keep the session token.
    ///
    /// Subsequent requests (and clients created by `fork`) carry it.
    pub async fn login(&mut self, username: &str, password: &SecretString) -> Result<(), Error> {
        let url = self.url("login")?;
        debug!("logging in at {url}");

        let resp = self
            .http()
            .get(url)
            .query(&[
                ("username", username),
                ("password", password.expose_secret()),
            ])
            .send()
            .await?;

        let body = match Self::read_body(resp).await {
            Ok(body) => body,
            Err(Error::Bluecat { status, message }) => {
                return Err(Error::Authentication {
                    message: format!("login failed (HTTP {status}): {message}"),
                });
            }
            Err(e) => return Err(e),
        };

        let token = parse_login_response(&body)?;
        self.set_session(token)?;

        debug!("login successful");
        Ok(())
    }

    /// End the current session. Failures are reported but harmless.
    pub async fn logout(&self) -> Result<(), Error> {
        let url = self.url("logout")?;
        debug!("logging out at {url}");

        let resp = self.http().get(url).send().await?;
        Self::read_body(resp).await?;

        debug!("logout complete");
        Ok(())
    }
}

/// Extract the `BAMAuthToken: ...` header value from a login response body.
///
/// The body is usually a JSON string literal; bare text is accepted too.
pub fn parse_login_response(body: &str) -> Result<SecretString, Error> {
    let text = serde_json::from_str::<String>(body).unwrap_or_else(|_| body.to_owned());

    let malformed = || Error::Authentication {
        message: format!(
            "unexpected login response: {:?}",
            text.chars().take(80).collect::<String>()
        ),
    };

    let start = text.find(TOKEN_START).ok_or_else(malformed)? + TOKEN_START.len();
    let rest = text.get(start..).ok_or_else(malformed)?;
    let end = rest.find(TOKEN_END).ok_or_else(malformed)?;
    let token = rest.get(..end).ok_or_else(malformed)?.trim();

    if token.is_empty() {
        return Err(malformed());
    }

    Ok(SecretString::from(token.to_owned()))
}
