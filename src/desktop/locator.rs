//! Remote-desktop locator parsing: `vnc://[user[:password]@]host[:port]`.

use crate::error::RegistryError;
use percent_encoding::percent_decode_str;
use std::fmt;

/// Only scheme accepted for desktop targets.
pub const DESKTOP_SCHEME: &str = "vnc";
/// Port used when the locator omits one.
pub const DEFAULT_DESKTOP_PORT: u16 = 5900;

/// Parsed connection target for the desktop protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Locator {
    /// Parse a locator string. The scheme must be `vnc` (case-insensitive).
    pub fn parse(uri: &str) -> Result<Self, RegistryError> {
        let uri = uri.trim();
        let parsed = reqwest::Url::parse(uri).map_err(|err| {
            RegistryError::InvalidLocator(format!(
                "`{uri}` is not of the form vnc://[user[:password]@]host[:port]: {err}"
            ))
        })?;
        if parsed.scheme() != DESKTOP_SCHEME {
            return Err(RegistryError::UnsupportedScheme(parsed.scheme().to_string()));
        }

        let host = parsed
            .host_str()
            .map(|host| host.trim_start_matches('[').trim_end_matches(']'))
            .unwrap_or_default();
        if host.is_empty() {
            return Err(RegistryError::InvalidLocator(format!(
                "`{uri}` is missing a host"
            )));
        }

        Ok(Self {
            host: host.to_string(),
            port: parsed.port().unwrap_or(DEFAULT_DESKTOP_PORT),
            username: decoded(parsed.username()),
            password: parsed.password().and_then(decoded),
        })
    }
}

impl fmt::Display for Locator {
    /// Renders the locator with the password masked, for logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{DESKTOP_SCHEME}://")?;
        if let Some(user) = &self.username {
            write!(f, "{user}")?;
            if self.password.is_some() {
                write!(f, ":***")?;
            }
            write!(f, "@")?;
        }
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Userinfo comes back percent-encoded; empty parts count as absent.
fn decoded(value: &str) -> Option<String> {
    if value.is_empty() {
        return None;
    }
    Some(percent_decode_str(value).decode_utf8_lossy().into_owned())
}
