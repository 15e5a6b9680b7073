//! Session state and credentials.

use std::fmt;

use reqwest::header::{HeaderMap, HeaderValue, SET_COOKIE};

/// Lifecycle of a client's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No credential held yet, or the session was logged out.
    #[default]
    Unauthenticated,
    /// A credential is held and attached to requests.
    Authenticated,
    /// The backend rejected the credential; a renewal is in progress.
    Retrying,
    /// The last login attempt was refused.
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticated => "authenticated",
            Self::Retrying => "retrying",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Cookie credential sent back to the backend on every request.
///
/// Built from the `Set-Cookie` headers of a login response as
/// `name=value` pairs joined with `"; "`. Attributes such as `Path` or
/// `HttpOnly` are dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredential(String);

impl SessionCredential {
    /// Wrap a cookie string read back from the session store.
    pub fn new(cookie: impl Into<String>) -> Self {
        Self(cookie.into())
    }

    /// Rebuild the cookie string from `Set-Cookie` response headers.
    ///
    /// Returns `None` if no usable cookie was set.
    pub fn from_set_cookie(headers: &HeaderMap) -> Option<Self> {
        let pairs: Vec<&str> = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|raw| {
                let pair = raw.split(';').next().unwrap_or_default().trim();
                let (name, _) = pair.split_once('=')?;
                (!name.trim().is_empty()).then_some(pair)
            })
            .collect();

        if pairs.is_empty() {
            None
        } else {
            Some(Self(pairs.join("; ")))
        }
    }

    /// The cookie string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The cookie string as a header value.
    ///
    /// Returns `None` if the string holds characters not allowed in headers.
    pub fn header_value(&self) -> Option<HeaderValue> {
        let mut value = HeaderValue::from_str(&self.0).ok()?;
        value.set_sensitive(true);
        Some(value)
    }

    /// Consume into the cookie string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionCredential").field(&"[REDACTED]").finish()
    }
}
