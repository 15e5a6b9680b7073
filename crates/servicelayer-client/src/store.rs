//! Session store abstraction.
//!
//! The client never owns session persistence. Tokens live in a
//! [`SessionStore`] shared by every client in the process (or across
//! processes, for remote implementations), keyed by [`SessionKey`].

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Upper bound on a stored entry's lifetime; larger TTLs saturate to it.
const MAX_TTL: Duration = Duration::from_secs(u32::MAX as u64);

/// Key-value store with per-entry expiry holding session tokens.
///
/// Implementations must be safe to share between tasks. Values are the
/// reconstructed cookie string sent in the `Cookie` header.
#[async_trait]
pub trait SessionStore: Send + Sync + fmt::Debug {
    /// Return the live token under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `token` under `key` for `ttl`.
    async fn put(&self, key: &str, token: String, ttl: Duration) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn forget(&self, key: &str) -> Result<()>;

    /// Whether a live token exists under `key`.
    async fn has(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}

/// Store key for one (server, database, username, slot) tuple.
///
/// The format is `session:<sha256-hex(server + database + username)>:<slot>`.
/// The identity triple is hashed so credentials-adjacent values never appear
/// verbatim in a shared store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(String);

impl SessionKey {
    /// Prefix shared by every key this crate produces.
    pub const PREFIX: &'static str = "session";

    /// Derive the key for a slot.
    pub fn derive(server: &str, database: &str, username: &str, slot: usize) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(server.as_bytes());
        hasher.update(database.as_bytes());
        hasher.update(username.as_bytes());
        let identity = hex::encode(hasher.finalize());
        Self(format!("{}:{identity}:{slot}", Self::PREFIX))
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Clone)]
struct StoredToken {
    token: String,
    expires_at: Instant,
}

impl StoredToken {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-process [`SessionStore`] backed by a concurrent map.
///
/// Expired entries are dropped lazily on access.
#[derive(Default)]
pub struct MemorySessionStore {
    entries: DashMap<String, StoredToken>,
}

impl fmt::Debug for MemorySessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySessionStore")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl MemorySessionStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.is_live(now) {
                return Ok(Some(entry.token.clone()));
            }
        } else {
            return Ok(None);
        }
        // expired: the read guard is released above before removal
        self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        Ok(None)
    }

    async fn put(&self, key: &str, token: String, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let expires_at = now.checked_add(ttl.min(MAX_TTL)).unwrap_or(now);
        self.entries
            .insert(key.to_owned(), StoredToken { token, expires_at });
        Ok(())
    }

    async fn forget(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}
