//! Pool mode: several requests issued concurrently under one session.

use std::fmt;

use reqwest::{Method, Response};
use serde::Serialize;
use servicelayer_query::QueryParameters;

use crate::client::PendingRequest;
use crate::error::Result;

/// Identifies one pooled request in [`PoolResponses`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PoolKey {
    /// Position among the untagged requests, in declaration order.
    Index(usize),
    /// Caller-chosen tag.
    Tag(String),
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "#{i}"),
            Self::Tag(tag) => f.write_str(tag),
        }
    }
}

/// Collects the requests declared inside [`ServiceLayerClient::pool`].
///
/// Call [`tag`](Self::tag) before a verb to name its result; untagged
/// requests are numbered in declaration order.
///
/// [`ServiceLayerClient::pool`]: crate::ServiceLayerClient::pool
#[derive(Debug, Default)]
pub struct SessionPool {
    entries: Vec<(PoolKey, Result<PendingRequest>)>,
    next_tag: Option<String>,
    untagged: usize,
}

impl SessionPool {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Name the next declared request.
    pub fn tag(&mut self, key: impl Into<String>) -> &mut Self {
        self.next_tag = Some(key.into());
        self
    }

    /// Declare `GET endpoint`.
    pub fn get(&mut self, endpoint: &str) -> &mut Self {
        self.push(Ok(PendingRequest::new(Method::GET, endpoint)))
    }

    /// Declare `GET endpoint?params`.
    pub fn get_with(&mut self, endpoint: &str, params: impl Into<QueryParameters>) -> &mut Self {
        self.push(Ok(
            PendingRequest::new(Method::GET, endpoint).with_query(params.into())
        ))
    }

    /// Declare `POST endpoint` with a JSON body.
    pub fn post<T: Serialize + ?Sized>(&mut self, endpoint: &str, body: &T) -> &mut Self {
        self.push(PendingRequest::new(Method::POST, endpoint).with_json(body))
    }

    /// Declare `PUT endpoint` with a JSON body.
    pub fn put<T: Serialize + ?Sized>(&mut self, endpoint: &str, body: &T) -> &mut Self {
        self.push(PendingRequest::new(Method::PUT, endpoint).with_json(body))
    }

    /// Declare `PATCH endpoint` with a JSON body.
    pub fn patch<T: Serialize + ?Sized>(&mut self, endpoint: &str, body: &T) -> &mut Self {
        self.push(PendingRequest::new(Method::PATCH, endpoint).with_json(body))
    }

    /// Declare `DELETE endpoint`.
    pub fn delete(&mut self, endpoint: &str) -> &mut Self {
        self.push(Ok(PendingRequest::new(Method::DELETE, endpoint)))
    }

    /// Number of declared requests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was declared.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, request: Result<PendingRequest>) -> &mut Self {
        let key = match self.next_tag.take() {
            Some(tag) => PoolKey::Tag(tag),
            None => {
                self.untagged += 1;
                PoolKey::Index(self.untagged - 1)
            }
        };
        self.entries.push((key, request));
        self
    }

    pub(crate) fn into_entries(self) -> Vec<(PoolKey, Result<PendingRequest>)> {
        self.entries
    }
}

/// Results of a pool run, in declaration order.
///
/// Each entry is the response (whatever its status) or the error that
/// prevented it from being sent.
#[derive(Debug, Default)]
pub struct PoolResponses {
    entries: Vec<(PoolKey, Result<Response>)>,
}

impl PoolResponses {
    pub(crate) fn new(entries: Vec<(PoolKey, Result<Response>)>) -> Self {
        Self { entries }
    }

    /// Result for `tag`. If a tag was reused, the last request wins.
    pub fn get(&self, tag: &str) -> Option<&Result<Response>> {
        self.position(tag).map(|i| &self.entries[i].1)
    }

    /// Take the result for `tag` out of the set.
    pub fn remove(&mut self, tag: &str) -> Option<Result<Response>> {
        self.position(tag).map(|i| self.entries.remove(i).1)
    }

    /// Result of the `index`-th untagged request.
    pub fn index(&self, index: usize) -> Option<&Result<Response>> {
        self.entries
            .iter()
            .find(|(key, _)| *key == PoolKey::Index(index))
            .map(|(_, result)| result)
    }

    /// Number of results.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool declared nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over keys and results in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&PoolKey, &Result<Response>)> {
        self.entries.iter().map(|(key, result)| (key, result))
    }

    fn position(&self, tag: &str) -> Option<usize> {
        self.entries
            .iter()
            .rposition(|(key, _)| matches!(key, PoolKey::Tag(t) if t == tag))
    }
}

impl IntoIterator for PoolResponses {
    type Item = (PoolKey, Result<Response>);
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
