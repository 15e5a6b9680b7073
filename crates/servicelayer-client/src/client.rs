//! Session-managing Service Layer client.
//!
//! A [`ServiceLayerClient`] is bound to one pool slot of one backend
//! identity. It acquires a session on demand (reusing a cached one when the
//! [`SessionStore`] has it), attaches the session cookie to every request,
//! and renews the session once when the backend answers 401 or 403.

use std::fmt;
use std::sync::Arc;

use reqwest::header::{COOKIE, HeaderMap};
use reqwest::{Client as HttpClient, Method, RequestBuilder, Response};
use serde::Serialize;
use servicelayer_query::{ODataQuery, QueryParameters};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::ServiceLayerConfig;
use crate::error::{ClientError, Result};
use crate::pool::{PoolResponses, SessionPool};
use crate::session::{SessionCredential, SessionState};
use crate::slot::select_slot;
use crate::store::{MemorySessionStore, SessionKey, SessionStore};
use crate::transport::{
    LOGIN_PATH, LOGOUT_PATH, LoginRequest, base_url, build_http_client, encode_query,
    endpoint_url, header_pair, is_session_expired, is_transient,
};

/// A request described independently of the session it is sent with, so it
/// can be replayed after a renewal.
#[derive(Debug, Clone)]
pub(crate) struct PendingRequest {
    pub method: Method,
    pub endpoint: String,
    pub query: Option<QueryParameters>,
    pub body: Option<Vec<u8>>,
}

impl PendingRequest {
    pub(crate) fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            query: None,
            body: None,
        }
    }

    pub(crate) fn with_query(mut self, query: QueryParameters) -> Self {
        if !query.is_empty() {
            self.query = Some(query);
        }
        self
    }

    pub(crate) fn with_json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_vec(body)?);
        Ok(self)
    }
}

/// Builder for [`ServiceLayerClient`].
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use servicelayer_client::{MemorySessionStore, ServiceLayerClient, ServiceLayerConfig};
///
/// # async fn example() -> servicelayer_client::Result<()> {
/// let store = Arc::new(MemorySessionStore::new());
/// let config = ServiceLayerConfig::new("https://sl:50000/b1s/v1/", "SBO_PROD", "manager", "pw")
///     .with_pool_size(4);
///
/// let mut client = ServiceLayerClient::builder(config)
///     .store(store)
///     .connect()
///     .await?;
/// let items = client.get("Items").await?;
/// # Ok(())
/// # }
/// ```
#[must_use]
pub struct ClientBuilder {
    config: ServiceLayerConfig,
    store: Option<Arc<dyn SessionStore>>,
    slot: Option<usize>,
    seed: Option<u64>,
    http: Option<HttpClient>,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("slot", &self.slot)
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

impl ClientBuilder {
    fn new(config: ServiceLayerConfig) -> Self {
        Self {
            config,
            store: None,
            slot: None,
            seed: None,
            http: None,
        }
    }

    /// Share a session store between clients. Defaults to a private
    /// [`MemorySessionStore`].
    pub fn store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Bind to an explicit slot, overriding `session_index` and random choice.
    pub fn slot(mut self, slot: usize) -> Self {
        self.slot = Some(slot);
        self
    }

    /// Seed the random slot choice, for reproducible selection.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Use a preconfigured HTTP client instead of one built from the config.
    pub fn http_client(mut self, http: HttpClient) -> Self {
        self.http = Some(http);
        self
    }

    /// Validate the configuration and bind a slot without contacting the
    /// backend. The session is acquired on the first request.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] for missing or invalid settings,
    /// [`ClientError::InvalidUrl`] if the server is not a URL.
    pub fn build(self) -> Result<ServiceLayerClient> {
        let config = self.config;
        config.validate()?;

        let mut rng = self
            .seed
            .map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);
        let slot = select_slot(self.slot, config.session_index, config.pool_size, &mut rng)?;

        let base_url = base_url(&config.server)?;
        let http = match self.http {
            Some(http) => http,
            None => build_http_client(&config)?,
        };
        let session_key =
            SessionKey::derive(&config.server, &config.database, &config.username, slot);
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemorySessionStore::new()));

        debug!(slot, pool_size = config.pool_size, "Service Layer client bound to slot");

        Ok(ServiceLayerClient {
            config: Arc::new(config),
            http,
            base_url,
            store,
            slot,
            session_key,
            credential: None,
            headers: HeaderMap::new(),
            state: SessionState::Unauthenticated,
        })
    }

    /// [`build`](Self::build), then acquire a session.
    ///
    /// # Errors
    ///
    /// Everything [`build`](Self::build) and
    /// [`ServiceLayerClient::login`] can return.
    pub async fn connect(self) -> Result<ServiceLayerClient> {
        let mut client = self.build()?;
        client.login().await?;
        Ok(client)
    }
}

/// Client bound to one session slot.
///
/// Requests take `&mut self`: the client owns its credential and the one-shot
/// header set. Build one client per unit of work and share the
/// [`SessionStore`] between them.
pub struct ServiceLayerClient {
    config: Arc<ServiceLayerConfig>,
    http: HttpClient,
    base_url: Url,
    store: Arc<dyn SessionStore>,
    slot: usize,
    session_key: SessionKey,
    credential: Option<SessionCredential>,
    headers: HeaderMap,
    state: SessionState,
}

impl fmt::Debug for ServiceLayerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceLayerClient")
            .field("base_url", &self.base_url.as_str())
            .field("slot", &self.slot)
            .field("session_key", &self.session_key)
            .field("credential", &self.credential)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl ServiceLayerClient {
    /// Start building a client for `config`.
    pub fn builder(config: ServiceLayerConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// Client with a private store and no session yet.
    ///
    /// Nothing is sent to the backend here: the session is acquired by the
    /// first request or an explicit [`login`](Self::login). Use
    /// [`connect`](Self::connect) to fail fast on bad credentials.
    ///
    /// # Errors
    ///
    /// See [`ClientBuilder::build`].
    pub fn new(config: ServiceLayerConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Client with a private store and an established session.
    ///
    /// # Errors
    ///
    /// See [`ClientBuilder::connect`].
    pub async fn connect(config: ServiceLayerConfig) -> Result<Self> {
        Self::builder(config).connect().await
    }

    /// Slot this client is bound to.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Store key of this client's slot.
    pub fn session_key(&self) -> &SessionKey {
        &self.session_key
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether a credential is held.
    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated && self.credential.is_some()
    }

    /// Configuration the client was built with.
    pub fn config(&self) -> &ServiceLayerConfig {
        &self.config
    }

    /// Resolved base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Acquire a session: adopt the cached token for this slot, or log in.
    ///
    /// # Errors
    ///
    /// [`ClientError::Authentication`] if the backend refuses the
    /// credentials, [`ClientError::Transport`] once login retries are
    /// exhausted, [`ClientError::Store`] if the store fails.
    pub async fn login(&mut self) -> Result<()> {
        if let Some(token) = self.store.get(self.session_key.as_str()).await? {
            debug!(slot = self.slot, "Reusing cached Service Layer session");
            self.credential = Some(SessionCredential::new(token));
            self.state = SessionState::Authenticated;
            return Ok(());
        }

        debug!(slot = self.slot, "No cached session, logging in");
        self.perform_login().await
    }

    async fn perform_login(&mut self) -> Result<()> {
        let config = Arc::clone(&self.config);
        let url = endpoint_url(&self.base_url, LOGIN_PATH)?;
        let body = LoginRequest::from_config(&config);

        let mut attempt = 1;
        let response = loop {
            match self.http.post(url.clone()).json(&body).send().await {
                Ok(response) => break response,
                Err(e) if is_transient(&e) => match config.login_retry.delay(attempt) {
                    Some(delay) => {
                        warn!(
                            slot = self.slot,
                            attempt,
                            "Login attempt failed ({}), retrying in {:?}",
                            e,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        error!(slot = self.slot, attempt, "Login failed: {}", e);
                        self.state = SessionState::Failed;
                        return Err(e.into());
                    }
                },
                Err(e) => {
                    error!(slot = self.slot, "Login failed: {}", e);
                    self.state = SessionState::Failed;
                    return Err(e.into());
                }
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => format!("failed to read response body: {e}"),
            };
            error!(slot = self.slot, status = status.as_u16(), "Login rejected by backend");
            self.credential = None;
            self.state = SessionState::Failed;
            return Err(ClientError::Authentication {
                slot: self.slot,
                status: status.as_u16(),
                body,
            });
        }

        let Some(credential) = SessionCredential::from_set_cookie(response.headers()) else {
            error!(slot = self.slot, "Login response carried no session cookie");
            self.credential = None;
            self.state = SessionState::Failed;
            return Err(ClientError::Authentication {
                slot: self.slot,
                status: status.as_u16(),
                body: "login response did not set a session cookie".to_string(),
            });
        };

        if let Err(e) = self
            .store
            .put(
                self.session_key.as_str(),
                credential.as_str().to_owned(),
                config.cache_ttl_duration(),
            )
            .await
        {
            error!(slot = self.slot, "Could not cache session: {}", e);
            self.state = SessionState::Failed;
            return Err(e);
        }

        info!(slot = self.slot, attempt, "Service Layer session established");
        self.credential = Some(credential);
        self.state = SessionState::Authenticated;
        Ok(())
    }

    async fn ensure_session(&mut self) -> Result<()> {
        if self.credential.is_none() {
            self.login().await?;
        }
        Ok(())
    }

    /// Close this slot's session on the backend and drop it from the store.
    ///
    /// Does nothing if the store holds no session for this slot.
    ///
    /// # Errors
    ///
    /// [`ClientError::Transport`] if the logout call could not be sent. The
    /// store entry is removed either way.
    pub async fn logout(&mut self) -> Result<()> {
        let key = self.session_key.as_str();
        if !self.store.has(key).await? {
            debug!(slot = self.slot, "No cached session to log out");
            return Ok(());
        }

        let token = match &self.credential {
            Some(credential) => Some(credential.clone()),
            None => self.store.get(key).await?.map(SessionCredential::new),
        };

        let url = endpoint_url(&self.base_url, LOGOUT_PATH)?;
        let mut request = self.http.post(url);
        if let Some(cookie) = token.as_ref().and_then(SessionCredential::header_value) {
            request = request.header(COOKIE, cookie);
        }
        let sent = request.send().await;

        self.store.forget(key).await?;
        self.credential = None;
        self.state = SessionState::Unauthenticated;

        match sent {
            Ok(response) => {
                info!(slot = self.slot, status = response.status().as_u16(), "Logged out");
                Ok(())
            }
            Err(e) => {
                warn!(slot = self.slot, "Logout call failed: {}", e);
                Err(e.into())
            }
        }
    }

    /// Queue headers for the next request only. Later calls override
    /// earlier values for the same name.
    ///
    /// ```rust,no_run
    /// # async fn example(client: &mut servicelayer_client::ServiceLayerClient)
    /// # -> servicelayer_client::Result<()> {
    /// let response = client
    ///     .with_headers([("Prefer", "odata.maxpagesize=500")])?
    ///     .get("Items")
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidHeader`] if a name or value is not valid HTTP.
    /// Nothing is queued in that case.
    pub fn with_headers<I, K, V>(&mut self, headers: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let parsed = headers
            .into_iter()
            .map(|(name, value)| header_pair(name.as_ref(), value.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        for (name, value) in parsed {
            self.headers.insert(name, value);
        }
        Ok(self)
    }

    /// `GET endpoint`.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn get(&mut self, endpoint: &str) -> Result<Response> {
        self.send_request(PendingRequest::new(Method::GET, endpoint)).await
    }

    /// `GET endpoint?params`.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn get_with(
        &mut self,
        endpoint: &str,
        params: impl Into<QueryParameters>,
    ) -> Result<Response> {
        let request = PendingRequest::new(Method::GET, endpoint).with_query(params.into());
        self.send_request(request).await
    }

    /// `POST endpoint` with a JSON body.
    ///
    /// # Errors
    ///
    /// [`ClientError::Json`] if the body cannot be encoded, otherwise see
    /// [`send`](Self::send).
    pub async fn post<T: Serialize + ?Sized>(&mut self, endpoint: &str, body: &T) -> Result<Response> {
        let request = PendingRequest::new(Method::POST, endpoint).with_json(body)?;
        self.send_request(request).await
    }

    /// `PUT endpoint` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`post`](Self::post).
    pub async fn put<T: Serialize + ?Sized>(&mut self, endpoint: &str, body: &T) -> Result<Response> {
        let request = PendingRequest::new(Method::PUT, endpoint).with_json(body)?;
        self.send_request(request).await
    }

    /// `PATCH endpoint` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`post`](Self::post).
    pub async fn patch<T: Serialize + ?Sized>(
        &mut self,
        endpoint: &str,
        body: &T,
    ) -> Result<Response> {
        let request = PendingRequest::new(Method::PATCH, endpoint).with_json(body)?;
        self.send_request(request).await
    }

    /// `DELETE endpoint`.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn delete(&mut self, endpoint: &str) -> Result<Response> {
        self.send_request(PendingRequest::new(Method::DELETE, endpoint))
            .await
    }

    /// Any method, optional query parameters, no body.
    ///
    /// Non-2xx statuses are returned as responses, not errors. A 401 or 403
    /// triggers one session renewal and one replay; if the replay is
    /// rejected too, that second response is returned.
    ///
    /// # Errors
    ///
    /// [`ClientError::Transport`] on network failure, or any error from
    /// [`login`](Self::login) while acquiring or renewing the session.
    pub async fn send(
        &mut self,
        method: Method,
        endpoint: &str,
        params: Option<QueryParameters>,
    ) -> Result<Response> {
        let mut request = PendingRequest::new(method, endpoint);
        if let Some(params) = params {
            request = request.with_query(params);
        }
        self.send_request(request).await
    }

    /// Compile `query` and `GET` it from `entity`.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn odata_query(&mut self, entity: &str, query: &ODataQuery) -> Result<Response> {
        self.get_with(entity, query).await
    }

    /// Build the request yourself from a builder that already carries the
    /// session cookie and the queued one-shot headers.
    ///
    /// No renewal is attempted on this path.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn send_with<F>(&mut self, method: Method, endpoint: &str, customize: F) -> Result<Response>
    where
        F: FnOnce(RequestBuilder) -> RequestBuilder,
    {
        let headers = std::mem::take(&mut self.headers);
        self.ensure_session().await?;
        let request = self.prepare(&method, endpoint, None, headers)?;
        Ok(customize(request).send().await?)
    }

    /// Declare requests for concurrent execution under the current session.
    ///
    /// ```rust,no_run
    /// # async fn example(client: &mut servicelayer_client::ServiceLayerClient)
    /// # -> servicelayer_client::Result<()> {
    /// let mut responses = client
    ///     .pool(|pool| {
    ///         pool.tag("items").get("Items");
    ///         pool.tag("partners").get("BusinessPartners");
    ///     })
    ///     .await?;
    /// let items = responses.remove("items");
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// Every pooled request carries the same credential. Pooled requests are
    /// not renewed on 401/403 and do not consume the one-shot headers.
    ///
    /// # Errors
    ///
    /// Only session acquisition errors. Per-request failures are reported in
    /// [`PoolResponses`].
    pub async fn pool<F>(&mut self, declare: F) -> Result<PoolResponses>
    where
        F: FnOnce(&mut SessionPool),
    {
        self.ensure_session().await?;

        let mut pool = SessionPool::new();
        declare(&mut pool);

        let this = &*self;
        let entries = pool.into_entries();
        debug!(slot = this.slot, requests = entries.len(), "Dispatching pooled requests");

        let pending = entries.into_iter().map(|(key, request)| async move {
            let result = match request {
                Ok(request) => this.dispatch(&request, HeaderMap::new()).await,
                Err(e) => Err(e),
            };
            (key, result)
        });
        let results = futures::future::join_all(pending).await;

        Ok(PoolResponses::new(results))
    }

    async fn send_request(&mut self, request: PendingRequest) -> Result<Response> {
        // one-shot headers leave the client before anything is sent
        let headers = std::mem::take(&mut self.headers);
        self.ensure_session().await?;

        let response = self.dispatch(&request, headers).await?;
        let status = response.status();
        if !is_session_expired(status) {
            return Ok(response);
        }
        drop(response);

        warn!(
            slot = self.slot,
            status = status.as_u16(),
            method = %request.method,
            endpoint = %request.endpoint,
            "Session rejected, renewing once"
        );
        self.state = SessionState::Retrying;
        self.credential = None;
        if let Err(e) = self.store.forget(self.session_key.as_str()).await {
            error!(slot = self.slot, "Could not evict rejected session: {}", e);
            self.state = SessionState::Failed;
            return Err(e);
        }
        self.perform_login().await?;

        let replay = self.dispatch(&request, HeaderMap::new()).await?;
        if is_session_expired(replay.status()) {
            warn!(
                slot = self.slot,
                status = replay.status().as_u16(),
                "Request still rejected after session renewal"
            );
        }
        Ok(replay)
    }

    fn prepare(
        &self,
        method: &Method,
        endpoint: &str,
        query: Option<&QueryParameters>,
        headers: HeaderMap,
    ) -> Result<RequestBuilder> {
        let mut url = endpoint_url(&self.base_url, endpoint)?;
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.set_query(Some(&encode_query(query)));
        }
        let mut builder = self.http.request(method.clone(), url).headers(headers);
        if let Some(cookie) = self
            .credential
            .as_ref()
            .and_then(SessionCredential::header_value)
        {
            builder = builder.header(COOKIE, cookie);
        }
        Ok(builder)
    }

    async fn dispatch(&self, request: &PendingRequest, headers: HeaderMap) -> Result<Response> {
        let mut builder = self.prepare(
            &request.method,
            &request.endpoint,
            request.query.as_ref(),
            headers,
        )?;
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        Ok(builder.send().await?)
    }
}
