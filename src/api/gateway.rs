use crate::config::{Config, join_path};
use crate::error::{ApiError, SyncError};
use crate::service::token_store::TokenStore;
use crate::types::{RefreshRequest, RefreshResponse};
use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};
use url::Url;

pub const REFRESH_PATH: &str = "/auth/refresh";

/// Session-level outcomes callers may need to react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The refresh protocol failed; both credentials are gone and the user
    /// has to sign in again.
    Expired,
}

/// One outbound REST call.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub query: Vec<(String, String)>,
}

impl RequestSpec {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            query: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, serde_json::Error> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn query(mut self, query: Vec<(String, String)>) -> Self {
        self.query.extend(query);
        self
    }
}

/// Outbound REST gateway.
///
/// Injects the bearer credential and runs the refresh protocol on a 401:
/// at most one refresh call and one retry per request, and a single refresh
/// in flight across requests. Any other failure is returned immediately.
#[derive(Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: Url,
    request_timeout: Duration,
    tokens: TokenStore,
    session_tx: broadcast::Sender<SessionEvent>,
    refresh_lock: Arc<Mutex<()>>,
}

impl HttpGateway {
    pub fn new(config: &Config, tokens: TokenStore) -> Result<Self, SyncError> {
        Ok(Self::with_client(
            config.http_client()?,
            config.api_url.clone(),
            config.request_timeout(),
            tokens,
        ))
    }

    pub fn with_client(
        client: reqwest::Client,
        base_url: Url,
        request_timeout: Duration,
        tokens: TokenStore,
    ) -> Self {
        let (session_tx, _) = broadcast::channel(16);
        Self {
            client,
            base_url,
            request_timeout,
            tokens,
            session_tx,
            refresh_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn subscribe_session(&self) -> broadcast::Receiver<SessionEvent> {
        self.session_tx.subscribe()
    }

    /// Issue `spec` and decode the JSON body into `T`.
    pub async fn request<T>(&self, spec: RequestSpec) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let value = self.execute(&spec).await?;
        serde_json::from_value(value).map_err(|e| ApiError::decode(&e, spec.path.as_str()))
    }

    /// Issue `spec` and discard whatever body comes back.
    pub async fn send(&self, spec: RequestSpec) -> Result<(), ApiError> {
        self.execute(&spec).await.map(drop)
    }

    /// Issue `spec`, running the refresh protocol once on a 401.
    pub async fn execute(&self, spec: &RequestSpec) -> Result<Value, ApiError> {
        let access = self.tokens.access();
        match self.send_once(spec, access.as_deref()).await {
            Err(err) if err.is_unauthorized() => {
                self.recover_unauthorized(spec, access.as_deref(), err).await
            }
            other => other,
        }
    }

    async fn recover_unauthorized(
        &self,
        spec: &RequestSpec,
        rejected: Option<&str>,
        original: ApiError,
    ) -> Result<Value, ApiError> {
        let access = {
            // One refresh at a time; concurrent 401s reuse its result.
            let _guard = self.refresh_lock.lock().await;
            match self.tokens.access() {
                Some(current) if Some(current.as_str()) != rejected => {
                    debug!(path = %spec.path, "credential already refreshed by another request");
                    current
                }
                _ => {
                    let Some(refresh_token) = self.tokens.refresh() else {
                        warn!(path = %spec.path, "401 without refresh credential; clearing session");
                        self.expire_session();
                        return Err(original);
                    };
                    info!(path = %spec.path, "401 received; refreshing access credential");
                    match self.refresh_access(&refresh_token).await {
                        Ok(access) => access,
                        Err(e) => {
                            warn!(error = %e, "refresh failed; clearing session");
                            self.expire_session();
                            return Err(original);
                        }
                    }
                }
            }
        };

        debug!(path = %spec.path, "retrying once with refreshed credential");
        // The retry's outcome is final, even another 401.
        self.send_once(spec, Some(&access)).await
    }

    /// Exchange the refresh credential for a new access credential, storing
    /// whatever the server returns. Goes straight to the transport.
    async fn refresh_access(&self, refresh_token: &str) -> Result<String, ApiError> {
        let spec = RequestSpec::post(REFRESH_PATH)
            .json(&RefreshRequest { refresh_token })
            .map_err(|e| ApiError::decode(&e, REFRESH_PATH))?;
        let value = self.send_once(&spec, None).await?;
        let payload: RefreshResponse =
            serde_json::from_value(value).map_err(|e| ApiError::decode(&e, REFRESH_PATH))?;

        let access = payload
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::new(500, "refresh response missing access_token", REFRESH_PATH))?;

        self.tokens.set_access(Some(access.clone()));
        if let Some(rotated) = payload.refresh_token.filter(|t| !t.is_empty()) {
            self.tokens.set_refresh(Some(rotated));
        }
        info!("access credential refreshed");
        Ok(access)
    }

    fn expire_session(&self) {
        self.tokens.clear();
        let _ = self.session_tx.send(SessionEvent::Expired);
    }

    /// Single attempt over the raw transport; never refreshes.
    async fn send_once(&self, spec: &RequestSpec, access: Option<&str>) -> Result<Value, ApiError> {
        let url = join_path(&self.base_url, &spec.path)
            .map_err(|e| ApiError::new(500, format!("invalid url: {e}"), spec.path.as_str()))?;

        let mut req = self
            .client
            .request(spec.method.clone(), url)
            .timeout(self.request_timeout);
        if !spec.query.is_empty() {
            req = req.query(&spec.query);
        }
        if let Some(token) = access {
            req = req.bearer_auth(token);
        }
        if let Some(body) = spec.body.as_ref() {
            req = req.json(body);
        }

        let resp = req.send().await.map_err(|e| ApiError::transport(&e))?;
        let status = resp.status();
        let bytes = resp.bytes().await.map_err(|e| ApiError::transport(&e))?;

        if !status.is_success() {
            let err = ApiError::from_response(Some(status.as_u16()), &bytes);
            debug!(method = %spec.method, path = %spec.path, status = err.status, "request failed");
            return Err(err);
        }
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| ApiError::decode(&e, spec.path.as_str()))
    }
}
