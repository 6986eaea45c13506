use crate::error::{ApiError, SyncError};
use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const ENV_PREFIX: &str = "TRAINSYNC_";

/// Runtime configuration: defaults overlaid with `TRAINSYNC_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the REST API; also hosts the realtime stream.
    pub api_url: Url,
    pub realtime_path: String,
    pub database_url: String,
    pub loglevel: String,
    pub proxy: Option<Url>,
    pub user_agent: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Handshake attempts per connect before the channel gives up until the
    /// next credential change.
    pub realtime_connect_attempts: usize,
    pub realtime_retry_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: Url::parse("http://localhost:4000").expect("static default url"),
            realtime_path: "/events".to_string(),
            database_url: "sqlite:trainsync.sqlite".to_string(),
            loglevel: "info".to_string(),
            proxy: None,
            user_agent: format!("trainsync/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout_secs: 5,
            request_timeout_secs: 15,
            realtime_connect_attempts: 3,
            realtime_retry_delay_ms: 500,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, SyncError> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(|e| SyncError::Config(Box::new(e)))
    }

    pub fn with_api_url(mut self, api_url: Url) -> Self {
        self.api_url = api_url;
        self
    }

    pub fn realtime_url(&self) -> Result<Url, SyncError> {
        Ok(join_path(&self.api_url, &self.realtime_path)?)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn realtime_retry_delay(&self) -> Duration {
        Duration::from_millis(self.realtime_retry_delay_ms)
    }

    /// Shared HTTP client for REST calls and the realtime stream.
    pub fn http_client(&self) -> Result<reqwest::Client, SyncError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(self.user_agent.clone())
            .connect_timeout(self.connect_timeout());
        // Only the configured proxy is used; proxy variables in the environment are not.
        builder = match self.proxy.as_ref() {
            Some(proxy_url) => {
                let proxy = reqwest::Proxy::all(proxy_url.as_str())
                    .map_err(|e| SyncError::Api(ApiError::transport(&e)))?;
                builder.proxy(proxy)
            }
            None => builder.no_proxy(),
        };
        builder
            .build()
            .map_err(|e| SyncError::Api(ApiError::transport(&e)))
    }
}

/// Append `path` to `base`, keeping any path prefix `base` already has.
pub fn join_path(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined)
}
