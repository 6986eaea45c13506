use crate::api::HttpGateway;
use crate::config::Config;
use crate::db::{KeyValueStore, Persister, SqliteStore};
use crate::error::SyncError;
use crate::service::{
    AuthStore, CacheHandle, ConnectPolicy, MutationCoordinator, PushTransport, Queries,
    RealtimeChannel, SessionService, SseTransport, TokenStore, cache_actor,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Every long-lived component, built once at start-up and handed out
/// explicitly. Nothing here is global.
pub struct AppContext {
    pub config: Config,
    pub tokens: TokenStore,
    pub auth: AuthStore,
    pub gateway: HttpGateway,
    pub cache: CacheHandle,
    pub queries: Queries,
    pub mutations: MutationCoordinator,
    pub session: SessionService,
    realtime: RealtimeChannel,
    persister: Persister,
    expiry_watch: JoinHandle<()>,
}

impl AppContext {
    /// SQLite persistence and the server-sent event transport.
    pub async fn start(config: Config) -> Result<Self, SyncError> {
        let store = SqliteStore::connect(&config.database_url).await?;
        let transport = SseTransport::from_config(&config)?;
        Self::with_parts(config, Arc::new(store), Arc::new(transport)).await
    }

    pub async fn with_parts(
        config: Config,
        store: Arc<dyn KeyValueStore>,
        transport: Arc<dyn PushTransport>,
    ) -> Result<Self, SyncError> {
        let persister = Persister::spawn(store);
        let tokens = TokenStore::hydrate(persister.clone()).await?;
        let auth = AuthStore::hydrate(persister.clone()).await?;
        if auth.is_authenticated() && !tokens.has_access() {
            warn!("persisted sign-in has no credentials; dropping it");
            auth.clear();
        }

        let gateway = HttpGateway::new(&config, tokens.clone())?;
        let cache = cache_actor::spawn().await?;
        let queries = Queries::new(gateway.clone(), cache.clone());
        let mutations = MutationCoordinator::new(gateway.clone(), cache.clone(), auth.clone());
        let session = SessionService::new(gateway.clone(), auth.clone(), cache.clone());
        let expiry_watch = session.watch_expiry();
        let realtime = RealtimeChannel::start(
            transport,
            &tokens,
            cache.clone(),
            ConnectPolicy::from_config(&config),
        );

        info!(api_url = %config.api_url, signed_in = auth.is_authenticated(), "context ready");
        Ok(Self {
            config,
            tokens,
            auth,
            gateway,
            cache,
            queries,
            mutations,
            session,
            realtime,
            persister,
            expiry_watch,
        })
    }

    pub fn realtime(&self) -> &RealtimeChannel {
        &self.realtime
    }

    /// Close the push connection, stop the cache and flush pending writes.
    pub async fn shutdown(self) {
        self.realtime.shutdown().await;
        self.expiry_watch.abort();
        self.cache.stop();
        self.persister.flush().await;
        info!("context shut down");
    }
}
