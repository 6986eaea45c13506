use crate::api::{AuthEndpoints, HttpGateway, SessionEvent};
use crate::cache::Tag;
use crate::error::SyncError;
use crate::service::auth_store::{AuthState, AuthStore};
use crate::service::cache_actor::CacheHandle;
use crate::service::token_store::CredentialPair;
use crate::types::{AuthTokens, LoginDto, RegisterDto, UpdatePasswordDto, User, Validate};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Sign-in lifecycle: obtains credentials, keeps [`AuthState`] in step with
/// them and tears the session down when the server ends it.
#[derive(Clone)]
pub struct SessionService {
    gateway: HttpGateway,
    auth: AuthStore,
    cache: CacheHandle,
}

impl SessionService {
    pub fn new(gateway: HttpGateway, auth: AuthStore, cache: CacheHandle) -> Self {
        Self {
            gateway,
            auth,
            cache,
        }
    }

    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated() && self.gateway.tokens().has_access()
    }

    pub async fn register(&self, dto: &RegisterDto) -> Result<User, SyncError> {
        dto.validate()?;
        let tokens = AuthEndpoints::register(&self.gateway, dto).await?;
        self.start_session(tokens).await
    }

    pub async fn login(&self, dto: &LoginDto) -> Result<User, SyncError> {
        dto.validate()?;
        let tokens = AuthEndpoints::login(&self.gateway, dto).await?;
        self.start_session(tokens).await
    }

    async fn start_session(&self, tokens: AuthTokens) -> Result<User, SyncError> {
        // Cached rows carry the previous viewer's favorite flags.
        self.cache.clear();
        self.gateway
            .tokens()
            .set_pair(CredentialPair::new(tokens.access_token, tokens.refresh_token));
        let user = AuthEndpoints::me(&self.gateway).await?;
        info!(user_id = user.id, "signed in");
        self.auth.set(AuthState::signed_in(user.clone()));
        Ok(user)
    }

    /// Ends the session server-side; local state is only dropped on success.
    pub async fn logout(&self) -> Result<(), SyncError> {
        AuthEndpoints::logout(&self.gateway).await?;
        self.end_session();
        info!("signed out");
        Ok(())
    }

    fn end_session(&self) {
        self.gateway.tokens().clear();
        self.auth.clear();
        self.cache.clear();
    }

    pub async fn me(&self) -> Result<User, SyncError> {
        let user = AuthEndpoints::me(&self.gateway).await?;
        self.auth.set_user(user.clone());
        Ok(user)
    }

    /// Cached user unless it was invalidated or never fetched.
    pub async fn user_if_stale(&self) -> Result<User, SyncError> {
        let stale = self.cache.is_stale(Tag::User).await?;
        match self.auth.user() {
            Some(user) if !stale => Ok(user),
            _ => self.me().await,
        }
    }

    pub async fn update_password(&self, dto: &UpdatePasswordDto) -> Result<User, SyncError> {
        dto.validate()?;
        let user = AuthEndpoints::update_password(&self.gateway, dto).await?;
        self.auth.set_user(user.clone());
        Ok(user)
    }

    /// Drop auth state and cached data whenever the gateway gives up on the
    /// session. Credentials are already cleared by then.
    pub fn watch_expiry(&self) -> JoinHandle<()> {
        let mut rx = self.gateway.subscribe_session();
        let auth = self.auth.clone();
        let cache = self.cache.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(SessionEvent::Expired) => {
                        warn!("session expired; sign-in required");
                        auth.clear();
                        cache.clear();
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!("missed {} session events", n);
                        auth.clear();
                        cache.clear();
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
