use crate::db::Persister;
use crate::error::SyncError;
use crate::types::User;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

pub const AUTH_STATE_KEY: &str = "auth";

/// Who is signed in, as last confirmed by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    pub user: Option<User>,
    pub is_authenticated: bool,
}

impl AuthState {
    pub fn signed_in(user: User) -> Self {
        Self {
            user: Some(user),
            is_authenticated: true,
        }
    }
}

/// Persisted, observable [`AuthState`].
#[derive(Clone)]
pub struct AuthStore {
    tx: Arc<watch::Sender<AuthState>>,
    persister: Persister,
}

impl AuthStore {
    /// Restore the state saved by a previous run. A corrupt entry is dropped.
    pub async fn hydrate(persister: Persister) -> Result<Self, SyncError> {
        let state = match persister.load(AUTH_STATE_KEY).await? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "discarding unreadable auth state");
                AuthState::default()
            }),
            None => AuthState::default(),
        };
        let (tx, _rx) = watch::channel(state);
        Ok(Self {
            tx: Arc::new(tx),
            persister,
        })
    }

    pub fn get(&self) -> AuthState {
        self.tx.borrow().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.tx.borrow().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_authenticated
    }

    pub fn set(&self, state: AuthState) {
        match serde_json::to_string(&state) {
            Ok(raw) => self.persister.write(AUTH_STATE_KEY, Some(raw)),
            Err(e) => warn!(error = %e, "auth state not persisted"),
        }
        self.tx.send_replace(state);
    }

    /// Replace the cached user without touching the authenticated flag.
    pub fn set_user(&self, user: User) {
        let mut state = self.get();
        state.user = Some(user);
        self.set(state);
    }

    pub fn clear(&self) {
        self.tx.send_replace(AuthState::default());
        self.persister.write(AUTH_STATE_KEY, None);
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.tx.subscribe()
    }
}
