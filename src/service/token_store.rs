use crate::db::Persister;
use crate::error::SyncError;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// The single live access/refresh pair. Token contents are opaque.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialPair {
    pub access: Option<String>,
    pub refresh: Option<String>,
}

impl CredentialPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: Some(access.into()),
            refresh: Some(refresh.into()),
        }
    }
}

/// Persisted holder of the credential pair.
///
/// Reads never tear: every reader sees a whole pair. Each mutation is
/// queued for persistence and returns without waiting for storage.
#[derive(Clone)]
pub struct TokenStore {
    tx: Arc<watch::Sender<CredentialPair>>,
    persister: Persister,
}

impl TokenStore {
    /// Load the pair persisted by a previous run.
    pub async fn hydrate(persister: Persister) -> Result<Self, SyncError> {
        let pair = CredentialPair {
            access: persister.load(ACCESS_TOKEN_KEY).await?,
            refresh: persister.load(REFRESH_TOKEN_KEY).await?,
        };
        debug!(
            has_access = pair.access.is_some(),
            has_refresh = pair.refresh.is_some(),
            "token store hydrated"
        );
        let (tx, _rx) = watch::channel(pair);
        Ok(Self {
            tx: Arc::new(tx),
            persister,
        })
    }

    pub fn get(&self) -> CredentialPair {
        self.tx.borrow().clone()
    }

    pub fn access(&self) -> Option<String> {
        self.tx.borrow().access.clone()
    }

    pub fn refresh(&self) -> Option<String> {
        self.tx.borrow().refresh.clone()
    }

    pub fn has_access(&self) -> bool {
        self.tx.borrow().access.is_some()
    }

    pub fn set_access(&self, token: Option<String>) {
        let changed = self.tx.send_if_modified(|pair| {
            if pair.access == token {
                return false;
            }
            pair.access = token.clone();
            true
        });
        if changed {
            self.persister.write(ACCESS_TOKEN_KEY, token);
        }
    }

    pub fn set_refresh(&self, token: Option<String>) {
        let changed = self.tx.send_if_modified(|pair| {
            if pair.refresh == token {
                return false;
            }
            pair.refresh = token.clone();
            true
        });
        if changed {
            self.persister.write(REFRESH_TOKEN_KEY, token);
        }
    }

    /// Replace both credentials in one observable step.
    pub fn set_pair(&self, pair: CredentialPair) {
        let previous = self.tx.send_replace(pair.clone());
        if previous.access != pair.access {
            self.persister.write(ACCESS_TOKEN_KEY, pair.access);
        }
        if previous.refresh != pair.refresh {
            self.persister.write(REFRESH_TOKEN_KEY, pair.refresh);
        }
    }

    pub fn clear(&self) {
        self.set_pair(CredentialPair::default());
    }

    /// Observe credential changes (the realtime channel reconnects on these).
    pub fn subscribe(&self) -> watch::Receiver<CredentialPair> {
        self.tx.subscribe()
    }

    /// Wait until queued writes reached storage.
    pub async fn flush(&self) {
        self.persister.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{KeyValueStore, MemoryStore};

    #[tokio::test]
    async fn hydrates_from_previous_run() {
        let store = Arc::new(MemoryStore::with_entries([
            (ACCESS_TOKEN_KEY, "a-1"),
            (REFRESH_TOKEN_KEY, "r-1"),
        ]));
        let tokens = TokenStore::hydrate(Persister::spawn(store)).await.unwrap();
        assert_eq!(tokens.get(), CredentialPair::new("a-1", "r-1"));
    }

    #[tokio::test]
    async fn mutations_are_persisted() {
        let store = Arc::new(MemoryStore::default());
        let tokens = TokenStore::hydrate(Persister::spawn(store.clone()))
            .await
            .unwrap();

        tokens.set_pair(CredentialPair::new("a-1", "r-1"));
        tokens.set_access(Some("a-2".into()));
        tokens.flush().await;
        assert_eq!(store.get(ACCESS_TOKEN_KEY).await.unwrap().as_deref(), Some("a-2"));
        assert_eq!(store.get(REFRESH_TOKEN_KEY).await.unwrap().as_deref(), Some("r-1"));

        tokens.clear();
        tokens.flush().await;
        assert_eq!(store.get(ACCESS_TOKEN_KEY).await.unwrap(), None);
        assert_eq!(store.get(REFRESH_TOKEN_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn unchanged_access_does_not_notify() {
        let store = Arc::new(MemoryStore::default());
        let tokens = TokenStore::hydrate(Persister::spawn(store)).await.unwrap();
        tokens.set_access(Some("a-1".into()));

        let mut rx = tokens.subscribe();
        rx.borrow_and_update();
        tokens.set_access(Some("a-1".into()));
        assert!(!rx.has_changed().unwrap());

        tokens.set_access(None);
        assert!(rx.has_changed().unwrap());
        assert!(!tokens.has_access());
    }
}
