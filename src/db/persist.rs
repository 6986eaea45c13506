use super::KeyValueStore;
use crate::error::SyncError;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

#[derive(Debug)]
enum PersistJob {
    Write { key: String, value: Option<String> },
    Flush(oneshot::Sender<()>),
}

/// Write-behind front for a [`KeyValueStore`].
///
/// Writes are queued and applied by a single worker in submission order, so
/// callers never wait on storage and later writes never land before earlier ones.
#[derive(Clone)]
pub struct Persister {
    store: Arc<dyn KeyValueStore>,
    tx: mpsc::UnboundedSender<PersistJob>,
}

impl Persister {
    /// Spawn the write worker. Must be called inside a Tokio runtime.
    pub fn spawn(store: Arc<dyn KeyValueStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<PersistJob>();
        let worker_store = store.clone();

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                match job {
                    PersistJob::Write { key, value } => {
                        let res = match value.as_deref() {
                            Some(v) => worker_store.set(&key, v).await,
                            None => worker_store.remove(&key).await,
                        };
                        match res {
                            Ok(()) => debug!(key = %key, "persisted"),
                            Err(e) => warn!(key = %key, error = %e, "persist write failed"),
                        }
                    }
                    PersistJob::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            info!("Persister stopped");
        });

        Self { store, tx }
    }

    /// Direct read, bypassing the queue.
    pub async fn load(&self, key: &str) -> Result<Option<String>, SyncError> {
        self.store.get(key).await
    }

    /// Queue a write; `None` removes the key.
    pub fn write(&self, key: &str, value: Option<String>) {
        let job = PersistJob::Write {
            key: key.to_string(),
            value,
        };
        if let Err(e) = self.tx.send(job) {
            warn!("Persist worker unreachable, dropping write: {}", e);
        }
    }

    /// Resolve once every write queued before this call has been applied.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(PersistJob::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}
