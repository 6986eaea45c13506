use crate::config::Config;
use crate::error::{ApiError, IsRetryable, SyncError};
use crate::service::cache_actor::CacheHandle;
use crate::service::token_store::{CredentialPair, TokenStore};
use crate::types::RealtimeEvent;

use backon::{ExponentialBuilder, Retryable};
use eventsource_stream::Eventsource;
use futures::stream::{BoxStream, StreamExt};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};
use url::Url;

/// Connection lifecycle of the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
}

pub type EventStream = BoxStream<'static, Result<RealtimeEvent, SyncError>>;

/// A push transport. `connect` performs the authenticated handshake and
/// returns the inbound event stream; dropping the stream closes the connection.
#[ractor::async_trait]
pub trait PushTransport: Send + Sync + 'static {
    async fn connect(&self, access_token: &str) -> Result<EventStream, SyncError>;
}

/// Server-sent events over the shared HTTP client.
pub struct SseTransport {
    client: reqwest::Client,
    url: Url,
}

impl SseTransport {
    pub fn new(client: reqwest::Client, url: Url) -> Self {
        Self { client, url }
    }

    pub fn from_config(config: &Config) -> Result<Self, SyncError> {
        Ok(Self::new(config.http_client()?, config.realtime_url()?))
    }
}

#[ractor::async_trait]
impl PushTransport for SseTransport {
    async fn connect(&self, access_token: &str) -> Result<EventStream, SyncError> {
        let resp = self
            .client
            .get(self.url.clone())
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| ApiError::transport(&e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.bytes().await.unwrap_or_default();
            return Err(ApiError::from_response(Some(status.as_u16()), &body).into());
        }

        let stream = resp
            .bytes_stream()
            .eventsource()
            .filter_map(|item| async move {
                match item {
                    Ok(ev) => match RealtimeEvent::from_named(&ev.event, &ev.data) {
                        Ok(Some(event)) => Some(Ok(event)),
                        Ok(None) => {
                            debug!(event = %ev.event, "ignoring unknown realtime event");
                            None
                        }
                        Err(e) => {
                            warn!(event = %ev.event, error = %e, "malformed realtime payload");
                            None
                        }
                    },
                    Err(e) => Some(Err(SyncError::Realtime(e.to_string()))),
                }
            })
            .boxed();
        Ok(stream)
    }
}

type Feed = mpsc::UnboundedSender<Result<RealtimeEvent, SyncError>>;

/// In-process transport: events are pushed by hand into the live connection.
#[derive(Default)]
pub struct MemoryTransport {
    live: Mutex<Option<Feed>>,
    handshakes: Mutex<Vec<String>>,
    refuse: Mutex<usize>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` on the open connection. False when nothing is connected.
    pub fn push(&self, event: RealtimeEvent) -> bool {
        self.feed(Ok(event))
    }

    /// Break the open connection with a transport error.
    pub fn fail(&self, message: &str) -> bool {
        self.feed(Err(SyncError::Realtime(message.to_string())))
    }

    /// Close the open connection cleanly.
    pub fn close(&self) {
        if let Ok(mut live) = self.live.lock() {
            live.take();
        }
    }

    /// Reject the next `n` handshakes with a retryable error.
    pub fn refuse_next(&self, n: usize) {
        if let Ok(mut refuse) = self.refuse.lock() {
            *refuse = n;
        }
    }

    /// Access credentials presented on each handshake, oldest first.
    pub fn handshakes(&self) -> Vec<String> {
        self.handshakes
            .lock()
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    fn feed(&self, item: Result<RealtimeEvent, SyncError>) -> bool {
        match self.live.lock() {
            Ok(live) => live.as_ref().is_some_and(|tx| tx.send(item).is_ok()),
            Err(_) => false,
        }
    }
}

#[ractor::async_trait]
impl PushTransport for MemoryTransport {
    async fn connect(&self, access_token: &str) -> Result<EventStream, SyncError> {
        if let Ok(mut h) = self.handshakes.lock() {
            h.push(access_token.to_string());
        }
        let refused = match self.refuse.lock() {
            Ok(mut refuse) if *refuse > 0 => {
                *refuse -= 1;
                true
            }
            _ => false,
        };
        if refused {
            return Err(SyncError::Realtime("handshake refused".to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut live) = self.live.lock() {
            *live = Some(tx);
        }
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }
}

/// Retry policy for a single connect.
#[derive(Debug, Clone, Copy)]
pub struct ConnectPolicy {
    pub attempts: usize,
    pub delay: Duration,
}

impl ConnectPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            attempts: config.realtime_connect_attempts.max(1),
            delay: config.realtime_retry_delay(),
        }
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.delay)
            .with_max_times(self.attempts.saturating_sub(1))
    }
}

/// Persistent push connection feeding the cache actor.
///
/// Connects whenever an access credential is present and reconnects as soon
/// as that credential changes. A supervisor task owns the connection; it is
/// stopped by [`RealtimeChannel::shutdown`] or, failing that, on drop.
pub struct RealtimeChannel {
    state_rx: watch::Receiver<ChannelState>,
    events_tx: broadcast::Sender<RealtimeEvent>,
    reconnect_tx: mpsc::UnboundedSender<()>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl RealtimeChannel {
    pub fn start(
        transport: Arc<dyn PushTransport>,
        tokens: &TokenStore,
        cache: CacheHandle,
        policy: ConnectPolicy,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(ChannelState::Disconnected);
        let (events_tx, _) = broadcast::channel(64);
        let (reconnect_tx, reconnect_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let supervisor = Supervisor {
            transport,
            cache,
            policy,
            state_tx,
            events_tx: events_tx.clone(),
        };
        let task = tokio::spawn(supervisor.run(tokens.subscribe(), reconnect_rx, shutdown_rx));

        Self {
            state_rx,
            events_tx,
            reconnect_tx,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        }
    }

    pub fn state(&self) -> ChannelState {
        *self.state_rx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ChannelState> {
        self.state_rx.clone()
    }

    /// Events after they were handed to the cache.
    pub fn subscribe_events(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.events_tx.subscribe()
    }

    /// Drop the current connection (if any) and connect again with the
    /// current credential.
    pub fn reconnect(&self) {
        let _ = self.reconnect_tx.send(());
    }

    /// Close the connection and wait for the supervisor to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct Supervisor {
    transport: Arc<dyn PushTransport>,
    cache: CacheHandle,
    policy: ConnectPolicy,
    state_tx: watch::Sender<ChannelState>,
    events_tx: broadcast::Sender<RealtimeEvent>,
}

enum Wake {
    Shutdown,
    Reconnect,
    Idle,
}

impl Supervisor {
    async fn run(
        self,
        mut creds: watch::Receiver<CredentialPair>,
        mut reconnect_rx: mpsc::UnboundedReceiver<()>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        loop {
            let access = creds.borrow_and_update().access.clone();
            let mut stream = match access.as_deref() {
                Some(token) => {
                    self.set_state(ChannelState::Connecting);
                    tokio::select! {
                        _ = &mut shutdown_rx => break,
                        res = self.connect(token) => match res {
                            Ok(stream) => {
                                info!("realtime channel connected");
                                self.set_state(ChannelState::Connected);
                                Some(stream)
                            }
                            Err(e) => {
                                warn!(error = %e, "realtime connect failed; waiting for new credentials");
                                self.set_state(ChannelState::Disconnected);
                                None
                            }
                        },
                    }
                }
                None => {
                    self.set_state(ChannelState::Disconnected);
                    None
                }
            };

            let wake = loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break Wake::Shutdown,
                    changed = creds.changed() => {
                        if changed.is_err() {
                            break Wake::Shutdown;
                        }
                        if creds.borrow().access != access {
                            debug!("access credential changed; reconnecting");
                            break Wake::Reconnect;
                        }
                    }
                    req = reconnect_rx.recv() => {
                        if req.is_none() {
                            break Wake::Shutdown;
                        }
                        break Wake::Reconnect;
                    }
                    item = next_event(&mut stream) => match item {
                        Some(Ok(event)) => self.apply(event),
                        Some(Err(e)) => {
                            warn!(error = %e, "realtime stream failed");
                            break Wake::Idle;
                        }
                        None => {
                            info!("realtime stream closed by server");
                            break Wake::Idle;
                        }
                    },
                }
            };

            // Drop the old connection before anything else happens.
            drop(stream.take());
            match wake {
                Wake::Shutdown => break,
                Wake::Reconnect => continue,
                Wake::Idle => {
                    self.set_state(ChannelState::Disconnected);
                    // Stay down until the access credential changes or a
                    // reconnect is asked for. A rotated refresh credential alone
                    // does not count.
                    let resume = loop {
                        tokio::select! {
                            _ = &mut shutdown_rx => break false,
                            changed = creds.changed() => {
                                if changed.is_err() {
                                    break false;
                                }
                                if creds.borrow().access != access {
                                    break true;
                                }
                            }
                            req = reconnect_rx.recv() => break req.is_some(),
                        }
                    };
                    if !resume {
                        break;
                    }
                }
            }
        }
        self.set_state(ChannelState::Disconnected);
        info!("realtime channel stopped");
    }

    async fn connect(&self, token: &str) -> Result<EventStream, SyncError> {
        (|| async { self.transport.connect(token).await })
            .retry(self.policy.backoff())
            .when(|e: &SyncError| e.is_retryable())
            .notify(|err, dur: Duration| {
                warn!("realtime connect retrying after error {}, sleeping {:?}", err, dur);
            })
            .await
    }

    fn apply(&self, event: RealtimeEvent) {
        debug!(event = event.name(), id = event.schedule_id(), "realtime event received");
        self.cache.apply_realtime(event.clone());
        let _ = self.events_tx.send(event);
    }

    fn set_state(&self, state: ChannelState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }
}

async fn next_event(stream: &mut Option<EventStream>) -> Option<Result<RealtimeEvent, SyncError>> {
    match stream.as_mut() {
        Some(s) => s.next().await,
        None => std::future::pending().await,
    }
}
