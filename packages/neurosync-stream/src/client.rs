// Stream client - connection state machine with fixed-delay reconnect
//
// State lives in one mutex-guarded `Machine`. Every transition (connect,
// channel open, channel loss, retry timer, teardown) takes that lock, so
// handlers never interleave. Each connection attempt runs as a session task
// tagged with a generation number; events from a session that has been
// superseded or torn down are ignored.
//
//   Idle -> Connecting -> Open -> Closed -> (delay) -> Connecting -> ...
//                    \-> Closed ...
//
// The reconnect delay is a spawned timer holding a CancellationToken. It is
// stored on the machine, so at most one exists and `disconnect` can cancel it.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::message::{InboundMessage, OutboundMessage};
use crate::transport::{ChannelEvent, Connector, WsConnector};
use crate::types::{
    ClientEvent, ClientStats, ConnectionState, LatestData, ReconnectPolicy, SendOutcome,
};

const EVENT_CAPACITY: usize = 256;

/// Auto-reconnecting stream client
///
/// Dropping the client tears it down like `disconnect`.
pub struct StreamClient {
    inner: Arc<Inner>,
}

struct Inner {
    endpoint: String,
    policy: ReconnectPolicy,
    connector: Arc<dyn Connector>,
    machine: Mutex<Machine>,
    state_tx: watch::Sender<ConnectionState>,
    latest: RwLock<Option<LatestData>>,
    events: broadcast::Sender<ClientEvent>,
    connection_attempts: AtomicU64,
    messages_discarded: AtomicU64,
    sends_dropped: AtomicU64,
}

#[derive(Default)]
struct Machine {
    state: ConnectionState,
    last_error: Option<String>,
    generation: u64,
    torn_down: bool,
    /// Consecutive closes without a successful open in between
    failures: u32,
    session: Option<Session>,
    retry: Option<RetryTimer>,
    outbound: Option<mpsc::UnboundedSender<String>>,
}

struct Session {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

struct RetryTimer {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl RetryTimer {
    fn cancel(self) {
        self.token.cancel();
        self.handle.abort();
    }
}

impl StreamClient {
    /// Create a WebSocket client for `endpoint`
    pub fn new(endpoint: impl Into<String>, policy: ReconnectPolicy) -> Self {
        Self::with_connector(endpoint, policy, Arc::new(WsConnector))
    }

    /// Create a client over a custom transport
    pub fn with_connector(
        endpoint: impl Into<String>,
        policy: ReconnectPolicy,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                endpoint: endpoint.into(),
                policy,
                connector,
                machine: Mutex::new(Machine::default()),
                state_tx,
                latest: RwLock::new(None),
                events,
                connection_attempts: AtomicU64::new(0),
                messages_discarded: AtomicU64::new(0),
                sends_dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Start connecting.
    ///
    /// Ignored while `Open` or `Connecting`. Re-enables automatic reconnection
    /// after a previous `disconnect`. Must be called within a Tokio runtime.
    pub fn connect(&self) {
        let mut machine = self.inner.machine.lock();

        match machine.state {
            ConnectionState::Open | ConnectionState::Connecting => {
                debug!(
                    "connect() ignored, client already {} to {}",
                    machine.state, self.inner.endpoint
                );
                return;
            }
            ConnectionState::Idle | ConnectionState::Closed => {}
        }

        machine.torn_down = false;
        machine.failures = 0;
        if let Some(timer) = machine.retry.take() {
            timer.cancel();
        }

        self.inner.begin_attempt(&mut machine);
    }

    /// Tear the connection down and stop reconnecting.
    ///
    /// Cancels any pending retry, closes the active channel and leaves the
    /// client `Closed` until `connect` is called again.
    pub fn disconnect(&self) {
        // the session task finishes closing the channel on its own
        drop(self.inner.teardown());
    }

    /// `disconnect`, then wait for the active session to finish closing
    pub async fn shutdown(&self) {
        if let Some(handle) = self.inner.teardown() {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!("Stream session ended abnormally: {}", e);
                }
            }
        }
    }

    /// Feed one raw inbound frame.
    ///
    /// Returns true when the frame decoded and replaced the latest data.
    /// Undecodable frames are discarded and the previous value is kept.
    pub fn on_message(&self, raw: &str) -> bool {
        self.inner.handle_message(raw, None)
    }

    /// Serialize and transmit `message` if the channel is open
    pub fn send(&self, message: &OutboundMessage) -> SendOutcome {
        self.inner.send(message)
    }

    /// Send `{"theta": .., "beta": ..}`
    pub fn send_params(&self, theta: f64, beta: f64) -> SendOutcome {
        self.send(&OutboundMessage::params(theta, beta))
    }

    /// Send `{"action": ..}`
    pub fn send_action(&self, label: impl Into<String>) -> SendOutcome {
        self.send(&OutboundMessage::action(label))
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.machine.lock().last_error.clone()
    }

    pub fn has_pending_retry(&self) -> bool {
        self.inner.machine.lock().retry.is_some()
    }

    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.inner.policy
    }

    /// Most recent successfully decoded payload
    pub fn latest(&self) -> Option<LatestData> {
        self.inner.latest.read().clone()
    }

    /// Sequence number of the latest payload, without cloning it
    pub fn latest_sequence(&self) -> Option<u64> {
        self.inner.latest.read().as_ref().map(|data| data.sequence)
    }

    /// Subscribe to lifecycle and message events
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.events.subscribe()
    }

    /// Watch the connection state
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    pub fn stats(&self) -> ClientStats {
        ClientStats {
            connection_attempts: self.inner.connection_attempts.load(Ordering::Relaxed),
            messages_received: self.latest_sequence().unwrap_or(0),
            messages_discarded: self.inner.messages_discarded.load(Ordering::Relaxed),
            sends_dropped: self.inner.sends_dropped.load(Ordering::Relaxed),
        }
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        drop(self.inner.teardown());
    }
}

impl Inner {
    fn emit(&self, event: ClientEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn transition(&self, machine: &mut Machine, state: ConnectionState) {
        if machine.state == state {
            return;
        }
        debug!("{}: {} -> {}", self.endpoint, machine.state, state);
        machine.state = state;
        self.state_tx.send_replace(state);
        self.emit(ClientEvent::StateChanged { state });
    }

    fn begin_attempt(self: &Arc<Self>, machine: &mut Machine) {
        machine.generation += 1;
        let generation = machine.generation;
        let token = CancellationToken::new();

        self.connection_attempts.fetch_add(1, Ordering::Relaxed);
        self.transition(machine, ConnectionState::Connecting);
        info!("Connecting to {}", self.endpoint);

        let handle = tokio::spawn(run_session(Arc::clone(self), token.clone(), generation));
        machine.session = Some(Session { token, handle });
    }

    fn handle_open(&self, generation: u64, outbound: mpsc::UnboundedSender<String>) -> bool {
        let mut machine = self.machine.lock();
        if machine.torn_down || machine.generation != generation {
            return false;
        }

        machine.last_error = None;
        machine.failures = 0;
        machine.outbound = Some(outbound);
        self.transition(&mut machine, ConnectionState::Open);
        info!("Stream connected: {}", self.endpoint);
        true
    }

    fn handle_closed(self: &Arc<Self>, generation: u64, reason: Option<String>) {
        let mut machine = self.machine.lock();
        if machine.torn_down || machine.generation != generation {
            return;
        }

        machine.outbound = None;
        machine.session = None;
        match reason {
            Some(error) => {
                warn!("Stream to {} lost: {}", self.endpoint, error);
                machine.last_error = Some(error);
            }
            None => info!("Stream to {} closed by remote", self.endpoint),
        }
        self.transition(&mut machine, ConnectionState::Closed);

        self.schedule_retry(&mut machine);
    }

    fn schedule_retry(self: &Arc<Self>, machine: &mut Machine) {
        if machine.retry.is_some() {
            return;
        }

        machine.failures += 1;
        let attempt = machine.failures;
        if !self.policy.allows(attempt) {
            let attempts = attempt - 1;
            warn!(
                "Giving up on {} after {} reconnect attempts",
                self.endpoint, attempts
            );
            self.emit(ClientEvent::ReconnectAbandoned { attempts });
            return;
        }

        let delay = self.policy.delay;
        let generation = machine.generation;
        let token = CancellationToken::new();
        let timer_token = token.clone();
        let inner = Arc::clone(self);

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = timer_token.cancelled() => {}
                _ = tokio::time::sleep(delay) => inner.fire_retry(generation),
            }
        });

        machine.retry = Some(RetryTimer { token, handle });
        info!(
            "Reconnecting to {} in {} ms (attempt {})",
            self.endpoint,
            delay.as_millis(),
            attempt
        );
        self.emit(ClientEvent::ReconnectScheduled {
            attempt,
            delay_ms: delay.as_millis() as u64,
        });
    }

    fn fire_retry(self: &Arc<Self>, generation: u64) {
        let mut machine = self.machine.lock();
        if machine.torn_down || machine.generation != generation {
            return;
        }

        machine.retry = None;
        if machine.state == ConnectionState::Closed {
            self.begin_attempt(&mut machine);
        }
    }

    fn teardown(&self) -> Option<JoinHandle<()>> {
        let mut machine = self.machine.lock();

        machine.torn_down = true;
        machine.generation += 1;
        machine.outbound = None;

        if let Some(timer) = machine.retry.take() {
            debug!("Cancelled pending reconnect to {}", self.endpoint);
            timer.cancel();
        }

        let handle = machine.session.take().map(|session| {
            session.token.cancel();
            session.handle
        });

        if machine.state != ConnectionState::Closed {
            info!("Disconnecting from {}", self.endpoint);
        }
        self.transition(&mut machine, ConnectionState::Closed);

        handle
    }

    /// Decode and publish one frame.
    ///
    /// `generation` identifies the session the frame arrived on; frames from a
    /// superseded or torn-down session are dropped. `None` is used for frames
    /// fed in directly through `on_message`.
    fn handle_message(&self, raw: &str, generation: Option<u64>) -> bool {
        let message = match InboundMessage::decode(raw) {
            Ok(message) => message,
            Err(e) => {
                self.messages_discarded.fetch_add(1, Ordering::Relaxed);
                warn!("Discarding inbound message from {}: {}", self.endpoint, e);
                self.emit(ClientEvent::MessageDiscarded {
                    reason: e.to_string(),
                });
                return false;
            }
        };

        // held across the write so teardown cannot slip in between check and publish
        let machine = self.machine.lock();
        if let Some(generation) = generation {
            if machine.torn_down || machine.generation != generation {
                debug!("Ignoring frame from stale session on {}", self.endpoint);
                return false;
            }
        }

        let sequence = {
            let mut latest = self.latest.write();
            let (sequence, mut merged) = match latest.as_ref() {
                Some(prev) => (prev.sequence + 1, prev.merged.clone()),
                None => (1, InboundMessage::default()),
            };
            merged.merge(&message);
            *latest = Some(LatestData {
                sequence,
                message,
                merged,
                received_at: chrono::Utc::now(),
            });
            sequence
        };
        drop(machine);

        self.emit(ClientEvent::MessageReceived { sequence });
        true
    }

    fn send(&self, message: &OutboundMessage) -> SendOutcome {
        let text = match message.encode() {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to serialize outbound message: {}", e);
                self.sends_dropped.fetch_add(1, Ordering::Relaxed);
                return SendOutcome::Dropped;
            }
        };

        let machine = self.machine.lock();
        if machine.state == ConnectionState::Open {
            if let Some(outbound) = machine.outbound.as_ref() {
                if outbound.send(text).is_ok() {
                    return SendOutcome::Sent;
                }
            }
        }

        let state = machine.state;
        drop(machine);

        self.sends_dropped.fetch_add(1, Ordering::Relaxed);
        warn!("Dropping send to {}: connection is {}", self.endpoint, state);
        self.emit(ClientEvent::SendDropped { state });
        SendOutcome::Dropped
    }
}

/// One connection attempt and, if it opens, the life of that channel
async fn run_session(inner: Arc<Inner>, token: CancellationToken, generation: u64) {
    let opened = tokio::select! {
        _ = token.cancelled() => return,
        result = inner.connector.open(&inner.endpoint) => result,
    };

    let mut channel = match opened {
        Ok(channel) => channel,
        Err(e) => {
            inner.handle_closed(generation, Some(e.to_string()));
            return;
        }
    };

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
    if !inner.handle_open(generation, outbound_tx) {
        channel.close().await;
        return;
    }

    let reason = loop {
        tokio::select! {
            biased;

            _ = token.cancelled() => {
                channel.close().await;
                debug!("Stream session for {} cancelled", inner.endpoint);
                return;
            }

            Some(text) = outbound_rx.recv() => {
                if let Err(e) = channel.send_text(text).await {
                    break Some(e.to_string());
                }
            }

            event = channel.next_event() => match event {
                Some(ChannelEvent::Message(raw)) => {
                    inner.handle_message(&raw, Some(generation));
                }
                Some(ChannelEvent::Error(e)) => break Some(e),
                Some(ChannelEvent::Closed) | None => break None,
            },
        }
    };

    inner.handle_closed(generation, reason);
}
