//! Connection lifecycle and callback dispatch for one MQTT client
//!
//! The assistant owns a single client session. Callbacks run on one
//! background task that polls the [`EventSource`]; the foreground drives
//! connect, publish and terminate.

use super::hooks::{ConnectInfo, DisconnectInfo, HookContext, Hooks};
use super::message::MessageRecord;
use crate::clock;
use crate::config::ClientSettings;
use crate::error::{AssistantError, AssistantResult};
use crate::mqtt_span;
use crate::transport::mqtt::{create_connection, RumqttEvents, RumqttLink};
use crate::transport::{EventSource, LinkError, LinkEvent, MqttLink, PublishReceipt};
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

/// How long terminate waits for the event task at each shutdown step
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Session state as observed by the event task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No CONNACK seen yet
    Pending,
    /// Broker accepted the connection
    Accepted,
    /// Broker refused the connection with this code
    Refused(u8),
    /// Network error from the client library
    Failed(String),
    /// DISCONNECT sent; the session is over
    Closed,
}

/// State shared between the foreground and the event task
struct Shared<L> {
    settings: ClientSettings,
    link: L,
    hooks: Hooks,
    received: AtomicU64,
    state_tx: watch::Sender<SessionState>,
}

impl<L: MqttLink + 'static> Shared<L> {
    fn context(&self) -> HookContext<'_> {
        HookContext {
            link: &self.link,
            settings: &self.settings,
        }
    }

    fn dispatch(&self, event: LinkEvent) -> AssistantResult<()> {
        match event {
            LinkEvent::ConnAck {
                code,
                session_present,
            } => {
                if code != 0 {
                    self.state_tx.send_replace(SessionState::Refused(code));
                    let err = AssistantError::from_return_code(code);
                    error!(code, "Broker refused connection: {}", err);
                    return Err(err);
                }
                info!(session_present, "Connection accepted");

                let info = ConnectInfo {
                    code,
                    session_present,
                    time: clock::timestamp(),
                };
                (self.hooks.on_connect)(&self.context(), &info);

                // Waiters in connect() resume only after the hook has run
                self.state_tx.send_replace(SessionState::Accepted);
            }
            LinkEvent::Disconnected { reason } => self.on_disconnect(reason),
            LinkEvent::Closed => {
                self.state_tx.send_replace(SessionState::Closed);
                self.on_disconnect("client disconnected".to_string());
            }
            LinkEvent::Message { topic, payload, .. } => {
                let count = self.received.fetch_add(1, Ordering::SeqCst) + 1;
                let record = MessageRecord::assemble(&topic, &payload);
                debug!(count, topic = %record.topic, "Message received");
                (self.hooks.on_message)(&self.context(), count, &record);
            }
            LinkEvent::Published { pkid } => {
                debug!(pkid, "Publish complete");
                (self.hooks.on_publish)(&self.context(), pkid);
            }
        }
        Ok(())
    }

    fn on_disconnect(&self, reason: String) {
        let info = DisconnectInfo {
            reason,
            time: clock::timestamp(),
        };
        println!("\nDisconnected: {} at {}", info.reason, info.time);
        (self.hooks.on_disconnect)(&self.context(), &info);
    }
}

/// Wraps one MQTT client session: connection parameters, lifecycle and callbacks
pub struct ClientAssistant<L = RumqttLink, E = RumqttEvents> {
    shared: Arc<Shared<L>>,
    events: Option<E>,
    event_task: Option<JoinHandle<AssistantResult<()>>>,
    state_rx: watch::Receiver<SessionState>,
    shutdown_tx: watch::Sender<bool>,
    connected: bool,
}

impl ClientAssistant {
    /// Build an assistant backed by a fresh rumqttc client
    pub fn new(settings: ClientSettings, hooks: Hooks) -> Self {
        let (link, events) = create_connection(&settings);
        Self::with_link(settings, hooks, link, events)
    }
}

impl<L, E> ClientAssistant<L, E>
where
    L: MqttLink + 'static,
    E: EventSource + 'static,
{
    /// Build an assistant around a pre-built client
    pub fn with_link(settings: ClientSettings, hooks: Hooks, link: L, events: E) -> Self {
        let (state_tx, state_rx) = watch::channel(SessionState::Pending);
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            shared: Arc::new(Shared {
                settings,
                link,
                hooks,
                received: AtomicU64::new(0),
                state_tx,
            }),
            events: Some(events),
            event_task: None,
            state_rx,
            shutdown_tx,
            connected: false,
        }
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.shared.settings
    }

    pub fn link(&self) -> &L {
        &self.shared.link
    }

    /// Number of messages dispatched to the on-message hook so far
    pub fn messages_received(&self) -> u64 {
        self.shared.received.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn session_state(&self) -> SessionState {
        self.state_rx.borrow().clone()
    }

    pub fn is_loop_running(&self) -> bool {
        self.event_task
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Print the parameter summary
    pub fn display_init(&self) {
        println!("{}", self.shared.settings);
    }

    /// Run one event through the callback path
    ///
    /// The event task calls this for every event; it is public so callers can
    /// feed events from elsewhere.
    pub fn dispatch(&self, event: LinkEvent) -> AssistantResult<()> {
        self.shared.dispatch(event)
    }

    /// Connect and wait for the broker's CONNACK
    pub async fn connect(&mut self) -> AssistantResult<()> {
        self.display_init();
        self.start_event_task()?;

        let timeout = Duration::from_secs(self.shared.settings.connect_timeout_secs);
        Self::wait_for_connection_confirmation(self.state_rx.clone(), timeout).await?;

        self.connected = true;
        Ok(())
    }

    /// Mark the session connected; the network is touched once the loop runs
    pub fn connect_async(&mut self) {
        self.display_init();
        self.connected = true;
    }

    /// Start background event processing, connecting asynchronously first if needed
    pub fn run_loop(&mut self) -> AssistantResult<()> {
        if !self.connected {
            self.connect_async();
        }
        self.start_event_task()
    }

    /// Publish the configured message, or `message` when given
    ///
    /// Connects first if needed. A nonzero return code from the client is
    /// reported as a connection error and no receipt is returned.
    pub async fn publish(&mut self, message: Option<&str>) -> AssistantResult<PublishReceipt> {
        if !self.connected {
            self.connect().await?;
        }

        let settings = &self.shared.settings;
        let payload = match message {
            Some(message) => message.to_string(),
            None => settings.message.clone().unwrap_or_default(),
        };

        let receipt = self
            .shared
            .link
            .publish(&settings.topic, settings.qos, settings.retain, Bytes::from(payload))
            .await?;

        if !receipt.is_success() {
            warn!(rc = receipt.rc, topic = %receipt.topic, "Publish rejected");
            return Err(AssistantError::from_return_code(receipt.rc));
        }

        debug!(topic = %receipt.topic, bytes = receipt.payload_len, "Publish queued");
        Ok(receipt)
    }

    /// Resolve when the event task ends: `Ok` after a clean close, the task's error otherwise
    pub async fn wait_for_exit(&mut self) -> AssistantResult<()> {
        let joined = match self.event_task.as_mut() {
            Some(handle) => handle.await,
            None => return Err(AssistantError::NotStarted),
        };
        self.event_task = None;

        match joined {
            Ok(result) => result,
            Err(e) => Err(LinkError::Other(format!("event task failed: {e}")).into()),
        }
    }

    /// Stop background processing, disconnect and report completion
    ///
    /// No DISCONNECT is sent once the event task has ended, since nothing is
    /// left to carry it.
    pub async fn terminate(&mut self) {
        let mut graceful = false;
        if self.connected && self.is_loop_running() {
            match self.shared.link.disconnect().await {
                Ok(()) => graceful = true,
                Err(e) => warn!("Disconnect request failed: {}", e),
            }
        }

        self.stop_event_task(graceful).await;
        self.connected = false;
        println!("Done");
    }

    fn start_event_task(&mut self) -> AssistantResult<()> {
        if self.event_task.is_some() {
            return Ok(());
        }
        let events = self.events.take().ok_or(LinkError::Closed)?;

        let shared = self.shared.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        let span = mqtt_span!(client_id = %shared.settings.client_id);

        self.event_task = Some(tokio::spawn(
            drive_events(shared, events, shutdown_rx).instrument(span),
        ));
        Ok(())
    }

    async fn stop_event_task(&mut self, graceful: bool) {
        let Some(mut handle) = self.event_task.take() else {
            return;
        };

        // After a DISCONNECT request the task ends on its own once the packet is out
        if graceful {
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await {
                Ok(joined) => return log_task_exit(joined),
                Err(_) => warn!("Event task still running after disconnect, signalling shutdown"),
            }
        }

        let _ = self.shutdown_tx.send(true);
        match tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await {
            Ok(joined) => log_task_exit(joined),
            Err(_) => {
                warn!("Event task didn't shut down gracefully, forcing abort");
                handle.abort();
            }
        }
    }

    async fn wait_for_connection_confirmation(
        mut state_rx: watch::Receiver<SessionState>,
        timeout: Duration,
    ) -> AssistantResult<()> {
        let confirmation = tokio::time::timeout(timeout, async {
            loop {
                let state = state_rx.borrow_and_update().clone();
                match state {
                    SessionState::Accepted => return Ok(()),
                    SessionState::Refused(code) => return Err(AssistantError::from_return_code(code)),
                    SessionState::Failed(reason) => return Err(LinkError::Other(reason).into()),
                    SessionState::Closed => return Err(LinkError::Closed.into()),
                    SessionState::Pending => {}
                }
                if state_rx.changed().await.is_err() {
                    return Err(LinkError::Closed.into());
                }
            }
        })
        .await;

        match confirmation {
            Ok(result) => result,
            Err(_) => Err(AssistantError::ConnectTimeout(timeout)),
        }
    }
}

fn log_task_exit(joined: Result<AssistantResult<()>, tokio::task::JoinError>) {
    match joined {
        Ok(Ok(())) => info!("Event task shut down gracefully"),
        Ok(Err(e)) => debug!("Event task had already stopped: {}", e),
        Err(e) if !e.is_cancelled() => warn!("Event task ended with error: {}", e),
        Err(_) => {}
    }
}

/// Poll events and dispatch them until closed, refused or shut down
async fn drive_events<L, E>(
    shared: Arc<Shared<L>>,
    mut events: E,
    mut shutdown_rx: watch::Receiver<bool>,
) -> AssistantResult<()>
where
    L: MqttLink + 'static,
    E: EventSource,
{
    let retry_interval = Duration::from_millis(shared.settings.retry_interval_ms);
    let mut connected = false;
    debug!("Starting MQTT event loop");

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("Shutdown signal received, stopping event loop");
                    return Ok(());
                }
            }

            next = events.next_event() => match next {
                Ok(LinkEvent::Closed) => {
                    shared.dispatch(LinkEvent::Closed)?;
                    return Ok(());
                }
                Ok(event) => {
                    match event {
                        LinkEvent::ConnAck { code: 0, .. } => connected = true,
                        LinkEvent::Disconnected { .. } => connected = false,
                        _ => {}
                    }
                    shared.dispatch(event)?;
                }
                Err(e) => {
                    warn!("MQTT event loop error: {}", e);
                    shared.state_tx.send_replace(SessionState::Failed(e.to_string()));
                    if connected {
                        connected = false;
                        shared.dispatch(LinkEvent::Disconnected { reason: e.to_string() })?;
                    }

                    // The client library reconnects on the next poll
                    tokio::select! {
                        _ = shutdown_rx.changed() => {
                            if *shutdown_rx.borrow() {
                                info!("Shutdown signal received during retry delay, stopping");
                                return Ok(());
                            }
                        }
                        _ = tokio::time::sleep(retry_interval) => {}
                    }
                }
            },
        }
    }
}
