//! Session controller - the public client surface.
//!
//! The [`Client`] owns the transport, the correlator, the keep-alive
//! ticker, and the reconnect state machine:
//!
//! ```text
//!  Up ──transport stream ends──▶ Reconnecting(attempt=1)
//!  Reconnecting(n):
//!    wait delay = base * 1.5^(n-1), capped
//!    emit Reconnecting{attempt=n}
//!    n > max_attempts  → Disconnected
//!    else establish transport, replay authentication
//!       success → Up (emit Reconnected)
//!       failure → Reconnecting(n+1)
//! ```
//!
//! Pending requests are never replayed across reconnects; they fail
//! with `ConnectionClosed`. Side effects on the server cannot be
//! retried safely without idempotency metadata the protocol lacks.
//!
//! # Example
//!
//! ```ignore
//! use blynk_client::{Action, Client, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::builder(Config::new("blynk.example.org"))
//!         .on_virtual_pin_update(|dash, device, pin, values| {
//!             println!("{dash}-{device} V{pin} = {values:?}");
//!         })
//!         .build();
//!
//!     client.connect("user@example.org", "secret", "Blynk").await?;
//!     client.send(Action::ActivateDashboard { dash_id: 1 }).await?;
//!     client.virtual_write(1, 0, 7, &["255"]).await?;
//!     client.disconnect().await;
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::action::{self, Action};
use crate::auth::hash_password;
use crate::compress;
use crate::config::Config;
use crate::correlator::{Correlator, PendingHandle, Reply, RequestKind};
use crate::error::{BlynkError, Result};
use crate::event::{ConnectionState, Event, Hooks};
use crate::protocol::{Command, Frame, ResponseCode};
use crate::router::Router;
use crate::transport::Transport;

/// Event broadcast depth per subscriber; slow subscribers lag rather
/// than block the router.
const EVENT_QUEUE: usize = 256;

/// Ticker cadence: deadline sweeping runs every tick, pings every
/// `ping_interval`.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Saved authentication material for re-auth after an outage.
#[derive(Clone)]
enum Credentials {
    Password {
        email: String,
        digest: String,
        app_name: String,
    },
    ShareToken {
        token: String,
        app_name: String,
    },
}

/// State mutated from the send path; guarded by a short-held mutex.
struct Shared {
    state: ConnectionState,
    active_dashboard: Option<i32>,
}

/// Lifecycle state; the async mutex serializes connect, disconnect and
/// reconnect against each other.
struct Lifecycle {
    credentials: Option<Credentials>,
    ticker: Option<JoinHandle<()>>,
    pump: Option<JoinHandle<()>>,
    reconnect: Option<JoinHandle<()>>,
}

struct Inner {
    config: Config,
    correlator: Arc<Correlator>,
    events: broadcast::Sender<Event>,
    hooks: Arc<Hooks>,
    /// Hot-path transport slot; read briefly by `send` and the ticker.
    transport: RwLock<Option<Arc<Transport>>>,
    shared: StdMutex<Shared>,
    lifecycle: Mutex<Lifecycle>,
    /// Bumped for every new transport and on user disconnect. A task
    /// spawned for an older generation stands down when it observes a
    /// newer one.
    generation: AtomicU64,
}

/// Builder for configuring callback hooks before creating a client.
pub struct ClientBuilder {
    config: Config,
    hooks: Hooks,
}

impl ClientBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            hooks: Hooks::default(),
        }
    }

    /// Hook for `vw` updates: `(dash_id, device_id, pin, values)`.
    pub fn on_virtual_pin_update(
        mut self,
        hook: impl Fn(i32, i32, u16, &[String]) + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_virtual_pin = Some(Box::new(hook));
        self
    }

    /// Hook for `dw` updates: `(dash_id, device_id, pin, value)`.
    pub fn on_digital_pin_update(
        mut self,
        hook: impl Fn(i32, i32, u16, &[String]) + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_digital_pin = Some(Box::new(hook));
        self
    }

    /// Hook for `aw` updates: `(dash_id, device_id, pin, value)`.
    pub fn on_analog_pin_update(
        mut self,
        hook: impl Fn(i32, i32, u16, &[String]) + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_analog_pin = Some(Box::new(hook));
        self
    }

    /// Hook for server-pushed widget property changes.
    pub fn on_widget_property_changed(
        mut self,
        hook: impl Fn(i32, i32, &str, &str, &str) + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_widget_property = Some(Box::new(hook));
        self
    }

    /// Hook for a board attaching to its dashboard.
    pub fn on_hardware_connected(
        mut self,
        hook: impl Fn(i32, i32) + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_hardware_connected = Some(Box::new(hook));
        self
    }

    /// Hook for a board going offline.
    pub fn on_hardware_disconnected(
        mut self,
        hook: impl Fn(i32, i32) + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_hardware_disconnected = Some(Box::new(hook));
        self
    }

    /// Hook for hardware-channel messages that are not pin writes.
    pub fn on_hardware_message(
        mut self,
        hook: impl Fn(i32, i32, &[String]) + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_hardware_message = Some(Box::new(hook));
        self
    }

    /// Hook for connection lifecycle transitions.
    pub fn on_connection_state_changed(
        mut self,
        hook: impl Fn(ConnectionState) + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_connection_state = Some(Box::new(hook));
        self
    }

    pub fn build(self) -> Client {
        let (events, _) = broadcast::channel(EVENT_QUEUE);
        Client {
            inner: Arc::new(Inner {
                config: self.config,
                correlator: Arc::new(Correlator::new()),
                events,
                hooks: Arc::new(self.hooks),
                transport: RwLock::new(None),
                shared: StdMutex::new(Shared {
                    state: ConnectionState::Disconnected,
                    active_dashboard: None,
                }),
                lifecycle: Mutex::new(Lifecycle {
                    credentials: None,
                    ticker: None,
                    pump: None,
                    reconnect: None,
                }),
                generation: AtomicU64::new(0),
            }),
        }
    }
}

/// Protocol client. Cheap to clone; all clones share one session.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    /// Client with default hooks.
    pub fn new(config: Config) -> Self {
        ClientBuilder::new(config).build()
    }

    /// Builder for attaching callback hooks.
    pub fn builder(config: Config) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// Subscribe to the domain event stream.
    ///
    /// Each subscriber gets an independent queue; events arriving while
    /// a subscriber lags are dropped for that subscriber only.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.events.subscribe()
    }

    /// Current connection lifecycle state.
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.shared.lock().expect("state mutex poisoned").state
    }

    /// Dashboard id of the last successful activate, if any.
    pub fn active_dashboard(&self) -> Option<i32> {
        self.inner
            .shared
            .lock()
            .expect("state mutex poisoned")
            .active_dashboard
    }

    /// Establish TLS and authenticate with email and password.
    ///
    /// On success the session moves to `Up`, keep-alive starts, and the
    /// credentials are cached for re-auth after an outage.
    pub async fn connect(&self, email: &str, password: &str, app_name: &str) -> Result<()> {
        let digest = hash_password(password, email);
        self.connect_with(Credentials::Password {
            email: email.to_string(),
            digest,
            app_name: app_name.to_string(),
        })
        .await
    }

    /// Establish TLS and authenticate with a share token.
    pub async fn connect_with_share_token(&self, token: &str, app_name: &str) -> Result<()> {
        self.connect_with(Credentials::ShareToken {
            token: token.to_string(),
            app_name: app_name.to_string(),
        })
        .await
    }

    async fn connect_with(&self, credentials: Credentials) -> Result<()> {
        let inner = &self.inner;
        let mut lifecycle = inner.lifecycle.lock().await;

        // A fresh session replaces whatever was there.
        teardown_locked(inner, &mut lifecycle);
        set_state(inner, ConnectionState::Connecting);
        lifecycle.credentials = Some(credentials);

        let (_generation, result) = establish(inner, &mut lifecycle).await;
        match result {
            Ok(()) => {
                set_state(inner, ConnectionState::Up);
                Ok(())
            }
            Err(e) => {
                lifecycle.credentials = None;
                set_state(inner, ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    /// Register a new account, then disconnect.
    ///
    /// Uses a one-shot connection; the session state is untouched.
    pub async fn register(&self, email: &str, password: &str, app_name: &str) -> Result<()> {
        let digest = hash_password(password, email);
        let (transport, mut frames) = Transport::connect(&self.inner.config).await?;

        let frame = Frame::command(Command::Register, 1, action::register_body(email, &digest, app_name));
        let result = async {
            transport.send(frame.encode().into()).await?;

            let reply = tokio::time::timeout(self.inner.config.response_timeout, async {
                while let Some(frame) = frames.recv().await {
                    if let Frame::Response {
                        message_id: 1,
                        code,
                    } = frame
                    {
                        return Some(code);
                    }
                }
                None
            })
            .await;

            match reply {
                Err(_) => Err(BlynkError::Timeout),
                Ok(None) => Err(BlynkError::ConnectionClosed),
                Ok(Some(code)) if code.is_ok() => Ok(()),
                Ok(Some(code @ ResponseCode::UserAlreadyRegistered)) => {
                    Err(BlynkError::Auth(code))
                }
                Ok(Some(code)) => Err(BlynkError::Server(code)),
            }
        }
        .await;

        transport.disconnect();
        if result.is_ok() {
            emit(&self.inner, Event::Registered);
        }
        result
    }

    /// Send an action and await its reply.
    ///
    /// Status-reply actions resolve to [`Event::Response`] on OK and
    /// fail with `Server(code)` otherwise. Data-returning actions
    /// resolve to the decoded reply event (e.g. [`Event::Profile`]).
    pub async fn send(&self, action: Action) -> Result<Event> {
        let inner = &self.inner;
        let transport = inner
            .transport
            .read()
            .expect("transport lock poisoned")
            .clone()
            .ok_or(BlynkError::NotConnected)?;

        let (id, handle) = inner
            .correlator
            .allocate(action.kind(), inner.config.response_timeout)?;
        let frame = Frame::command(action.command(), id, action.encode_body());

        if let Err(e) = transport.send(frame.encode().into()).await {
            inner.correlator.cancel(id);
            return Err(e);
        }

        match await_reply(inner, id, handle).await? {
            Reply::Code(code) if code.is_ok() => {
                self.note_success(&action);
                Ok(Event::Response {
                    message_id: id,
                    code,
                })
            }
            Reply::Code(code) => Err(BlynkError::Server(code)),
            Reply::Data(frame) => decode_data_reply(frame),
        }
    }

    /// Write values to a virtual pin.
    pub async fn virtual_write<S: AsRef<str>>(
        &self,
        dash_id: i32,
        device_id: i32,
        pin: u16,
        values: &[S],
    ) -> Result<Event> {
        let mut fields = vec!["vw".to_string(), pin.to_string()];
        fields.extend(values.iter().map(|v| v.as_ref().to_string()));
        self.send(Action::Hardware {
            dash_id,
            device_id,
            fields,
        })
        .await
    }

    /// Write a digital pin state.
    pub async fn digital_write(
        &self,
        dash_id: i32,
        device_id: i32,
        pin: u16,
        value: &str,
    ) -> Result<Event> {
        self.send(Action::Hardware {
            dash_id,
            device_id,
            fields: vec!["dw".into(), pin.to_string(), value.to_string()],
        })
        .await
    }

    /// Mark a dashboard active for this connection.
    pub async fn activate_dashboard(&self, dash_id: i32) -> Result<Event> {
        self.send(Action::ActivateDashboard { dash_id }).await
    }

    /// Deactivate every active dashboard.
    pub async fn deactivate_all(&self) -> Result<Event> {
        self.send(Action::DeactivateDashboard { dash_id: None }).await
    }

    /// Load and decompress the user profile.
    pub async fn load_profile(&self) -> Result<String> {
        match self.send(Action::LoadProfile).await? {
            Event::Profile { json } => Ok(json),
            other => Err(BlynkError::Decode(format!(
                "unexpected profile reply: {other:?}"
            ))),
        }
    }

    /// Stop keep-alive, cancel any reconnect, close the transport, and
    /// fail all pending requests with `ConnectionClosed`. Infallible.
    pub async fn disconnect(&self) {
        let inner = &self.inner;
        let mut lifecycle = inner.lifecycle.lock().await;

        teardown_locked(inner, &mut lifecycle);
        lifecycle.credentials = None;
        inner
            .shared
            .lock()
            .expect("state mutex poisoned")
            .active_dashboard = None;

        if set_state(inner, ConnectionState::Disconnected) {
            emit(inner, Event::Disconnected);
        }
    }

    /// Track server-confirmed side effects on the session record.
    fn note_success(&self, action: &Action) {
        let mut shared = self.inner.shared.lock().expect("state mutex poisoned");
        match action {
            Action::ActivateDashboard { dash_id } => {
                shared.active_dashboard = Some(*dash_id);
            }
            Action::DeactivateDashboard { dash_id: None } => {
                shared.active_dashboard = None;
            }
            Action::DeactivateDashboard { dash_id: Some(id) } => {
                if shared.active_dashboard == Some(*id) {
                    shared.active_dashboard = None;
                }
            }
            _ => {}
        }
    }
}

/// Broadcast an event and run its hook.
fn emit(inner: &Inner, event: Event) {
    let _ = inner.events.send(event.clone());
    inner.hooks.dispatch(&event);
}

/// Move to `state`, emitting the transition event. Returns whether the
/// state actually changed.
fn set_state(inner: &Inner, state: ConnectionState) -> bool {
    let changed = {
        let mut shared = inner.shared.lock().expect("state mutex poisoned");
        if shared.state == state {
            false
        } else {
            shared.state = state;
            true
        }
    };
    if changed {
        emit(inner, Event::ConnectionState(state));
    }
    changed
}

/// Abort connection-scoped tasks, drop the transport, and fail every
/// pending request. Leaves credentials and state to the caller.
fn teardown_locked(inner: &Inner, lifecycle: &mut Lifecycle) {
    inner.generation.fetch_add(1, Ordering::SeqCst);
    if let Some(ticker) = lifecycle.ticker.take() {
        ticker.abort();
    }
    if let Some(reconnect) = lifecycle.reconnect.take() {
        reconnect.abort();
    }
    if let Some(pump) = lifecycle.pump.take() {
        pump.abort();
    }
    if let Some(transport) = inner
        .transport
        .write()
        .expect("transport lock poisoned")
        .take()
    {
        transport.disconnect();
    }
    inner.correlator.fail_all(|| BlynkError::ConnectionClosed);
}

/// Create a transport for the saved credentials and authenticate over
/// it. Returns the generation the attempt ended on; the caller keeps
/// tracking it across retries.
fn establish<'a>(
    inner: &'a Arc<Inner>,
    lifecycle: &'a mut Lifecycle,
) -> Pin<Box<dyn Future<Output = (u64, Result<()>)> + Send + 'a>> {
    Box::pin(establish_inner(inner, lifecycle))
}

async fn establish_inner(inner: &Arc<Inner>, lifecycle: &mut Lifecycle) -> (u64, Result<()>) {
    let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

    let Some(credentials) = lifecycle.credentials.clone() else {
        return (generation, Err(BlynkError::NotConnected));
    };

    // Replace remnants of the previous connection.
    if let Some(ticker) = lifecycle.ticker.take() {
        ticker.abort();
    }
    if let Some(pump) = lifecycle.pump.take() {
        pump.abort();
    }
    if let Some(old) = inner
        .transport
        .write()
        .expect("transport lock poisoned")
        .take()
    {
        old.disconnect();
    }

    let (transport, frames) = match Transport::connect(&inner.config).await {
        Ok(pair) => pair,
        Err(e) => return (generation, Err(e)),
    };
    let transport = Arc::new(transport);

    // The pump must run before login so the reply can be routed.
    let pump = tokio::spawn(run_pump(inner.clone(), generation, frames));

    match authenticate(inner, &transport, &credentials).await {
        Ok(()) => {
            *inner.transport.write().expect("transport lock poisoned") = Some(transport);
            lifecycle.pump = Some(pump);
            lifecycle.ticker = Some(tokio::spawn(run_ticker(inner.clone(), generation)));
            (generation, Ok(()))
        }
        Err(e) => {
            // Invalidate the pump before tearing the transport down so
            // the stream ending does not look like an outage.
            let stale = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            transport.disconnect();
            pump.abort();
            (stale, Err(e))
        }
    }
}

/// Send LOGIN or SHARE_LOGIN and await the status reply.
async fn authenticate(
    inner: &Arc<Inner>,
    transport: &Transport,
    credentials: &Credentials,
) -> Result<()> {
    let (command, body) = match credentials {
        Credentials::Password {
            email,
            digest,
            app_name,
        } => (Command::Login, action::login_body(email, digest, app_name)),
        Credentials::ShareToken { token, app_name } => (
            Command::ShareLogin,
            action::share_login_body(token, app_name),
        ),
    };

    let (id, handle) = inner
        .correlator
        .allocate(RequestKind::ResponseOnly, inner.config.response_timeout)?;
    let frame = Frame::command(command, id, body);

    if let Err(e) = transport.send(frame.encode().into()).await {
        inner.correlator.cancel(id);
        return Err(e);
    }

    match await_reply(inner, id, handle).await? {
        Reply::Code(code) if code.is_ok() => Ok(()),
        Reply::Code(code) => Err(BlynkError::Auth(code)),
        Reply::Data(_) => Err(BlynkError::Decode(
            "command-shaped reply to an auth request".into(),
        )),
    }
}

/// Await a pending handle with the per-request deadline applied at the
/// call site as well; the ticker's sweep is the backstop.
async fn await_reply(inner: &Arc<Inner>, id: u16, handle: PendingHandle) -> Result<Reply> {
    match tokio::time::timeout(inner.config.response_timeout, handle.wait()).await {
        Ok(reply) => reply,
        Err(_) => {
            // A late frame for this id now routes as an unsolicited event.
            inner.correlator.cancel(id);
            Err(BlynkError::Timeout)
        }
    }
}

/// Decode the command-shaped reply of a data-returning request.
fn decode_data_reply(frame: Frame) -> Result<Event> {
    let Frame::Command {
        command, payload, ..
    } = frame
    else {
        return Err(BlynkError::Decode("status frame in a data reply".into()));
    };

    match command {
        Command::LoadProfileGzipped => {
            let json = compress::decompress(&payload)?;
            Ok(Event::Profile {
                json: String::from_utf8_lossy(&json).into_owned(),
            })
        }
        Command::GetEnhancedGraphData => {
            let data = compress::decompress(&payload)?;
            Ok(Event::Data {
                command,
                payload: data.into(),
            })
        }
        _ => Ok(Event::Data { command, payload }),
    }
}

/// Consume the inbound frame stream; its termination is the disconnect
/// signal that drives reconnection.
async fn run_pump(inner: Arc<Inner>, generation: u64, mut frames: mpsc::Receiver<Frame>) {
    let router = Router::new(
        inner.correlator.clone(),
        inner.events.clone(),
        inner.hooks.clone(),
    );
    while let Some(frame) = frames.recv().await {
        router.route(frame);
    }

    if inner.generation.load(Ordering::SeqCst) != generation {
        // Superseded by a newer transport or a user disconnect.
        return;
    }

    tracing::debug!(generation, "transport stream ended, starting reconnect");
    let task = tokio::spawn(run_reconnect(inner.clone(), generation));
    let mut lifecycle = inner.lifecycle.lock().await;
    lifecycle.reconnect = Some(task);
}

/// Reconnect state machine for one outage.
async fn run_reconnect(inner: Arc<Inner>, lost_generation: u64) {
    {
        let mut lifecycle = inner.lifecycle.lock().await;
        if inner.generation.load(Ordering::SeqCst) != lost_generation {
            return;
        }
        // Requests owed by the dead transport are not replayed. Failing
        // them under the lock, after the generation check, keeps a
        // superseded task away from a newer session's pending entries.
        inner.correlator.fail_all(|| BlynkError::ConnectionClosed);
        if let Some(ticker) = lifecycle.ticker.take() {
            ticker.abort();
        }
        inner
            .transport
            .write()
            .expect("transport lock poisoned")
            .take();
        if lifecycle.credentials.is_none() {
            set_state(&inner, ConnectionState::Disconnected);
            emit(&inner, Event::Disconnected);
            return;
        }
        set_state(&inner, ConnectionState::Reconnecting);
    }

    let mut current_generation = lost_generation;
    let mut attempt: u32 = 1;
    loop {
        tokio::time::sleep(inner.config.reconnect_delay(attempt)).await;
        if inner.generation.load(Ordering::SeqCst) != current_generation {
            return;
        }
        emit(&inner, Event::Reconnecting { attempt });

        let mut lifecycle = inner.lifecycle.lock().await;
        if inner.generation.load(Ordering::SeqCst) != current_generation {
            return;
        }

        if attempt > inner.config.max_reconnect_attempts {
            set_state(&inner, ConnectionState::Disconnected);
            emit(&inner, Event::Disconnected);
            return;
        }

        let (generation, result) = establish(&inner, &mut lifecycle).await;
        current_generation = generation;
        match result {
            Ok(()) => {
                set_state(&inner, ConnectionState::Up);
                emit(&inner, Event::Reconnected);
                return;
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "reconnect attempt failed");
                attempt += 1;
            }
        }
    }
}

/// Connection-scoped ticker: sweeps request deadlines every tick and
/// emits keep-alive pings every `ping_interval`. Ping failures are
/// logged, never raised; the stream termination does the real work.
async fn run_ticker(inner: Arc<Inner>, generation: u64) {
    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The interval fires immediately once; skip that edge.
    ticker.tick().await;

    let mut last_ping = Instant::now();
    loop {
        ticker.tick().await;
        if inner.generation.load(Ordering::SeqCst) != generation {
            return;
        }

        inner.correlator.expire_deadlines(Instant::now());

        if last_ping.elapsed() >= inner.config.ping_interval {
            last_ping = Instant::now();
            send_ping(&inner).await;
        }
    }
}

async fn send_ping(inner: &Arc<Inner>) {
    let transport = inner
        .transport
        .read()
        .expect("transport lock poisoned")
        .clone();
    let Some(transport) = transport else {
        return;
    };

    let allocated = inner
        .correlator
        .allocate(RequestKind::ResponseOnly, inner.config.response_timeout);
    let Ok((id, handle)) = allocated else {
        tracing::warn!("keep-alive skipped: id space saturated");
        return;
    };

    let frame = Frame::command(Command::Ping, id, Bytes::new());
    if let Err(e) = transport.send(frame.encode().into()).await {
        tracing::debug!(error = %e, "keep-alive ping not sent");
        inner.correlator.cancel(id);
        return;
    }

    // The reply only clears the pending entry; failures are swallowed.
    tokio::spawn(async move {
        if let Err(e) = handle.wait().await {
            tracing::debug!(error = %e, "keep-alive reply error");
        }
    });
}
