//! [`Dashboard`] – the single-owner event loop.
//!
//! All dashboard state lives in one task.  UI input, remote pushes, auth
//! changes, write outcomes and timer ticks arrive as messages and are
//! processed one at a time; after each message the loop publishes the new
//! [`DashboardView`] on a watch channel and drains queued notifications onto
//! the [`EventBus`].
//!
//! ```text
//!  UI ──InputEvent──▶ InputTracker ──Intent──▶ CommandDispatcher ──▶ RemoteChannel ──▶ store
//!                                                                                     │
//!  UI ◀──view/bus── DashboardState ◀── reconciler ◀──── subscriptions ◀──────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use robodash_middleware::EventBus;
//! use robodash_runtime::{Dashboard, DashboardConfig};
//!
//! # async fn run() {
//! let config = DashboardConfig { demo: true, ..Default::default() };
//! let (dashboard, handle) = Dashboard::new(config, None, EventBus::default());
//! tokio::spawn(dashboard.run());
//! println!("{}", handle.view().session_label);
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use robodash_middleware::{EventBus, RemoteChannel, RemoteStore, WriteOutcome, paths};
use robodash_types::{
    DashError, DashboardView, EventPayload, Identity, LogEntry, LogLevel, SessionStatus,
};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::DashboardConfig;
use crate::dispatcher::{CommandDispatcher, WriteOp};
use crate::input::{InputEvent, InputTracker, Intent};
use crate::reconciler;
use crate::session::{self, SessionManager};
use crate::simulator::DemoSimulator;
use crate::state::DashboardState;

const BUS_SOURCE: &str = "robodash-runtime::dashboard";

/// Remote slots the dashboard subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Distance,
    RobotConnected,
    Mode,
}

impl Slot {
    pub const ALL: [Slot; 3] = [Slot::Distance, Slot::RobotConnected, Slot::Mode];

    pub fn path(self) -> &'static str {
        match self {
            Slot::Distance => paths::DISTANCE,
            Slot::RobotConnected => paths::ROBOT_CONNECTED,
            Slot::Mode => paths::MODE,
        }
    }
}

/// Messages processed by the dashboard loop.
#[derive(Debug)]
pub enum DashMessage {
    Input(InputEvent),
    Remote { slot: Slot, value: Option<Value> },
    Auth(Option<Identity>),
    SessionFailed(DashError),
    /// Stop the loop after lowering the presence beacon; the sender, if
    /// any, is notified once teardown finished.
    Shutdown(Option<oneshot::Sender<()>>),
}

/// Cloneable handle used by UI surfaces.
#[derive(Clone)]
pub struct DashboardHandle {
    tx: mpsc::UnboundedSender<DashMessage>,
    view: watch::Receiver<DashboardView>,
    log: watch::Receiver<Vec<LogEntry>>,
    bus: EventBus,
}

impl DashboardHandle {
    pub fn send_input(&self, event: InputEvent) -> Result<(), DashError> {
        self.send(DashMessage::Input(event))
    }

    /// Latest view snapshot.
    pub fn view(&self) -> DashboardView {
        self.view.borrow().clone()
    }

    pub fn subscribe_view(&self) -> watch::Receiver<DashboardView> {
        self.view.clone()
    }

    /// Current activity log, oldest first.
    pub fn log(&self) -> Vec<LogEntry> {
        self.log.borrow().clone()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Ask the loop to stop without waiting for it.
    pub fn request_shutdown(&self) -> Result<(), DashError> {
        self.send(DashMessage::Shutdown(None))
    }

    /// Stop the loop and wait until teardown finished.
    pub async fn shutdown(&self) -> Result<(), DashError> {
        let (ack, done) = oneshot::channel();
        self.send(DashMessage::Shutdown(Some(ack)))?;
        done.await
            .map_err(|_| DashError::Channel("dashboard stopped before acknowledging".to_string()))
    }

    fn send(&self, message: DashMessage) -> Result<(), DashError> {
        self.tx
            .send(message)
            .map_err(|_| DashError::Channel("dashboard loop has stopped".to_string()))
    }
}

pub struct Dashboard {
    config: DashboardConfig,
    store: Option<Arc<dyn RemoteStore>>,
    bus: EventBus,
    state: DashboardState,
    input: InputTracker,
    rx: mpsc::UnboundedReceiver<DashMessage>,
    weak_tx: mpsc::WeakUnboundedSender<DashMessage>,
    view_tx: watch::Sender<DashboardView>,
    log_tx: watch::Sender<Vec<LogEntry>>,
    log_version: u64,
    subscriptions_bound: bool,
}

impl Dashboard {
    /// Build the loop and its handle.  Without a store the dashboard runs in
    /// demo mode regardless of `config.demo`.
    pub fn new(
        config: DashboardConfig,
        store: Option<Arc<dyn RemoteStore>>,
        bus: EventBus,
    ) -> (Dashboard, DashboardHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = DashboardState::new();
        let (view_tx, view_rx) = watch::channel(state.view());
        let (log_tx, log_rx) = watch::channel(Vec::new());
        let handle = DashboardHandle {
            tx: tx.clone(),
            view: view_rx,
            log: log_rx,
            bus: bus.clone(),
        };
        let dashboard = Dashboard {
            config,
            store,
            bus,
            state,
            input: InputTracker::new(),
            rx,
            weak_tx: tx.downgrade(),
            view_tx,
            log_tx,
            log_version: 0,
            subscriptions_bound: false,
        };
        (dashboard, handle)
    }

    pub fn is_demo(&self) -> bool {
        self.config.demo || self.store.is_none()
    }

    /// Run until shutdown is requested or every handle is dropped.
    pub async fn run(mut self) {
        self.state.log(LogLevel::Info, "Manual controls are ready.");
        self.state.log(LogLevel::Info, "System Initialized. Connecting...");

        let (write_tx, mut write_rx) = mpsc::unbounded_channel::<WriteOutcome<WriteOp>>();
        let mut simulator = None;
        let dispatcher = match (&self.store, self.is_demo()) {
            (Some(store), false) => {
                self.spawn_session(Arc::clone(store));
                CommandDispatcher::remote(RemoteChannel::spawn(
                    Arc::clone(store),
                    self.config.write_timeout,
                    write_tx,
                ))
            }
            _ => {
                let sim = DemoSimulator::new(self.config.demo_seed);
                sim.start(&mut self.state);
                simulator = Some(sim);
                CommandDispatcher::local()
            }
        };

        let mut demo_ticker = simulator
            .as_ref()
            .map(|_| ticker(self.config.demo_interval));
        let mut animation_ticker = self.config.animation_interval.map(ticker);
        self.flush();
        info!(demo = dispatcher.is_local(), "dashboard loop started");

        loop {
            tokio::select! {
                message = self.rx.recv() => match message {
                    Some(DashMessage::Shutdown(ack)) => {
                        self.teardown(&dispatcher).await;
                        if let Some(ack) = ack {
                            let _ = ack.send(());
                        }
                        break;
                    }
                    Some(message) => self.handle(&dispatcher, message),
                    None => {
                        debug!("every dashboard handle dropped");
                        self.teardown(&dispatcher).await;
                        break;
                    }
                },
                Some(outcome) = write_rx.recv() => dispatcher.on_write_outcome(&mut self.state, outcome),
                _ = tick(&mut demo_ticker) => {
                    if let Some(sim) = simulator.as_mut() {
                        sim.tick(&mut self.state);
                    }
                }
                _ = tick(&mut animation_ticker) => {
                    self.state.steering.frame();
                }
            }
            self.flush();
        }
        self.flush();
        info!("dashboard loop stopped");
    }

    fn handle(&mut self, dispatcher: &CommandDispatcher, message: DashMessage) {
        match message {
            DashMessage::Input(event) => {
                for intent in self.input.handle(&event, self.state.mode) {
                    self.apply_intent(dispatcher, intent);
                }
            }
            DashMessage::Remote { slot, value } => match slot {
                Slot::Distance => reconciler::on_distance(&mut self.state, value.as_ref()),
                Slot::RobotConnected => reconciler::on_connectivity(&mut self.state, value.as_ref()),
                Slot::Mode => reconciler::on_mode(&mut self.state, value.as_ref()),
            },
            DashMessage::Auth(Some(identity)) => {
                info!(uid = %identity.uid, "signed in");
                self.state.session_established = true;
                self.state.set_session(SessionStatus::Connected);
                self.state.log(LogLevel::Ok, "Firebase connection successful.");
                self.bind_subscriptions();
                dispatcher.announce(&mut self.state);
            }
            DashMessage::Auth(None) => {
                if self.state.session_established {
                    warn!("session lost");
                    self.state.session_established = false;
                    self.state.set_session(SessionStatus::Disconnected);
                    self.state.log(LogLevel::Bad, "Firebase disconnected.");
                    if self.state.robot_connected {
                        self.state.robot_connected = false;
                        self.state.emit(EventPayload::RobotLink { connected: false });
                    }
                }
            }
            DashMessage::SessionFailed(e) => {
                error!(error = %e, "session could not be established");
                self.state.session_established = false;
                self.state.set_session(SessionStatus::AuthFailed);
                self.state.log(LogLevel::Bad, "Firebase authentication failed.");
            }
            DashMessage::Shutdown(_) => {}
        }
    }

    fn apply_intent(&mut self, dispatcher: &CommandDispatcher, intent: Intent) {
        match intent {
            Intent::Dispatch(command) => dispatcher.dispatch(&mut self.state, command),
            Intent::ToggleMode => dispatcher.request_mode(&mut self.state),
            Intent::PreviewSpeed(index) => self.state.speed_index = index,
            Intent::CommitSpeed(index) => dispatcher.commit_speed(&mut self.state, index),
            Intent::DragStart => self.state.speed_dragging = true,
            Intent::DragEnd => self.state.speed_dragging = false,
        }
    }

    fn spawn_session(&self, store: Arc<dyn RemoteStore>) {
        let weak = self.weak_tx.clone();
        let retry = self.config.session_retry;
        tokio::spawn(async move {
            match SessionManager::new(store, retry).start().await {
                Ok(handle) => forward(weak, handle.auth_changes.map(DashMessage::Auth)).await,
                Err(e) => {
                    if let Some(tx) = weak.upgrade() {
                        let _ = tx.send(DashMessage::SessionFailed(e));
                    }
                }
            }
        });
    }

    /// Subscribe to the telemetry slots once per process.
    fn bind_subscriptions(&mut self) {
        if self.subscriptions_bound {
            return;
        }
        let Some(store) = self.store.clone() else {
            return;
        };
        self.subscriptions_bound = true;
        for slot in Slot::ALL {
            let store = Arc::clone(&store);
            let weak = self.weak_tx.clone();
            tokio::spawn(async move {
                match store.subscribe(slot.path()).await {
                    Ok(stream) => {
                        let messages = stream.map(move |remote| DashMessage::Remote {
                            slot,
                            value: remote.value,
                        });
                        forward(weak, messages).await;
                    }
                    Err(e) => warn!(path = slot.path(), error = %e, "subscription failed"),
                }
            });
        }
    }

    async fn teardown(&mut self, dispatcher: &CommandDispatcher) {
        if let Some(channel) = dispatcher.channel()
            && self.state.session_established
        {
            session::depart(channel).await;
        }
    }

    /// Publish the view and drain queued notifications.
    fn flush(&mut self) {
        let view = self.state.view();
        self.view_tx.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
        if self.state.log.version() != self.log_version {
            self.log_version = self.state.log.version();
            self.log_tx.send_replace(self.state.log.entries());
        }
        for payload in self.state.take_events() {
            self.bus.emit(BUS_SOURCE, payload);
        }
    }
}

/// Shortest tick period; `tokio::time::interval` rejects zero.
const MIN_TICK: Duration = Duration::from_millis(1);

fn ticker(period: Duration) -> Interval {
    let period = period.max(MIN_TICK);
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Pump `stream` into the loop until either side goes away.
async fn forward<S>(weak: mpsc::WeakUnboundedSender<DashMessage>, stream: S)
where
    S: Stream<Item = DashMessage> + Send,
{
    let mut stream = std::pin::pin!(stream);
    while let Some(message) = stream.next().await {
        let Some(tx) = weak.upgrade() else {
            break;
        };
        if tx.send(message).is_err() {
            break;
        }
    }
}
