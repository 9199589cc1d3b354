//! [`DashboardState`] – the single owned state of the dashboard.
//!
//! Mutated only by the dashboard loop task.  Components that change it
//! (dispatcher, reconciler, simulator) queue bus notifications in an outbox
//! which the loop drains after each message.

use robodash_types::{
    Command, DashboardView, DISTANCE_PLACEHOLDER, EventPayload, LogEntry, LogLevel, Mode, SessionStatus,
    SpeedIndex,
};

use crate::log::ActivityLog;
use crate::steering::SteeringWheel;

pub struct DashboardState {
    pub session: SessionStatus,
    /// `true` between a successful sign-in and the next sign-out.
    pub session_established: bool,
    pub robot_connected: bool,
    /// Set once the first connectivity push has been applied.
    pub connectivity_seen: bool,
    pub distance: String,
    /// Remotely confirmed mode (or the local mode in demo runs).
    pub mode: Mode,
    pub last_command: String,
    /// Last command whose writes were accepted by the store.
    pub last_command_sent: Option<Command>,
    /// Slider position currently displayed.
    pub speed_index: SpeedIndex,
    /// Last committed slider position; `None` after a failed commit.
    pub committed_speed: Option<SpeedIndex>,
    pub speed_dragging: bool,
    pub steering: SteeringWheel,
    pub log: ActivityLog,
    outbox: Vec<EventPayload>,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardState {
    pub fn new() -> Self {
        Self {
            session: SessionStatus::Connecting,
            session_established: false,
            robot_connected: false,
            connectivity_seen: false,
            distance: DISTANCE_PLACEHOLDER.to_string(),
            mode: Mode::Manual,
            last_command: String::new(),
            last_command_sent: None,
            speed_index: SpeedIndex::default(),
            committed_speed: Some(SpeedIndex::default()),
            speed_dragging: false,
            steering: SteeringWheel::new(),
            log: ActivityLog::default(),
            outbox: Vec::new(),
        }
    }

    /// Append to the activity log and announce the line on the bus.
    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) -> LogEntry {
        let entry = self.log.push(level, message);
        self.outbox.push(EventPayload::Log(entry.clone()));
        entry
    }

    pub fn emit(&mut self, payload: EventPayload) {
        self.outbox.push(payload);
    }

    /// Take every notification queued since the last call.
    pub fn take_events(&mut self) -> Vec<EventPayload> {
        std::mem::take(&mut self.outbox)
    }

    pub fn set_session(&mut self, status: SessionStatus) {
        if self.session != status {
            self.session = status;
            self.emit(EventPayload::Session(status));
        }
    }

    /// Make `mode` the displayed mode.  Manual controls follow it.
    pub fn apply_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            self.mode = mode;
            self.emit(EventPayload::ModeConfirmed(mode));
        }
    }

    pub fn controls_enabled(&self) -> bool {
        self.mode == Mode::Manual
    }

    pub fn view(&self) -> DashboardView {
        DashboardView {
            session: self.session,
            session_label: self.session.label().to_string(),
            robot_connected: self.robot_connected,
            distance: self.distance.clone(),
            mode: self.mode,
            controls_enabled: self.controls_enabled(),
            last_command: self.last_command.clone(),
            speed_index: self.speed_index,
            speed: self.speed_index.value(),
            speed_band: self.speed_index.band(),
            speed_dragging: self.speed_dragging,
            steering_transform: self.steering.transform(),
        }
    }
}
