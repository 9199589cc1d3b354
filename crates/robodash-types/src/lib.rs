//! `robodash-types` – shared vocabulary of the dashboard.
//!
//! Every other crate speaks in these types: the momentary drive
//! [`Command`]s, the remotely-authoritative [`Mode`], the discrete
//! [`SpeedIndex`], the records appended to the audit logs, the bus
//! [`Event`] envelope and the global [`DashError`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use uuid::Uuid;

// ────────────────────────────────────────────────────────────────────────────
// Commands
// ────────────────────────────────────────────────────────────────────────────

/// Drive command written to `control/command`.
///
/// Commands are stateless and never queued: every write supersedes the
/// previous value at the remote slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
}

impl Command {
    /// All commands, directional ones first.
    pub const ALL: [Command; 5] = [
        Command::Forward,
        Command::Backward,
        Command::Left,
        Command::Right,
        Command::Stop,
    ];

    /// Wire name as stored in the remote database.
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Forward => "forward",
            Command::Backward => "backward",
            Command::Left => "left",
            Command::Right => "right",
            Command::Stop => "stop",
        }
    }

    /// Upper-case label shown in the "last command" indicator.
    pub fn label(self) -> &'static str {
        match self {
            Command::Forward => "FORWARD",
            Command::Backward => "BACKWARD",
            Command::Left => "LEFT",
            Command::Right => "RIGHT",
            Command::Stop => "STOP",
        }
    }

    /// `true` for the momentary movement commands (everything but `stop`).
    pub fn is_directional(self) -> bool {
        !matches!(self, Command::Stop)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = DashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forward" => Ok(Command::Forward),
            "backward" => Ok(Command::Backward),
            "left" => Ok(Command::Left),
            "right" => Ok(Command::Right),
            "stop" => Ok(Command::Stop),
            other => Err(DashError::Parsing(format!("unknown command '{other}'"))),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Mode
// ────────────────────────────────────────────────────────────────────────────

/// Operating mode persisted at `control/mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Manual,
    Auto,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Manual => "manual",
            Mode::Auto => "auto",
        }
    }

    /// Title-case label ("Manual" / "Auto").
    pub fn label(self) -> &'static str {
        match self {
            Mode::Manual => "Manual",
            Mode::Auto => "Auto",
        }
    }

    /// The other mode.
    pub fn toggled(self) -> Mode {
        match self {
            Mode::Manual => Mode::Auto,
            Mode::Auto => Mode::Manual,
        }
    }

    /// Interpret a value pushed from the remote `control/mode` slot.
    ///
    /// Only the exact string `"auto"` selects [`Mode::Auto`]; anything else,
    /// including an absent value, falls back to [`Mode::Manual`].
    pub fn from_remote(value: &Value) -> Mode {
        match value.as_str() {
            Some("auto") => Mode::Auto,
            _ => Mode::Manual,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Speed
// ────────────────────────────────────────────────────────────────────────────

/// Permitted speed magnitudes, indexed by the slider position.
pub const SPEED_VALUES: [u8; 6] = [0, 50, 100, 150, 200, 255];

/// Slider position: an index into [`SPEED_VALUES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct SpeedIndex(usize);

impl SpeedIndex {
    /// Highest valid slider position.
    pub const MAX: SpeedIndex = SpeedIndex(SPEED_VALUES.len() - 1);

    /// Validate a raw slider position.
    pub fn new(index: usize) -> Result<Self, DashError> {
        if index < SPEED_VALUES.len() {
            Ok(Self(index))
        } else {
            Err(DashError::InvalidSpeedIndex(index))
        }
    }

    pub fn index(self) -> usize {
        self.0
    }

    /// Magnitude committed to `control/speed`.
    pub fn value(self) -> u8 {
        SPEED_VALUES[self.0]
    }

    pub fn band(self) -> SpeedBand {
        SpeedBand::for_speed(self.value())
    }
}

impl Default for SpeedIndex {
    fn default() -> Self {
        Self(0)
    }
}

impl TryFrom<usize> for SpeedIndex {
    type Error = DashError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SpeedIndex> for usize {
    fn from(value: SpeedIndex) -> Self {
        value.0
    }
}

/// Colour band of the speed bubble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedBand {
    Idle,
    Low,
    Medium,
    High,
}

impl SpeedBand {
    pub fn for_speed(speed: u8) -> SpeedBand {
        match speed {
            0 => SpeedBand::Idle,
            1..=100 => SpeedBand::Low,
            101..=200 => SpeedBand::Medium,
            _ => SpeedBand::High,
        }
    }

    /// RGB triple used to tint the bubble.
    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            SpeedBand::Idle => (107, 114, 128),
            SpeedBand::Low => (16, 185, 129),
            SpeedBand::Medium => (245, 158, 11),
            SpeedBand::High => (225, 29, 72),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Remote slots
// ────────────────────────────────────────────────────────────────────────────

/// A single addressable slot in the remote store.
///
/// There is no history: the last write visible to subscribers is
/// authoritative.  `value` is `None` when the slot is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteValue<T> {
    pub path: String,
    pub value: Option<T>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl<T> RemoteValue<T> {
    pub fn new(path: impl Into<String>, value: Option<T>) -> Self {
        Self {
            path: path.into(),
            value,
            updated_at: Some(Utc::now()),
        }
    }

    /// An absent slot that has never been written.
    pub fn absent(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            value: None,
            updated_at: None,
        }
    }
}

/// Placeholder the store replaces with its own clock on write.
pub fn server_timestamp() -> Value {
    json!({ ".sv": "timestamp" })
}

/// `true` when `value` is the server-timestamp placeholder.
pub fn is_server_timestamp(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|o| o.len() == 1 && o.get(".sv").and_then(Value::as_str) == Some("timestamp"))
}

/// Entry appended to `control/commands`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub command: Command,
    pub ts: Value,
    pub source: String,
}

impl CommandRecord {
    pub fn from_website(command: Command) -> Self {
        Self {
            command,
            ts: server_timestamp(),
            source: "website".to_string(),
        }
    }
}

/// Entry appended to `events/mode_changes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeChangeRecord {
    pub mode: Mode,
    pub ts: Value,
}

impl ModeChangeRecord {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            ts: server_timestamp(),
        }
    }
}

/// Identity returned by the anonymous sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Session and activity log
// ────────────────────────────────────────────────────────────────────────────

/// Status of the dashboard's own session with the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Connecting,
    Connected,
    Disconnected,
    AuthFailed,
    Demo,
}

impl SessionStatus {
    /// Text of the backend status indicator.
    pub fn label(self) -> &'static str {
        match self {
            SessionStatus::Connecting => "Firebase: connecting...",
            SessionStatus::Connected => "Firebase: connected",
            SessionStatus::Disconnected => "Firebase: disconnected",
            SessionStatus::AuthFailed => "Firebase: Auth Failed",
            SessionStatus::Demo => "Firebase: Demo Mode",
        }
    }
}

/// Severity tag of an activity-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Ok,
    Warn,
    Bad,
    Cmd,
}

/// One line of the user-visible activity log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub time: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            time: Utc::now(),
            level,
            message: message.into(),
        }
    }

    /// `HH:MM:SS` prefix shown next to the message.
    pub fn clock(&self) -> String {
        self.time.format("%H:%M:%S").to_string()
    }
}

/// Snapshot of everything the UI renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    pub session: SessionStatus,
    pub session_label: String,
    pub robot_connected: bool,
    pub distance: String,
    pub mode: Mode,
    /// `false` while in auto mode: all manual buttons are disabled.
    pub controls_enabled: bool,
    pub last_command: String,
    pub speed_index: SpeedIndex,
    pub speed: u8,
    pub speed_band: SpeedBand,
    pub speed_dragging: bool,
    pub steering_transform: String,
}

impl Default for DashboardView {
    fn default() -> Self {
        Self {
            session: SessionStatus::Connecting,
            session_label: SessionStatus::Connecting.label().to_string(),
            robot_connected: false,
            distance: DISTANCE_PLACEHOLDER.to_string(),
            mode: Mode::Manual,
            controls_enabled: true,
            last_command: String::new(),
            speed_index: SpeedIndex::default(),
            speed: SpeedIndex::default().value(),
            speed_band: SpeedIndex::default().band(),
            speed_dragging: false,
            steering_transform: "rotateX(0deg) rotateZ(0deg)".to_string(),
        }
    }
}

/// Shown when the distance sensor slot is absent or non-numeric.
pub const DISTANCE_PLACEHOLDER: &str = "—";

// ────────────────────────────────────────────────────────────────────────────
// Bus envelope
// ────────────────────────────────────────────────────────────────────────────

/// Unified event wrapper for the dashboard event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g. "robodash-runtime::reconciler"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data routed over the event bus to UI bridges.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    /// New distance text; the UI runs its one-shot pulse animation.
    DistancePulse { display: String },
    /// Robot-side liveness changed (or was observed for the first time).
    RobotLink { connected: bool },
    /// Mode echoed back by the remote store.
    ModeConfirmed(Mode),
    /// A command was dispatched locally (not necessarily delivered).
    CommandIssued(Command),
    /// Session status changed.
    Session(SessionStatus),
    /// A speed value was committed.
    SpeedCommitted { speed: u8 },
    /// A line was appended to the activity log.
    Log(LogEntry),
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Global error type spanning session, remote-write and transport failures.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DashError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Write to '{path}' failed: {details}")]
    Write { path: String, details: String },

    #[error("Write to '{path}' timed out after {after_ms} ms")]
    Timeout { path: String, after_ms: u64 },

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Parsing error: {0}")]
    Parsing(String),

    #[error("Speed index {0} is outside the permitted range")]
    InvalidSpeedIndex(usize),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DashError {
    /// `true` for failures of a single remote write (`WriteError`).
    pub fn is_write_error(&self) -> bool {
        matches!(self, DashError::Write { .. } | DashError::Timeout { .. })
    }
}

impl From<serde_json::Error> for DashError {
    fn from(e: serde_json::Error) -> Self {
        DashError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_wire_names() {
        for cmd in Command::ALL {
            let json = serde_json::to_value(cmd).unwrap();
            assert_eq!(json, Value::String(cmd.as_str().to_string()));
            assert_eq!(cmd.as_str().parse::<Command>().unwrap(), cmd);
        }
        assert!("jump".parse::<Command>().is_err());
    }

    #[test]
    fn only_stop_is_not_directional() {
        let directional: Vec<_> = Command::ALL.iter().filter(|c| c.is_directional()).collect();
        assert_eq!(directional.len(), 4);
        assert!(!Command::Stop.is_directional());
        assert_eq!(Command::Forward.label(), "FORWARD");
    }

    #[test]
    fn mode_from_remote_defaults_to_manual() {
        assert_eq!(Mode::from_remote(&json!("auto")), Mode::Auto);
        assert_eq!(Mode::from_remote(&json!("manual")), Mode::Manual);
        assert_eq!(Mode::from_remote(&json!("AUTO")), Mode::Manual);
        assert_eq!(Mode::from_remote(&Value::Null), Mode::Manual);
        assert_eq!(Mode::from_remote(&json!(1)), Mode::Manual);
        assert_eq!(Mode::Manual.toggled(), Mode::Auto);
    }

    #[test]
    fn every_speed_index_maps_into_the_permitted_set() {
        for i in 0..SPEED_VALUES.len() {
            let speed = SpeedIndex::new(i).unwrap().value();
            assert!([0, 50, 100, 150, 200, 255].contains(&speed));
        }
        assert_eq!(SpeedIndex::new(6), Err(DashError::InvalidSpeedIndex(6)));
        assert_eq!(SpeedIndex::MAX.value(), 255);
    }

    #[test]
    fn speed_index_deserialization_is_validated() {
        let ok: SpeedIndex = serde_json::from_str("3").unwrap();
        assert_eq!(ok.value(), 150);
        assert!(serde_json::from_str::<SpeedIndex>("9").is_err());
    }

    #[test]
    fn speed_bands() {
        assert_eq!(SpeedBand::for_speed(0), SpeedBand::Idle);
        assert_eq!(SpeedBand::for_speed(100), SpeedBand::Low);
        assert_eq!(SpeedBand::for_speed(150), SpeedBand::Medium);
        assert_eq!(SpeedBand::for_speed(255), SpeedBand::High);
        assert_eq!(SpeedBand::High.rgb(), (225, 29, 72));
    }

    #[test]
    fn command_record_carries_server_timestamp() {
        let record = CommandRecord::from_website(Command::Left);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["command"], "left");
        assert_eq!(json["source"], "website");
        assert!(is_server_timestamp(&json["ts"]));
        assert!(!is_server_timestamp(&json!({"x": 1})));
    }

    #[test]
    fn session_labels() {
        assert_eq!(SessionStatus::AuthFailed.label(), "Firebase: Auth Failed");
        assert_eq!(SessionStatus::Demo.label(), "Firebase: Demo Mode");
    }

    #[test]
    fn event_roundtrip() {
        let event = Event::new("robodash-runtime::test", EventPayload::ModeConfirmed(Mode::Auto));
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event.id, back.id);
        assert!(matches!(back.payload, EventPayload::ModeConfirmed(Mode::Auto)));
    }

    #[test]
    fn dash_error_display() {
        let err = DashError::Write {
            path: "control/command".to_string(),
            details: "permission denied".to_string(),
        };
        assert!(err.to_string().contains("control/command"));
        assert!(err.is_write_error());
        assert!(!DashError::Auth("nope".to_string()).is_write_error());
    }
}
