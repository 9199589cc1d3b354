//! [`CommandDispatcher`] – turns intents into remote writes.
//!
//! Dispatch is optimistic: the local display changes immediately and the
//! write is handed to the ordered [`RemoteChannel`] without waiting.  The
//! outcome comes back later through [`CommandDispatcher::on_write_outcome`].
//! Failed writes are reported, never retried.
//!
//! Without a channel (demo runs) every write short-circuits to local-only
//! logging.

use robodash_middleware::{RemoteChannel, WriteOutcome, WriteStep, paths};
use robodash_types::{
    Command, CommandRecord, DashError, EventPayload, LogLevel, Mode, ModeChangeRecord, SpeedIndex,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::state::DashboardState;

/// Tag of a queued write job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Command(Command),
    Mode(Mode),
    Speed(SpeedIndex),
    /// Presence beacon and safety-default mode after sign-in.
    Announce,
}

pub struct CommandDispatcher {
    channel: Option<RemoteChannel<WriteOp>>,
}

impl CommandDispatcher {
    /// Dispatcher that never touches the remote store.
    pub fn local() -> Self {
        Self { channel: None }
    }

    pub fn remote(channel: RemoteChannel<WriteOp>) -> Self {
        Self {
            channel: Some(channel),
        }
    }

    pub fn channel(&self) -> Option<&RemoteChannel<WriteOp>> {
        self.channel.as_ref()
    }

    pub fn is_local(&self) -> bool {
        self.channel.is_none()
    }

    /// Dispatch a drive command.  Never blocks.
    pub fn dispatch(&self, state: &mut DashboardState, command: Command) {
        state.steering.apply(command);
        state.last_command = command.label().to_string();
        state.emit(EventPayload::CommandIssued(command));
        if command.is_directional() {
            state.log(LogLevel::Cmd, format!("Sending command: {}", command.label()));
        }

        let Some(channel) = &self.channel else {
            return;
        };
        if !state.session_established {
            state.log(LogLevel::Bad, format!("Command \"{command}\" not sent: no session."));
            return;
        }
        if !state.robot_connected {
            state.log(
                LogLevel::Bad,
                format!("Robot offline. Command \"{command}\" may not be delivered."),
            );
        }

        let steps = encode(CommandRecord::from_website(command)).map(|record| {
            vec![
                WriteStep::set(paths::COMMAND, command.as_str()),
                WriteStep::push(paths::COMMAND_LOG, record),
            ]
        });
        if let Err(e) = steps.and_then(|steps| channel.enqueue(WriteOp::Command(command), steps)) {
            self.on_write_outcome(
                state,
                WriteOutcome {
                    tag: WriteOp::Command(command),
                    result: Err(e),
                },
            );
        }
    }

    /// Request the opposite of the displayed mode.
    ///
    /// The displayed mode only changes when the store echoes the new value,
    /// except in local runs where there is nothing to echo.
    pub fn request_mode(&self, state: &mut DashboardState) {
        let target = state.mode.toggled();
        let Some(channel) = &self.channel else {
            state.log(LogLevel::Warn, mode_changed(target));
            state.apply_mode(target);
            return;
        };
        if !state.session_established {
            state.log(LogLevel::Bad, "Mode change not sent: no session.");
            return;
        }
        let steps = encode(ModeChangeRecord::new(target)).map(|record| {
            vec![
                WriteStep::set(paths::MODE, target.as_str()),
                WriteStep::push(paths::MODE_CHANGES, record),
            ]
        });
        if let Err(e) = steps.and_then(|steps| channel.enqueue(WriteOp::Mode(target), steps)) {
            self.on_write_outcome(
                state,
                WriteOutcome {
                    tag: WriteOp::Mode(target),
                    result: Err(e),
                },
            );
        }
    }

    /// Commit a finalised slider position.  Unchanged positions are skipped.
    pub fn commit_speed(&self, state: &mut DashboardState, index: SpeedIndex) {
        state.speed_index = index;
        if state.committed_speed == Some(index) {
            debug!(speed = index.value(), "speed unchanged; not committed");
            return;
        }
        let Some(channel) = &self.channel else {
            state.committed_speed = Some(index);
            state.emit(EventPayload::SpeedCommitted {
                speed: index.value(),
            });
            state.log(LogLevel::Cmd, format!("Speed set to: {}", index.value()));
            return;
        };
        if !state.session_established {
            state.log(LogLevel::Bad, "Speed change not sent: no session.");
            return;
        }
        state.committed_speed = Some(index);
        state.emit(EventPayload::SpeedCommitted {
            speed: index.value(),
        });
        let steps = vec![WriteStep::set(paths::SPEED, index.value())];
        if let Err(e) = channel.enqueue(WriteOp::Speed(index), steps) {
            self.on_write_outcome(
                state,
                WriteOutcome {
                    tag: WriteOp::Speed(index),
                    result: Err(e),
                },
            );
        }
    }

    /// Reset the mode to manual and raise the presence beacon.
    pub fn announce(&self, state: &mut DashboardState) {
        let Some(channel) = &self.channel else {
            return;
        };
        let steps = vec![
            WriteStep::set(paths::MODE, Mode::Manual.as_str()),
            WriteStep::set(paths::WEBSITE_CONNECTED, true),
        ];
        if let Err(e) = channel.enqueue(WriteOp::Announce, steps) {
            self.on_write_outcome(
                state,
                WriteOutcome {
                    tag: WriteOp::Announce,
                    result: Err(e),
                },
            );
        }
    }

    /// Fold a finished write job into the state.
    pub fn on_write_outcome(&self, state: &mut DashboardState, outcome: WriteOutcome<WriteOp>) {
        match (outcome.tag, outcome.result) {
            (WriteOp::Command(command), Ok(())) => state.last_command_sent = Some(command),
            (WriteOp::Command(command), Err(e)) => {
                warn!(command = %command, error = %e, "command write failed");
                state.last_command = "ERROR".to_string();
                state.log(LogLevel::Bad, format!("Error: Command \"{command}\" failed to send."));
            }
            (WriteOp::Mode(mode), Ok(())) => {
                state.log(LogLevel::Warn, mode_changed(mode));
            }
            (WriteOp::Mode(mode), Err(e)) => {
                warn!(mode = %mode, error = %e, "mode write failed");
                state.log(LogLevel::Bad, "Error: Mode change failed.");
            }
            (WriteOp::Speed(index), Ok(())) => {
                state.log(LogLevel::Cmd, format!("Speed set to: {}", index.value()));
            }
            (WriteOp::Speed(index), Err(e)) => {
                warn!(speed = index.value(), error = %e, "speed write failed");
                if state.committed_speed == Some(index) {
                    state.committed_speed = None;
                }
                state.log(LogLevel::Bad, "Error: Speed change failed.");
            }
            (WriteOp::Announce, Ok(())) => {
                state.log(LogLevel::Info, "Dashboard connection established.");
            }
            (WriteOp::Announce, Err(e)) => {
                warn!(error = %e, "failed to announce dashboard presence");
            }
        }
    }
}

fn mode_changed(mode: Mode) -> String {
    format!("Mode changed to: {}", mode.as_str().to_uppercase())
}

fn encode<T: serde::Serialize>(record: T) -> Result<Value, DashError> {
    Ok(serde_json::to_value(record)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use robodash_middleware::{MemoryStore, RemoteStore};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    async fn remote() -> (
        Arc<MemoryStore>,
        CommandDispatcher,
        mpsc::UnboundedReceiver<WriteOutcome<WriteOp>>,
    ) {
        let store = Arc::new(MemoryStore::new());
        store.sign_in_anonymously().await.unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let channel = RemoteChannel::spawn(
            store.clone() as Arc<dyn RemoteStore>,
            Duration::from_millis(200),
            tx,
        );
        (store, CommandDispatcher::remote(channel), rx)
    }

    fn connected_state() -> DashboardState {
        let mut state = DashboardState::new();
        state.session_established = true;
        state.robot_connected = true;
        state
    }

    #[tokio::test]
    async fn command_writes_value_and_audit_entry() {
        let (store, dispatcher, mut rx) = remote().await;
        let mut state = connected_state();
        dispatcher.dispatch(&mut state, Command::Forward);
        assert_eq!(state.last_command, "FORWARD");

        let outcome = rx.recv().await.unwrap();
        dispatcher.on_write_outcome(&mut state, outcome);
        assert_eq!(state.last_command_sent, Some(Command::Forward));
        assert_eq!(store.writes_to(paths::COMMAND), vec![json!("forward")]);
        let audit = store.writes_to(paths::COMMAND_LOG);
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0]["source"], "website");
        assert!(audit[0]["ts"].is_i64());
    }

    #[tokio::test]
    async fn no_session_means_no_write() {
        let (store, dispatcher, _rx) = remote().await;
        let mut state = DashboardState::new();
        dispatcher.dispatch(&mut state, Command::Left);
        assert_eq!(state.last_command, "LEFT");
        assert_eq!(state.log.count_containing("not sent: no session"), 1);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn failed_command_shows_error_label() {
        let (store, dispatcher, mut rx) = remote().await;
        store.set_fail_writes(true);
        let mut state = connected_state();
        dispatcher.dispatch(&mut state, Command::Stop);
        let outcome = rx.recv().await.unwrap();
        dispatcher.on_write_outcome(&mut state, outcome);
        assert_eq!(state.last_command, "ERROR");
        assert_eq!(state.log.count_containing("Error: Command \"stop\" failed to send."), 1);
    }

    #[tokio::test]
    async fn mode_request_waits_for_echo() {
        let (store, dispatcher, mut rx) = remote().await;
        let mut state = connected_state();
        dispatcher.request_mode(&mut state);
        let outcome = rx.recv().await.unwrap();
        dispatcher.on_write_outcome(&mut state, outcome);
        assert_eq!(state.mode, Mode::Manual, "mode must wait for the remote echo");
        assert_eq!(state.log.count_containing("Mode changed to: AUTO"), 1);
        assert_eq!(store.get(paths::MODE), Some(json!("auto")));
    }

    #[tokio::test]
    async fn speed_commits_only_changes() {
        let (store, dispatcher, mut rx) = remote().await;
        let mut state = connected_state();
        dispatcher.commit_speed(&mut state, SpeedIndex::default());
        dispatcher.commit_speed(&mut state, SpeedIndex::new(3).unwrap());
        dispatcher.commit_speed(&mut state, SpeedIndex::new(3).unwrap());
        let outcome = rx.recv().await.unwrap();
        dispatcher.on_write_outcome(&mut state, outcome);
        assert_eq!(store.writes_to(paths::SPEED), vec![json!(150)]);
        assert_eq!(state.log.count_containing("Speed set to: 150"), 1);
    }

    #[test]
    fn local_dispatcher_never_writes() {
        let dispatcher = CommandDispatcher::local();
        let mut state = DashboardState::new();
        dispatcher.dispatch(&mut state, Command::Right);
        dispatcher.request_mode(&mut state);
        dispatcher.commit_speed(&mut state, SpeedIndex::MAX);
        assert_eq!(state.last_command, "RIGHT");
        assert_eq!(state.mode, Mode::Auto);
        assert_eq!(state.log.count_containing("Speed set to: 255"), 1);
        assert_eq!(state.log.count_containing("not sent"), 0);
    }
}
