//! Raw UI input and the [`InputTracker`] that turns it into intents.
//!
//! Directional controls are momentary: a press dispatches the direction and
//! the matching release dispatches `stop`.  Each input device (pointer,
//! keyboard) holds at most one outstanding intent.  Key auto-repeat is
//! dropped, and manual controls are ignored while the mode is auto.

use robodash_types::{Command, Mode, SpeedIndex};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// One input event from a UI surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    PointerDown { command: Command },
    PointerUp,
    PointerLeave,
    KeyDown {
        code: String,
        #[serde(default)]
        repeat: bool,
    },
    KeyUp { code: String },
    StopClick,
    ModeToggle,
    SliderPress,
    SliderInput { index: SpeedIndex },
    SliderRelease,
    /// The slider value was finalised.
    SliderChange { index: SpeedIndex },
}

/// What the dashboard should do in response to an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Dispatch(Command),
    ToggleMode,
    /// Display-only slider update.
    PreviewSpeed(SpeedIndex),
    CommitSpeed(SpeedIndex),
    DragStart,
    DragEnd,
}

/// Keyboard binding of a `KeyboardEvent.code`.
pub fn key_command(code: &str) -> Option<Command> {
    match code {
        "ArrowUp" | "KeyW" => Some(Command::Forward),
        "ArrowDown" | "KeyS" => Some(Command::Backward),
        "ArrowLeft" | "KeyA" => Some(Command::Left),
        "ArrowRight" | "KeyD" => Some(Command::Right),
        "Space" => Some(Command::Stop),
        _ => None,
    }
}

/// Per-device hold tracking.
#[derive(Debug, Default)]
pub struct InputTracker {
    pointer_hold: Option<Command>,
    keyboard_hold: Option<Command>,
    dragging: bool,
}

impl InputTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate `event` given the currently displayed `mode`.
    pub fn handle(&mut self, event: &InputEvent, mode: Mode) -> Vec<Intent> {
        let manual = mode == Mode::Manual;
        let intents = match event {
            InputEvent::PointerDown { command } if manual => {
                if command.is_directional() {
                    self.pointer_hold = Some(*command);
                }
                vec![Intent::Dispatch(*command)]
            }
            InputEvent::PointerUp | InputEvent::PointerLeave => match self.pointer_hold.take() {
                Some(_) => vec![Intent::Dispatch(Command::Stop)],
                None => vec![],
            },
            InputEvent::KeyDown { code, repeat } => match key_command(code) {
                Some(command) if manual && !*repeat => {
                    if command.is_directional() {
                        self.keyboard_hold = Some(command);
                    }
                    vec![Intent::Dispatch(command)]
                }
                _ => vec![],
            },
            InputEvent::KeyUp { code } => match key_command(code) {
                Some(command) if command.is_directional() && self.keyboard_hold.take().is_some() => {
                    vec![Intent::Dispatch(Command::Stop)]
                }
                _ => vec![],
            },
            InputEvent::StopClick if manual => {
                self.pointer_hold = None;
                vec![Intent::Dispatch(Command::Stop)]
            }
            InputEvent::ModeToggle => vec![Intent::ToggleMode],
            InputEvent::SliderPress => {
                self.dragging = true;
                vec![Intent::DragStart]
            }
            InputEvent::SliderInput { index } if self.dragging => vec![Intent::PreviewSpeed(*index)],
            InputEvent::SliderRelease if self.dragging => {
                self.dragging = false;
                vec![Intent::DragEnd]
            }
            InputEvent::SliderChange { index } => vec![Intent::CommitSpeed(*index)],
            _ => vec![],
        };
        trace!(?event, ?intents, "input translated");
        intents
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }
}
