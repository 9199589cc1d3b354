//! Logical paths of the remote slots.
//!
//! | Path | Direction | Semantics |
//! |---|---|---|
//! | [`MODE`] | write + subscribe | authoritative operating mode |
//! | [`COMMAND`] | write | last-write-wins drive command |
//! | [`COMMAND_LOG`] | append | command audit trail |
//! | [`SPEED`] | write | committed speed magnitude |
//! | [`MODE_CHANGES`] | append | mode audit trail |
//! | [`DISTANCE`] | subscribe | distance sensor, centimetres |
//! | [`ROBOT_CONNECTED`] | subscribe | robot-side liveness |
//! | [`WEBSITE_CONNECTED`] | write | dashboard presence beacon |

pub const MODE: &str = "control/mode";
pub const COMMAND: &str = "control/command";
pub const COMMAND_LOG: &str = "control/commands";
pub const SPEED: &str = "control/speed";
pub const MODE_CHANGES: &str = "events/mode_changes";
pub const DISTANCE: &str = "sensors/distance_cm";
pub const ROBOT_CONNECTED: &str = "status/connected";
pub const WEBSITE_CONNECTED: &str = "status/website_connected";
