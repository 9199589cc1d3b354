//! Telemetry reconciler: folds remote pushes into [`DashboardState`].
//!
//! Handlers are idempotent against repeated delivery of the same value.

use robodash_types::{DISTANCE_PLACEHOLDER, EventPayload, LogLevel, Mode};
use serde_json::Value;
use tracing::debug;

use crate::state::DashboardState;

/// Display text of a distance reading, rounded to whole centimetres.
///
/// Halves round away from zero; absent or non-numeric values render as the
/// placeholder dash.
pub fn format_distance(value: Option<&Value>) -> String {
    match value.and_then(Value::as_f64) {
        Some(cm) if cm.is_finite() => format!("{:.0}", cm.round() + 0.0),
        _ => DISTANCE_PLACEHOLDER.to_string(),
    }
}

/// Loose truthiness of a pushed flag.
pub fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_) | Value::Object(_)) => true,
    }
}

/// `sensors/distance_cm` push.  Pulses only when the text changes.
pub fn on_distance(state: &mut DashboardState, value: Option<&Value>) {
    let text = format_distance(value);
    if text != state.distance {
        debug!(distance = %text, "distance changed");
        state.distance = text.clone();
        state.emit(EventPayload::DistancePulse { display: text });
    }
}

/// `status/connected` push.
///
/// The first push is always applied and logged, even when it matches the
/// assumed default; later pushes only when the value changed.
pub fn on_connectivity(state: &mut DashboardState, value: Option<&Value>) {
    let connected = truthy(value);
    if state.connectivity_seen && connected == state.robot_connected {
        return;
    }
    state.connectivity_seen = true;
    state.robot_connected = connected;
    if connected {
        state.log(LogLevel::Ok, "Robot is now Online");
    } else {
        state.log(LogLevel::Bad, "Robot is now Offline");
    }
    state.emit(EventPayload::RobotLink { connected });
}

/// `control/mode` push.  The UI mode always follows the remote value.
pub fn on_mode(state: &mut DashboardState, value: Option<&Value>) {
    let mode = value.map_or(Mode::Manual, Mode::from_remote);
    state.apply_mode(mode);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn distance_formatting() {
        assert_eq!(format_distance(Some(&json!(37.4))), "37");
        assert_eq!(format_distance(Some(&json!(37.5))), "38");
        assert_eq!(format_distance(Some(&json!(-0.2))), "0");
        assert_eq!(format_distance(Some(&json!(120))), "120");
        assert_eq!(format_distance(Some(&json!("12"))), DISTANCE_PLACEHOLDER);
        assert_eq!(format_distance(None), DISTANCE_PLACEHOLDER);
    }

    #[test]
    fn distance_pulses_only_on_change() {
        let mut state = DashboardState::new();
        on_distance(&mut state, Some(&json!(42.2)));
        on_distance(&mut state, Some(&json!(41.9)));
        assert_eq!(state.take_events().len(), 1);
        assert_eq!(state.distance, "42");
        on_distance(&mut state, None);
        assert_eq!(state.distance, DISTANCE_PLACEHOLDER);
        assert_eq!(state.take_events().len(), 1);
    }

    #[test]
    fn first_connectivity_push_is_logged_even_if_false() {
        let mut state = DashboardState::new();
        on_connectivity(&mut state, Some(&json!(false)));
        assert_eq!(state.log.count_containing("Robot is now Offline"), 1);
        on_connectivity(&mut state, Some(&json!(false)));
        on_connectivity(&mut state, None);
        assert_eq!(state.log.count_containing("Robot is now Offline"), 1);
        on_connectivity(&mut state, Some(&json!(true)));
        on_connectivity(&mut state, Some(&json!(1)));
        assert_eq!(state.log.count_containing("Robot is now Online"), 1);
        assert!(state.robot_connected);
    }

    #[test]
    fn truthiness() {
        assert!(truthy(Some(&json!(true))));
        assert!(truthy(Some(&json!("yes"))));
        assert!(truthy(Some(&json!({}))));
        assert!(!truthy(Some(&json!(0))));
        assert!(!truthy(Some(&json!(""))));
        assert!(!truthy(None));
    }

    #[test]
    fn mode_follows_remote_value() {
        let mut state = DashboardState::new();
        on_mode(&mut state, Some(&json!("auto")));
        assert_eq!(state.mode, Mode::Auto);
        on_mode(&mut state, Some(&json!("bogus")));
        assert_eq!(state.mode, Mode::Manual);
        on_mode(&mut state, Some(&json!("auto")));
        on_mode(&mut state, None);
        assert_eq!(state.mode, Mode::Manual);
    }
}
