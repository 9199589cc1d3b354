//! [`DemoSimulator`] – synthetic telemetry for runs without a remote store.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use robodash_types::{EventPayload, LogLevel, SessionStatus};
use serde_json::Value;

use crate::reconciler;
use crate::state::DashboardState;

/// Synthetic distance readings are drawn from `[20, 120)` centimetres.
const DISTANCE_RANGE: std::ops::Range<u32> = 20..120;

pub struct DemoSimulator {
    rng: StdRng,
}

impl DemoSimulator {
    /// `seed` makes the reading sequence reproducible.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng }
    }

    pub fn next_distance(&mut self) -> u32 {
        self.rng.random_range(DISTANCE_RANGE)
    }

    /// Enter demo mode: the robot counts as permanently connected.
    pub fn start(&self, state: &mut DashboardState) {
        state.log(LogLevel::Warn, "System running in Demo Mode.");
        state.set_session(SessionStatus::Demo);
        state.robot_connected = true;
        state.connectivity_seen = true;
        state.emit(EventPayload::RobotLink { connected: true });
    }

    /// One reading, fed through the reconciler like a remote push. A reading
    /// equal to the previous one changes nothing on screen, so it emits no
    /// distance pulse; with 100 possible values that happens about once
    /// every hundred ticks.
    pub fn tick(&mut self, state: &mut DashboardState) {
        let reading = Value::from(self.next_distance());
        reconciler::on_distance(state, Some(&reading));
    }
}
