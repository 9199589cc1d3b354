//! Headless, typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every UI
//! bridge receives every message without any single subscriber blocking
//! the dashboard loop.
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Telemetry`] | distance pulses, robot liveness, confirmed mode |
//! | [`Topic::Commands`] | locally issued commands and committed speeds |
//! | [`Topic::Session`] | session status transitions |
//! | [`Topic::Log`] | activity-log lines |
//!
//! Every event is also mirrored on a global lane for bridges that forward
//! everything (see [`EventBus::subscribe_all`]).

use robodash_types::{Event, EventPayload};
use tokio::sync::broadcast;
use tracing::warn;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Routing lanes of the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Telemetry,
    Commands,
    Session,
    Log,
}

impl Topic {
    /// Lane an event payload belongs to.
    pub fn for_payload(payload: &EventPayload) -> Topic {
        match payload {
            EventPayload::DistancePulse { .. }
            | EventPayload::RobotLink { .. }
            | EventPayload::ModeConfirmed(_) => Topic::Telemetry,
            EventPayload::CommandIssued(_) | EventPayload::SpeedCommitted { .. } => {
                Topic::Commands
            }
            EventPayload::Session(_) => Topic::Session,
            EventPayload::Log(_) => Topic::Log,
        }
    }
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    all: broadcast::Sender<Event>,
    telemetry: broadcast::Sender<Event>,
    commands: broadcast::Sender<Event>,
    session: broadcast::Sender<Event>,
    log: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every channel independently.
    pub fn new(capacity: usize) -> Self {
        let (all, _) = broadcast::channel(capacity);
        let (telemetry, _) = broadcast::channel(capacity);
        let (commands, _) = broadcast::channel(capacity);
        let (session, _) = broadcast::channel(capacity);
        let (log, _) = broadcast::channel(capacity);
        Self {
            all,
            telemetry,
            commands,
            session,
            log,
        }
    }

    /// Publish `event` on the lane matching its payload and on the global
    /// lane.
    ///
    /// Returns the number of receivers handed the event.  `0` means no UI is
    /// currently listening, which is a normal condition.
    pub fn publish(&self, event: Event) -> usize {
        let topic = Topic::for_payload(&event.payload);
        let on_topic = self.topic_sender(topic).send(event.clone()).unwrap_or(0);
        let on_all = self.all.send(event).unwrap_or(0);
        on_topic + on_all
    }

    /// Convenience: wrap `payload` in an [`Event`] from `source` and publish.
    pub fn emit(&self, source: &str, payload: EventPayload) -> usize {
        self.publish(Event::new(source, payload))
    }

    /// Subscribe to one [`Topic`].
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic: Some(topic),
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Subscribe to every event regardless of topic.
    pub fn subscribe_all(&self) -> TopicReceiver {
        TopicReceiver {
            topic: None,
            receiver: self.all.subscribe(),
        }
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Telemetry => &self.telemetry,
            Topic::Commands => &self.commands,
            Topic::Session => &self.session,
            Topic::Log => &self.log,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// An async receiver bound to one topic (or to the global lane).
pub struct TopicReceiver {
    topic: Option<Topic>,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event.
    ///
    /// Lagging is logged and skipped over; `None` means the bus has shut down.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "bus subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant used by tests and polling bridges.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// The [`Topic`] this receiver is bound to; `None` for the global lane.
    pub fn topic(&self) -> Option<Topic> {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use robodash_types::{Command, LogEntry, LogLevel, Mode};

    #[tokio::test]
    async fn topic_subscribers_receive_matching_events() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut telemetry = bus.subscribe_to(Topic::Telemetry);
        let mut commands = bus.subscribe_to(Topic::Commands);

        bus.emit("test", EventPayload::ModeConfirmed(Mode::Auto));

        let event = telemetry.recv().await.ok_or("telemetry closed")?;
        assert!(matches!(event.payload, EventPayload::ModeConfirmed(Mode::Auto)));
        assert!(commands.try_recv().is_none(), "commands lane must stay empty");
        Ok(())
    }

    #[tokio::test]
    async fn global_lane_sees_everything() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut all = bus.subscribe_all();

        bus.emit("test", EventPayload::CommandIssued(Command::Left));
        bus.emit("test", EventPayload::Log(LogEntry::new(LogLevel::Info, "hello")));

        assert!(matches!(
            all.recv().await.ok_or("closed")?.payload,
            EventPayload::CommandIssued(Command::Left)
        ));
        assert!(matches!(all.recv().await.ok_or("closed")?.payload, EventPayload::Log(_)));
        assert_eq!(all.topic(), None);
        Ok(())
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let bus = EventBus::default();
        assert_eq!(bus.emit("test", EventPayload::RobotLink { connected: true }), 0);
    }

    #[tokio::test]
    async fn slow_subscriber_skips_lagged_events() {
        let bus = EventBus::new(4);
        let mut slow = bus.subscribe_to(Topic::Commands);
        for _ in 0..100 {
            bus.emit("flood", EventPayload::CommandIssued(Command::Forward));
        }
        bus.emit("flood", EventPayload::CommandIssued(Command::Stop));

        let mut last = None;
        while let Some(event) = slow.try_recv() {
            last = Some(event);
        }
        assert!(matches!(
            last.map(|e| e.payload),
            Some(EventPayload::CommandIssued(Command::Stop))
        ));
    }
}
