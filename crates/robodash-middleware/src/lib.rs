//! `robodash-middleware` – the remote channel.
//!
//! Wraps the subscribe/publish primitives of a hosted real-time key-value
//! store and routes dashboard notifications to UI bridges, without caring
//! what the values mean.
//!
//! # Modules
//!
//! - [`store`] – the [`RemoteStore`] trait every backend implements.
//! - [`memory`] – [`MemoryStore`], an in-process backend with failure
//!   injection, used in tests and local runs.
//! - [`firebase`] – [`FirebaseStore`], the hosted backend over REST with
//!   server-sent-event subscriptions.
//! - [`sse`] – incremental `text/event-stream` decoder and the snapshot
//!   mirror fed by `put`/`patch` events.
//! - [`channel`] – [`RemoteChannel`], the ordered, timeout-bounded writer.
//! - [`bus`] – typed, topic-based broadcast bus for UI bridges.
//! - [`paths`] – logical paths of the remote slots.

pub mod bus;
pub mod channel;
pub mod firebase;
pub mod memory;
pub mod paths;
pub mod sse;
pub mod store;

pub use bus::{EventBus, Topic, TopicReceiver};
pub use channel::{RemoteChannel, WriteOutcome, WriteStep};
pub use firebase::{FirebaseConfig, FirebaseStore};
pub use memory::{MemoryStore, WriteKind, WriteRecord};
pub use store::{RemoteStore, ValueStream};
