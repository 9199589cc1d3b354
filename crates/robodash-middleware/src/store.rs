//! The remote store seam.
//!
//! The dashboard never speaks HTTP or touches an SDK directly.  It talks to a
//! [`RemoteStore`]: a push/subscribe key-value store with server timestamps
//! and an anonymous identity.
//!
//! - [`MemoryStore`][crate::memory::MemoryStore] – in-process store for
//!   tests, demos and local development.
//! - [`FirebaseStore`][crate::firebase::FirebaseStore] – a hosted real-time
//!   database reached over REST and server-sent events.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use robodash_types::{DashError, Identity, RemoteValue};
use serde_json::Value;

/// Live stream of values pushed for one path.
pub type ValueStream = BoxStream<'static, RemoteValue<Value>>;

/// Every remote backend must implement this trait.
///
/// # Contract
///
/// * `sign_in_anonymously` – establishes an anonymous identity; every other
///   operation may fail until it has succeeded.
///
/// * `auth_changes` – yields the current identity immediately and then
///   every change (`None` once the session is lost).
///
/// * `set` / `push` – fire a single write. `push` appends under a list path
///   and returns the generated child key.  Values may embed the
///   [`server_timestamp`][robodash_types::server_timestamp] placeholder.
///
/// * `subscribe` – yields the current value of `path` and then every
///   change.  Implementations must reconnect on transport drops themselves;
///   the stream only ends when the subscription is permanently cancelled.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn sign_in_anonymously(&self) -> Result<Identity, DashError>;

    fn auth_changes(&self) -> BoxStream<'static, Option<Identity>>;

    async fn set(&self, path: &str, value: Value) -> Result<(), DashError>;

    async fn push(&self, path: &str, value: Value) -> Result<String, DashError>;

    async fn subscribe(&self, path: &str) -> Result<ValueStream, DashError>;
}
