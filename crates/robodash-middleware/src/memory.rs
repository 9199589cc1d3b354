//! In-process remote store.
//!
//! [`MemoryStore`] keeps one [`RemoteValue`] per path and fans changes out
//! through per-path [`tokio::sync::broadcast`] channels, so subscribers see
//! the current value first and every later write.  A journal of accepted
//! writes plus failure switches make it the test double for the hosted
//! database:
//!
//! * [`set_fail_auth`][MemoryStore::set_fail_auth] – sign-in is rejected.
//! * [`set_fail_writes`][MemoryStore::set_fail_writes] – writes error out.
//! * [`set_hang_writes`][MemoryStore::set_hang_writes] – writes never resolve.
//! * [`inject`][MemoryStore::inject] – simulate a robot-side write.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use robodash_types::{DashError, Identity, RemoteValue, is_server_timestamp};
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::store::{RemoteStore, ValueStream};

/// Buffered pushes per path before slow subscribers start lagging.
const PATH_CHANNEL_CAPACITY: usize = 64;

/// Kind of accepted write in the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Set,
    Push,
}

/// One accepted write, in acceptance order.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRecord {
    pub kind: WriteKind,
    /// For pushes this is the list path, not the generated child path.
    pub path: String,
    /// The value as stored, with server timestamps resolved.
    pub value: Value,
}

#[derive(Default)]
struct Inner {
    values: HashMap<String, RemoteValue<Value>>,
    channels: HashMap<String, broadcast::Sender<RemoteValue<Value>>>,
    journal: Vec<WriteRecord>,
}

/// In-memory [`RemoteStore`].
pub struct MemoryStore {
    inner: Mutex<Inner>,
    auth: watch::Sender<Option<Identity>>,
    fail_auth: AtomicBool,
    fail_writes: AtomicBool,
    hang_writes: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (auth, _) = watch::channel(None);
        Self {
            inner: Mutex::new(Inner::default()),
            auth,
            fail_auth: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            hang_writes: AtomicBool::new(false),
        }
    }

    pub fn set_fail_auth(&self, fail: bool) {
        self.fail_auth.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_hang_writes(&self, hang: bool) {
        self.hang_writes.store(hang, Ordering::SeqCst);
    }

    /// Drop the current identity; `auth_changes` subscribers see `None`.
    pub fn sign_out(&self) {
        self.auth.send_replace(None);
    }

    /// Write `value` as if another client (the robot) had written it.
    ///
    /// Injected values bypass the failure switches and the journal.
    pub fn inject(&self, path: &str, value: Value) {
        self.store_value(path, value);
    }

    /// Current value of `path`, if any.
    pub fn get(&self, path: &str) -> Option<Value> {
        self.lock().values.get(path).and_then(|v| v.value.clone())
    }

    /// Journal of every write accepted through the [`RemoteStore`] API.
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.lock().journal.clone()
    }

    /// Values of accepted writes to `path` (sets and pushes), oldest first.
    pub fn writes_to(&self, path: &str) -> Vec<Value> {
        self.lock()
            .journal
            .iter()
            .filter(|w| w.path == path)
            .map(|w| w.value.clone())
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means a test panicked mid-write; the map is
        // still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn store_value(&self, path: &str, value: Value) {
        let slot = RemoteValue::new(path, (!value.is_null()).then_some(value));
        let mut inner = self.lock();
        inner.values.insert(path.to_string(), slot.clone());
        if let Some(sender) = inner.channels.get(path) {
            // No receivers is fine: nobody is watching this path right now.
            let _ = sender.send(slot);
        }
    }

    async fn gate_write(&self, path: &str) -> Result<(), DashError> {
        if self.hang_writes.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            warn!(path, "memory store rejecting write");
            return Err(DashError::Write {
                path: path.to_string(),
                details: "write rejected by store".to_string(),
            });
        }
        if self.auth.borrow().is_none() {
            return Err(DashError::Write {
                path: path.to_string(),
                details: "permission denied: not signed in".to_string(),
            });
        }
        Ok(())
    }
}

/// Replace every server-timestamp placeholder inside `value` with the
/// current epoch-milliseconds.
pub(crate) fn resolve_server_timestamps(value: Value) -> Value {
    if is_server_timestamp(&value) {
        return Value::from(Utc::now().timestamp_millis());
    }
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, resolve_server_timestamps(v)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(resolve_server_timestamps).collect())
        }
        other => other,
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn sign_in_anonymously(&self) -> Result<Identity, DashError> {
        if self.fail_auth.load(Ordering::SeqCst) {
            return Err(DashError::Auth("anonymous sign-in is disabled".to_string()));
        }
        let identity = Identity {
            uid: Uuid::new_v4().simple().to_string(),
        };
        self.auth.send_replace(Some(identity.clone()));
        debug!(uid = %identity.uid, "memory store signed in");
        Ok(identity)
    }

    fn auth_changes(&self) -> BoxStream<'static, Option<Identity>> {
        let mut rx = self.auth.subscribe();
        let current = rx.borrow_and_update().clone();
        let changes = stream::unfold(rx, |mut rx| async move {
            rx.changed().await.ok()?;
            let next = rx.borrow_and_update().clone();
            Some((next, rx))
        });
        Box::pin(stream::once(async move { current }).chain(changes))
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), DashError> {
        self.gate_write(path).await?;
        let value = resolve_server_timestamps(value);
        self.lock().journal.push(WriteRecord {
            kind: WriteKind::Set,
            path: path.to_string(),
            value: value.clone(),
        });
        self.store_value(path, value);
        Ok(())
    }

    async fn push(&self, path: &str, value: Value) -> Result<String, DashError> {
        self.gate_write(path).await?;
        let key = Uuid::new_v4().simple().to_string();
        let value = resolve_server_timestamps(value);
        self.lock().journal.push(WriteRecord {
            kind: WriteKind::Push,
            path: path.to_string(),
            value: value.clone(),
        });
        self.store_value(&format!("{path}/{key}"), value);
        Ok(key)
    }

    async fn subscribe(&self, path: &str) -> Result<ValueStream, DashError> {
        let (current, rx) = {
            let mut inner = self.lock();
            let current = inner
                .values
                .get(path)
                .cloned()
                .unwrap_or_else(|| RemoteValue::absent(path));
            let rx = inner
                .channels
                .entry(path.to_string())
                .or_insert_with(|| broadcast::channel(PATH_CHANNEL_CAPACITY).0)
                .subscribe();
            (current, rx)
        };

        let path = path.to_string();
        let changes = stream::unfold(rx, move |mut rx| {
            let path = path.clone();
            async move {
                loop {
                    match rx.recv().await {
                        Ok(value) => return Some((value, rx)),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(path = %path, lagged_by = n, "memory store subscriber lagged");
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        });
        Ok(Box::pin(stream::once(async move { current }).chain(changes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use robodash_types::server_timestamp;
    use serde_json::json;
    use std::time::Duration;

    async fn signed_in() -> MemoryStore {
        let store = MemoryStore::new();
        store.sign_in_anonymously().await.unwrap();
        store
    }

    #[tokio::test]
    async fn subscribe_yields_current_then_changes() -> Result<(), Box<dyn std::error::Error>> {
        let store = signed_in().await;
        store.set("control/mode", json!("manual")).await?;

        let mut sub = store.subscribe("control/mode").await?;
        let first = sub.next().await.ok_or("no initial value")?;
        assert_eq!(first.value, Some(json!("manual")));

        store.inject("control/mode", json!("auto"));
        let second = sub.next().await.ok_or("no change")?;
        assert_eq!(second.value, Some(json!("auto")));
        Ok(())
    }

    #[tokio::test]
    async fn absent_path_is_reported_as_none() -> Result<(), Box<dyn std::error::Error>> {
        let store = MemoryStore::new();
        let mut sub = store.subscribe("sensors/distance_cm").await?;
        let first = sub.next().await.ok_or("no initial value")?;
        assert_eq!(first.value, None);
        assert!(first.updated_at.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn writes_require_a_session() {
        let store = MemoryStore::new();
        let err = store.set("control/command", json!("forward")).await.unwrap_err();
        assert!(err.is_write_error());
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn push_resolves_server_timestamps_and_journals() -> Result<(), Box<dyn std::error::Error>> {
        let store = signed_in().await;
        let key = store
            .push("control/commands", json!({ "command": "left", "ts": server_timestamp() }))
            .await?;
        assert!(!key.is_empty());

        let writes = store.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].kind, WriteKind::Push);
        assert!(writes[0].value["ts"].is_i64());
        assert_eq!(
            store.get(&format!("control/commands/{key}")).ok_or("missing child")?["command"],
            "left"
        );
        Ok(())
    }

    #[tokio::test]
    async fn failing_writes_are_not_journaled() {
        let store = signed_in().await;
        store.set_fail_writes(true);
        assert!(store.set("control/speed", json!(100)).await.is_err());
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn hanging_writes_never_resolve() {
        let store = signed_in().await;
        store.set_hang_writes(true);
        let result = tokio::time::timeout(
            Duration::from_millis(30),
            store.set("control/speed", json!(100)),
        )
        .await;
        assert!(result.is_err(), "write must still be pending");
    }

    #[tokio::test]
    async fn failed_auth_is_an_auth_error() {
        let store = MemoryStore::new();
        store.set_fail_auth(true);
        assert!(matches!(
            store.sign_in_anonymously().await,
            Err(DashError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn auth_changes_reports_sign_out() -> Result<(), Box<dyn std::error::Error>> {
        let store = signed_in().await;
        let mut changes = store.auth_changes();
        assert!(changes.next().await.ok_or("no current identity")?.is_some());
        store.sign_out();
        assert!(changes.next().await.ok_or("no change")?.is_none());
        Ok(())
    }

    #[test]
    fn resolve_server_timestamps_is_recursive() {
        let value = json!({ "a": [server_timestamp()], "b": { "ts": server_timestamp() }, "c": 1 });
        let resolved = resolve_server_timestamps(value);
        assert!(resolved["a"][0].is_i64());
        assert!(resolved["b"]["ts"].is_i64());
        assert_eq!(resolved["c"], 1);
    }
}
