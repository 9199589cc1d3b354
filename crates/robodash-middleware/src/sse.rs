//! Server-sent-event decoding for streaming subscriptions.
//!
//! The hosted database streams a subscribed subtree as `text/event-stream`:
//!
//! ```text
//! event: put
//! data: {"path":"/","data":{"a":1}}
//!
//! event: patch
//! data: {"path":"/","data":{"b":2}}
//!
//! event: keep-alive
//! data: null
//! ```
//!
//! [`SseDecoder`] turns arbitrary byte chunks into complete [`SseEvent`]s and
//! [`SnapshotMirror`] folds `put`/`patch` payloads into the full current value
//! of the subscribed path.

use robodash_types::DashError;
use serde_json::{Map, Value};

/// A complete server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `event:` field; `"message"` when absent.
    pub event: String,
    /// `data:` lines joined with `\n`.
    pub data: String,
}

/// Incremental `text/event-stream` decoder.
///
/// Chunks may split lines (and UTF-8 sequences) anywhere; only complete
/// lines are interpreted.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every event it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.pending.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);

            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    events.push(event);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (&*line, ""),
            };
            match field {
                "event" => self.event = Some(value.to_string()),
                "data" => self.data.push(value.to_string()),
                _ => {}
            }
        }
        events
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() && event.is_none() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
        })
    }
}

/// Local copy of a subscribed subtree, rebuilt from `put`/`patch` events.
#[derive(Debug, Default, Clone)]
pub struct SnapshotMirror {
    root: Value,
}

impl SnapshotMirror {
    /// Current value; `None` when the subtree is absent.
    pub fn value(&self) -> Option<Value> {
        (!self.root.is_null()).then(|| self.root.clone())
    }

    /// Apply the JSON body of a `put` or `patch` event.
    pub fn apply(&mut self, kind: &str, body: &str) -> Result<(), DashError> {
        let body: Value = serde_json::from_str(body)
            .map_err(|e| DashError::Parsing(format!("invalid {kind} payload: {e}")))?;
        let path = body
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| DashError::Parsing(format!("{kind} payload without path")))?;
        let data = body.get("data").cloned().unwrap_or(Value::Null);
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match kind {
            "put" => set_at(&mut self.root, &segments, data),
            "patch" => {
                let Value::Object(children) = data else {
                    return Err(DashError::Parsing("patch data must be an object".to_string()));
                };
                for (key, child) in children {
                    let mut child_path = segments.clone();
                    child_path.extend(key.split('/').filter(|s| !s.is_empty()));
                    set_at(&mut self.root, &child_path, child);
                }
            }
            other => return Err(DashError::Parsing(format!("unsupported event '{other}'"))),
        }
        Ok(())
    }
}

fn set_at(node: &mut Value, segments: &[&str], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = value;
        return;
    };
    if !node.is_object() {
        if value.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else {
        return;
    };
    if rest.is_empty() {
        if value.is_null() {
            map.remove(*head);
        } else {
            map.insert((*head).to_string(), value);
        }
    } else {
        let child = map.entry((*head).to_string()).or_insert(Value::Null);
        set_at(child, rest, value);
        if child.is_null() || child.as_object().is_some_and(Map::is_empty) {
            map.remove(*head);
        }
    }
    if map.is_empty() {
        *node = Value::Null;
    }
}
