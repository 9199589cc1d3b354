//! [`CockpitServer`] – HTTP + WebSocket server for the dashboard page.
//!
//! Listens on `0.0.0.0:8080` (configurable via [`CockpitServer::with_port`]).
//!
//! * Regular HTTP requests → 200 OK with the embedded dashboard HTML.
//! * WebSocket upgrades → bidirectional bridge to the dashboard loop.
//!
//! # Frames
//!
//! Downstream (server → browser), tagged by `type`:
//!
//! | `type` | Body |
//! |---|---|
//! | `view` | `view`: full [`DashboardView`] snapshot |
//! | `log` | `entries`: activity-log history, sent once on connect |
//! | `event` | `event`: one bus [`Event`] |
//! | `theme` | `prefs` and the derived accent CSS `vars` |
//!
//! Upstream (browser → server): every [`InputEvent`] plus
//! `{"type":"theme","theme":"light","accent":"#10b981"}` and
//! `{"type":"custom_color","hex":"#aabbcc"}`.  Unknown or malformed frames
//! are ignored.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{Sink, SinkExt, StreamExt};
use robodash_runtime::{DashboardHandle, InputEvent};
use robodash_types::{DashError, DashboardView, Event, LogEntry};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::prefs::ThemeController;
use crate::theme::{AccentVars, Theme, ThemePrefs};

/// Default TCP port for the dashboard HTTP/WebSocket server.
pub const DEFAULT_PORT: u16 = 8080;

/// The compiled-in dashboard single-page application (HTML + CSS + JS).
const COCKPIT_HTML: &str = include_str!("cockpit.html");

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerFrame {
    View { view: DashboardView },
    Log { entries: Vec<LogEntry> },
    Event { event: Event },
    Theme { prefs: ThemePrefs, vars: AccentVars },
}

impl ServerFrame {
    fn theme(prefs: ThemePrefs) -> Self {
        let vars = prefs.accent_vars();
        ServerFrame::Theme { prefs, vars }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ThemeFrame {
    Theme {
        theme: Theme,
        #[serde(default)]
        accent: Option<String>,
    },
    CustomColor {
        hex: String,
    },
}

#[derive(Debug)]
enum Upstream {
    Input(InputEvent),
    Theme(ThemeFrame),
}

fn parse_upstream(text: &str) -> Option<Upstream> {
    if let Ok(frame) = serde_json::from_str::<ThemeFrame>(text) {
        return Some(Upstream::Theme(frame));
    }
    serde_json::from_str::<InputEvent>(text).ok().map(Upstream::Input)
}

// ---------------------------------------------------------------------------
// CockpitServer
// ---------------------------------------------------------------------------

/// Lightweight HTTP + WebSocket server that serves the dashboard page and
/// bridges every connected browser to the dashboard loop.
pub struct CockpitServer {
    handle: DashboardHandle,
    theme: Arc<ThemeController>,
    port: u16,
}

impl CockpitServer {
    /// Create a server for `handle` on the [`DEFAULT_PORT`].
    pub fn new(handle: DashboardHandle, theme: Arc<ThemeController>) -> Self {
        Self {
            handle,
            theme,
            port: DEFAULT_PORT,
        }
    }

    /// Override the listening port (builder-style).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Bind `0.0.0.0:{port}` and serve forever.
    ///
    /// # Errors
    ///
    /// Returns [`DashError::Config`] if the TCP listener cannot bind.
    pub async fn run(self) -> Result<(), DashError> {
        let listener = self.bind().await?;
        self.serve(listener).await;
        Ok(())
    }

    /// Bind `0.0.0.0:{port}` without serving yet.
    pub async fn bind(&self) -> Result<TcpListener, DashError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| DashError::Config(format!("cockpit bind error on {addr}: {e}")))?;
        info!("dashboard UI listening on http://localhost:{}", self.port);
        Ok(listener)
    }

    /// Serve connections from an already bound listener.
    pub async fn serve(self, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let handle = self.handle.clone();
                    let theme = Arc::clone(&self.theme);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, handle, theme).await {
                            warn!(%peer, error = %e, "cockpit client error");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "cockpit accept error"),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Per-connection handler
// ---------------------------------------------------------------------------

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    handle: DashboardHandle,
    theme: Arc<ThemeController>,
) -> Result<(), DashError> {
    // `peek` leaves the request in place for tungstenite's handshake.
    let mut buf = [0u8; 1024];
    let n = stream
        .peek(&mut buf)
        .await
        .map_err(|e| DashError::Channel(format!("peek error from {peer}: {e}")))?;

    let header_preview = String::from_utf8_lossy(&buf[..n]);
    let is_ws_upgrade = header_preview.lines().any(|line| {
        let line = line.to_ascii_lowercase();
        line.starts_with("upgrade:") && line.contains("websocket")
    });

    if is_ws_upgrade {
        handle_ws(stream, peer, handle, theme).await
    } else {
        serve_html(stream).await
    }
}

/// Upper bound on the request head read before answering a plain HTTP request.
const MAX_REQUEST_HEAD: usize = 8 * 1024;

async fn serve_html(mut stream: TcpStream) -> Result<(), DashError> {
    // Consume the request head so closing the socket does not reset the
    // connection while the client is still sending.
    let mut head = Vec::with_capacity(1024);
    let mut buf = [0u8; 1024];
    while head.len() < MAX_REQUEST_HEAD && !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream
            .read(&mut buf)
            .await
            .map_err(|e| DashError::Channel(format!("HTTP read error: {e}")))?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&buf[..n]);
    }

    let body = COCKPIT_HTML;
    let response = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/html; charset=utf-8\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        body.len(),
        body
    );
    stream
        .write_all(response.as_bytes())
        .await
        .map_err(|e| DashError::Channel(format!("HTTP write error: {e}")))?;
    stream
        .shutdown()
        .await
        .map_err(|e| DashError::Channel(format!("HTTP shutdown error: {e}")))
}

// ---------------------------------------------------------------------------
// WebSocket bridge
// ---------------------------------------------------------------------------

async fn handle_ws(
    stream: TcpStream,
    peer: SocketAddr,
    handle: DashboardHandle,
    theme: Arc<ThemeController>,
) -> Result<(), DashError> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| DashError::Channel(format!("WS handshake from {peer}: {e}")))?;
    debug!(%peer, "browser connected");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let mut bus_rx = handle.bus().subscribe_all();
    let mut view_rx = handle.subscribe_view();
    let mut theme_rx = theme.subscribe();

    let view = view_rx.borrow_and_update().clone();
    let prefs = theme_rx.borrow_and_update().clone();
    for frame in [
        ServerFrame::View { view },
        ServerFrame::Log {
            entries: handle.log(),
        },
        ServerFrame::theme(prefs),
    ] {
        if !send_frame(&mut ws_tx, &frame).await {
            return Ok(());
        }
    }

    loop {
        let frame = tokio::select! {
            event = bus_rx.recv() => match event {
                Some(event) => ServerFrame::Event { event },
                None => break,
            },
            changed = view_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                ServerFrame::View { view: view_rx.borrow_and_update().clone() }
            }
            changed = theme_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                ServerFrame::theme(theme_rx.borrow_and_update().clone())
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_upstream_message(text.as_str(), &handle, &theme);
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    _ => {}
                }
                continue;
            }
        };
        if !send_frame(&mut ws_tx, &frame).await {
            break;
        }
    }

    // A tab that vanishes mid-press must not leave the robot moving.
    let _ = handle.send_input(InputEvent::PointerLeave);
    debug!(%peer, "browser disconnected");
    Ok(())
}

async fn send_frame<S>(ws_tx: &mut S, frame: &ServerFrame) -> bool
where
    S: Sink<Message> + Unpin,
{
    match serde_json::to_string(frame) {
        Ok(json) => ws_tx.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "frame serialization error");
            true
        }
    }
}

/// Apply one upstream text frame.  Returns `false` when it was ignored.
pub(crate) fn handle_upstream_message(
    text: &str,
    handle: &DashboardHandle,
    theme: &ThemeController,
) -> bool {
    let Some(upstream) = parse_upstream(text) else {
        debug!(frame = text, "ignoring unknown frame");
        return false;
    };
    let result = match upstream {
        Upstream::Input(event) => handle.send_input(event),
        Upstream::Theme(ThemeFrame::Theme { theme: t, accent }) => {
            theme.set_theme(t, accent.as_deref()).map(|_| ())
        }
        Upstream::Theme(ThemeFrame::CustomColor { hex }) => {
            theme.apply_custom_color(&hex).map(|_| ())
        }
    };
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "upstream frame rejected");
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::MemoryPreferences;
    use robodash_middleware::EventBus;
    use robodash_runtime::{Dashboard, DashboardConfig};
    use robodash_types::{Command, Mode};
    use serde_json::Value;
    use std::time::Duration;

    fn demo_dashboard() -> (DashboardHandle, Arc<ThemeController>) {
        let config = DashboardConfig {
            demo: true,
            animation_interval: None,
            demo_interval: Duration::from_secs(60),
            ..Default::default()
        };
        let (dashboard, handle) = Dashboard::new(config, None, EventBus::default());
        tokio::spawn(dashboard.run());
        let theme = Arc::new(ThemeController::load(Box::new(MemoryPreferences::default())));
        (handle, theme)
    }

    async fn eventually(mut check: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        check()
    }

    #[tokio::test]
    async fn default_port_is_8080() {
        let (handle, theme) = demo_dashboard();
        let server = CockpitServer::new(handle.clone(), theme.clone());
        assert_eq!(server.port(), DEFAULT_PORT);
        assert_eq!(CockpitServer::new(handle, theme).with_port(9999).port(), 9999);
    }

    #[tokio::test]
    async fn upstream_input_reaches_the_dashboard() {
        let (handle, theme) = demo_dashboard();
        assert!(handle_upstream_message(
            r#"{"type":"pointer_down","command":"backward"}"#,
            &handle,
            &theme
        ));
        assert!(eventually(|| handle.view().last_command == Command::Backward.label()).await);
        assert!(handle_upstream_message(r#"{"type":"mode_toggle"}"#, &handle, &theme));
        assert!(eventually(|| handle.view().mode == Mode::Auto).await);
    }

    #[tokio::test]
    async fn upstream_theme_frames_update_preferences() {
        let (handle, theme) = demo_dashboard();
        assert!(handle_upstream_message(
            r##"{"type":"theme","theme":"light","accent":"#10b981"}"##,
            &handle,
            &theme
        ));
        assert_eq!(theme.current().theme, Theme::Light);
        assert!(handle_upstream_message(
            r##"{"type":"custom_color","hex":"#123456"}"##,
            &handle,
            &theme
        ));
        assert_eq!(theme.current().accent_color, "#123456");
        assert_eq!(theme.current().recent_colors, vec!["#123456".to_string()]);
    }

    #[tokio::test]
    async fn unknown_and_invalid_frames_are_ignored() {
        let (handle, theme) = demo_dashboard();
        assert!(!handle_upstream_message("not json at all", &handle, &theme));
        assert!(!handle_upstream_message(r#"{"type":"jump"}"#, &handle, &theme));
        assert!(!handle_upstream_message(r#"{"type":"slider_change","index":42}"#, &handle, &theme));
        assert!(!handle_upstream_message(r#"{"type":"custom_color","hex":"blue"}"#, &handle, &theme));
        assert_eq!(theme.current(), ThemePrefs::default());
    }

    #[tokio::test]
    async fn http_request_gets_the_dashboard_page() -> Result<(), Box<dyn std::error::Error>> {
        let (handle, theme) = demo_dashboard();
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(CockpitServer::new(handle, theme).serve(listener));

        let mut stream = TcpStream::connect(addr).await?;
        stream.write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").await?;
        let mut response = String::new();
        stream.read_to_string(&mut response).await?;
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("WebSocket"));
        Ok(())
    }

    #[tokio::test]
    async fn slow_request_head_still_gets_full_page() -> Result<(), Box<dyn std::error::Error>> {
        let (handle, theme) = demo_dashboard();
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(CockpitServer::new(handle, theme).serve(listener));

        let mut stream = TcpStream::connect(addr).await?;
        stream.write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n").await?;
        tokio::time::sleep(Duration::from_millis(50)).await;
        stream
            .write_all(b"User-Agent: cockpit-test\r\nAccept: text/html\r\n\r\n")
            .await?;
        let mut response = Vec::new();
        tokio::time::timeout(Duration::from_secs(2), stream.read_to_end(&mut response)).await??;
        let response = String::from_utf8(response)?;
        let (head, body) = response.split_once("\r\n\r\n").ok_or("no header terminator")?;
        assert!(head.starts_with("HTTP/1.1 200 OK"));
        assert!(head.contains(&format!("Content-Length: {}", COCKPIT_HTML.len())));
        assert_eq!(body.len(), COCKPIT_HTML.len());
        Ok(())
    }

    #[tokio::test]
    async fn websocket_streams_state_and_accepts_input() -> Result<(), Box<dyn std::error::Error>> {
        let (handle, theme) = demo_dashboard();
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(CockpitServer::new(handle.clone(), theme).serve(listener));

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/")).await?;
        let mut kinds = Vec::new();
        for _ in 0..3 {
            let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
                .await?
                .ok_or("socket closed")??;
            let frame: Value = serde_json::from_str(msg.to_text()?)?;
            kinds.push(frame["type"].as_str().unwrap_or_default().to_string());
        }
        assert_eq!(kinds, vec!["view", "log", "theme"]);

        ws.send(Message::Text(r#"{"type":"key_down","code":"KeyD"}"#.into()))
            .await?;
        assert!(eventually(|| handle.view().last_command == "RIGHT").await);

        let mut saw_command = false;
        for _ in 0..20 {
            let Ok(Some(Ok(msg))) = tokio::time::timeout(Duration::from_secs(2), ws.next()).await
            else {
                break;
            };
            let frame: Value = serde_json::from_str(msg.to_text()?)?;
            if frame["type"] == "event" && frame["event"]["payload"]["kind"] == "command_issued" {
                assert_eq!(frame["event"]["payload"]["data"], "right");
                saw_command = true;
                break;
            }
        }
        assert!(saw_command, "command event must be streamed to the browser");
        Ok(())
    }

    #[test]
    fn cockpit_html_contains_websocket_and_key_bindings() {
        assert!(COCKPIT_HTML.contains("WebSocket"));
        assert!(COCKPIT_HTML.contains("KeyW"));
        assert!(COCKPIT_HTML.contains("slider_change"));
    }
}
