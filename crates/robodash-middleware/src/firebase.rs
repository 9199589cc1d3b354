//! Hosted real-time database backend.
//!
//! [`FirebaseStore`] implements [`RemoteStore`] against a Firebase-style
//! real-time database using its REST surface:
//!
//! * **Sign-in** – `POST {auth_url}/v1/accounts:signUp?key=…` with
//!   `returnSecureToken` yields an anonymous ID token plus a refresh token.
//! * **Refresh** – `POST {token_url}/v1/token?key=…` trades the refresh token
//!   for a new ID token shortly before expiry, after a `401` on a write, and
//!   when a subscription reports `auth_revoked`.
//! * **Writes** – `PUT` (set) and `POST` (push) on `{database_url}/{path}.json`.
//! * **Subscriptions** – a streaming `GET` with `Accept: text/event-stream`.
//!   Each subscription runs on its own task, folds `put`/`patch` events into a
//!   [`SnapshotMirror`] and reconnects with exponential backoff whenever the
//!   transport drops.
//!
//! Credentials travel in query strings, so transport errors are always
//! rendered without their URL.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use reqwest::header::ACCEPT;
use reqwest::{Method, StatusCode};
use robodash_types::{DashError, Identity, RemoteValue};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::{RwLock, mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::sse::{SnapshotMirror, SseDecoder};
use crate::store::{RemoteStore, ValueStream};

/// Default identity endpoint for anonymous sign-in.
pub const DEFAULT_AUTH_URL: &str = "https://identitytoolkit.googleapis.com";

/// Default endpoint that exchanges refresh tokens for ID tokens.
pub const DEFAULT_TOKEN_URL: &str = "https://securetoken.googleapis.com";

/// First reconnect delay of a dropped subscription.
const RECONNECT_BASE_MS: u64 = 150;

/// Cap on the doubling exponent of the reconnect delay (150 ms × 16).
const RECONNECT_MAX_EXPONENT: u32 = 4;

/// ID tokens are renewed this long before they expire.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Lifetime assumed when the server omits or garbles `expiresIn`.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Connection settings for [`FirebaseStore`].
#[derive(Clone)]
pub struct FirebaseConfig {
    /// e.g. `https://my-robot-default-rtdb.firebaseio.com`
    pub database_url: String,
    /// Web API key of the project.
    pub api_key: String,
    /// Identity endpoint, overridable for emulators.
    pub auth_url: String,
    /// Token refresh endpoint, overridable for emulators.
    pub token_url: String,
}

impl FirebaseConfig {
    pub fn new(database_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            api_key: api_key.into(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
        }
    }

    /// Override the identity endpoint (builder-style).
    pub fn with_auth_url(mut self, auth_url: impl Into<String>) -> Self {
        self.auth_url = auth_url.into();
        self
    }

    /// Override the token refresh endpoint (builder-style).
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }
}

impl std::fmt::Debug for FirebaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseConfig")
            .field("database_url", &self.database_url)
            .field(
                "api_key",
                if self.api_key.is_empty() { &"<not set>" } else { &"<redacted>" },
            )
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpResponse {
    id_token: String,
    refresh_token: String,
    local_id: String,
    #[serde(default)]
    expires_in: Option<String>,
}

#[derive(Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<String>,
}

#[derive(Deserialize)]
struct PushResponse {
    name: String,
}

/// Why a single streaming connection ended.
#[derive(Debug, PartialEq, Eq)]
enum StreamEnd {
    /// The server closed the stream; reconnect.
    Closed,
    /// The server cancelled the subscription (security rules).
    Cancelled,
    /// The ID token was revoked or expired; refresh, then reconnect.
    AuthRevoked,
    /// Nobody is listening any more.
    ReceiverGone,
}

/// Renders a transport error without the request URL, which carries the
/// API key or the ID token.
fn transport_error(e: reqwest::Error) -> String {
    e.without_url().to_string()
}

/// Token lifetime from the `expiresIn` field (decimal seconds).
fn token_lifetime(expires_in: Option<&str>) -> Duration {
    expires_in
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TOKEN_LIFETIME)
}

/// Whether a token expiring at `expires_at` is due for renewal at `now`.
fn needs_refresh(expires_at: Instant, now: Instant) -> bool {
    now + REFRESH_MARGIN >= expires_at
}

/// Credentials of the current anonymous session.
struct Session {
    id_token: Zeroizing<String>,
    refresh_token: Zeroizing<String>,
    expires_at: Instant,
}

impl Session {
    fn new(id_token: String, refresh_token: String, expires_in: Option<&str>) -> Self {
        Self {
            id_token: Zeroizing::new(id_token),
            refresh_token: Zeroizing::new(refresh_token),
            expires_at: Instant::now() + token_lifetime(expires_in),
        }
    }
}

/// Owns the session credentials and renews them on demand. Shared between
/// the store and its subscription tasks.
struct SessionKeeper {
    client: reqwest::Client,
    config: FirebaseConfig,
    session: RwLock<Option<Session>>,
}

impl SessionKeeper {
    async fn install(&self, session: Session) {
        *self.session.write().await = Some(session);
    }

    /// Current ID token, renewed first when it is about to expire.
    async fn id_token(&self) -> Result<Zeroizing<String>, DashError> {
        {
            let guard = self.session.read().await;
            let session = guard
                .as_ref()
                .ok_or_else(|| DashError::Auth("no session: sign in first".to_string()))?;
            if !needs_refresh(session.expires_at, Instant::now()) {
                return Ok(session.id_token.clone());
            }
        }
        debug!("ID token close to expiry; refreshing");
        self.refresh().await
    }

    /// Trade the refresh token for a new ID token.
    async fn refresh(&self) -> Result<Zeroizing<String>, DashError> {
        let refresh_token = {
            let guard = self.session.read().await;
            let session = guard
                .as_ref()
                .ok_or_else(|| DashError::Auth("no session: sign in first".to_string()))?;
            session.refresh_token.clone()
        };
        let url = format!(
            "{}/v1/token?key={}",
            self.config.token_url.trim_end_matches('/'),
            self.config.api_key
        );
        let response = self
            .client
            .post(&url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| DashError::Auth(format!("token refresh failed: {}", transport_error(e))))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DashError::Auth(format!("token refresh rejected with HTTP {status}: {body}")));
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| DashError::Auth(format!("malformed refresh response: {e}")))?;
        let session = Session::new(body.id_token, body.refresh_token, body.expires_in.as_deref());
        let id_token = session.id_token.clone();
        self.install(session).await;
        info!("ID token refreshed");
        Ok(id_token)
    }
}

/// [`RemoteStore`] backed by a hosted real-time database.
pub struct FirebaseStore {
    keeper: Arc<SessionKeeper>,
    auth: watch::Sender<Option<Identity>>,
}

impl FirebaseStore {
    pub fn new(config: FirebaseConfig) -> Self {
        let (auth, _) = watch::channel(None);
        Self {
            keeper: Arc::new(SessionKeeper {
                client: reqwest::Client::new(),
                config,
                session: RwLock::new(None),
            }),
            auth,
        }
    }

    pub fn config(&self) -> &FirebaseConfig {
        &self.keeper.config
    }

    /// REST URL of `path`, without credentials.
    pub fn path_url(&self, path: &str) -> String {
        path_url(&self.keeper.config, path)
    }

    async fn response_error(path: &str, response: reqwest::Response) -> DashError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        DashError::Write {
            path: path.to_string(),
            details: format!("HTTP {status}: {body}"),
        }
    }

    /// Send an authenticated write, refreshing the ID token and retrying
    /// once when the database answers `401`.
    async fn send_write(
        &self,
        method: Method,
        path: &str,
        value: &Value,
    ) -> Result<reqwest::Response, DashError> {
        let write_error = |details: String| DashError::Write {
            path: path.to_string(),
            details,
        };
        let mut token = self.keeper.id_token().await.map_err(|e| write_error(e.to_string()))?;
        let mut retried = false;
        loop {
            let url = authed_url(&self.keeper.config, path, &token);
            let response = self
                .keeper
                .client
                .request(method.clone(), url.as_str())
                .json(value)
                .send()
                .await
                .map_err(|e| write_error(transport_error(e)))?;
            if response.status() == StatusCode::UNAUTHORIZED && !retried {
                debug!(path, "write rejected as unauthorized; refreshing ID token");
                token = self.keeper.refresh().await.map_err(|e| write_error(e.to_string()))?;
                retried = true;
                continue;
            }
            if !response.status().is_success() {
                return Err(Self::response_error(path, response).await);
            }
            return Ok(response);
        }
    }
}

fn path_url(config: &FirebaseConfig, path: &str) -> String {
    format!(
        "{}/{}.json",
        config.database_url.trim_end_matches('/'),
        path.trim_matches('/')
    )
}

fn authed_url(config: &FirebaseConfig, path: &str, id_token: &str) -> Zeroizing<String> {
    Zeroizing::new(format!("{}?auth={}", path_url(config, path), id_token))
}

#[async_trait]
impl RemoteStore for FirebaseStore {
    async fn sign_in_anonymously(&self) -> Result<Identity, DashError> {
        let config = &self.keeper.config;
        let url = format!(
            "{}/v1/accounts:signUp?key={}",
            config.auth_url.trim_end_matches('/'),
            config.api_key
        );
        let response = self
            .keeper
            .client
            .post(&url)
            .json(&json!({ "returnSecureToken": true }))
            .send()
            .await
            .map_err(|e| DashError::Auth(format!("sign-in request failed: {}", transport_error(e))))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DashError::Auth(format!("HTTP {status}: {body}")));
        }

        let body: SignUpResponse = response
            .json()
            .await
            .map_err(|e| DashError::Auth(format!("malformed sign-in response: {e}")))?;

        self.keeper
            .install(Session::new(body.id_token, body.refresh_token, body.expires_in.as_deref()))
            .await;
        let identity = Identity { uid: body.local_id };
        self.auth.send_replace(Some(identity.clone()));
        info!(uid = %identity.uid, "anonymous session established");
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
        self.send_write(Method::PUT, path, &value).await?;
        debug!(path, "remote set accepted");
        Ok(())
    }

    async fn push(&self, path: &str, value: Value) -> Result<String, DashError> {
        let response = self.send_write(Method::POST, path, &value).await?;
        let body: PushResponse = response.json().await.map_err(|e| DashError::Write {
            path: path.to_string(),
            details: format!("malformed push response: {e}"),
        })?;
        debug!(path, key = %body.name, "remote push accepted");
        Ok(body.name)
    }

    async fn subscribe(&self, path: &str) -> Result<ValueStream, DashError> {
        // Fail fast when signed out; the task fetches its own token per connection.
        self.keeper
            .id_token()
            .await
            .map_err(|e| DashError::Channel(e.to_string()))?;
        let (tx, rx) = mpsc::unbounded_channel();
        let keeper = Arc::clone(&self.keeper);
        let path = path.to_string();

        tokio::spawn(async move {
            let mut mirror = SnapshotMirror::default();
            let mut failure_streak: u32 = 0;
            loop {
                let outcome = match keeper.id_token().await {
                    Ok(token) => {
                        let url = authed_url(&keeper.config, &path, &token);
                        stream_once(&keeper.client, &url, &path, &mut mirror, &tx).await
                    }
                    Err(e) => Err(DashError::Channel(e.to_string())),
                };
                match outcome {
                    Ok(StreamEnd::ReceiverGone) => break,
                    Ok(StreamEnd::Cancelled) => {
                        warn!(path = %path, "subscription cancelled by server");
                        break;
                    }
                    Ok(StreamEnd::AuthRevoked) => {
                        info!(path = %path, "subscription credentials revoked; refreshing");
                        if let Err(e) = keeper.refresh().await {
                            failure_streak = failure_streak.saturating_add(1);
                            let backoff_ms = reconnect_delay_ms(failure_streak);
                            warn!(path = %path, error = %e, failure_streak, backoff_ms, "token refresh failed");
                            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                        }
                    }
                    Ok(StreamEnd::Closed) => {
                        failure_streak = 0;
                        debug!(path = %path, "subscription stream closed; reconnecting");
                    }
                    Err(e) => {
                        failure_streak = failure_streak.saturating_add(1);
                        let backoff_ms = reconnect_delay_ms(failure_streak);
                        warn!(path = %path, error = %e, failure_streak, backoff_ms, "subscription dropped");
                        tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    }
                }
                if tx.is_closed() {
                    break;
                }
            }
        });

        let values = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|value| (value, rx))
        });
        Ok(Box::pin(values))
    }
}

/// Delay before the next reconnect after `failure_streak` consecutive drops.
pub(crate) fn reconnect_delay_ms(failure_streak: u32) -> u64 {
    RECONNECT_BASE_MS.saturating_mul(2u64.saturating_pow(failure_streak.min(RECONNECT_MAX_EXPONENT)))
}

async fn stream_once(
    client: &reqwest::Client,
    url: &str,
    path: &str,
    mirror: &mut SnapshotMirror,
    tx: &mpsc::UnboundedSender<RemoteValue<Value>>,
) -> Result<StreamEnd, DashError> {
    let response = client
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .send()
        .await
        .map_err(|e| DashError::Channel(format!("stream connect failed: {}", transport_error(e))))?;
    if response.status() == StatusCode::UNAUTHORIZED {
        return Ok(StreamEnd::AuthRevoked);
    }
    if !response.status().is_success() {
        return Err(DashError::Channel(format!(
            "stream for '{path}' rejected with HTTP {}",
            response.status()
        )));
    }

    let mut body = response.bytes_stream();
    let mut decoder = SseDecoder::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk
            .map_err(|e| DashError::Channel(format!("stream read failed: {}", transport_error(e))))?;
        for event in decoder.push(&chunk) {
            match event.event.as_str() {
                "put" | "patch" => {
                    if let Err(e) = mirror.apply(&event.event, &event.data) {
                        warn!(path, error = %e, "ignoring malformed stream event");
                        continue;
                    }
                    if tx.send(RemoteValue::new(path, mirror.value())).is_err() {
                        return Ok(StreamEnd::ReceiverGone);
                    }
                }
                "keep-alive" => {}
                "auth_revoked" => return Ok(StreamEnd::AuthRevoked),
                "cancel" => return Ok(StreamEnd::Cancelled),
                other => debug!(path, event = other, "unhandled stream event"),
            }
        }
    }
    Ok(StreamEnd::Closed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn store() -> FirebaseStore {
        FirebaseStore::new(FirebaseConfig::new("https://robot-rtdb.example.com/", "key-123"))
    }

    /// Store whose every endpoint points at `base`.
    fn local_store(base: &str) -> FirebaseStore {
        FirebaseStore::new(
            FirebaseConfig::new(base, "key-123")
                .with_auth_url(base)
                .with_token_url(base),
        )
    }

    fn session(id_token: &str, refresh_token: &str, lifetime: Duration) -> Session {
        Session {
            id_token: Zeroizing::new(id_token.to_string()),
            refresh_token: Zeroizing::new(refresh_token.to_string()),
            expires_at: Instant::now() + lifetime,
        }
    }

    fn http_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    /// Serves one scripted response per connection, in order, and reports
    /// each request's line and body.
    async fn scripted_server(
        responses: Vec<String>,
    ) -> (String, mpsc::UnboundedReceiver<(String, String)>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let (seen_tx, seen_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            for response in responses {
                let Ok((mut socket, _)) = listener.accept().await else { return };
                let mut raw = Vec::new();
                let mut buf = [0u8; 1024];
                let header_end = loop {
                    if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                        break pos + 4;
                    }
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => raw.extend_from_slice(&buf[..n]),
                    }
                };
                let head = String::from_utf8_lossy(&raw[..header_end]).to_string();
                let content_length = head
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                while raw.len() < header_end + content_length {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => raw.extend_from_slice(&buf[..n]),
                    }
                }
                let body = String::from_utf8_lossy(&raw[header_end..]).to_string();
                let request_line = head.lines().next().unwrap_or_default().to_string();
                let _ = seen_tx.send((request_line, body));
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        (base, seen_rx)
    }

    #[test]
    fn path_url_joins_cleanly() {
        let store = store();
        assert_eq!(
            store.path_url("/control/mode"),
            "https://robot-rtdb.example.com/control/mode.json"
        );
    }

    #[test]
    fn config_debug_redacts_api_key() {
        let debug = format!("{:?}", store().config());
        assert!(!debug.contains("key-123"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains(DEFAULT_TOKEN_URL));
    }

    #[test]
    fn reconnect_delay_doubles_and_caps() {
        assert_eq!(reconnect_delay_ms(1), 300);
        assert_eq!(reconnect_delay_ms(2), 600);
        assert_eq!(reconnect_delay_ms(4), 2400);
        assert_eq!(reconnect_delay_ms(50), 2400);
    }

    #[test]
    fn token_lifetime_parses_seconds_with_fallback() {
        assert_eq!(token_lifetime(Some("3600")), Duration::from_secs(3600));
        assert_eq!(token_lifetime(Some(" 120 ")), Duration::from_secs(120));
        assert_eq!(token_lifetime(Some("soon")), DEFAULT_TOKEN_LIFETIME);
        assert_eq!(token_lifetime(None), DEFAULT_TOKEN_LIFETIME);
    }

    #[test]
    fn refresh_is_due_inside_the_margin() {
        let now = Instant::now();
        assert!(!needs_refresh(now + Duration::from_secs(3600), now));
        assert!(!needs_refresh(now + REFRESH_MARGIN + Duration::from_secs(1), now));
        assert!(needs_refresh(now + REFRESH_MARGIN, now));
        assert!(needs_refresh(now, now));
    }

    #[tokio::test]
    async fn writes_without_session_fail_fast() {
        let store = store();
        let err = store.set("control/command", json!("stop")).await.unwrap_err();
        assert!(err.is_write_error());
        assert!(store.subscribe("status/connected").await.is_err());
    }

    #[tokio::test]
    async fn auth_changes_starts_signed_out() -> Result<(), Box<dyn std::error::Error>> {
        let store = store();
        let mut changes = store.auth_changes();
        assert_eq!(changes.next().await.ok_or("no current state")?, None);
        Ok(())
    }

    #[tokio::test]
    async fn transport_errors_never_carry_credentials() {
        // Nothing listens on the discard port, so every request fails in transit.
        let store = local_store("http://127.0.0.1:9");
        store
            .keeper
            .install(session("secret-id-token", "secret-refresh", Duration::from_secs(3600)))
            .await;

        let set_err = store.set("control/command", json!("stop")).await.unwrap_err();
        let push_err = store.push("logs", json!({ "m": "hi" })).await.unwrap_err();
        let sign_in_err = store.sign_in_anonymously().await.unwrap_err();
        for err in [set_err, push_err, sign_in_err] {
            let text = err.to_string();
            assert!(!text.contains("secret-id-token"), "token leaked: {text}");
            assert!(!text.contains("key-123"), "api key leaked: {text}");
        }
    }

    #[tokio::test]
    async fn unauthorized_write_refreshes_token_and_retries() {
        let (base, mut seen) = scripted_server(vec![
            http_response("401 Unauthorized", r#"{"error":"Auth token is expired"}"#),
            http_response(
                "200 OK",
                r#"{"id_token":"fresh-id","refresh_token":"fresh-refresh","expires_in":"3600"}"#,
            ),
            http_response("200 OK", r#""stop""#),
        ])
        .await;
        let store = local_store(&base);
        store
            .keeper
            .install(session("stale-id", "old-refresh", Duration::from_secs(3600)))
            .await;

        store.set("control/command", json!("stop")).await.unwrap();

        let (first, _) = seen.recv().await.unwrap();
        assert!(first.starts_with("PUT /control/command.json?auth=stale-id"), "{first}");
        let (refresh, form) = seen.recv().await.unwrap();
        assert!(refresh.starts_with("POST /v1/token?key=key-123"), "{refresh}");
        assert!(form.contains("grant_type=refresh_token"), "{form}");
        assert!(form.contains("refresh_token=old-refresh"), "{form}");
        let (retry, _) = seen.recv().await.unwrap();
        assert!(retry.starts_with("PUT /control/command.json?auth=fresh-id"), "{retry}");
    }

    #[tokio::test]
    async fn token_near_expiry_is_refreshed_before_writing() {
        let (base, mut seen) = scripted_server(vec![
            http_response(
                "200 OK",
                r#"{"id_token":"fresh-id","refresh_token":"fresh-refresh","expires_in":"3600"}"#,
            ),
            http_response("200 OK", r#"{"name":"-Nabc"}"#),
        ])
        .await;
        let store = local_store(&base);
        store
            .keeper
            .install(session("stale-id", "old-refresh", Duration::from_secs(5)))
            .await;

        let key = store.push("logs", json!({ "m": "hi" })).await.unwrap();
        assert_eq!(key, "-Nabc");

        let (refresh, _) = seen.recv().await.unwrap();
        assert!(refresh.starts_with("POST /v1/token"), "{refresh}");
        let (write, _) = seen.recv().await.unwrap();
        assert!(write.starts_with("POST /logs.json?auth=fresh-id"), "{write}");
    }

    #[tokio::test]
    async fn revoked_stream_asks_for_fresh_credentials() {
        let stream_body = "event: put\ndata: {\"path\":\"/\",\"data\":true}\n\nevent: auth_revoked\ndata: \"credential is no longer valid\"\n\n";
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n{stream_body}"
        );
        let (base, _seen) = scripted_server(vec![response]).await;
        let client = reqwest::Client::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut mirror = SnapshotMirror::default();

        let url = format!("{base}/status/connected.json?auth=stale-id");
        let end = stream_once(&client, &url, "status/connected", &mut mirror, &tx)
            .await
            .unwrap();

        assert_eq!(end, StreamEnd::AuthRevoked);
        assert_eq!(rx.recv().await.unwrap().value, Some(json!(true)));
    }
}
