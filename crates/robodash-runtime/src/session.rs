//! [`SessionManager`] – anonymous session establishment and teardown.

use std::sync::Arc;

use futures_util::stream::BoxStream;
use robodash_middleware::{RemoteChannel, RemoteStore, WriteStep, paths};
use robodash_types::{DashError, Identity};
use tracing::{info, warn};

use crate::config::RetryPolicy;

/// A live session: the identity obtained at sign-in and the stream of later
/// identity changes (`None` = signed out).
pub struct SessionHandle {
    pub identity: Identity,
    pub auth_changes: BoxStream<'static, Option<Identity>>,
}

pub struct SessionManager {
    store: Arc<dyn RemoteStore>,
    retry: RetryPolicy,
}

impl SessionManager {
    pub fn new(store: Arc<dyn RemoteStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Sign in anonymously, retrying with exponential backoff.
    ///
    /// # Errors
    ///
    /// Returns the last [`DashError::Auth`] once every attempt has failed.
    pub async fn start(&self) -> Result<SessionHandle, DashError> {
        let attempts = self.retry.attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.store.sign_in_anonymously().await {
                Ok(identity) => {
                    info!(uid = %identity.uid, attempt, "session established");
                    return Ok(SessionHandle {
                        identity,
                        auth_changes: self.store.auth_changes(),
                    });
                }
                Err(e) if attempt < attempts => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(attempt, error = %e, retry_in_ms = delay.as_millis() as u64, "sign-in failed; retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "sign-in failed; giving up");
                    return Err(e);
                }
            }
        }
    }
}

/// Lower the presence beacon.
///
/// Bounded by the channel's write timeout; a failure is logged and
/// swallowed so shutdown never stalls on it.
pub async fn depart<T: Send + 'static>(channel: &RemoteChannel<T>) {
    match channel
        .write_now(WriteStep::set(paths::WEBSITE_CONNECTED, false))
        .await
    {
        Ok(()) => info!("presence beacon lowered"),
        Err(e) => warn!(error = %e, "failed to update disconnect status"),
    }
}
