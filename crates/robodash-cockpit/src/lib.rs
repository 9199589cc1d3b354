//! `robodash-cockpit` – the browser dashboard server.
//!
//! Boots a lightweight HTTP + WebSocket server (default port `8080`) that:
//!
//! 1. **Serves** the embedded single-page dashboard at every non-WebSocket
//!    HTTP path.
//! 2. **Streams** state to every connected tab: [`DashboardView`] snapshots,
//!    bus [`Event`]s (log lines, distance pulses, command echoes) and the
//!    current theme.
//! 3. **Accepts** upstream input frames (button presses, keys, slider,
//!    mode toggle) and forwards them to the dashboard loop, plus theme and
//!    colour-picker frames handled by the [`ThemeController`].
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use robodash_cockpit::{CockpitServer, MemoryPreferences, ThemeController};
//! use robodash_middleware::EventBus;
//! use robodash_runtime::{Dashboard, DashboardConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = DashboardConfig { demo: true, ..Default::default() };
//!     let (dashboard, handle) = Dashboard::new(config, None, EventBus::default());
//!     tokio::spawn(dashboard.run());
//!     let theme = Arc::new(ThemeController::load(Box::new(MemoryPreferences::default())));
//!     CockpitServer::new(handle, theme)
//!         .run()
//!         .await
//!         .expect("cockpit server failed");
//! }
//! ```
//!
//! [`DashboardView`]: robodash_types::DashboardView
//! [`Event`]: robodash_types::Event

pub mod prefs;
pub mod server;
pub mod theme;

pub use prefs::{FilePreferences, MemoryPreferences, PreferenceStore, ThemeController};
pub use server::{CockpitServer, DEFAULT_PORT};
pub use theme::{Theme, ThemePrefs};
