//! `robodash-runtime` – the synchronization core of the dashboard.
//!
//! Reconciles local UI intent (button presses, the mode toggle, the speed
//! slider) with remote robot state over an eventually-consistent channel.
//!
//! # Modules
//!
//! - [`dashboard`] – [`Dashboard`][dashboard::Dashboard]: the single-owner
//!   event loop and its cloneable [`DashboardHandle`][dashboard::DashboardHandle].
//! - [`session`] – [`SessionManager`][session::SessionManager]: anonymous
//!   sign-in with bounded retry, and the best-effort departure write.
//! - [`dispatcher`] – [`CommandDispatcher`][dispatcher::CommandDispatcher]:
//!   optimistic, fire-and-forget translation of intents into remote writes.
//! - [`input`] – [`InputTracker`][input::InputTracker]: momentary
//!   press/release semantics, key repeat suppression and mode gating.
//! - [`reconciler`] – folds distance, connectivity and mode pushes into the
//!   dashboard state without redundant churn.
//! - [`simulator`] – [`DemoSimulator`][simulator::DemoSimulator]: synthetic
//!   telemetry when no remote store is configured.
//! - [`steering`] – smoothing animation of the steering-wheel widget.
//! - [`state`] – [`DashboardState`][state::DashboardState], the one owned
//!   state struct.
//! - [`log`] – the bounded, user-visible activity log.
//! - [`config`] – [`DashboardConfig`][config::DashboardConfig] and
//!   [`RetryPolicy`][config::RetryPolicy].
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: global
//!   `tracing` subscriber with an optional OTLP span exporter.

pub mod config;
pub mod dashboard;
pub mod dispatcher;
pub mod input;
pub mod log;
pub mod reconciler;
pub mod session;
pub mod simulator;
pub mod state;
pub mod steering;
pub mod telemetry;

pub use config::{DashboardConfig, RetryPolicy};
pub use dashboard::{DashMessage, Dashboard, DashboardHandle, Slot};
pub use dispatcher::{CommandDispatcher, WriteOp};
pub use input::{InputEvent, InputTracker, Intent, key_command};
pub use session::{SessionHandle, SessionManager};
pub use telemetry::{TracerProviderGuard, init_tracing};
