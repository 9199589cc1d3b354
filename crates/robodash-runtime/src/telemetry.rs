//! Tracing and OpenTelemetry initialisation.
//!
//! Call [`init_tracing`] once at process startup.
//!
//! # Environment variables
//!
//! | Variable | Effect |
//! |---|---|
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | OTLP collector base URL (e.g. `http://localhost:4318`). When set, spans are exported over OTLP/HTTP. |
//! | `RUST_LOG` | Log filter (default `"info"`). |
//! | `ROBODASH_LOG_FORMAT=json` | Emit newline-delimited JSON logs. |
//!
//! # Example
//!
//! ```rust,no_run
//! // Hold the guard for the entire lifetime of the process.
//! let _guard = robodash_runtime::telemetry::init_tracing("robodash");
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Output shape of console logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

/// Settings resolved from the environment.
#[derive(Debug, Clone)]
pub struct TelemetryOptions {
    pub service_name: String,
    pub format: LogFormat,
    pub filter: String,
    pub otlp_endpoint: Option<String>,
}

impl TelemetryOptions {
    pub fn from_env(service_name: &str) -> Self {
        let format = if std::env::var("ROBODASH_LOG_FORMAT").as_deref() == Ok("json") {
            LogFormat::Json
        } else {
            LogFormat::Compact
        };
        Self {
            service_name: service_name.to_string(),
            format,
            filter: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok(),
        }
    }
}

/// Initialise the global subscriber from the environment.
///
/// The returned [`TracerProviderGuard`] **must** be held for the lifetime of
/// the process; dropping it flushes pending spans.
pub fn init_tracing(service_name: &str) -> TracerProviderGuard {
    init_with(&TelemetryOptions::from_env(service_name))
}

/// Initialise the global subscriber from explicit options.
///
/// A second initialisation in the same process is ignored.
pub fn init_with(options: &TelemetryOptions) -> TracerProviderGuard {
    let env_filter = EnvFilter::try_new(&options.filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let provider = options
        .otlp_endpoint
        .as_deref()
        .and_then(|endpoint| build_provider(&options.service_name, endpoint));

    let otel_layer = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer("robodash")));
    let fmt_layer = match options.format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer().compact().boxed(),
    };

    if let Err(e) = tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer)
        .with(fmt_layer)
        .try_init()
    {
        eprintln!("[robodash] tracing already initialised: {e}");
    }

    TracerProviderGuard(provider)
}

/// RAII guard that shuts down the OTel [`SdkTracerProvider`] on drop.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl TracerProviderGuard {
    /// `true` when spans are being exported.
    pub fn is_exporting(&self) -> bool {
        self.0.is_some()
    }
}

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.0.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("[robodash] OpenTelemetry provider shutdown error: {e}");
        }
    }
}

/// Build an OTLP/HTTP tracer provider for `endpoint`.
///
/// Returns `None` when the exporter cannot be initialised; the error is
/// printed and console logging continues on its own.
fn build_provider(service_name: &str, endpoint: &str) -> Option<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("[robodash] OTLP exporter init failed: {e}"))
        .ok()?;

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    Some(
        SdkTracerProvider::builder()
            .with_resource(resource)
            // Simple exporter: the CLI initialises tracing before its Tokio
            // runtime exists, so a batch exporter cannot spawn its worker.
            .with_simple_exporter(exporter)
            .build(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_without_endpoint_do_not_export() {
        let options = TelemetryOptions {
            service_name: "test-service".to_string(),
            format: LogFormat::Compact,
            filter: "warn".to_string(),
            otlp_endpoint: None,
        };
        let guard = init_with(&options);
        assert!(!guard.is_exporting());
    }

    #[test]
    fn guard_drop_with_none_is_safe() {
        let guard = TracerProviderGuard(None);
        drop(guard);
    }
}
