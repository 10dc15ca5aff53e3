//! Tracing subscriber and OpenTelemetry wiring.
//!
//! Every crate logs through `tracing`; this module decides where the events
//! go. `RUST_LOG` takes precedence over the configured level. When an OTLP
//! endpoint is configured, spans are also exported over gRPC; if the exporter
//! cannot be built the run proceeds with local logging only.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::TracerProvider;
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::{LogFormat, TelemetrySection};

const TRACER_NAME: &str = "travel-planner";

/// Flushes exported spans on shutdown.
#[must_use = "dropping the guard without calling shutdown loses buffered spans"]
pub struct TelemetryGuard {
    provider: Option<TracerProvider>,
}

impl TelemetryGuard {
    pub fn exporting(&self) -> bool {
        self.provider.is_some()
    }

    pub fn shutdown(self) {
        if let Some(provider) = self.provider {
            if let Err(e) = provider.shutdown() {
                warn!(error = %e, "Failed to flush OpenTelemetry spans");
            }
        }
    }
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Fails only if a global subscriber is already installed.
pub fn init(settings: &TelemetrySection) -> anyhow::Result<TelemetryGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = match settings.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    let (provider, exporter_error) = match settings.otlp_endpoint.as_deref() {
        Some(endpoint) => match build_provider(endpoint) {
            Ok(provider) => (Some(provider), None),
            Err(e) => (None, Some((endpoint.to_string(), e))),
        },
        None => (None, None),
    };
    let otel_layer = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer(TRACER_NAME)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()?;

    if let Some((endpoint, e)) = exporter_error {
        warn!(%endpoint, error = %e, "OTLP exporter unavailable; continuing without span export");
    }
    if let Some(provider) = &provider {
        opentelemetry::global::set_tracer_provider(provider.clone());
    }

    Ok(TelemetryGuard { provider })
}

fn build_provider(endpoint: &str) -> anyhow::Result<TracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    Ok(TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .build())
}
