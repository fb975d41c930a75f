//! Process-wide tracing setup: an env filter, a text or JSON formatter, and an
//! OTLP exporter when an endpoint is configured.

use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{trace as sdktrace, Resource};
use opentelemetry_semantic_conventions::resource;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// sqlx and sea_orm are noisy below warn.
pub const DEFAULT_LOG_FILTER: &str = "info,plantpulse_server=info,sqlx=warn,sea_orm=warn";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    /// One flattened JSON object per event, without timestamps.
    Json,
}

impl LogFormat {
    /// Anything other than `json` (case-insensitive) is text.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryOptions {
    pub service_name: String,
    pub filter: String,
    pub format: LogFormat,
    pub otlp_endpoint: Option<String>,
}

impl TelemetryOptions {
    /// Reads `RUST_LOG`, `RUST_LOG_FORMAT` and `OTEL_EXPORTER_OTLP_ENDPOINT`.
    pub fn from_lookup<F>(service_name: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            service_name: service_name.to_string(),
            filter: lookup("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            format: lookup("RUST_LOG_FORMAT")
                .map(|raw| LogFormat::parse(&raw))
                .unwrap_or(LogFormat::Text),
            otlp_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT").filter(|e| !e.trim().is_empty()),
        }
    }
}

pub fn init_telemetry(service_name: &str) {
    init_with(TelemetryOptions::from_lookup(service_name, |name| {
        std::env::var(name).ok()
    }));
}

pub fn init_with(options: TelemetryOptions) {
    let registry = tracing_subscriber::registry().with(EnvFilter::new(&options.filter));

    let otel_layer = options
        .otlp_endpoint
        .as_deref()
        .and_then(|endpoint| otlp_tracer(&options.service_name, endpoint))
        .map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));

    match options.format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .flatten_event(true)
                .without_time();
            registry.with(otel_layer).with(fmt_layer).init();
        }
        LogFormat::Text => {
            registry
                .with(otel_layer)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    tracing::info!(
        service = %options.service_name,
        otlp = options.otlp_endpoint.is_some(),
        "Telemetry initialized"
    );
}

/// The service keeps running without export if the pipeline cannot start.
fn otlp_tracer(service_name: &str, endpoint: &str) -> Option<sdktrace::Tracer> {
    let resource = Resource::new(vec![
        KeyValue::new(resource::SERVICE_NAME, service_name.to_string()),
        KeyValue::new(resource::SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
    ]);

    let installed = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .with_trace_config(
            sdktrace::config()
                .with_resource(resource)
                .with_sampler(sdktrace::Sampler::AlwaysOn),
        )
        .install_batch(opentelemetry_sdk::runtime::Tokio);

    match installed {
        Ok(tracer) => Some(tracer),
        Err(e) => {
            // No subscriber yet.
            eprintln!("OpenTelemetry exporter disabled: {}", e);
            None
        }
    }
}
