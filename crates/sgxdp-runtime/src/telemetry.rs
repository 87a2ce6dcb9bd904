//! Logging and trace export for the SGX device plugin.
//!
//! | Variable | Effect |
//! |---|---|
//! | `RUST_LOG` | Log filter. Overrides the `debug` argument when valid and non-empty. |
//! | `SGXDP_LOG_FORMAT=json` | Newline-delimited JSON records instead of the compact format. |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | OTLP/HTTP collector URL. Spans (the scan loop's included) are exported when set. |
//!
//! ```rust,no_run
//! let _guard = sgxdp_runtime::telemetry::init_tracing("sgx-device-plugin", false);
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FORMAT_ENV: &str = "SGXDP_LOG_FORMAT";
const OTLP_ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

/// Install the global subscriber for `service_name`.
///
/// `debug` lowers the default level to `debug` so capability records and
/// per-cycle details show up.  Keep the returned guard alive until exit.
pub fn init_tracing(service_name: &str, debug: bool) -> TracerProviderGuard {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = env_filter(rust_log.as_deref(), debug);
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let provider = std::env::var(OTLP_ENDPOINT_ENV)
        .ok()
        .and_then(|endpoint| build_provider(service_name, endpoint));
    let otel = provider.as_ref().map(|p| {
        tracing_opentelemetry::layer().with_tracer(p.tracer(service_name.to_string()))
    });

    let output = if json {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().compact().boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(otel)
        .with(output)
        .init();

    TracerProviderGuard(provider)
}

/// Flushes and shuts down the OTLP exporter on drop.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.0.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("OpenTelemetry provider shutdown failed: {e}");
            }
        }
    }
}

fn env_filter(rust_log: Option<&str>, debug: bool) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(if debug { "debug" } else { "info" }))
}

fn build_provider(service_name: &str, endpoint: String) -> Option<SdkTracerProvider> {
    let exporter = match opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
    {
        Ok(exporter) => exporter,
        Err(e) => {
            // No subscriber exists yet.
            eprintln!("OTLP exporter init failed, spans stay local: {e}");
            return None;
        }
    };

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    // Tracing starts before the Tokio runtime, so the batch exporter is out.
    Some(
        SdkTracerProvider::builder()
            .with_resource(resource)
            .with_simple_exporter(exporter)
            .build(),
    )
}
