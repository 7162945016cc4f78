//! Global subscriber for the `termchat` binary.
//!
//! Console output always; spans are also exported to stdout through
//! OpenTelemetry when `--otel` is given. `RUST_LOG` overrides the default
//! filter.

use std::sync::OnceLock;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static OTEL_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// Install the subscriber. Fails if one is already installed.
///
/// Closing spans are logged, so every `session` and `chat` span reports its
/// lifetime when the client leaves.
pub fn init_tracing(
    default_filter: &str,
    enable_otel: bool,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let console = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE);

    let otel = enable_otel.then(|| {
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build();
        let layer = tracing_opentelemetry::layer().with_tracer(provider.tracer("termchat"));
        let _ = OTEL_PROVIDER.set(provider.clone());
        opentelemetry::global::set_tracer_provider(provider);
        layer
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(otel)
        .try_init()?;
    Ok(())
}

/// Flush exported spans. No-op without `--otel`.
pub fn shutdown_tracing() {
    if let Some(provider) = OTEL_PROVIDER.get()
        && let Err(err) = provider.shutdown()
    {
        eprintln!("termchat: span export shutdown failed: {err}");
    }
}
