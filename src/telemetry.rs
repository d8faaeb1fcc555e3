use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Initialize tracing for the walkthrough host.
///
/// Logs go to stderr so they never interleave with the narration and prompts
/// on stdout. `RUST_LOG` overrides the default `warn` level.
pub fn init_telemetry(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    if json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .try_init()?;
    }

    tracing::debug!("Blob walkthrough telemetry initialized");
    Ok(())
}

/// Generate an ID linking every log line of one run
pub fn generate_run_id() -> String {
    Uuid::new_v4().to_string()
}

/// Create a span with common walkthrough step attributes
pub fn create_step_span(step: &str, run_id: &str) -> tracing::Span {
    tracing::info_span!(
        "workflow_step",
        step = step,
        run.id = run_id,
        otel.kind = "internal"
    )
}
