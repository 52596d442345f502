//! Benchmark entrypoint.
//!
//! Run with: cargo run --bin relay-bench [url] [connections] [messages]

use edit_relay_bench::LoadHarness;

const DEFAULT_URL: &str = "ws://127.0.0.1:8080";
const DEFAULT_CONNECTIONS: u32 = 10;
const DEFAULT_MESSAGES: u32 = 100;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let url = args.next().unwrap_or_else(|| DEFAULT_URL.to_string());
    let connections = match args.next() {
        Some(raw) => raw.parse()?,
        None => DEFAULT_CONNECTIONS,
    };
    let messages = match args.next() {
        Some(raw) => raw.parse()?,
        None => DEFAULT_MESSAGES,
    };

    let report = LoadHarness::new(url, connections, messages)
        .record_samples(true)
        .run()
        .await?;

    tracing::info!(
        result = report.total_seconds,
        per_connection = report.per_connection_micros,
        per_message = report.per_message_micros,
        mismatches = report.mismatch_count,
        transport_errors = report.transport_error_count,
        failed_connections = report.failed_connections,
        "benchmark done"
    );
    if let Some(samples) = report.samples {
        tracing::info!(
            count = samples.count,
            min = samples.min_micros,
            max = samples.max_micros,
            mean = samples.mean_micros,
            "round-trip samples (micros)"
        );
    }

    Ok(())
}
