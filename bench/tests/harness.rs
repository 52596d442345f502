//! End-to-end harness runs against a real relay.

use edit_relay_bench::{LoadHarness, BASELINE_MESSAGES};
use edit_relay_protocol::EditEvent;
use edit_relay_server::{EventHandler, RelayServer};

async fn start_relay() -> String {
    let server = RelayServer::bind("127.0.0.1:0").await.expect("bind relay");
    let addr = server.local_addr().expect("local addr");
    tokio::spawn(server.run());
    format!("ws://{addr}")
}

#[tokio::test]
async fn load_run_against_echo_relay_is_clean() {
    let url = start_relay().await;

    let report = LoadHarness::new(url, 4, 20)
        .record_samples(true)
        .run()
        .await
        .expect("harness run");

    assert!(report.is_clean(), "unexpected errors: {report:?}");
    assert!(report.baseline_micros > 0);
    assert_eq!(
        report.baseline_per_message_micros,
        report.baseline_micros / u64::from(BASELINE_MESSAGES)
    );
    assert!(report.per_connection_micros >= report.per_message_micros);

    let samples = report.samples.expect("samples were requested");
    assert_eq!(samples.count, 4 * 20);
    assert!(samples.min_micros <= samples.mean_micros);
    assert!(samples.mean_micros <= samples.max_micros);
}

/// A relay that rewrites every event, so no echo verifies.
struct MangleHandler;

impl EventHandler for MangleHandler {
    fn handle(&self, mut event: EditEvent) -> Option<EditEvent> {
        event.time = event.time.wrapping_add(1);
        Some(event)
    }
}

#[tokio::test]
async fn mismatches_are_counted_not_fatal() {
    let server = RelayServer::bind("127.0.0.1:0")
        .await
        .expect("bind relay")
        .with_handler(MangleHandler);
    let addr = server.local_addr().expect("local addr");
    tokio::spawn(server.run());

    let report = LoadHarness::new(format!("ws://{addr}"), 2, 5)
        .run()
        .await
        .expect("harness still produces a report");

    // Baseline mismatches are logged separately; the count covers the
    // load phase: 2 connections x 5 messages.
    assert_eq!(report.mismatch_count, 10);
    assert_eq!(report.failed_connections, 0);
    assert_eq!(report.transport_error_count, 0);
}
