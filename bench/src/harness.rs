//! Load generation: many concurrent connections, each driving a closed
//! send/receive loop against the relay and verifying every echo.

use std::time::{Duration, Instant};

use edit_relay_protocol::{EditAction, EditEvent};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::HarnessError;
use crate::report::{Report, SampleStats};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Messages driven through the single warm-up connection before the load
/// phase, to separate dial/handshake overhead from steady-state echo cost.
pub const BASELINE_MESSAGES: u32 = 10;

const DIAL_RETRY_DELAY: Duration = Duration::from_millis(5);
const DIAL_MAX_ATTEMPTS: u32 = 200;
const READ_DEADLINE: Duration = Duration::from_secs(5);
const ROUND_TRIP_ERROR_BACKOFF: Duration = Duration::from_millis(5);

/// The fixed event every round trip carries.
pub fn sample_event() -> EditEvent {
    EditEvent {
        time: 12345,
        position: 10,
        character: "a".to_string(),
        action: EditAction::Insert,
    }
}

/// Drives `connections` concurrent connections against a relay, each
/// performing `messages` sequential round trips, and derives amortized
/// timing figures from the wall clock.
pub struct LoadHarness {
    url: String,
    connections: u32,
    messages: u32,
    record_samples: bool,
}

#[derive(Debug, Default)]
struct TaskStats {
    mismatches: u64,
    transport_errors: u64,
    samples: Vec<Duration>,
}

enum RoundTripError {
    /// The echo came back with the wrong bytes or the wrong frame kind.
    Mismatch(String),
    Timeout,
    Transport(String),
}

impl LoadHarness {
    pub fn new(url: impl Into<String>, connections: u32, messages: u32) -> Self {
        Self {
            url: url.into(),
            connections,
            messages,
            record_samples: false,
        }
    }

    /// Also record each round trip's own duration. The amortized report
    /// figures are unaffected.
    pub fn record_samples(mut self, enabled: bool) -> Self {
        self.record_samples = enabled;
        self
    }

    /// Run the baseline phase, then the load phase, and report.
    ///
    /// Verification failures inside a task are counted, never fatal; only
    /// a baseline that cannot connect at all aborts the run.
    pub async fn run(&self) -> Result<Report, HarnessError> {
        let payload: Utf8Bytes = sample_event().encode().into();

        let started = Instant::now();
        let baseline_stats =
            drive_connection(self.url.clone(), payload.clone(), BASELINE_MESSAGES, false).await?;
        let baseline = started.elapsed();
        tracing::info!(
            result = baseline.as_micros() as u64,
            per_message = baseline.as_micros() as u64 / u64::from(BASELINE_MESSAGES),
            "baseline done"
        );
        if baseline_stats.mismatches > 0 {
            tracing::warn!(
                mismatches = baseline_stats.mismatches,
                "baseline echoes failed verification"
            );
        }

        let started = Instant::now();
        let mut tasks = Vec::with_capacity(self.connections as usize);
        for _ in 0..self.connections {
            tasks.push(tokio::spawn(drive_connection(
                self.url.clone(),
                payload.clone(),
                self.messages,
                self.record_samples,
            )));
        }

        let mut mismatches = 0;
        let mut transport_errors = 0;
        let mut failed_connections = 0;
        let mut samples = Vec::new();
        for task in tasks {
            match task.await {
                Ok(Ok(stats)) => {
                    mismatches += stats.mismatches;
                    transport_errors += stats.transport_errors;
                    samples.extend(stats.samples);
                }
                Ok(Err(e)) => {
                    failed_connections += 1;
                    tracing::warn!(error = %e, "connection task gave up");
                }
                Err(e) => return Err(HarnessError::Task(e.to_string())),
            }
        }
        let total = started.elapsed();

        Ok(Report::derive(
            baseline,
            BASELINE_MESSAGES,
            total,
            self.connections,
            self.messages,
            mismatches,
            transport_errors,
            failed_connections,
            SampleStats::from_durations(&samples),
        ))
    }
}

/// One simulated connection: dial (bounded retry), then `messages`
/// sequential round trips. Per-message failures are counted and the loop
/// moves on, so one bad echo never poisons the aggregate timing.
async fn drive_connection(
    url: String,
    payload: Utf8Bytes,
    messages: u32,
    record_samples: bool,
) -> Result<TaskStats, HarnessError> {
    let ws = dial_with_retry(&url, DIAL_MAX_ATTEMPTS).await?;
    let (mut write, mut read) = ws.split();

    let mut stats = TaskStats::default();
    for _ in 0..messages {
        let started = Instant::now();
        match round_trip(&mut write, &mut read, &payload).await {
            Ok(()) => {
                if record_samples {
                    stats.samples.push(started.elapsed());
                }
            }
            Err(RoundTripError::Mismatch(detail)) => {
                stats.mismatches += 1;
                tracing::warn!(%detail, "echo verification failed");
            }
            Err(RoundTripError::Timeout) => {
                stats.transport_errors += 1;
                tracing::warn!("timed out waiting for echo");
            }
            Err(RoundTripError::Transport(detail)) => {
                stats.transport_errors += 1;
                tracing::warn!(%detail, "round trip failed");
                tokio::time::sleep(ROUND_TRIP_ERROR_BACKOFF).await;
            }
        }
    }

    let _ = write.close().await;
    Ok(stats)
}

/// Dial with a fixed short delay between attempts and a capped budget, so
/// an unreachable target surfaces as an error instead of a spin.
async fn dial_with_retry(url: &str, max_attempts: u32) -> Result<WsStream, HarnessError> {
    let mut last_error = String::new();
    for attempt in 1..=max_attempts {
        match connect_async(url).await {
            Ok((ws, _)) => return Ok(ws),
            Err(e) => {
                last_error = e.to_string();
                tracing::debug!(attempt, error = %last_error, "dial failed, retrying");
                tokio::time::sleep(DIAL_RETRY_DELAY).await;
            }
        }
    }
    Err(HarnessError::Dial {
        attempts: max_attempts,
        last_error,
    })
}

async fn round_trip(
    write: &mut WsSink,
    read: &mut WsSource,
    payload: &Utf8Bytes,
) -> Result<(), RoundTripError> {
    write
        .send(Message::Text(payload.clone()))
        .await
        .map_err(|e| RoundTripError::Transport(e.to_string()))?;

    let reply = tokio::time::timeout(READ_DEADLINE, read.next())
        .await
        .map_err(|_| RoundTripError::Timeout)?;

    match reply {
        Some(Ok(Message::Text(text))) if text == *payload => Ok(()),
        Some(Ok(Message::Text(text))) => Err(RoundTripError::Mismatch(format!(
            "expected {payload:?}, received {text:?}"
        ))),
        Some(Ok(other)) => Err(RoundTripError::Mismatch(format!(
            "expected a text frame, received {other:?}"
        ))),
        Some(Err(e)) => Err(RoundTripError::Transport(e.to_string())),
        None => Err(RoundTripError::Transport("stream ended".to_string())),
    }
}
