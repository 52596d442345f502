//! Aggregate figures derived from a harness run.

use std::time::Duration;

/// Optional per-round-trip timings, recorded when the harness is asked to
/// keep samples. These enrich the report without changing the amortized
/// figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleStats {
    pub count: u64,
    pub min_micros: u64,
    pub max_micros: u64,
    pub mean_micros: u64,
}

impl SampleStats {
    pub fn from_durations(samples: &[Duration]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let micros: Vec<u64> = samples.iter().map(|d| d.as_micros() as u64).collect();
        let sum: u64 = micros.iter().sum();
        Some(Self {
            count: micros.len() as u64,
            min_micros: *micros.iter().min().unwrap_or(&0),
            max_micros: *micros.iter().max().unwrap_or(&0),
            mean_micros: sum / micros.len() as u64,
        })
    }
}

/// The outcome of one harness run.
///
/// The per-connection and per-message figures are amortized: total wall
/// time spread evenly across the nominal counts, not a latency
/// distribution. `samples` carries real per-round-trip timings when
/// recording was enabled.
#[derive(Debug, Clone)]
pub struct Report {
    /// Wall time for the 10-message warm-up connection, in microseconds.
    pub baseline_micros: u64,
    pub baseline_per_message_micros: u64,
    /// Wall time for the load phase, in seconds.
    pub total_seconds: f64,
    pub per_connection_micros: u64,
    pub per_message_micros: u64,
    /// Echoes that came back with the wrong bytes or the wrong frame kind.
    pub mismatch_count: u64,
    /// Round trips lost to transport failures or read timeouts.
    pub transport_error_count: u64,
    /// Tasks that exhausted their dial retry budget.
    pub failed_connections: u64,
    pub samples: Option<SampleStats>,
}

impl Report {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn derive(
        baseline: Duration,
        baseline_messages: u32,
        total: Duration,
        connections: u32,
        messages: u32,
        mismatch_count: u64,
        transport_error_count: u64,
        failed_connections: u64,
        samples: Option<SampleStats>,
    ) -> Self {
        let baseline_micros = baseline.as_micros() as u64;
        let per_connection_micros = total.as_micros() as u64 / u64::from(connections.max(1));
        Self {
            baseline_micros,
            baseline_per_message_micros: baseline_micros / u64::from(baseline_messages.max(1)),
            total_seconds: total.as_secs_f64(),
            per_connection_micros,
            per_message_micros: per_connection_micros / u64::from(messages.max(1)),
            mismatch_count,
            transport_error_count,
            failed_connections,
            samples,
        }
    }

    /// True when every task connected and every echo verified.
    pub fn is_clean(&self) -> bool {
        self.mismatch_count == 0 && self.transport_error_count == 0 && self.failed_connections == 0
    }
}
