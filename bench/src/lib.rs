//! Load-test harness for the edit relay.
//!
//! Opens many WebSocket connections concurrently, drives a closed
//! request/response loop on each, verifies every echo, and reports
//! amortized per-connection and per-message timings.

pub mod error;
pub mod harness;
pub mod report;

pub use error::HarnessError;
pub use harness::{sample_event, LoadHarness, BASELINE_MESSAGES};
pub use report::{Report, SampleStats};
