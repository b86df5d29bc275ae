//! Shared contracts reused by the `testhttp` registry. The goal is to let
//! test harnesses plug in their own diagnostic destinations without depending
//! on registry internals.
//!
//! The [`reference`] module ships ready-to-use sinks: an in-memory collector
//! for assertions and a `tracing` forwarder for human debugging.

pub mod reference;
pub mod telemetry;

pub use reference::{MemoryTelemetry, TracingTelemetry};
pub use telemetry::{NoopTelemetry, TelemetrySink};
