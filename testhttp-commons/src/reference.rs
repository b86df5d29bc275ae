//! Reference sink implementations.

use std::fmt::Debug;

use anyhow::Result;
use parking_lot::Mutex;
use tracing::debug;

use crate::telemetry::TelemetrySink;

/// Collects every recorded event in memory so tests can assert on what a
/// component emitted.
#[derive(Debug)]
pub struct MemoryTelemetry<Event> {
    events: Mutex<Vec<Event>>,
    flushes: Mutex<usize>,
}

impl<Event> Default for MemoryTelemetry<Event> {
    fn default() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            flushes: Mutex::new(0),
        }
    }
}

impl<Event: Clone> MemoryTelemetry<Event> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone of every event recorded so far, in record order.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Drain recorded events, leaving the sink empty.
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Number of times `flush` has been called.
    pub fn flush_count(&self) -> usize {
        *self.flushes.lock()
    }
}

impl<Event: Clone + Send> TelemetrySink<Event> for MemoryTelemetry<Event> {
    fn record(&self, event: &Event) -> Result<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        *self.flushes.lock() += 1;
        Ok(())
    }
}

/// Forwards each event to `tracing` at debug level. The `label` is attached
/// as the `sink` field so several sinks can share one subscriber.
#[derive(Debug, Clone)]
pub struct TracingTelemetry {
    label: &'static str,
}

impl TracingTelemetry {
    pub fn new(label: &'static str) -> Self {
        Self { label }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl Default for TracingTelemetry {
    fn default() -> Self {
        Self::new("testhttp")
    }
}

impl<Event: Debug> TelemetrySink<Event> for TracingTelemetry {
    fn record(&self, event: &Event) -> Result<()> {
        debug!(sink = self.label, ?event, "diagnostic event");
        Ok(())
    }
}
