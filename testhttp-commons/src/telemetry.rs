use anyhow::Result;

/// Destination for diagnostic snapshots of a registry's pending requests.
///
/// Generic over `Event` so the commons crate stays free of `testhttp` types.
pub trait TelemetrySink<Event>: Send + Sync {
    fn record(&self, event: &Event) -> Result<()>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Record `events` in order, then flush once. Stops at the first failing
    /// record; nothing is flushed in that case.
    fn record_batch(&self, events: &[Event]) -> Result<()> {
        for event in events {
            self.record(event)?;
        }
        self.flush()
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl<Event> TelemetrySink<Event> for NoopTelemetry {
    fn record(&self, _event: &Event) -> Result<()> {
        Ok(())
    }
}
