//! Recording dispatch
//!
//! Wraps a sink behind a throttle latch: nothing is persisted until the
//! first frame with positive throttle arrives, so the stationary frames
//! before the driver (or autopilot) moves off never pollute a dataset.
//! Once open the latch stays open for the rest of the session.

use anyhow::Result;
use tracing::info;

use robocar_core::model::TelemetryFrame;

use crate::sinks::RecordSink;

pub struct Recorder {
    sink: Box<dyn RecordSink>,
    started: bool,
}

impl Recorder {
    pub fn new(sink: Box<dyn RecordSink>) -> Self {
        Self { sink, started: false }
    }

    /// Whether the throttle latch has opened yet.
    pub fn started(&self) -> bool {
        self.started
    }

    /// Offer one telemetry frame. Returns true when the frame was
    /// persisted.
    pub fn offer(&mut self, frame: &TelemetryFrame, current_lap: u32) -> Result<bool> {
        if !self.started {
            if frame.throttle <= 0.0 {
                return Ok(false);
            }
            self.started = true;
            info!(time = frame.time, "recording started");
        }

        let mut annotated = frame.clone();
        annotated.lap = current_lap;
        self.sink.record(&annotated)?;
        Ok(true)
    }
}
