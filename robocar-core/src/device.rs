//! Input device seam
//!
//! The concrete joystick driver lives outside this crate; the control loop
//! only consumes this trait.

use crate::error::DeviceFault;

/// Axes the manual control source reads. Normalized ranges are part of the
/// contract: steering is -1.0..1.0, the trigger axes are 0.0..1.0, and
/// reverse is 0.0..-1.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Steering,
    Throttle,
    Reverse,
    Brake,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    /// Begin driving from the paused state
    Start,
    /// Stop driving (back to paused)
    Stop,
    /// Request a scene reset
    Reset,
    /// Force maximum reverse throttle regardless of trigger position
    EmergencyReverse,
}

/// A pollable human input device.
pub trait InputDevice {
    /// Drain pending device events into the current axis/button state.
    fn poll(&mut self) -> Result<(), DeviceFault>;

    /// Re-open the device after a poll failure.
    fn reconnect(&mut self) -> Result<(), DeviceFault>;

    /// Latest normalized value for an axis; 0.0 when the device does not
    /// have it.
    fn axis(&self, axis: Axis) -> f64;

    fn pressed(&self, button: Button) -> bool;
}
