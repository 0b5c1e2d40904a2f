//! Scripted stand-ins for the session's external collaborators
//!
//! A real deployment plugs in an evdev joystick driver and a model
//! runtime. These implementations run the same code paths without the
//! hardware: the scripted device replays axis/button state set by the
//! caller, and the constant pilot answers every prediction identically.

use std::collections::{HashMap, HashSet};

use robocar_core::device::{Axis, Button, InputDevice};
use robocar_core::error::{DeviceFault, InferenceFault};
use robocar_core::pilot::{InferencePilot, ModelInput, Prediction};

#[derive(Debug, Default)]
pub struct ScriptedDevice {
    axes: HashMap<Axis, f64>,
    buttons: HashSet<Button>,
    fail_polls: u32,
    fail_reconnect: bool,
}

impl ScriptedDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_axis(&mut self, axis: Axis, value: f64) {
        self.axes.insert(axis, value);
    }

    pub fn set_button(&mut self, button: Button, pressed: bool) {
        if pressed {
            self.buttons.insert(button);
        } else {
            self.buttons.remove(&button);
        }
    }

    /// Make the next `count` polls fail, as an unplugged device would.
    pub fn fail_next_polls(&mut self, count: u32) {
        self.fail_polls = count;
    }

    pub fn fail_reconnect(&mut self, fail: bool) {
        self.fail_reconnect = fail;
    }
}

impl InputDevice for ScriptedDevice {
    fn poll(&mut self) -> Result<(), DeviceFault> {
        if self.fail_polls > 0 {
            self.fail_polls -= 1;
            return Err(DeviceFault::Poll("scripted poll failure".into()));
        }
        Ok(())
    }

    fn reconnect(&mut self) -> Result<(), DeviceFault> {
        if self.fail_reconnect {
            return Err(DeviceFault::Reconnect("scripted reconnect failure".into()));
        }
        Ok(())
    }

    fn axis(&self, axis: Axis) -> f64 {
        self.axes.get(&axis).copied().unwrap_or(0.0)
    }

    fn pressed(&self, button: Button) -> bool {
        self.buttons.contains(&button)
    }
}

/// Fixed-output policy, useful for soak-testing the loop end to end.
#[derive(Debug)]
pub struct ConstantPilot {
    prediction: Prediction,
}

impl ConstantPilot {
    pub fn new(prediction: Prediction) -> Self {
        Self { prediction }
    }
}

impl InferencePilot for ConstantPilot {
    fn predict(&mut self, _input: ModelInput<'_>) -> Result<Prediction, InferenceFault> {
        Ok(self.prediction)
    }
}
