//! Control sources
//!
//! The session loop asks exactly one control source for an action each
//! tick. Manual reads the human input device; Autopilot asks the loaded
//! model. Both return a plain [`Action`]; the drive controller decides
//! whether it actually reaches the wire.

use tracing::warn;

use robocar_core::config::{ControlTuning, ModelConfig};
use robocar_core::device::{Axis, Button, InputDevice};
use robocar_core::error::{DeviceFault, InferenceFault};
use robocar_core::model::Action;
use robocar_core::pilot::{InferencePilot, ModelInput, Prediction};

/// State-change request read from the human device this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlIntent {
    None,
    Start,
    Stop,
    Reset,
}

/// Joystick-driven control.
pub struct ManualSource {
    device: Box<dyn InputDevice>,
    tuning: ControlTuning,
}

impl ManualSource {
    pub fn new(device: Box<dyn InputDevice>, tuning: ControlTuning) -> Self {
        Self { device, tuning }
    }

    /// Poll the device and read any state-change intent.
    ///
    /// A poll failure gets one reconnect-and-retry; if that also fails the
    /// fault propagates and the session aborts rather than driving blind.
    pub fn poll(&mut self) -> Result<ControlIntent, DeviceFault> {
        if let Err(err) = self.device.poll() {
            warn!(%err, "input device poll failed, reconnecting");
            self.device.reconnect()?;
            self.device.poll()?;
        }

        if self.device.pressed(Button::Stop) {
            Ok(ControlIntent::Stop)
        } else if self.device.pressed(Button::Reset) {
            Ok(ControlIntent::Reset)
        } else if self.device.pressed(Button::Start) {
            Ok(ControlIntent::Start)
        } else {
            Ok(ControlIntent::None)
        }
    }

    /// Shape the current axis state into an action.
    pub fn action(&self) -> Action {
        let raw = self.device.axis(Axis::Steering);
        let steering = if raw.abs() < self.tuning.steering_deadzone {
            0.0
        } else {
            raw * self.tuning.steering_scale
        };

        // Forward trigger and reverse trigger share the throttle channel;
        // the e-brake button overrides both with full reverse.
        let throttle = if self.device.pressed(Button::EmergencyReverse) {
            -1.0
        } else {
            (self.device.axis(Axis::Throttle) + self.device.axis(Axis::Reverse))
                * self.tuning.throttle_scale
        };

        let brake = if self.tuning.use_brake_axis {
            self.device.axis(Axis::Brake)
        } else {
            0.0
        };

        Action::new(steering, throttle, brake)
    }
}

/// Model-driven control.
pub struct AutopilotSource {
    pilot: Box<dyn InferencePilot>,
    fallback_throttle: f64,
}

impl AutopilotSource {
    pub fn new(pilot: Box<dyn InferencePilot>, model: &ModelConfig) -> Self {
        Self { pilot, fallback_throttle: model.fallback_throttle }
    }

    pub fn action(&mut self, input: ModelInput<'_>) -> Result<Action, InferenceFault> {
        let action = match self.pilot.predict(input)? {
            Prediction::Steering(s) => Action::new(s, self.fallback_throttle, 0.0),
            Prediction::SteeringThrottle(s, t) => Action::new(s, t, 0.0),
            Prediction::SteeringThrottleBrake(s, t, b) => Action::new(s, t, b),
        };
        Ok(action)
    }
}

/// The session's single control seam.
pub enum ControlSource {
    Manual(ManualSource),
    Autopilot(AutopilotSource),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::{ConstantPilot, ScriptedDevice};
    use robocar_core::features::ImageTensor;

    fn manual(device: ScriptedDevice, tuning: ControlTuning) -> ManualSource {
        ManualSource::new(Box::new(device), tuning)
    }

    #[test]
    fn test_deadzone_snaps_small_steering_to_zero() {
        let mut device = ScriptedDevice::new();
        device.set_axis(Axis::Steering, 0.03);
        let source = manual(device, ControlTuning::default());
        assert_eq!(source.action().steering, 0.0);

        let mut device = ScriptedDevice::new();
        device.set_axis(Axis::Steering, 0.10);
        let source = manual(device, ControlTuning::default());
        assert_eq!(source.action().steering, 0.10);
    }

    #[test]
    fn test_throttle_combines_triggers_and_scales() {
        let mut device = ScriptedDevice::new();
        device.set_axis(Axis::Throttle, 0.8);
        device.set_axis(Axis::Reverse, -0.2);
        let tuning = ControlTuning { throttle_scale: 0.5, ..Default::default() };
        let source = manual(device, tuning);
        let action = source.action();
        assert!((action.throttle - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_emergency_reverse_overrides_triggers() {
        let mut device = ScriptedDevice::new();
        device.set_axis(Axis::Throttle, 1.0);
        device.set_button(Button::EmergencyReverse, true);
        let source = manual(device, ControlTuning::default());
        assert_eq!(source.action().throttle, -1.0);
    }

    #[test]
    fn test_brake_axis_only_read_when_enabled() {
        let mut device = ScriptedDevice::new();
        device.set_axis(Axis::Brake, 0.7);
        let source = manual(device, ControlTuning::default());
        assert_eq!(source.action().brake, 0.0);

        let mut device = ScriptedDevice::new();
        device.set_axis(Axis::Brake, 0.7);
        let tuning = ControlTuning { use_brake_axis: true, ..Default::default() };
        let source = manual(device, tuning);
        assert_eq!(source.action().brake, 0.7);
    }

    #[test]
    fn test_poll_recovers_through_one_reconnect() {
        let mut device = ScriptedDevice::new();
        device.fail_next_polls(1);
        device.set_button(Button::Start, true);
        let mut source = manual(device, ControlTuning::default());
        assert_eq!(source.poll().unwrap(), ControlIntent::Start);
    }

    #[test]
    fn test_failed_reconnect_propagates() {
        let mut device = ScriptedDevice::new();
        device.fail_next_polls(2);
        device.fail_reconnect(true);
        let mut source = manual(device, ControlTuning::default());
        assert!(source.poll().is_err());
    }

    #[test]
    fn test_stop_wins_over_other_buttons() {
        let mut device = ScriptedDevice::new();
        device.set_button(Button::Start, true);
        device.set_button(Button::Stop, true);
        let mut source = manual(device, ControlTuning::default());
        assert_eq!(source.poll().unwrap(), ControlIntent::Stop);
    }

    #[test]
    fn test_steering_only_model_gets_cruise_throttle() {
        let model = ModelConfig { fallback_throttle: 0.25, ..Default::default() };
        let mut source =
            AutopilotSource::new(Box::new(ConstantPilot::new(Prediction::Steering(-0.4))), &model);
        let image = ImageTensor { width: 1, height: 1, channels: 1, pixels: vec![0.0] };
        let action = source
            .action(ModelInput::Single { image: &image, sensors: &[] })
            .unwrap();
        assert_eq!(action, Action::new(-0.4, 0.25, 0.0));
    }

    #[test]
    fn test_three_head_model_maps_all_outputs() {
        let model = ModelConfig::default();
        let mut source = AutopilotSource::new(
            Box::new(ConstantPilot::new(Prediction::SteeringThrottleBrake(0.1, 0.6, 0.2))),
            &model,
        );
        let image = ImageTensor { width: 1, height: 1, channels: 1, pixels: vec![0.0] };
        let action = source
            .action(ModelInput::Single { image: &image, sensors: &[] })
            .unwrap();
        assert_eq!(action, Action::new(0.1, 0.6, 0.2));
    }
}
