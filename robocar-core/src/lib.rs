//! Robocar Sim Client Core Library
//!
//! Telemetry wire model, lap/progress reconstruction, and the
//! telemetry-to-feature pipeline shared by every entry point.

pub mod config;
pub mod device;
pub mod error;
pub mod features;
pub mod lap;
pub mod model;
pub mod pilot;

pub use config::{DriveMode, RecordFormat, SessionConfig};
pub use features::{FeaturePipeline, FeatureWindow, ImageTensor};
pub use lap::{LapEvent, LapTracker};
pub use model::{Action, SimMessage, TelemetryFrame};
pub use pilot::{InferencePilot, ModelInput, Prediction};
