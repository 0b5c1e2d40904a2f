//! Robocar sim driving client
//!
//! Connects to the simulator, loads a scene, and runs the session loop:
//! telemetry in, one control message out per tick, with optional dataset
//! recording along the way.

pub mod cli;
pub mod control;
pub mod controller;
pub mod demo;
pub mod session;
pub mod transport;

pub use control::{AutopilotSource, ControlSource, ManualSource};
pub use controller::{DriveController, DriveState};
pub use session::{run_session, SessionOutcome};
pub use transport::SimSocket;
