//! Fault taxonomy for the session control loop
//!
//! Propagation policy: transport and inference faults end the session;
//! device faults get one reconnect attempt before aborting; lap timeouts
//! and collisions in auto-training reset the scene rather than exiting.

use std::time::Duration;

use thiserror::Error;

use crate::model::Hit;

/// Send/receive failure on the simulator socket. Fatal to the session.
#[derive(Debug, Error)]
pub enum TransportFault {
    #[error("connection closed by simulator")]
    Closed,
    #[error("no message within {0:?}")]
    RecvTimeout(Duration),
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Input device failure. Recovered with one reconnect; a second failure
/// aborts the session.
#[derive(Debug, Error)]
pub enum DeviceFault {
    #[error("input device poll failed: {0}")]
    Poll(String),
    #[error("input device reconnect failed: {0}")]
    Reconnect(String),
}

/// Model call failure. Fatal to the session: a policy that cannot predict
/// must not keep sending stale commands.
#[derive(Debug, Error)]
pub enum InferenceFault {
    #[error("model inference failed: {0}")]
    Predict(String),
}

/// Auto-training faults that trigger a scene reset, not a process exit.
#[derive(Debug, Error)]
pub enum SessionFault {
    #[error("lap exceeded {timeout_secs:.0}s during auto-training")]
    LapTimeout { timeout_secs: f64 },
    #[error("collision with `{}` during auto-training", .0.as_str())]
    Collision(Hit),
}
