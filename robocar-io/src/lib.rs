//! Robocar I/O
//!
//! Camera payload decoding and the recording sinks that persist driving
//! sessions to disk.

pub mod decode;
pub mod recorder;
pub mod sinks;

pub use decode::{decode_frame_image, DecodedImage};
pub use recorder::Recorder;
pub use sinks::{create_sink, LapLog, RecordSink};
