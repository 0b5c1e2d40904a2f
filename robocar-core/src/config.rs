//! Session configuration
//!
//! One immutable struct built at startup and passed by reference into each
//! component. Replaces the historical module-level mutable tables.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::flat_config_message;

/// Track scene names the simulator knows how to load.
pub const TRACKS: &[&str] = &[
    "generated_road",
    "warehouse",
    "sparkfun_avc",
    "generated_track",
    "roboracingleague_1",
    "waveshare",
    "mini_monaco",
    "warren",
    "circuit_launch",
    "mountain_track",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveMode {
    /// Human joystick control
    Manual,
    /// Learned policy drives; no fault-triggered resets
    Auto,
    /// Learned policy drives while collecting training data; lap timeouts
    /// and collisions reset the scene
    AutoTrain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFormat {
    None,
    /// One CSV row plus one image per frame
    Csv,
    /// Donkey-style tub: one JSON record plus one image per frame
    Tub,
    /// EuRoC/ASL dataset tree for SLAM tooling
    Slam,
}

/// Camera channel depth requested from the sim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageChannels {
    Mono,
    Rgb,
}

impl ImageChannels {
    pub fn count(self) -> u8 {
        match self {
            ImageChannels::Mono => 1,
            ImageChannels::Rgb => 3,
        }
    }
}

/// Properties of the loaded inference model. The column list and image
/// normalization are facts about how the model was trained, recorded in
/// its manifest; they are never inferred at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_id: Option<String>,
    /// Ordered telemetry columns the model expects
    pub columns: Vec<String>,
    /// Window length for sequence models
    pub sequence_length: Option<usize>,
    /// Divide image samples into 0.0-1.0 before inference
    pub normalize_images: bool,
    /// Cruise throttle used when the model predicts steering only
    pub fallback_throttle: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_id: None,
            columns: vec!["speed".into(), "yaw".into(), "pos_x".into(), "pos_z".into()],
            sequence_length: None,
            normalize_images: true,
            fallback_throttle: 0.3,
        }
    }
}

/// Manual control shaping.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ControlTuning {
    /// Absolute steering below this snaps to exactly zero, so analog drift
    /// never jitters the command stream
    pub steering_deadzone: f64,
    pub steering_scale: f64,
    pub throttle_scale: f64,
    /// Read a separate brake axis and send it with the control message
    pub use_brake_axis: bool,
}

impl Default for ControlTuning {
    fn default() -> Self {
        Self {
            steering_deadzone: 0.05,
            steering_scale: 1.0,
            throttle_scale: 1.0,
            use_brake_axis: false,
        }
    }
}

/// Car body appearance sent in `car_config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarStyle {
    pub body_style: String,
    pub body_r: u8,
    pub body_g: u8,
    pub body_b: u8,
    pub car_name: String,
    pub font_size: u8,
}

impl Default for CarStyle {
    fn default() -> Self {
        Self {
            body_style: "donkey".into(),
            body_r: 255,
            body_g: 72,
            body_b: 0,
            car_name: String::new(),
            font_size: 10,
        }
    }
}

impl CarStyle {
    pub fn to_message(&self) -> String {
        flat_config_message(
            "car_config",
            &[
                ("body_style", self.body_style.clone()),
                ("body_r", self.body_r.to_string()),
                ("body_g", self.body_g.to_string()),
                ("body_b", self.body_b.to_string()),
                ("car_name", self.car_name.clone()),
                ("font_size", self.font_size.to_string()),
            ],
        )
    }
}

/// Camera placement and encoding sent in `cam_config`. Zero fields keep
/// the sim's default for that setting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraSetup {
    pub fov: u16,
    pub fish_eye_x: f64,
    pub fish_eye_y: f64,
    pub img_w: u16,
    pub img_h: u16,
    pub img_d: u8,
    pub img_enc: String,
    pub offset_x: f64,
    pub offset_y: f64,
    pub offset_z: f64,
    pub rot_x: f64,
}

impl Default for CameraSetup {
    fn default() -> Self {
        Self {
            fov: 0,
            fish_eye_x: 0.0,
            fish_eye_y: 0.0,
            img_w: 64,
            img_h: 64,
            img_d: 1,
            img_enc: "PNG".into(),
            offset_x: 0.0,
            offset_y: 0.0,
            offset_z: 0.0,
            rot_x: 0.0,
        }
    }
}

impl CameraSetup {
    pub fn to_message(&self) -> String {
        flat_config_message(
            "cam_config",
            &[
                ("fov", self.fov.to_string()),
                ("fish_eye_x", self.fish_eye_x.to_string()),
                ("fish_eye_y", self.fish_eye_y.to_string()),
                ("img_w", self.img_w.to_string()),
                ("img_h", self.img_h.to_string()),
                ("img_d", self.img_d.to_string()),
                ("img_enc", self.img_enc.clone()),
                ("offset_x", self.offset_x.to_string()),
                ("offset_y", self.offset_y.to_string()),
                ("offset_z", self.offset_z.to_string()),
                ("rot_x", self.rot_x.to_string()),
            ],
        )
    }
}

/// Racer identity sent in `racer_info` (shown on the shared race server).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RacerInfo {
    pub racer_name: String,
    pub car_name: String,
    pub bio: String,
    pub country: String,
    pub guid: String,
}

impl Default for RacerInfo {
    fn default() -> Self {
        Self {
            racer_name: "robocar".into(),
            car_name: "robocar".into(),
            bio: "custom client".into(),
            country: "California".into(),
            guid: String::new(),
        }
    }
}

impl RacerInfo {
    pub fn to_message(&self) -> String {
        flat_config_message(
            "racer_info",
            &[
                ("racer_name", self.racer_name.clone()),
                ("car_name", self.car_name.clone()),
                ("bio", self.bio.clone()),
                ("country", self.country.clone()),
                ("guid", self.guid.clone()),
            ],
        )
    }
}

/// Everything a session needs, constructed once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub track: String,
    pub drive_mode: DriveMode,
    pub record_format: RecordFormat,
    pub image_channels: ImageChannels,
    pub record_laps: bool,
    pub data_dir: PathBuf,

    pub model: ModelConfig,
    pub tuning: ControlTuning,

    /// Grace period before an auto-training session starts driving
    pub start_delay: Duration,
    /// Lap time (sim seconds) after which an auto-training lap is declared
    /// stuck and the scene is reset
    pub auto_timeout_secs: f64,
    /// Bound on one transport receive; a miss is a transport fault
    pub recv_timeout: Duration,

    pub car: CarStyle,
    pub camera: CameraSetup,
    pub racer: RacerInfo,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 9091,
            track: TRACKS[0].into(),
            drive_mode: DriveMode::Manual,
            record_format: RecordFormat::None,
            image_channels: ImageChannels::Mono,
            record_laps: false,
            data_dir: PathBuf::from("data"),
            model: ModelConfig::default(),
            tuning: ControlTuning::default(),
            start_delay: Duration::from_secs(3),
            auto_timeout_secs: 60.0,
            recv_timeout: Duration::from_secs(5),
            car: CarStyle::default(),
            camera: CameraSetup::default(),
            racer: RacerInfo::default(),
        }
    }
}

impl SessionConfig {
    /// Only tear down the scene on exit when the sim is local; on a shared
    /// race server the scene belongs to everyone.
    pub fn is_local_host(&self) -> bool {
        matches!(self.host.as_str(), "127.0.0.1" | "localhost" | "::1")
    }
}
