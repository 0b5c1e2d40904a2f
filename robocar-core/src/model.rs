//! Simulator wire model
//!
//! Defines the telemetry frame as the simulator sends it, the inbound
//! message envelope, and the outbound message builders.
//!
//! Wire compatibility note: the simulator expects every numeric field of an
//! outbound message as its *string* representation, not a native JSON
//! number. All builders here preserve that contract.

use serde::{Deserialize, Serialize};
use serde_json::json;

/// One simulator tick, with the field names the sim uses on the wire.
///
/// Fields the sim occasionally omits (older scene builds) default to zero
/// rather than failing the whole packet. The `lap` field is never sent by
/// the simulator; the lap tracker assigns it before a frame is recorded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryFrame {
    /// Simulator clock, seconds
    #[serde(default)]
    pub time: f64,

    #[serde(default)]
    pub steering_angle: f64,
    #[serde(default)]
    pub throttle: f64,
    #[serde(default)]
    pub brake: f64,
    #[serde(default)]
    pub speed: f64,

    /// Base64-encoded compressed camera frame, exactly as received
    #[serde(default)]
    pub image: String,

    /// Collision state for this tick
    #[serde(default)]
    pub hit: Hit,

    /// Waypoint index the car is currently on
    #[serde(rename = "activeNode", default)]
    pub active_node: usize,

    /// Waypoint count for the loaded track; absent until the scene reports it
    #[serde(rename = "totalNodes", default)]
    pub total_nodes: Option<usize>,

    #[serde(default)]
    pub pos_x: f64,
    #[serde(default)]
    pub pos_y: f64,
    #[serde(default)]
    pub pos_z: f64,

    #[serde(default)]
    pub vel_x: f64,
    #[serde(default)]
    pub vel_y: f64,
    #[serde(default)]
    pub vel_z: f64,

    #[serde(default)]
    pub accel_x: f64,
    #[serde(default)]
    pub accel_y: f64,
    #[serde(default)]
    pub accel_z: f64,

    #[serde(default)]
    pub gyro_x: f64,
    #[serde(default)]
    pub gyro_y: f64,
    #[serde(default)]
    pub gyro_z: f64,

    #[serde(default)]
    pub pitch: f64,
    #[serde(default)]
    pub yaw: f64,
    #[serde(default)]
    pub roll: f64,

    /// Assigned by the lap tracker before recording; the sim never sends it
    #[serde(default, skip_deserializing)]
    pub lap: u32,
}

impl TelemetryFrame {
    /// Look up a telemetry field by its wire name.
    ///
    /// Returns `None` for names that are not numeric telemetry fields;
    /// the feature pipeline surfaces that as a missing-column error.
    pub fn numeric_field(&self, name: &str) -> Option<f64> {
        let v = match name {
            "time" => self.time,
            "steering_angle" => self.steering_angle,
            "throttle" => self.throttle,
            "brake" => self.brake,
            "speed" => self.speed,
            "activeNode" => self.active_node as f64,
            "totalNodes" => self.total_nodes? as f64,
            "pos_x" => self.pos_x,
            "pos_y" => self.pos_y,
            "pos_z" => self.pos_z,
            "vel_x" => self.vel_x,
            "vel_y" => self.vel_y,
            "vel_z" => self.vel_z,
            "accel_x" => self.accel_x,
            "accel_y" => self.accel_y,
            "accel_z" => self.accel_z,
            "gyro_x" => self.gyro_x,
            "gyro_y" => self.gyro_y,
            "gyro_z" => self.gyro_z,
            "pitch" => self.pitch,
            "yaw" => self.yaw,
            "roll" => self.roll,
            "lap" => self.lap as f64,
            _ => return None,
        };
        Some(v)
    }
}

/// Collision classification reported by the simulator.
///
/// The sim sends the name of the object that was struck as a free-form
/// string, with `"none"` meaning no contact.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Hit {
    #[default]
    None,
    Wall,
    Car,
    Other(String),
}

impl Hit {
    pub fn is_none(&self) -> bool {
        matches!(self, Hit::None)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Hit::None => "none",
            Hit::Wall => "wall",
            Hit::Car => "car",
            Hit::Other(s) => s,
        }
    }
}

impl From<&str> for Hit {
    fn from(raw: &str) -> Self {
        let lower = raw.to_lowercase();
        if lower == "none" || lower.is_empty() {
            Hit::None
        } else if lower.contains("wall") {
            Hit::Wall
        } else if lower.contains("car") {
            Hit::Car
        } else {
            Hit::Other(raw.to_string())
        }
    }
}

impl Serialize for Hit {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Hit {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        Ok(Hit::from(raw.as_str()))
    }
}

/// Inbound message envelope, discriminated by `msg_type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "msg_type", rename_all = "snake_case")]
pub enum SimMessage {
    NeedCarConfig,
    CarLoaded,
    CollisionWithStartingLine {
        #[serde(rename = "timeStamp", default)]
        time_stamp: f64,
    },
    Telemetry(TelemetryFrame),
    /// Message types this client does not consume (scene selection menus,
    /// cross-track pings). Kept so an unrecognized type never kills a session.
    #[serde(other)]
    Unknown,
}

/// Final (steering, throttle, brake) output for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Action {
    pub steering: f64,
    pub throttle: f64,
    pub brake: f64,
}

impl Action {
    pub fn new(steering: f64, throttle: f64, brake: f64) -> Self {
        Self { steering, throttle, brake }
    }

    /// The output while paused or faulted: no steering, no throttle, full brake.
    pub fn safe() -> Self {
        Self { steering: 0.0, throttle: 0.0, brake: 1.0 }
    }
}

/// Build the per-tick control message.
pub fn control_message(action: &Action) -> String {
    json!({
        "msg_type": "control",
        "steering": action.steering.to_string(),
        "throttle": action.throttle.to_string(),
        "brake": action.brake.to_string(),
    })
    .to_string()
}

pub fn load_scene_message(scene_name: &str) -> String {
    json!({
        "msg_type": "load_scene",
        "scene_name": scene_name,
    })
    .to_string()
}

pub fn exit_scene_message() -> String {
    json!({ "msg_type": "exit_scene" }).to_string()
}

/// Build a flat configuration message with every value stringified,
/// which is the only shape the sim's config parser accepts.
pub fn flat_config_message(msg_type: &str, fields: &[(&str, String)]) -> String {
    let mut map = serde_json::Map::new();
    map.insert(
        "msg_type".to_string(),
        serde_json::Value::String(msg_type.to_string()),
    );
    for (key, value) in fields {
        map.insert(
            key.to_string(),
            serde_json::Value::String(value.clone()),
        );
    }
    serde_json::Value::Object(map).to_string()
}
