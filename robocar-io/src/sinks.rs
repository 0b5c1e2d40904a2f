//! Recording sink implementations
//!
//! Sinks persist annotated telemetry frames in one of three on-disk
//! formats: tabular CSV for training pipelines, the tub layout consumed by
//! the Donkey training tools, and the EuRoC/ASL dataset tree consumed by
//! SLAM tooling. All sinks share the `RecordSink` contract and the
//! dispatcher stays agnostic to which one is wired in.

use std::fs::{self, File};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use chrono::Local;
use serde_json::json;

use robocar_core::config::{ImageChannels, RecordFormat};
use robocar_core::model::TelemetryFrame;

use crate::decode::decode_frame_image;

/// Trait for recording sinks. One call per persisted frame; the frame
/// arrives already annotated with its lap number.
pub trait RecordSink: Send {
    fn record(&mut self, frame: &TelemetryFrame) -> Result<()>;
}

/// Create a sink for the configured format, or `None` when recording is
/// disabled.
pub fn create_sink(
    format: RecordFormat,
    data_dir: &Path,
    channels: ImageChannels,
) -> Result<Option<Box<dyn RecordSink>>> {
    match format {
        RecordFormat::None => Ok(None),
        RecordFormat::Csv => Ok(Some(Box::new(CsvSink::new(data_dir, channels)?))),
        RecordFormat::Tub => Ok(Some(Box::new(TubSink::new(data_dir, channels)?))),
        RecordFormat::Slam => Ok(Some(Box::new(SlamSink::new(data_dir, channels)?))),
    }
}

/// Per-session timestamped directory, shared by the CSV and tub sinks.
fn session_dir(data_dir: &Path) -> PathBuf {
    data_dir.join(Local::now().format("%m_%d_%Y/%H_%M_%S").to_string())
}

// =============================================================================
// CSV sink
// =============================================================================

const CSV_COLUMNS: &[&str] = &[
    "steering_angle",
    "throttle",
    "brake",
    "speed",
    "image",
    "hit",
    "time",
    "accel_x",
    "accel_y",
    "accel_z",
    "gyro_x",
    "gyro_y",
    "gyro_z",
    "pitch",
    "yaw",
    "roll",
    "activeNode",
    "totalNodes",
    "pos_x",
    "pos_y",
    "pos_z",
    "vel_x",
    "vel_y",
    "vel_z",
    "lap",
];

/// One CSV row plus one PNG per frame, under a timestamped session dir.
pub struct CsvSink {
    writer: csv::Writer<File>,
    img_dir: PathBuf,
    channels: ImageChannels,
}

impl CsvSink {
    pub fn new(data_dir: &Path, channels: ImageChannels) -> Result<Self> {
        let dir = session_dir(data_dir);
        let img_dir = dir.join("images");
        fs::create_dir_all(&img_dir)
            .with_context(|| format!("creating session dir {}", dir.display()))?;

        let mut writer = csv::Writer::from_path(dir.join("data.csv"))?;
        writer.write_record(CSV_COLUMNS)?;
        writer.flush()?;

        Ok(Self { writer, img_dir, channels })
    }
}

impl RecordSink for CsvSink {
    fn record(&mut self, frame: &TelemetryFrame) -> Result<()> {
        let image_name = format!("{}.png", frame.time);
        decode_frame_image(&frame.image, self.channels)?
            .save_png(&self.img_dir.join(&image_name))?;

        let total_nodes = frame
            .total_nodes
            .map(|n| n.to_string())
            .unwrap_or_default();
        self.writer.write_record([
            frame.steering_angle.to_string(),
            frame.throttle.to_string(),
            frame.brake.to_string(),
            frame.speed.to_string(),
            image_name,
            frame.hit.as_str().to_string(),
            frame.time.to_string(),
            frame.accel_x.to_string(),
            frame.accel_y.to_string(),
            frame.accel_z.to_string(),
            frame.gyro_x.to_string(),
            frame.gyro_y.to_string(),
            frame.gyro_z.to_string(),
            frame.pitch.to_string(),
            frame.yaw.to_string(),
            frame.roll.to_string(),
            frame.active_node.to_string(),
            total_nodes,
            frame.pos_x.to_string(),
            frame.pos_y.to_string(),
            frame.pos_z.to_string(),
            frame.vel_x.to_string(),
            frame.vel_y.to_string(),
            frame.vel_z.to_string(),
            frame.lap.to_string(),
        ])?;
        self.writer.flush()?;
        Ok(())
    }
}

// =============================================================================
// Tub sink (Donkey training layout)
// =============================================================================

/// One JSON record plus one PNG per frame, with a `meta.json` describing
/// the record schema.
pub struct TubSink {
    data_dir: PathBuf,
    img_dir: PathBuf,
    channels: ImageChannels,
    record_count: u32,
    started: Instant,
}

impl TubSink {
    pub fn new(data_dir: &Path, channels: ImageChannels) -> Result<Self> {
        let dir = session_dir(data_dir);
        let tub_data = dir.join("tub_data");
        let img_dir = dir.join("images");
        fs::create_dir_all(&tub_data)?;
        fs::create_dir_all(&img_dir)?;

        let meta = json!({
            "inputs": ["cam/image_array", "user/angle", "user/throttle", "user/mode"],
            "types": ["image_array", "float", "float", "str"],
            "start": Local::now().timestamp().to_string(),
        });
        fs::write(dir.join("meta.json"), serde_json::to_string(&meta)?)?;

        Ok(Self {
            data_dir: tub_data,
            img_dir,
            channels,
            record_count: 0,
            started: Instant::now(),
        })
    }
}

impl RecordSink for TubSink {
    fn record(&mut self, frame: &TelemetryFrame) -> Result<()> {
        let image_name = format!("frame_{:04}.png", self.record_count);
        decode_frame_image(&frame.image, self.channels)?
            .save_png(&self.img_dir.join(&image_name))?;

        let record = json!({
            "cam/image_array": image_name,
            "user/angle": frame.steering_angle,
            "user/throttle": frame.throttle,
            "user/mode": "user",
            "milliseconds": self.started.elapsed().as_millis() as u64,
            "lap": frame.lap,
        });
        let path = self
            .data_dir
            .join(format!("record_{:04}.json", self.record_count));
        fs::write(path, serde_json::to_string(&record)?)?;
        self.record_count += 1;
        Ok(())
    }
}

// =============================================================================
// SLAM dataset sink (EuRoC/ASL tree)
// =============================================================================

/// Camera and inertial time series keyed by nanosecond timestamps:
///
/// ```text
/// DSnn/mav0/cam0/data.csv      #timestamp [ns], filename
/// DSnn/mav0/cam0/data/<ns>.png
/// DSnn/mav0/imu0/data.csv      #timestamp [ns], gyro xyz, accel xyz
/// ```
pub struct SlamSink {
    img_dir: PathBuf,
    cam_csv: csv::Writer<File>,
    imu_csv: csv::Writer<File>,
    channels: ImageChannels,
}

impl SlamSink {
    pub fn new(data_dir: &Path, channels: ImageChannels) -> Result<Self> {
        let asl_root = data_dir.join("asl");
        // Next free dataset number
        let mut ds_num = 1;
        let dir = loop {
            let candidate = asl_root.join(format!("DS{ds_num:02}"));
            if !candidate.is_dir() {
                break candidate;
            }
            ds_num += 1;
        };
        let cam_dir = dir.join("mav0/cam0");
        let imu_dir = dir.join("mav0/imu0");
        let img_dir = cam_dir.join("data");
        fs::create_dir_all(&img_dir)?;
        fs::create_dir_all(&imu_dir)?;

        let mut cam_csv = csv::Writer::from_path(cam_dir.join("data.csv"))?;
        cam_csv.write_record(["#timestamp [ns]", "filename"])?;
        cam_csv.flush()?;

        let mut imu_csv = csv::Writer::from_path(imu_dir.join("data.csv"))?;
        imu_csv.write_record([
            "#timestamp [ns]",
            "w_RS_S_x [rad s^-1]",
            "w_RS_S_y [rad s^-1]",
            "w_RS_S_z [rad s^-1]",
            "a_RS_S_x [m s^-2]",
            "a_RS_S_y [m s^-2]",
            "a_RS_S_z [m s^-2]",
        ])?;
        imu_csv.flush()?;

        Ok(Self { img_dir, cam_csv, imu_csv, channels })
    }
}

impl RecordSink for SlamSink {
    fn record(&mut self, frame: &TelemetryFrame) -> Result<()> {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("system clock before unix epoch")?
            .as_nanos()
            .to_string();

        let image_name = format!("{stamp}.png");
        decode_frame_image(&frame.image, self.channels)?
            .save_png(&self.img_dir.join(&image_name))?;

        self.cam_csv.write_record([stamp.as_str(), image_name.as_str()])?;
        self.cam_csv.flush()?;

        self.imu_csv.write_record([
            stamp.clone(),
            frame.gyro_x.to_string(),
            frame.gyro_y.to_string(),
            frame.gyro_z.to_string(),
            frame.accel_x.to_string(),
            frame.accel_y.to_string(),
            frame.accel_z.to_string(),
        ])?;
        self.imu_csv.flush()?;
        Ok(())
    }
}

// =============================================================================
// Lap time log
// =============================================================================

/// Appends one row per lap boundary crossing, independent of the frame
/// sinks. Every crossing is logged, incomplete laps included; `lap_time`
/// is empty when the lap had no measurable time. Used to line recorded
/// data up against lap boundaries.
pub struct LapLog {
    file: File,
}

impl LapLog {
    pub fn new(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)?;
        let path = data_dir.join("lap_times.csv");
        let exists = path.exists();
        let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
        if !exists {
            writeln!(file, "lap,timestamp,lap_time")?;
        }
        Ok(Self { file })
    }

    /// `lap` is the lap the car is now on, `time_stamp` the crossing's sim
    /// time, `lap_time` the duration of the lap that just ended.
    pub fn record(&mut self, lap: u32, time_stamp: f64, lap_time: Option<f64>) -> Result<()> {
        match lap_time {
            Some(t) => writeln!(self.file, "{lap},{time_stamp},{t}")?,
            None => writeln!(self.file, "{lap},{time_stamp},")?,
        }
        Ok(())
    }
}
