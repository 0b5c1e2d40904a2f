//! Command-line interface

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use robocar_core::config::{
    DriveMode, ImageChannels, RecordFormat, SessionConfig, TRACKS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Manual,
    Auto,
    AutoTrain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RecordArg {
    None,
    Csv,
    Tub,
    Slam,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChannelsArg {
    Mono,
    Rgb,
}

#[derive(Debug, Parser)]
#[command(name = "robocar-client", about = "Sim driving client", version)]
pub struct Args {
    /// Simulator host
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Simulator port
    #[arg(long, default_value_t = 9091)]
    pub port: u16,

    /// Track scene to load
    #[arg(long, default_value = "generated_road", value_parser = parse_track)]
    pub track: String,

    /// Who drives
    #[arg(long, value_enum, default_value_t = ModeArg::Manual)]
    pub mode: ModeArg,

    /// Recording format
    #[arg(long, value_enum, default_value_t = RecordArg::None)]
    pub record: RecordArg,

    /// Camera channel depth
    #[arg(long, value_enum, default_value_t = ChannelsArg::Mono)]
    pub channels: ChannelsArg,

    /// Append lap times to lap_times.csv
    #[arg(long)]
    pub record_laps: bool,

    /// Root directory for recorded data
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Identifier of the loaded driving model
    #[arg(long)]
    pub model_id: Option<String>,

    /// Observation window length for sequence models
    #[arg(long, value_parser = parse_sequence_length)]
    pub sequence_length: Option<usize>,

    /// Seconds before an autonomous session starts driving
    #[arg(long, default_value_t = 3.0)]
    pub start_delay: f64,

    /// Sim seconds after which a stuck auto-training lap resets the scene
    #[arg(long, default_value_t = 60.0)]
    pub auto_timeout: f64,

    /// Read a separate brake axis from the input device
    #[arg(long)]
    pub brake_axis: bool,
}

fn parse_sequence_length(raw: &str) -> Result<usize, String> {
    let n: usize = raw.parse().map_err(|_| format!("`{raw}` is not a number"))?;
    if n == 0 {
        return Err("sequence length must be at least 1".to_string());
    }
    Ok(n)
}

fn parse_track(raw: &str) -> Result<String, String> {
    if TRACKS.contains(&raw) {
        Ok(raw.to_string())
    } else {
        Err(format!("unknown track `{raw}`; known tracks: {}", TRACKS.join(", ")))
    }
}

impl Args {
    pub fn to_config(&self) -> SessionConfig {
        let mut cfg = SessionConfig::default();
        cfg.host = self.host.clone();
        cfg.port = self.port;
        cfg.track = self.track.clone();
        cfg.drive_mode = match self.mode {
            ModeArg::Manual => DriveMode::Manual,
            ModeArg::Auto => DriveMode::Auto,
            ModeArg::AutoTrain => DriveMode::AutoTrain,
        };
        cfg.record_format = match self.record {
            RecordArg::None => RecordFormat::None,
            RecordArg::Csv => RecordFormat::Csv,
            RecordArg::Tub => RecordFormat::Tub,
            RecordArg::Slam => RecordFormat::Slam,
        };
        cfg.image_channels = match self.channels {
            ChannelsArg::Mono => ImageChannels::Mono,
            ChannelsArg::Rgb => ImageChannels::Rgb,
        };
        cfg.record_laps = self.record_laps;
        cfg.data_dir = self.data_dir.clone();
        cfg.model.model_id = self.model_id.clone();
        cfg.model.sequence_length = self.sequence_length;
        cfg.start_delay = Duration::from_secs_f64(self.start_delay);
        cfg.auto_timeout_secs = self.auto_timeout;
        cfg.tuning.use_brake_axis = self.brake_axis;
        cfg
    }
}
