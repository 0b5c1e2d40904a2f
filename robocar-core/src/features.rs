//! Telemetry-to-feature pipeline
//!
//! Turns a raw telemetry frame into the fixed-order numeric vector a loaded
//! model expects, and maintains the fixed-length observation window for
//! sequence models. The column list is a property of the model
//! configuration, never hard-coded here.

use std::collections::VecDeque;

use thiserror::Error;
use tracing::warn;

use crate::model::TelemetryFrame;

/// Width of the `activeNode_*` one-hot expansion. Tracks in the reference
/// deployment never exceed 250 waypoints.
pub const NODE_ONE_HOT_WIDTH: usize = 250;

#[derive(Debug, Error, PartialEq)]
pub enum FeatureError {
    /// A declared column has no counterpart in the telemetry frame. This is
    /// a model/schema mismatch and is fatal: silently defaulting the value
    /// would corrupt training data provenance.
    #[error("declared column `{0}` is not present in telemetry")]
    MissingColumn(String),
}

/// Decoded camera frame as the model consumes it.
///
/// Pixels are stored as raw 0-255 samples; [`FeaturePipeline::scale_image`]
/// maps them to 0.0-1.0 when the model was trained on normalized input.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub pixels: Vec<f32>,
}

/// One `(image, sensor vector)` pair fed to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub image: ImageTensor,
    pub sensors: Vec<f64>,
}

/// Fixed-capacity FIFO of recent observations for sequence models.
///
/// Until the first observation arrives the window is empty; the first push
/// back-fills the whole window with copies of that observation, so the
/// model never sees a partial sequence.
#[derive(Debug)]
pub struct FeatureWindow {
    capacity: usize,
    buf: VecDeque<Observation>,
}

impl FeatureWindow {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "sequence length must be at least 1");
        Self { capacity, buf: VecDeque::with_capacity(capacity) }
    }

    pub fn push(&mut self, obs: Observation) {
        if self.buf.is_empty() {
            for _ in 1..self.capacity {
                self.buf.push_back(obs.clone());
            }
        }
        self.buf.push_back(obs);
        while self.buf.len() > self.capacity {
            self.buf.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Observations in chronological order, oldest first. Exactly
    /// `capacity` entries once anything has been pushed.
    pub fn observations(&self) -> impl Iterator<Item = &Observation> {
        self.buf.iter()
    }
}

/// Builds model inputs from telemetry frames against a declared column list.
#[derive(Debug)]
pub struct FeaturePipeline {
    columns: Vec<String>,
    normalize_images: bool,
    window: Option<FeatureWindow>,
}

impl FeaturePipeline {
    pub fn new(
        columns: Vec<String>,
        normalize_images: bool,
        sequence_length: Option<usize>,
    ) -> Self {
        Self {
            columns,
            normalize_images,
            window: sequence_length.map(FeatureWindow::new),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Resolve the declared columns against one frame.
    ///
    /// Resolution order: direct telemetry fields, then the derived
    /// lap-context family, then the `activeNode_*` one-hot family (expanded
    /// exactly once regardless of how many of its columns are declared).
    pub fn build_vector(
        &self,
        frame: &TelemetryFrame,
        current_lap: u32,
    ) -> Result<Vec<f64>, FeatureError> {
        let first_lap = current_lap == 1;
        let mut out = Vec::with_capacity(self.columns.len());
        let mut one_hot_emitted = false;

        for column in &self.columns {
            if let Some(value) = frame.numeric_field(column) {
                out.push(value);
                continue;
            }
            if column == "first_lap" {
                out.push(first_lap as u8 as f64);
                continue;
            }
            if let Some(field) = column.strip_prefix("first_lap_") {
                let value = frame
                    .numeric_field(field)
                    .ok_or_else(|| FeatureError::MissingColumn(column.clone()))?;
                out.push(if first_lap { value } else { 0.0 });
                continue;
            }
            if let Some(field) = column.strip_prefix("later_lap_") {
                let value = frame
                    .numeric_field(field)
                    .ok_or_else(|| FeatureError::MissingColumn(column.clone()))?;
                out.push(if first_lap { 0.0 } else { value });
                continue;
            }
            if column.starts_with("activeNode_") {
                if !one_hot_emitted {
                    out.extend(node_one_hot(frame.active_node));
                    one_hot_emitted = true;
                }
                continue;
            }
            return Err(FeatureError::MissingColumn(column.clone()));
        }
        Ok(out)
    }

    /// Map raw 0-255 samples into the 0.0-1.0 range the model was trained
    /// on. A no-op for models trained on unnormalized input.
    pub fn scale_image(&self, image: &mut ImageTensor) {
        if self.normalize_images {
            for px in &mut image.pixels {
                *px /= 255.0;
            }
        }
    }

    /// Record one observation; feeds the sequence window when one is
    /// configured.
    pub fn observe(&mut self, image: ImageTensor, sensors: Vec<f64>) -> Observation {
        let obs = Observation { image, sensors };
        if let Some(window) = &mut self.window {
            window.push(obs.clone());
        }
        obs
    }

    /// The sequence window, when sequence mode is enabled.
    pub fn window(&self) -> Option<&FeatureWindow> {
        self.window.as_ref()
    }
}

fn node_one_hot(active_node: usize) -> Vec<f64> {
    let mut slots = vec![0.0; NODE_ONE_HOT_WIDTH];
    match slots.get_mut(active_node) {
        Some(slot) => *slot = 1.0,
        None => warn!(
            active_node,
            width = NODE_ONE_HOT_WIDTH,
            "waypoint index outside one-hot range, emitting all zeros"
        ),
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> TelemetryFrame {
        let json = r#"{
            "time": 3.0, "steering_angle": 0.1, "throttle": 0.6, "brake": 0.0,
            "speed": 7.5, "image": "", "hit": "none",
            "activeNode": 3, "totalNodes": 50,
            "pos_x": 1.0, "pos_y": 0.0, "pos_z": -2.0,
            "vel_x": 0.0, "vel_y": 0.0, "vel_z": 0.0,
            "accel_x": 0.0, "accel_y": 0.0, "accel_z": 0.0,
            "gyro_x": 0.0, "gyro_y": 0.0, "gyro_z": 0.0,
            "pitch": 0.0, "yaw": 1.25, "roll": 0.0
        }"#;
        serde_json::from_str(json).unwrap()
    }

    fn tiny_image(fill: f32) -> ImageTensor {
        ImageTensor { width: 2, height: 2, channels: 1, pixels: vec![fill; 4] }
    }

    fn obs(fill: f32) -> Observation {
        Observation { image: tiny_image(fill), sensors: vec![fill as f64] }
    }

    #[test]
    fn test_direct_columns_copied_in_order() {
        let pipeline = FeaturePipeline::new(
            vec!["speed".into(), "yaw".into(), "pos_x".into(), "pos_z".into()],
            false,
            None,
        );
        let v = pipeline.build_vector(&frame(), 0).unwrap();
        assert_eq!(v, vec![7.5, 1.25, 1.0, -2.0]);
    }

    #[test]
    fn test_first_lap_indicator() {
        let pipeline = FeaturePipeline::new(vec!["first_lap".into()], false, None);
        assert_eq!(pipeline.build_vector(&frame(), 1).unwrap(), vec![1.0]);
        assert_eq!(pipeline.build_vector(&frame(), 2).unwrap(), vec![0.0]);
    }

    #[test]
    fn test_lap_context_gated_columns() {
        let pipeline = FeaturePipeline::new(
            vec!["first_lap_speed".into(), "later_lap_yaw".into()],
            false,
            None,
        );
        assert_eq!(pipeline.build_vector(&frame(), 1).unwrap(), vec![7.5, 0.0]);
        assert_eq!(pipeline.build_vector(&frame(), 3).unwrap(), vec![0.0, 1.25]);
    }

    #[test]
    fn test_active_node_one_hot_expands_once() {
        // Declared the way a model manifest lists them: one name per slot
        let mut columns = vec!["speed".into()];
        columns.extend((0..NODE_ONE_HOT_WIDTH).map(|i| format!("activeNode_{i}")));
        let pipeline = FeaturePipeline::new(columns, false, None);

        let v = pipeline.build_vector(&frame(), 0).unwrap();
        assert_eq!(v.len(), 1 + NODE_ONE_HOT_WIDTH);
        assert_eq!(v[1 + 3], 1.0, "slot for activeNode=3 is set");
        let set: usize = v[1..].iter().filter(|&&x| x == 1.0).count();
        assert_eq!(set, 1, "exactly one hot slot");
    }

    #[test]
    fn test_out_of_range_node_emits_no_hot_slot() {
        let v = node_one_hot(NODE_ONE_HOT_WIDTH + 5);
        assert_eq!(v.len(), NODE_ONE_HOT_WIDTH);
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_missing_column_is_surfaced() {
        let pipeline =
            FeaturePipeline::new(vec!["speed".into(), "cte".into()], false, None);
        let err = pipeline.build_vector(&frame(), 0).unwrap_err();
        assert_eq!(err, FeatureError::MissingColumn("cte".into()));
    }

    #[test]
    fn test_missing_lap_context_base_field_is_surfaced() {
        let pipeline = FeaturePipeline::new(vec!["first_lap_cte".into()], false, None);
        let err = pipeline.build_vector(&frame(), 1).unwrap_err();
        assert_eq!(err, FeatureError::MissingColumn("first_lap_cte".into()));
    }

    #[test]
    fn test_image_scaling_respects_flag() {
        let normalizing = FeaturePipeline::new(vec![], true, None);
        let mut img = tiny_image(255.0);
        normalizing.scale_image(&mut img);
        assert_eq!(img.pixels, vec![1.0; 4]);

        let raw = FeaturePipeline::new(vec![], false, None);
        let mut img = tiny_image(255.0);
        raw.scale_image(&mut img);
        assert_eq!(img.pixels, vec![255.0; 4]);
    }

    #[test]
    fn test_window_backfills_from_first_observation() {
        let mut window = FeatureWindow::new(3);
        assert!(window.is_empty());
        window.push(obs(1.0));
        let got: Vec<_> = window.observations().cloned().collect();
        assert_eq!(got, vec![obs(1.0), obs(1.0), obs(1.0)]);
    }

    #[test]
    fn test_window_slides_and_never_grows() {
        let mut window = FeatureWindow::new(3);
        window.push(obs(1.0));
        window.push(obs(2.0));
        window.push(obs(3.0));
        window.push(obs(4.0));
        assert_eq!(window.len(), 3);
        let got: Vec<_> = window.observations().cloned().collect();
        assert_eq!(got, vec![obs(2.0), obs(3.0), obs(4.0)], "latest three, oldest first");
    }

    #[test]
    fn test_pipeline_feeds_window_when_sequence_mode_enabled() {
        let mut pipeline = FeaturePipeline::new(vec![], false, Some(2));
        pipeline.observe(tiny_image(9.0), vec![]);
        assert_eq!(pipeline.window().unwrap().len(), 2);

        let stateless = FeaturePipeline::new(vec![], false, None);
        assert!(stateless.window().is_none());
    }
}
