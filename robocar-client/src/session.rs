//! Session control loop
//!
//! Owns one connection to the simulator from scene load to teardown.
//! Every telemetry tick produces exactly one control message: the active
//! control source proposes an action and the drive controller decides
//! whether it reaches the wire or is replaced by the safe action.

use anyhow::{Context, Result};
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use robocar_core::config::{DriveMode, SessionConfig};
use robocar_core::error::{SessionFault, TransportFault};
use robocar_core::features::FeaturePipeline;
use robocar_core::lap::LapTracker;
use robocar_core::model::{
    control_message, exit_scene_message, load_scene_message, Action, SimMessage, TelemetryFrame,
};
use robocar_core::pilot::ModelInput;
use robocar_io::decode::decode_frame_image;
use robocar_io::recorder::Recorder;
use robocar_io::sinks::{create_sink, LapLog};

use crate::control::{ControlIntent, ControlSource};
use crate::controller::{DriveController, DriveState};
use crate::transport::SimSocket;

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Clean shutdown; the process should exit.
    Finished,
    /// A reset was requested or the connection died mid-training; the
    /// caller should tear down and run a fresh session.
    Restart,
}

pub async fn run_session(
    cfg: &SessionConfig,
    source: &mut ControlSource,
) -> Result<SessionOutcome> {
    let mut socket = SimSocket::connect(&cfg.host, cfg.port, cfg.recv_timeout)
        .await
        .context("connecting to simulator")?;

    socket.send(&load_scene_message(&cfg.track)).await?;
    info!(track = %cfg.track, "scene load requested");
    wait_for_car(&mut socket, cfg).await?;

    let mut session = Session::new(cfg)?;
    let outcome = session.run(cfg, source, &mut socket).await;

    // On a shared race server the scene belongs to everyone; only tear it
    // down when the sim is ours.
    if cfg.is_local_host() {
        if let Err(err) = socket.send(&exit_scene_message()).await {
            debug!(%err, "exit_scene send failed during teardown");
        }
    }
    outcome
}

/// Drain the handshake: answer config requests until the car is in the
/// scene.
async fn wait_for_car(socket: &mut SimSocket, cfg: &SessionConfig) -> Result<()> {
    loop {
        match socket.recv().await? {
            SimMessage::NeedCarConfig => {
                send_car_configs(socket, cfg).await?;
            }
            SimMessage::CarLoaded => {
                info!("car loaded");
                return Ok(());
            }
            other => debug!(msg = ?other, "ignored during scene load"),
        }
    }
}

/// The sim applies config messages asynchronously; pacing them out keeps
/// it from dropping any.
async fn send_car_configs(socket: &mut SimSocket, cfg: &SessionConfig) -> Result<()> {
    for message in [
        cfg.racer.to_message(),
        cfg.car.to_message(),
        cfg.camera.to_message(),
    ] {
        socket.send(&message).await?;
        sleep(Duration::from_millis(200)).await;
    }
    info!("car configuration sent");
    Ok(())
}

/// Per-session state that lives across telemetry ticks.
struct Session {
    controller: DriveController,
    tracker: LapTracker,
    pipeline: FeaturePipeline,
    recorder: Option<Recorder>,
    lap_log: Option<LapLog>,
    /// Brake input read this tick; telemetry for the current tick was
    /// captured before this input existed, so it lands in the next
    /// recorded frame
    pending_brake: Option<f64>,
}

impl Session {
    fn new(cfg: &SessionConfig) -> Result<Self> {
        let recorder = create_sink(cfg.record_format, &cfg.data_dir, cfg.image_channels)?
            .map(Recorder::new);
        let lap_log = if cfg.record_laps {
            Some(LapLog::new(&cfg.data_dir)?)
        } else {
            None
        };
        Ok(Self {
            controller: DriveController::new(cfg.drive_mode, cfg.start_delay),
            tracker: LapTracker::new(),
            pipeline: FeaturePipeline::new(
                cfg.model.columns.clone(),
                cfg.model.normalize_images,
                cfg.model.sequence_length,
            ),
            recorder,
            lap_log,
            pending_brake: None,
        })
    }

    async fn run(
        &mut self,
        cfg: &SessionConfig,
        source: &mut ControlSource,
        socket: &mut SimSocket,
    ) -> Result<SessionOutcome> {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            let message = tokio::select! {
                msg = socket.recv() => msg,
                _ = &mut ctrl_c => {
                    info!("interrupt received, ending session");
                    self.controller.abort();
                    return Ok(SessionOutcome::Finished);
                }
            };

            let message = match message {
                Ok(message) => message,
                Err(err @ (TransportFault::RecvTimeout(_) | TransportFault::Closed))
                    if cfg.drive_mode == DriveMode::AutoTrain =>
                {
                    // Unattended training rides through sim restarts
                    warn!(%err, "transport fault during auto-training, reconnecting");
                    return Ok(SessionOutcome::Restart);
                }
                Err(err) => return Err(err.into()),
            };

            match message {
                SimMessage::Telemetry(frame) => {
                    self.on_telemetry(cfg, source, socket, frame).await?;
                    if self.controller.aborted() {
                        return Ok(SessionOutcome::Finished);
                    }
                    if self.controller.take_reset_request() {
                        info!("session reset requested, tearing down");
                        return Ok(SessionOutcome::Restart);
                    }
                }
                SimMessage::CollisionWithStartingLine { time_stamp } => {
                    self.tracker.on_finish_line(time_stamp);
                }
                SimMessage::NeedCarConfig => send_car_configs(socket, cfg).await?,
                SimMessage::CarLoaded => debug!("duplicate car_loaded ignored"),
                SimMessage::Unknown => {}
            }
        }
    }

    async fn on_telemetry(
        &mut self,
        cfg: &SessionConfig,
        source: &mut ControlSource,
        socket: &mut SimSocket,
        mut frame: TelemetryFrame,
    ) -> Result<()> {
        // Lap state first: everything downstream reads the updated lap
        if let Some(event) = self.tracker.on_frame(frame.active_node, frame.total_nodes, frame.time)
        {
            // Every crossing is logged, incomplete laps included
            if let Some(log) = &mut self.lap_log {
                log.record(self.tracker.current_lap(), frame.time, event.time)?;
            }
            self.log_pace();
        }

        if self.controller.tick_auto_start() {
            self.tracker.arm(frame.time);
        }

        self.check_session_faults(cfg, &frame);

        // An aborted tick produces no action and nothing goes on the wire
        let Some(action) = self.propose_action(cfg, source, &frame)? else {
            return Ok(());
        };
        let action = self.controller.compose(action);
        socket.send(&control_message(&action)).await?;

        if let Some(brake) = self.pending_brake.take() {
            frame.brake = brake;
        }
        if cfg.tuning.use_brake_axis {
            self.pending_brake = Some(action.brake);
        }

        if let Some(recorder) = &mut self.recorder {
            if let Err(err) = recorder.offer(&frame, self.tracker.current_lap()) {
                // Lost frames degrade the dataset but never the drive
                warn!(%err, "failed to record frame");
            }
        }
        Ok(())
    }

    /// Lap-timeout and collision policy. Only auto-training resets the
    /// scene; manual and plain auto leave faults to the human watching.
    fn check_session_faults(&mut self, cfg: &SessionConfig, frame: &TelemetryFrame) {
        if cfg.drive_mode != DriveMode::AutoTrain
            || self.controller.state() != DriveState::Driving
        {
            return;
        }
        if let Some(elapsed) = self.tracker.lap_elapsed(frame.time) {
            if elapsed > cfg.auto_timeout_secs {
                self.controller.fault(&SessionFault::LapTimeout {
                    timeout_secs: cfg.auto_timeout_secs,
                });
                return;
            }
        }
        if !frame.hit.is_none() {
            self.controller
                .fault(&SessionFault::Collision(frame.hit.clone()));
        }
    }

    /// Ask the active control source for this tick's action.
    ///
    /// `None` means the session aborted this tick; no control message may
    /// follow.
    fn propose_action(
        &mut self,
        cfg: &SessionConfig,
        source: &mut ControlSource,
        frame: &TelemetryFrame,
    ) -> Result<Option<Action>> {
        match source {
            ControlSource::Manual(manual) => {
                match manual.poll() {
                    Ok(ControlIntent::None) => {}
                    Ok(intent) => self.controller.apply_intent(intent),
                    Err(err) => {
                        // Driving blind is worse than stopping
                        error!(%err, "input device lost, aborting session");
                        self.controller.abort();
                        return Ok(None);
                    }
                }
                Ok(Some(manual.action()))
            }
            ControlSource::Autopilot(pilot) => {
                if self.controller.state() != DriveState::Driving {
                    return Ok(Some(Action::safe()));
                }
                if frame.image.is_empty() {
                    debug!("no camera frame yet, holding safe action");
                    return Ok(Some(Action::safe()));
                }

                let decoded = decode_frame_image(&frame.image, cfg.image_channels)?;
                let mut image = decoded.to_tensor();
                self.pipeline.scale_image(&mut image);
                let sensors = self
                    .pipeline
                    .build_vector(frame, self.tracker.current_lap())?;
                let obs = self.pipeline.observe(image, sensors);

                let input = match self.pipeline.window() {
                    Some(window) => ModelInput::Sequence(window),
                    None => ModelInput::Single {
                        image: &obs.image,
                        sensors: &obs.sensors,
                    },
                };
                let action = pilot.action(input).context("model inference failed")?;
                Ok(Some(action))
            }
        }
    }

    fn log_pace(&self) {
        let stats = self.tracker.stats();
        if let Some(fastest) = stats.fastest() {
            info!(
                fastest = format!("{fastest:.2}"),
                streak = stats.fastest_streak(),
                average = stats.average().map(|a| format!("{a:.2}")),
                later_average = stats.later_average().map(|a| format!("{a:.2}")),
                "pace",
            );
        }
    }
}
