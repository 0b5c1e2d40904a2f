//! Robocar sim client entry point

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use robocar_client::cli::Args;
use robocar_client::control::{AutopilotSource, ControlSource, ManualSource};
use robocar_client::demo::{ConstantPilot, ScriptedDevice};
use robocar_client::session::{run_session, SessionOutcome};
use robocar_core::config::DriveMode;
use robocar_core::pilot::Prediction;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let cfg = args.to_config();
    info!(host = %cfg.host, port = cfg.port, track = %cfg.track, "starting robocar client");

    // The joystick driver and model runtime are deployment-specific; the
    // stock binary wires in the scripted stand-ins.
    let mut source = match cfg.drive_mode {
        DriveMode::Manual => {
            ControlSource::Manual(ManualSource::new(Box::new(ScriptedDevice::new()), cfg.tuning))
        }
        DriveMode::Auto | DriveMode::AutoTrain => ControlSource::Autopilot(AutopilotSource::new(
            Box::new(ConstantPilot::new(Prediction::SteeringThrottle(0.0, 0.2))),
            &cfg.model,
        )),
    };

    loop {
        match run_session(&cfg, &mut source).await? {
            SessionOutcome::Finished => break,
            SessionOutcome::Restart => {
                warn!("tearing down and starting a fresh session");
            }
        }
    }

    info!("client stopped");
    Ok(())
}
