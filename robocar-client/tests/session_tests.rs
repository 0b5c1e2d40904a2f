//! Loopback tests for the session loop.

use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use robocar_client::control::{ControlSource, ManualSource};
use robocar_client::demo::ScriptedDevice;
use robocar_client::session::{run_session, SessionOutcome};
use robocar_core::config::SessionConfig;

#[tokio::test]
async fn lost_device_aborts_without_further_control_messages() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Play the simulator: accept the scene load, put the car in the scene,
    // deliver one telemetry tick, then capture everything the client sends
    // until it hangs up.
    let sim = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let mut line = String::new();
        tokio::io::AsyncBufReadExt::read_line(&mut reader, &mut line)
            .await
            .unwrap();
        assert!(line.contains("load_scene"), "first message loads the scene");

        write_half
            .write_all(b"{\"msg_type\": \"car_loaded\"}\n")
            .await
            .unwrap();
        write_half
            .write_all(
                b"{\"msg_type\": \"telemetry\", \"time\": 1.0, \"activeNode\": 3, \"totalNodes\": 50}\n",
            )
            .await
            .unwrap();

        let mut rest = String::new();
        reader.read_to_string(&mut rest).await.unwrap();
        rest
    });

    let cfg = SessionConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        ..SessionConfig::default()
    };

    let mut device = ScriptedDevice::new();
    device.fail_next_polls(2);
    device.fail_reconnect(true);
    let mut source = ControlSource::Manual(ManualSource::new(Box::new(device), cfg.tuning));

    let outcome = run_session(&cfg, &mut source).await.unwrap();
    assert_eq!(outcome, SessionOutcome::Finished);

    let sent_after_telemetry = sim.await.unwrap();
    assert!(
        !sent_after_telemetry.contains("\"control\""),
        "no control message after the device is lost, got: {sent_after_telemetry}"
    );
    assert!(
        sent_after_telemetry.contains("exit_scene"),
        "local session still tears the scene down"
    );
}
