//! End-to-end runs of the in-process platform on ephemeral ports.

use fleet_agents::LocalPlatform;
use fleet_control::{
    driver, read_json_report, Coordinator, ControllerState, ExportFormat, OutputConfig,
    RunOutcome, SimulationConfig, SimulationController,
};
use fleet_events::{Command, PassengerStatus};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tempfile::tempdir;

fn config(dir: &Path) -> SimulationConfig {
    SimulationConfig {
        simulation_name: Some("platform".into()),
        http_port: 0,
        backend_port: 0,
        workdir: dir.join("work"),
        poll_interval_ms: 10,
        seed: Some(1),
        ..SimulationConfig::default()
    }
}

fn http_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).unwrap();
    write!(
        stream,
        "GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n"
    )
    .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();
    response
}

#[test]
fn test_http_command_grows_the_fleet() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("results.json");
    let mut config = config(dir.path());
    config.num_taxis = 1;
    config.num_passengers = 1;
    config.output = Some(OutputConfig {
        path: output.clone(),
        format: ExportFormat::Json,
    });

    let mut controller = SimulationController::new(config, LocalPlatform::new(Some(1))).unwrap();
    assert!(dir.path().join("work").join("messaging.toml").exists());
    controller.run().unwrap();

    let addr = controller.listener_addr().unwrap();
    let response = http_get(addr, "/generate/taxis/1/passengers/2");
    assert!(response.starts_with("HTTP/1.1 200"));

    assert_eq!(controller.process_commands().unwrap(), Some(Command::new(1, 2)));
    assert_eq!(controller.process_commands().unwrap(), None);
    assert_eq!(controller.coordinator().taxi_count(), 2);
    assert_eq!(controller.coordinator().passenger_count(), 3);

    let failures = controller.stop();
    assert!(failures.is_empty(), "{failures:?}");
    assert_eq!(controller.state(), ControllerState::Stopped);
    assert!(TcpStream::connect(addr).is_err());

    let report = read_json_report(&output).unwrap();
    assert_eq!(report.passengers.len(), 3);
    assert_eq!(report.taxis.len(), 2);
}

#[test]
fn test_scenario_runs_to_completion() {
    let dir = tempdir().unwrap();
    let scenario = dir.path().join("scenario.json");
    std::fs::write(
        &scenario,
        r#"{
            "taxis": [{"name": "cab", "position": [0.0, 0.0], "speed": 20.0}],
            "passengers": [{"name": "rider", "position": [0.0, 0.0], "destination": [1.0, 0.0]}]
        }"#,
    )
    .unwrap();
    let mut config = config(dir.path());
    config.scenario = Some(scenario);
    config.max_time = Some(30.0);

    let mut controller = SimulationController::new(config, LocalPlatform::new(None)).unwrap();
    controller.run().unwrap();
    let outcome = driver::run_until_finished(
        &mut controller,
        Duration::from_millis(10),
        &AtomicBool::new(false),
    )
    .unwrap();

    assert_eq!(outcome, RunOutcome::Finished);
    assert!(controller.coordinator().is_simulation_finished());
    let passengers = controller.coordinator().passenger_stats();
    assert_eq!(passengers[0].name, "rider");
    assert_eq!(passengers[0].status, PassengerStatus::Finished);

    assert!(controller.stop().is_empty());
    let summary = &controller.stats().summary;
    assert!(summary.finished);
}

#[test]
fn test_workdir_is_reused_across_hosts() {
    let dir = tempdir().unwrap();

    let mut first =
        SimulationController::new(config(dir.path()), LocalPlatform::new(Some(1))).unwrap();
    first.run().unwrap();
    assert!(first.stop().is_empty());
    drop(first);

    let mut config = config(dir.path());
    config.host = "127.0.0.2".into();
    let mut second = SimulationController::new(config, LocalPlatform::new(Some(1))).unwrap();
    second.run().unwrap();
    assert!(second.coordinator().address().ends_with("@127.0.0.2"));
    assert!(second.stop().is_empty());
}

#[test]
fn test_sample_config_files_parse() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");

    let config = SimulationConfig::from_file(&root.join("config/simulation.toml")).unwrap();
    config.validate().unwrap();
    assert_eq!(config.simulation_name.as_deref(), Some("rush_hour"));

    let scenario =
        fleet_agents::ScenarioFile::from_file(&root.join("config/scenario.json")).unwrap();
    assert_eq!(scenario.taxis.len(), 2);
    assert_eq!(scenario.passengers.len(), 2);
}
