// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for a follower node
//!
//! These tests drive the pipeline a follower runs in the field:
//! 1. Load `dance_<id>.txt` from a script directory
//! 2. Resolve the coordinator and log in over TCP
//! 3. Receive START and play the script against an actuator
//! 4. Step into and back out of a procedure

use async_trait::async_trait;
use flockstep_core::application::performance::{PerformanceOutcome, PerformanceRunner};
use flockstep_core::domain::collaborators::{
    Actuator, ActuatorError, ControlCommand, ScriptSource, SystemClock,
};
use flockstep_core::domain::message::{FollowerId, Message};
use flockstep_core::domain::node_config::{CoordinatorDiscovery, NetworkConfig};
use flockstep_core::infrastructure::actuator::SharedPose;
use flockstep_core::infrastructure::codec::{encode_frame, read_frame, FrameRead};
use flockstep_core::infrastructure::script_source::FileScriptSource;
use flockstep_core::infrastructure::transport_client::{SessionEnd, TransportClient};
use parking_lot::Mutex;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

const SHOW: &str = "\
# two performances for drone 2
number_of_performances = 2

PROCEDURE blink
0   LEDS ON
20  LEDS OFF
ENDP
0   TAKEOFF
30  RUN blink
120 LAND
150 END

0   LEDS ON
40  END
";

#[derive(Default)]
struct RecordingActuator {
    calls: Mutex<Vec<String>>,
}

impl RecordingActuator {
    fn record(&self, call: &str) {
        self.calls.lock().push(call.to_string());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Actuator for RecordingActuator {
    async fn takeoff(&self) -> Result<(), ActuatorError> {
        self.record("takeoff");
        Ok(())
    }

    async fn land(&self) -> Result<(), ActuatorError> {
        self.record("land");
        Ok(())
    }

    async fn confirm_forced_landing(&self) -> Result<(), ActuatorError> {
        self.record("confirm");
        Ok(())
    }

    async fn set_leds(&self, on: bool) -> Result<(), ActuatorError> {
        self.record(if on { "leds on" } else { "leds off" });
        Ok(())
    }

    async fn send_control(&self, _command: ControlCommand) -> Result<(), ActuatorError> {
        self.record("control");
        Ok(())
    }
}

fn load_show(drone_id: i32) -> (tempfile::TempDir, Vec<flockstep_core::domain::script::DanceScript>) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("dance_2.txt"), SHOW).unwrap();
    let scripts = FileScriptSource::new(dir.path(), false)
        .load_scripts(drone_id)
        .unwrap();
    (dir, scripts)
}

#[tokio::test]
async fn test_performance_runs_through_procedure() {
    let (_dir, scripts) = load_show(2);
    assert_eq!(scripts.len(), 2);
    assert_eq!(scripts[0].landing_time, Some(120));

    let actuator = Arc::new(RecordingActuator::default());
    let runner = PerformanceRunner::new(
        2,
        scripts,
        actuator.clone(),
        Arc::new(SharedPose::new()),
        Arc::new(SystemClock),
    );
    let handle = runner.handle();
    let task = tokio::spawn(runner.run());
    handle.start(0);

    let outcome = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome, PerformanceOutcome::Completed { dance_index: 0 });
    assert_eq!(
        actuator.calls(),
        vec!["takeoff", "leds on", "leds off", "land"]
    );
}

#[tokio::test]
async fn test_follower_logs_in_and_starts_on_signal() {
    let (_dir, scripts) = load_show(2);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let coordinator = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let login = read_frame(&mut socket, Duration::from_secs(2)).await.unwrap();
        socket
            .write_all(&encode_frame(&Message::Start { dance_index: 1 }))
            .await
            .unwrap();
        login
    });

    let actuator = Arc::new(RecordingActuator::default());
    let runner = PerformanceRunner::new(
        2,
        scripts,
        actuator.clone(),
        Arc::new(SharedPose::new()),
        Arc::new(SystemClock),
    );
    let network = NetworkConfig {
        coordinator_discovery: CoordinatorDiscovery::Static,
        coordinator_address: Some(Ipv4Addr::LOCALHOST),
        transport_port: port,
        ..NetworkConfig::default()
    };
    let session = TransportClient::new(FollowerId(2), network, runner.handle()).start();
    let performance = tokio::spawn(runner.run());

    let login = coordinator.await.unwrap();
    let expected = encode_frame(&Message::Login { follower_id: FollowerId(2) });
    assert_eq!(login, FrameRead::Frame(expected.slice(4..)));

    let outcome = tokio::time::timeout(Duration::from_secs(5), performance)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome, PerformanceOutcome::Completed { dance_index: 1 });
    assert_eq!(actuator.calls(), vec!["leds on"]);

    let end = tokio::time::timeout(Duration::from_secs(5), session)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(end, SessionEnd::Closed);
}
