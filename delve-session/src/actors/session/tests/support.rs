use std::sync::Arc;
use std::time::Duration;

use ractor::{Actor, ActorRef};

use delve_types::{StatusLabel, StatusSnapshot};

use crate::actors::session::{SessionActor, SessionArguments, SessionMsg};
use crate::config::Config;
use crate::gateway::testing::ScriptedGateway;
use crate::gateway::AgentGateway;
use crate::surface::ControlSurface;

pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("delve_session=debug")
        .with_test_writer()
        .try_init();
}

pub(crate) async fn spawn_session(
    gateway: Arc<ScriptedGateway>,
) -> (ActorRef<SessionMsg>, tokio::task::JoinHandle<()>) {
    init_tracing();
    let args = SessionArguments {
        session_id: "session_test".to_string(),
        gateway: gateway as Arc<dyn AgentGateway>,
        config: Config::default(),
    };
    Actor::spawn(None, SessionActor, args).await.unwrap()
}

pub(crate) async fn spawn_surface(gateway: Arc<ScriptedGateway>) -> ControlSurface {
    init_tracing();
    let (surface, _handle) = ControlSurface::spawn(gateway, Config::default())
        .await
        .unwrap();
    surface
}

/// Poll until the session reaches `label`; panics after ~1s.
pub(crate) async fn wait_for_label(
    surface: &ControlSurface,
    session_id: &str,
    label: StatusLabel,
) -> StatusSnapshot {
    for _ in 0..100 {
        if let Ok(snapshot) = surface.status(session_id).await {
            if snapshot.label == label {
                return snapshot;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("session {session_id} never reached {label}");
}
