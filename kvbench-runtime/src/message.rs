use kvbench_core::{BenchConfig, BenchEvent, RawConfig, SessionStatus};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Messages a WebSocket client may send, tagged by `type`.
///
/// ```json
/// {"type": "startTest", "config": {"port": 6379, "testTypes": ["set"]}}
/// {"type": "stopTest"}
/// {"type": "getTestStatus"}
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    StartTest {
        #[serde(default)]
        config: RawConfig,
    },
    StopTest,
    GetTestStatus,
}

/// Everything the relay writes to a socket. Engine events pass through
/// unchanged; [`Control`] covers replies that do not come from a session.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Event(BenchEvent),
    Control(Control),
}

impl From<BenchEvent> for ServerMessage {
    fn from(event: BenchEvent) -> Self {
        ServerMessage::Event(event)
    }
}

impl From<Control> for ServerMessage {
    fn from(control: Control) -> Self {
        ServerMessage::Control(control)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum Control {
    Status(StatusReport),
    Invalid { errors: Vec<String> },
    Rejected { message: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum StatusReport {
    Session(SessionInfo),
    Idle { status: &'static str },
}

impl StatusReport {
    pub fn idle() -> Self {
        StatusReport::Idle { status: "idle" }
    }
}

/// Registry entry for one relayed session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: Uuid,
    pub status: SessionStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    pub config: BenchConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Health {
    pub status: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub active_sessions: usize,
}
