use kvbench::prelude::*;
use kvbench::BenchError;
use kvbench_core::RawConfig;
use mock_store::MockConnector;
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::sync::mpsc;
use tracing_subscriber::FmtSubscriber;

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let _ = FmtSubscriber::builder()
            .with_env_filter("kvbench=debug,kvbench_runtime=debug,mock_store=debug")
            .try_init();
    });
}

#[allow(unused)]
pub fn config(json: serde_json::Value) -> BenchConfig {
    serde_json::from_value::<RawConfig>(json)
        .unwrap()
        .validate()
        .unwrap()
}

/// Run one session to the end and return its outcome with every emitted event.
#[allow(unused)]
pub async fn run_session(
    config: BenchConfig,
    connector: MockConnector,
) -> (Result<SessionOutcome, BenchError>, Vec<BenchEvent>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let runner = BenchRunner::new(config, connector, tx);
    let outcome = runner.run().await;
    drop(runner);

    let mut events = vec![];
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    (outcome, events)
}

/// Event names, without progress.
#[allow(unused)]
pub fn names(events: &[BenchEvent]) -> Vec<&'static str> {
    events
        .iter()
        .map(BenchEvent::name)
        .filter(|n| *n != "progress")
        .collect()
}

/// Serve the relay on an ephemeral port.
#[allow(unused)]
pub async fn spawn_relay(connector: MockConnector) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, kvbench_runtime::router(connector))
            .await
            .unwrap();
    });
    addr
}
