//! Default kvbench runtime.
//!
//! `serve` spins up the event relay; `run` executes a single session in the
//! foreground against Redis and prints the report.
use crate::{error::RuntimeError, server::server_task};
use clap::{Args, Parser, Subcommand};
use kvbench::prelude::*;
use kvbench_core::{Progress, RawNumber};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
#[allow(unused)]
use tracing::{debug, error, info, instrument, Instrument};

const DEFAULT_PORT: u16 = 3000;

#[derive(Parser, Debug)]
#[command(name = "kvbench", version, about = "Key-value store benchmark")]
struct KvBenchCli {
    /// Expose Prometheus metrics on this address.
    #[arg(long, env = "KVBENCH_METRICS_ADDR", global = true)]
    metrics_addr: Option<SocketAddr>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Serve the WebSocket event relay and HTTP API.
    Serve {
        #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Run one session in the foreground and print the report.
    Run(RunArgs),
}

/// One flag per config field. Values are validated the same way relay
/// requests are, so out-of-range numbers produce the usual error list.
#[derive(Args, Debug, Clone, Default)]
struct RunArgs {
    #[arg(long)]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<i64>,

    #[arg(long, env = "KVBENCH_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[arg(short, long)]
    database: Option<i64>,

    /// Seconds; 1000 iterations per second are split across the operation types.
    #[arg(short('t'), long)]
    test_duration: Option<i64>,

    #[arg(short, long)]
    concurrency: Option<i64>,

    #[arg(long)]
    key_size: Option<i64>,

    #[arg(long)]
    value_size: Option<i64>,

    /// Comma separated subset of set,get,hset,hget.
    #[arg(long = "types", value_delimiter = ',')]
    test_types: Vec<String>,
}

impl From<RunArgs> for RawConfig {
    fn from(args: RunArgs) -> Self {
        RawConfig {
            host: args.host,
            port: args.port.map(RawNumber::Int),
            password: args.password,
            database: args.database.map(RawNumber::Int),
            test_duration: args.test_duration.map(RawNumber::Int),
            concurrency: args.concurrency.map(RawNumber::Int),
            key_size: args.key_size.map(RawNumber::Int),
            value_size: args.value_size.map(RawNumber::Int),
            test_types: (!args.test_types.is_empty()).then_some(args.test_types),
        }
    }
}

/// Default kvbench runtime.
///
/// # Example
///
/// ```no_run
/// use kvbench_runtime::KvBenchRuntime;
///
/// #[tokio::main]
/// async fn main() -> std::process::ExitCode {
///     KvBenchRuntime::new()
///         .with_args()
///         .run()
///         .await
///         .unwrap_or(std::process::ExitCode::FAILURE)
/// }
/// ```
pub struct KvBenchRuntime {
    command: Command,
    metrics_addr: Option<SocketAddr>,
}

impl Default for KvBenchRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl KvBenchRuntime {
    /// Serve on the default port with no metrics exporter.
    pub fn new() -> Self {
        KvBenchRuntime {
            command: Command::Serve { port: DEFAULT_PORT },
            metrics_addr: None,
        }
    }

    /// Use the command line.
    ///
    /// ```text
    /// $ kvbench serve -p 3000
    /// $ kvbench run --host 127.0.0.1 -t 5 --types set,get
    /// $ kvbench --metrics-addr 0.0.0.0:9000 serve
    /// ```
    pub fn with_args(self) -> Self {
        let args = KvBenchCli::parse();
        KvBenchRuntime {
            command: args.command,
            metrics_addr: args.metrics_addr,
        }
    }

    /// Serve the relay on `port`.
    pub fn port(mut self, port: u16) -> Self {
        self.command = Command::Serve { port };
        self
    }

    pub fn metrics_addr(mut self, addr: SocketAddr) -> Self {
        self.metrics_addr = Some(addr);
        self
    }

    #[instrument(name = "kvbench", skip_all)]
    pub async fn run(self) -> Result<ExitCode, RuntimeError> {
        if let Some(addr) = self.metrics_addr {
            PrometheusBuilder::new().with_http_listener(addr).install()?;
            info!("Prometheus exporter listening on {addr}");
        }

        match self.command {
            Command::Serve { port } => {
                server_task(port, RedisConnector).await?;
                Ok(ExitCode::SUCCESS)
            }
            Command::Run(args) => {
                let config = RawConfig::from(args).validate()?;
                Ok(run_headless(config).await)
            }
        }
    }
}

async fn run_headless(config: BenchConfig) -> ExitCode {
    let (tx, mut rx) = mpsc::unbounded_channel::<BenchEvent>();
    let runner = Arc::new(BenchRunner::new(config, RedisConnector, tx));

    let stop = runner.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping after the current operation type.");
            stop.stop();
        }
    });

    let task = runner.clone();
    let session = tokio::spawn(async move { task.run().await }.in_current_span());

    while let Some(event) = rx.recv().await {
        log_event(&event);
        if event.is_terminal() {
            break;
        }
    }

    let outcome = match session.await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(err)) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
        Err(err) => {
            error!("Session task failed: {err}");
            return ExitCode::FAILURE;
        }
    };

    match outcome {
        SessionOutcome::Completed(results) => {
            println!("{}", Report(&results));
            ExitCode::SUCCESS
        }
        SessionOutcome::Stopped => ExitCode::SUCCESS,
        SessionOutcome::Failed(_) => ExitCode::FAILURE,
    }
}

fn log_event(event: &BenchEvent) {
    match event {
        BenchEvent::Started(started) => info!("{} ({})", started.message, started.session_id),
        BenchEvent::Progress(Progress::Phase(phase)) => info!("{}", phase.message),
        BenchEvent::Progress(Progress::Iteration(p)) => debug!(
            "{}: {}/{} avg {:.3}ms",
            p.operation, p.completed, p.total, p.avg_time_ms
        ),
        BenchEvent::Result(result) => info!(
            "{} done: {:.0} ops/s, {:.2}% success",
            result.operation,
            result.ops,
            result.success_rate()
        ),
        BenchEvent::Completed(_) => {}
        BenchEvent::Error(msg) => error!("{}", msg.message),
        BenchEvent::Stopped(msg) => info!("{}", msg.message),
    }
}
