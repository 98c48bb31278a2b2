use kvbench_runtime::KvBenchRuntime;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("kvbench=info,kvbench_runtime=info"));
    FmtSubscriber::builder().with_env_filter(filter).init();

    match KvBenchRuntime::new().with_args().run().await {
        Ok(code) => code,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
