//! etcdadm-lock CLI

use clap::Parser;

use etcdadm_cli::{Cli, Result};
use etcdadm_common::telemetry::{init_tracing, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(TelemetryConfig {
        format: cli.log_format,
        ..Default::default()
    })?;

    cli.run().await
}
