//!
//! Global Safety server binary
//! ---------------------------
//! Command-line entry point. Configuration comes from CLI flags and environment
//! variables; see `--help`.

use anyhow::Result;
use std::env;

use globalsafety::config::{has_flag, ServerConfig, USAGE};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))?;
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let config = ServerConfig::from_env_and_args(&args)?;
    let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    tracing::info!(
        target: "globalsafety",
        "Global Safety starting: RUST_LOG='{}', bind={}, http_port={}, session_secret={}",
        rust_log,
        config.bind,
        config.http_port,
        if config.session_secret.is_some() { "configured" } else { "random" }
    );

    globalsafety::server::run(config).await
}
