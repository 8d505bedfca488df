use std::sync::Arc;

use clap::Parser;
use eyre::{Result, WrapErr};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use feesight::{Args, FeeSource, GasOracle, OracleError, RpcFeeSource, server};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let rpc_url = args.rpc_url()?;
    let config = args.oracle_config()?;

    let source = Arc::new(RpcFeeSource::new(rpc_url));
    info!(
        host = source.name(),
        window_size = config.window_size,
        batch_size = config.batch_size,
        poll_interval = ?config.poll_interval,
        percentiles = ?config.percentiles.as_slice(),
        "starting gas oracle"
    );
    let oracle = Arc::new(GasOracle::new(source, config)?);

    let updater = start_with_retries(&oracle, &args)
        .await
        .wrap_err("could not load initial fee history")?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for shutdown signal");
        }
    };
    let served = server::serve(args.listen_addr(), oracle.subscribe(), shutdown).await;

    updater.abort();
    served.wrap_err("HTTP server failed")?;
    info!("gas oracle stopped");
    Ok(())
}

async fn start_with_retries(
    oracle: &Arc<GasOracle>,
    args: &Args,
) -> Result<JoinHandle<()>, OracleError> {
    let attempts = args.startup_retries.max(1);
    let mut attempt = 1;
    loop {
        match oracle.clone().start().await {
            Ok(handle) => return Ok(handle),
            Err(e) if e.is_transient() && attempt < attempts => {
                warn!(error = %e, attempt, attempts, "initial fee history failed; retrying");
                tokio::time::sleep(args.startup_retry_delay()).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
