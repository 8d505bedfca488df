//! Configuration parameters for the feesight gas oracle
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::Parser;
use url::Url;

use crate::error::OracleError;
use crate::percentile::PercentileConfig;

/// Number of settled blocks kept in the fee window
pub const DEFAULT_WINDOW_SIZE: usize = 200;

/// Number of newest blocks requested on every update cycle
pub const DEFAULT_BATCH_SIZE: u64 = 4;

/// Update cadence, slightly more than twice per ~12s block
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(6);

/// Upper bound on any single provider call
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Reward percentiles for the low, standard and fast tiers
pub const DEFAULT_PERCENTILES: [f64; 3] = [35.0, 60.0, 90.0];

pub const DEFAULT_PORT: u16 = 3000;

pub const INFURA_MAINNET_URL: &str = "https://mainnet.infura.io/v3/";

/// Tuning for the fee estimator itself.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub window_size: usize,
    pub batch_size: u64,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub percentiles: PercentileConfig,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            percentiles: PercentileConfig::default(),
        }
    }
}

impl OracleConfig {
    pub fn validate(&self) -> Result<(), OracleError> {
        if self.window_size == 0 {
            return Err(OracleError::Config("window size must be positive".into()));
        }
        if self.batch_size == 0 {
            return Err(OracleError::Config("batch size must be positive".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(OracleError::Config("poll interval must be positive".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(OracleError::Config("request timeout must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "feesight", about = "Serves rolling EIP-1559 fee estimates")]
pub struct Args {
    /// JSON-RPC endpoint of the node to sample
    #[arg(long, env = "RPC_URL")]
    pub rpc_url: Option<Url>,

    /// Infura project key, used when no RPC URL is given
    #[arg(long, env = "INFURA_API_KEY", hide_env_values = true)]
    pub infura_api_key: Option<String>,

    #[arg(long, env = "BIND_ADDR", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    #[arg(long, env = "WINDOW_SIZE", default_value_t = DEFAULT_WINDOW_SIZE)]
    pub window_size: usize,

    #[arg(long, env = "BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: u64,

    #[arg(long, env = "POLL_INTERVAL_MS", default_value_t = DEFAULT_POLL_INTERVAL.as_millis() as u64)]
    pub poll_interval_ms: u64,

    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value_t = DEFAULT_REQUEST_TIMEOUT.as_millis() as u64)]
    pub request_timeout_ms: u64,

    #[arg(long, env = "LOW_PERCENTILE", default_value_t = DEFAULT_PERCENTILES[0])]
    pub low_percentile: f64,

    #[arg(long, env = "STANDARD_PERCENTILE", default_value_t = DEFAULT_PERCENTILES[1])]
    pub standard_percentile: f64,

    #[arg(long, env = "FAST_PERCENTILE", default_value_t = DEFAULT_PERCENTILES[2])]
    pub fast_percentile: f64,

    /// Attempts at the initial full refresh before giving up
    #[arg(long, env = "STARTUP_RETRIES", default_value_t = 5)]
    pub startup_retries: u32,

    #[arg(long, env = "STARTUP_RETRY_DELAY_MS", default_value_t = 2_000)]
    pub startup_retry_delay_ms: u64,
}

impl Args {
    /// Explicit URL wins; otherwise the Infura key is expanded into a mainnet URL.
    pub fn rpc_url(&self) -> Result<Url, OracleError> {
        if let Some(url) = &self.rpc_url {
            return Ok(url.clone());
        }
        match self.infura_api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => format!("{INFURA_MAINNET_URL}{key}")
                .parse()
                .map_err(|e| OracleError::Config(format!("invalid Infura key: {e}"))),
            _ => Err(OracleError::Config(
                "set RPC_URL or INFURA_API_KEY to reach a node".into(),
            )),
        }
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn oracle_config(&self) -> Result<OracleConfig, OracleError> {
        let config = OracleConfig {
            window_size: self.window_size,
            batch_size: self.batch_size,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            percentiles: PercentileConfig::new(
                self.low_percentile,
                self.standard_percentile,
                self.fast_percentile,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn startup_retry_delay(&self) -> Duration {
        Duration::from_millis(self.startup_retry_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("feesight").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_match_constants() {
        let args = parse(&["--rpc-url", "http://localhost:8545"]);
        let config = args.oracle_config().unwrap();
        assert_eq!(config.window_size, DEFAULT_WINDOW_SIZE);
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(config.percentiles.as_slice(), &DEFAULT_PERCENTILES);
        assert_eq!(args.listen_addr().port(), DEFAULT_PORT);
    }

    #[test]
    fn explicit_rpc_url_wins_over_infura_key() {
        let args = parse(&[
            "--rpc-url",
            "http://localhost:8545",
            "--infura-api-key",
            "abc",
        ]);
        assert_eq!(args.rpc_url().unwrap().as_str(), "http://localhost:8545/");
    }

    #[test]
    fn infura_key_expands_to_mainnet_url() {
        let args = parse(&["--infura-api-key", "abc123"]);
        assert_eq!(
            args.rpc_url().unwrap().as_str(),
            "https://mainnet.infura.io/v3/abc123"
        );
    }

    #[test]
    fn missing_endpoint_is_a_config_error() {
        let args = Args {
            rpc_url: None,
            infura_api_key: Some("  ".into()),
            ..parse(&["--rpc-url", "http://localhost:8545"])
        };
        assert!(matches!(args.rpc_url(), Err(OracleError::Config(_))));
    }

    #[test]
    fn invalid_tuning_is_rejected() {
        let zero_window = parse(&["--rpc-url", "http://x", "--window-size", "0"]);
        assert!(matches!(
            zero_window.oracle_config(),
            Err(OracleError::Config(_))
        ));

        let unsorted = parse(&[
            "--rpc-url",
            "http://x",
            "--low-percentile",
            "70",
            "--standard-percentile",
            "60",
        ]);
        assert!(matches!(
            unsorted.oracle_config(),
            Err(OracleError::Config(_))
        ));
    }
}
