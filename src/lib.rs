//! Rolling EIP-1559 fee oracle.
//!
//! Samples `eth_feeHistory` on a fixed cadence, keeps a bounded window of
//! per-block priority fees and publishes low/standard/fast suggestions plus
//! the pending base fee.

pub mod client;
pub mod config;
pub mod error;
pub mod oracle;
pub mod percentile;
pub mod provider;
pub mod server;
pub mod window;

pub use client::{FeeData, OracleClient};
pub use config::{Args, OracleConfig};
pub use error::OracleError;
pub use oracle::{CycleOutcome, EstimateReader, GasEstimate, GasOracle};
pub use percentile::{FeeTier, PercentileConfig};
pub use provider::{FeeSource, RpcFeeSource};
