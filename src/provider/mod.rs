//! Fee data source boundary.
//!
//! Everything the node returns is decoded and shape-checked here, so the
//! window only ever sees contiguous, fully typed [`BlockFeeRecord`]s.

#[cfg(test)]
pub mod mock;

use alloy::eips::BlockNumberOrTag;
use alloy::rpc::types::FeeHistory;
use alloy_consensus::BlockHeader;
use alloy_primitives::BlockNumber;
use alloy_provider::{Provider as ProviderTrait, RootProvider as AlloyProvider};
use async_trait::async_trait;
use url::Url;

use crate::error::OracleError;
use crate::window::BlockFeeRecord;

/// Remote capability the oracle samples from.
#[async_trait]
pub trait FeeSource: Send + Sync {
    /// Fee history for the `block_count` most recent settled blocks, with
    /// one reward column per entry of `percentiles`.
    async fn fee_history(
        &self,
        block_count: u64,
        percentiles: &[f64],
    ) -> Result<FeeHistoryBatch, OracleError>;

    /// Base fee of the block currently being built.
    async fn pending_base_fee(&self) -> Result<u128, OracleError>;

    fn name(&self) -> &str;
}

/// Decoded `eth_feeHistory` result: contiguous records starting at
/// `oldest_block`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeeHistoryBatch {
    oldest_block: BlockNumber,
    records: Vec<BlockFeeRecord>,
}

impl FeeHistoryBatch {
    pub fn new(
        oldest_block: BlockNumber,
        records: Vec<BlockFeeRecord>,
    ) -> Result<Self, OracleError> {
        for (offset, record) in records.iter().enumerate() {
            let expected = oldest_block + offset as u64;
            if record.block_number != expected {
                return Err(OracleError::Discontinuity {
                    expected,
                    found: record.block_number,
                });
            }
        }
        Ok(Self {
            oldest_block,
            records,
        })
    }

    /// Shapes a raw fee history into per-block records.
    ///
    /// The node reports one base fee more than blocks (the next block's);
    /// that trailing entry belongs to the pending block and is dropped.
    pub fn from_fee_history(
        history: FeeHistory,
        percentile_count: usize,
    ) -> Result<Self, OracleError> {
        let count = history.gas_used_ratio.len();
        if history.base_fee_per_gas.len() < count {
            return Err(OracleError::Decode(format!(
                "{} base fees for {count} blocks",
                history.base_fee_per_gas.len()
            )));
        }

        let rewards = match history.reward {
            Some(rewards) => rewards,
            None if count == 0 => Vec::new(),
            None => return Err(OracleError::Decode("fee history has no rewards".into())),
        };
        if rewards.len() != count {
            return Err(OracleError::Decode(format!(
                "{} reward rows for {count} blocks",
                rewards.len()
            )));
        }

        let records = history
            .gas_used_ratio
            .into_iter()
            .zip(history.base_fee_per_gas)
            .zip(rewards)
            .enumerate()
            .map(|(offset, ((gas_used_ratio, base_fee_per_gas), reward))| {
                let block_number = history.oldest_block + offset as u64;
                if reward.len() != percentile_count {
                    return Err(OracleError::Decode(format!(
                        "block {block_number} has {} rewards, expected {percentile_count}",
                        reward.len()
                    )));
                }
                if !(0.0..=1.0).contains(&gas_used_ratio) {
                    return Err(OracleError::Decode(format!(
                        "block {block_number} has gas used ratio {gas_used_ratio}"
                    )));
                }
                Ok(BlockFeeRecord {
                    block_number,
                    base_fee_per_gas,
                    gas_used_ratio,
                    priority_fee_per_gas: reward,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(history.oldest_block, records)
    }

    pub fn oldest_block(&self) -> BlockNumber {
        self.oldest_block
    }

    pub fn newest_block(&self) -> Option<BlockNumber> {
        (!self.records.is_empty()).then(|| self.oldest_block + self.records.len() as u64 - 1)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[BlockFeeRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<BlockFeeRecord> {
        self.records
    }
}

/// [`FeeSource`] backed by a JSON-RPC node over HTTP.
pub struct RpcFeeSource {
    provider: AlloyProvider,
    name: String,
}

impl RpcFeeSource {
    pub fn new(rpc_url: Url) -> Self {
        // host only; provider URLs often carry an API key in the path
        let name = rpc_url.host_str().unwrap_or("rpc").to_string();
        let provider = AlloyProvider::new_http(rpc_url);
        Self { provider, name }
    }
}

#[async_trait]
impl FeeSource for RpcFeeSource {
    async fn fee_history(
        &self,
        block_count: u64,
        percentiles: &[f64],
    ) -> Result<FeeHistoryBatch, OracleError> {
        let history = self
            .provider
            .get_fee_history(block_count, BlockNumberOrTag::Latest, percentiles)
            .await
            .map_err(|e| OracleError::Provider(format!("eth_feeHistory: {e}")))?;
        FeeHistoryBatch::from_fee_history(history, percentiles.len())
    }

    async fn pending_base_fee(&self) -> Result<u128, OracleError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Pending)
            .await
            .map_err(|e| OracleError::Provider(format!("eth_getBlockByNumber: {e}")))?
            .ok_or_else(|| OracleError::Decode("pending block not found".into()))?;

        block
            .header
            .base_fee_per_gas()
            .map(u128::from)
            .ok_or_else(|| OracleError::Decode("pending block has no base fee".into()))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
