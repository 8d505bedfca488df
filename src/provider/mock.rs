//! Simulated chain for exercising the oracle without a live node.
//!
//! Gated behind `#[cfg(test)]`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use alloy_primitives::BlockNumber;
use async_trait::async_trait;

use super::{FeeHistoryBatch, FeeSource};
use crate::error::OracleError;
use crate::window::BlockFeeRecord;

struct MockChain {
    head: BlockNumber,
    rewards: HashMap<BlockNumber, Vec<u128>>,
    default_reward: Vec<u128>,
    base_fee: u128,
    pending_base_fee: Option<u128>,
    history_failures: usize,
    pending_failures: usize,
    delay: Option<Duration>,
    requested_counts: Vec<u64>,
}

/// A [`FeeSource`] whose chain head and per-block rewards are set by the test.
pub struct MockFeeSource {
    chain: Mutex<MockChain>,
    history_calls: AtomicUsize,
    pending_calls: AtomicUsize,
}

impl MockFeeSource {
    pub fn new(head: BlockNumber) -> Self {
        Self {
            chain: Mutex::new(MockChain {
                head,
                rewards: HashMap::new(),
                default_reward: vec![1, 2, 3],
                base_fee: 1_000,
                pending_base_fee: Some(9_999),
                history_failures: 0,
                pending_failures: 0,
                delay: None,
                requested_counts: Vec::new(),
            }),
            history_calls: AtomicUsize::new(0),
            pending_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_default_reward(self, reward: [u128; 3]) -> Self {
        self.chain().default_reward = reward.to_vec();
        self
    }

    pub fn with_reward(self, block: BlockNumber, reward: [u128; 3]) -> Self {
        self.set_reward(block, reward);
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.chain().delay = Some(delay);
        self
    }

    pub fn set_reward(&self, block: BlockNumber, reward: [u128; 3]) {
        self.chain().rewards.insert(block, reward.to_vec());
    }

    pub fn set_head(&self, head: BlockNumber) {
        self.chain().head = head;
    }

    pub fn advance(&self, blocks: u64) {
        self.chain().head += blocks;
    }

    pub fn head(&self) -> BlockNumber {
        self.chain().head
    }

    pub fn set_pending_base_fee(&self, base_fee: Option<u128>) {
        self.chain().pending_base_fee = base_fee;
    }

    pub fn fail_next_history(&self, times: usize) {
        self.chain().history_failures = times;
    }

    pub fn fail_next_pending(&self, times: usize) {
        self.chain().pending_failures = times;
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub fn pending_calls(&self) -> usize {
        self.pending_calls.load(Ordering::SeqCst)
    }

    /// `block_count` of every fee history request, in call order.
    pub fn requested_counts(&self) -> Vec<u64> {
        self.chain().requested_counts.clone()
    }

    fn chain(&self) -> std::sync::MutexGuard<'_, MockChain> {
        self.chain.lock().unwrap()
    }

    fn delay(&self) -> Option<Duration> {
        self.chain().delay
    }
}

#[async_trait]
impl FeeSource for MockFeeSource {
    async fn fee_history(
        &self,
        block_count: u64,
        _percentiles: &[f64],
    ) -> Result<FeeHistoryBatch, OracleError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay() {
            tokio::time::sleep(delay).await;
        }

        let mut chain = self.chain();
        chain.requested_counts.push(block_count);
        if chain.history_failures > 0 {
            chain.history_failures -= 1;
            return Err(OracleError::Provider("simulated outage".into()));
        }

        let oldest = (chain.head + 1).saturating_sub(block_count);
        let records = (oldest..=chain.head)
            .map(|block_number| BlockFeeRecord {
                block_number,
                base_fee_per_gas: chain.base_fee,
                gas_used_ratio: 0.5,
                priority_fee_per_gas: chain
                    .rewards
                    .get(&block_number)
                    .unwrap_or(&chain.default_reward)
                    .clone(),
            })
            .collect();
        FeeHistoryBatch::new(oldest, records)
    }

    async fn pending_base_fee(&self) -> Result<u128, OracleError> {
        self.pending_calls.fetch_add(1, Ordering::SeqCst);

        let mut chain = self.chain();
        if chain.pending_failures > 0 {
            chain.pending_failures -= 1;
            return Err(OracleError::Provider("simulated outage".into()));
        }
        chain
            .pending_base_fee
            .ok_or_else(|| OracleError::Decode("pending block has no base fee".into()))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_the_newest_blocks_up_to_head() {
        let mock = MockFeeSource::new(20).with_reward(19, [7, 8, 9]);
        let batch = mock.fee_history(4, &[35.0, 60.0, 90.0]).await.unwrap();

        assert_eq!(batch.oldest_block(), 17);
        assert_eq!(batch.newest_block(), Some(20));
        assert_eq!(batch.records()[2].priority_fee_per_gas, vec![7, 8, 9]);
        assert_eq!(batch.records()[3].priority_fee_per_gas, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn young_chain_returns_fewer_blocks() {
        let mock = MockFeeSource::new(2);
        let batch = mock.fee_history(10, &[]).await.unwrap();
        assert_eq!(batch.oldest_block(), 0);
        assert_eq!(batch.len(), 3);
    }

    #[tokio::test]
    async fn scripted_failures_are_consumed() {
        let mock = MockFeeSource::new(5);
        mock.fail_next_history(1);
        assert!(mock.fee_history(4, &[]).await.is_err());
        assert!(mock.fee_history(4, &[]).await.is_ok());
        assert_eq!(mock.history_calls(), 2);
        assert_eq!(mock.requested_counts(), vec![4, 4]);
    }

    #[tokio::test]
    async fn pending_base_fee_can_be_missing() {
        let mock = MockFeeSource::new(5);
        assert_eq!(mock.pending_base_fee().await.unwrap(), 9_999);
        mock.set_pending_base_fee(None);
        assert!(matches!(
            mock.pending_base_fee().await,
            Err(OracleError::Decode(_))
        ));
    }
}
