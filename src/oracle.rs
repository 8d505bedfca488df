//! Rolling fee estimator.
//!
//! [`GasOracle`] owns the fee window and publishes a [`GasEstimate`] after
//! every productive update cycle. Readers never block the update loop: they
//! hold a [`watch`] receiver and always observe a whole estimate.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::OracleConfig;
use crate::error::OracleError;
use crate::percentile::{FeeTier, tier_averages};
use crate::provider::FeeSource;
use crate::window::{FeeWindow, UpdateOutcome};

/// Published fee suggestion, in wei.
///
/// `base_fee` stays `None` until the first cycle publishes; the tiers are
/// zero until then.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_fee: Option<u128>,
    pub low: u128,
    pub standard: u128,
    pub fast: u128,
}

impl GasEstimate {
    pub fn is_warm(&self) -> bool {
        self.base_fee.is_some()
    }

    pub fn tier(&self, tier: FeeTier) -> u128 {
        match tier {
            FeeTier::Low => self.low,
            FeeTier::Standard => self.standard,
            FeeTier::Fast => self.fast,
        }
    }
}

/// Read side of the published estimate.
#[derive(Debug, Clone)]
pub struct EstimateReader {
    rx: watch::Receiver<GasEstimate>,
}

impl EstimateReader {
    pub fn current(&self) -> GasEstimate {
        *self.rx.borrow()
    }

    /// Resolves once an estimate has been published. `None` if the oracle
    /// was dropped first.
    pub async fn wait_until_warm(&mut self) -> Option<GasEstimate> {
        self.rx.wait_for(GasEstimate::is_warm).await.ok().map(|e| *e)
    }
}

/// How the window changed during a published cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowUpdate {
    Unchanged,
    Appended(usize),
    Refreshed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Another cycle held the window.
    Skipped,
    /// No new block and nothing left to publish.
    Unchanged,
    Published {
        update: WindowUpdate,
        estimate: GasEstimate,
    },
}

struct Cache {
    window: FeeWindow,
    /// The window moved but the matching estimate was never published.
    unpublished: bool,
}

pub struct GasOracle {
    source: Arc<dyn FeeSource>,
    config: OracleConfig,
    cache: Mutex<Cache>,
    estimate: watch::Sender<GasEstimate>,
}

impl GasOracle {
    /// Builds a cold oracle. Nothing is fetched until [`GasOracle::start`].
    pub fn new(source: Arc<dyn FeeSource>, config: OracleConfig) -> Result<Self, OracleError> {
        config.validate()?;
        let (estimate, _) = watch::channel(GasEstimate::default());
        Ok(Self {
            cache: Mutex::new(Cache {
                window: FeeWindow::with_capacity(config.window_size),
                unpublished: false,
            }),
            source,
            config,
            estimate,
        })
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    pub fn current_estimate(&self) -> GasEstimate {
        *self.estimate.borrow()
    }

    pub fn subscribe(&self) -> EstimateReader {
        EstimateReader {
            rx: self.estimate.subscribe(),
        }
    }

    /// Fills the window, runs the first cycle and spawns the update loop.
    ///
    /// A failed initial refresh is returned so the caller can retry. A
    /// failure in the first cycle only leaves the estimate cold; the loop
    /// retries it on the next tick.
    pub async fn start(self: Arc<Self>) -> Result<JoinHandle<()>, OracleError> {
        {
            let mut cache = self.cache.lock().await;
            self.full_refresh(&mut cache).await?;
        }

        if let Err(e) = self.run_cycle().await {
            warn!(error = %e, source = self.source.name(), "initial fee estimate failed");
        }

        let oracle = Arc::clone(&self);
        Ok(tokio::spawn(async move { oracle.run().await }))
    }

    async fn run(self: Arc<Self>) {
        let period = self.config.poll_interval;
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match self.run_cycle().await {
                Ok(outcome) => debug!(?outcome, "fee update cycle finished"),
                Err(e) => warn!(
                    error = %e,
                    source = self.source.name(),
                    "fee update cycle failed; keeping previous estimate"
                ),
            }
        }
    }

    /// One `fetch -> reconcile -> aggregate -> publish` pass.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, OracleError> {
        let Ok(mut cache) = self.cache.try_lock() else {
            debug!("previous fee update still running; skipping tick");
            return Ok(CycleOutcome::Skipped);
        };

        let batch = self
            .call(
                self.source
                    .fee_history(self.config.batch_size, self.config.percentiles.as_slice()),
            )
            .await?;

        let update = match cache.window.apply_increment(&batch)? {
            UpdateOutcome::MissedUpdate => {
                info!(
                    cached_newest = ?cache.window.newest_block(),
                    reported_newest = ?batch.newest_block(),
                    "missed blocks since last update; refreshing full window"
                );
                self.full_refresh(&mut cache).await?;
                WindowUpdate::Refreshed
            }
            UpdateOutcome::Appended(blocks) => {
                cache.unpublished = true;
                WindowUpdate::Appended(blocks)
            }
            UpdateOutcome::NoOp => {
                if self.current_estimate().is_warm() && !cache.unpublished {
                    debug!(newest = ?cache.window.newest_block(), "no new block");
                    return Ok(CycleOutcome::Unchanged);
                }
                WindowUpdate::Unchanged
            }
        };

        let fees = tier_averages(&cache.window)?;
        let base_fee = self.call(self.source.pending_base_fee()).await?;

        let estimate = GasEstimate {
            base_fee: Some(base_fee),
            low: fees.low,
            standard: fees.standard,
            fast: fees.fast,
        };
        self.estimate.send_replace(estimate);
        cache.unpublished = false;

        info!(
            base_fee = %base_fee,
            low = %estimate.low,
            standard = %estimate.standard,
            fast = %estimate.fast,
            newest = ?cache.window.newest_block(),
            "updated gas estimate"
        );
        Ok(CycleOutcome::Published { update, estimate })
    }

    async fn full_refresh(&self, cache: &mut Cache) -> Result<(), OracleError> {
        let batch = self
            .call(self.source.fee_history(
                self.config.window_size as u64,
                self.config.percentiles.as_slice(),
            ))
            .await?;
        if batch.is_empty() {
            return Err(OracleError::EmptyHistory);
        }

        cache.window = FeeWindow::from_batch(self.config.window_size, batch)?;
        cache.unpublished = true;
        info!(
            oldest = ?cache.window.oldest_block(),
            newest = ?cache.window.newest_block(),
            blocks = cache.window.len(),
            "loaded fee history window"
        );
        Ok(())
    }

    async fn call<T>(
        &self,
        request: impl Future<Output = Result<T, OracleError>>,
    ) -> Result<T, OracleError> {
        let limit = self.config.request_timeout;
        time::timeout(limit, request)
            .await
            .map_err(|_| OracleError::Timeout(limit))?
    }
}
