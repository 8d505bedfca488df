//! HTTP client for services that fill in transaction fees from the oracle.
use eyre::{Result, eyre};
use url::Url;

use crate::oracle::GasEstimate;
use crate::percentile::FeeTier;

/// Fee fields for one transaction at a chosen tier, in wei.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeData {
    /// Legacy (pre-1559) price: base fee plus the tier's tip.
    pub gas_price: u128,
    /// Headroom for the base fee doubling before inclusion.
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

impl FeeData {
    pub fn from_estimate(estimate: &GasEstimate, tier: FeeTier) -> Result<Self> {
        let base_fee = estimate
            .base_fee
            .ok_or_else(|| eyre!("gas oracle has not published an estimate yet"))?;
        let tip = estimate.tier(tier);
        Ok(Self {
            gas_price: base_fee.saturating_add(tip),
            max_fee_per_gas: base_fee.saturating_mul(2).saturating_add(tip),
            max_priority_fee_per_gas: tip,
        })
    }
}

pub struct OracleClient {
    endpoint: Url,
    tier: FeeTier,
    http: reqwest::Client,
}

impl OracleClient {
    pub fn new(base_url: Url, tier: FeeTier) -> Result<Self> {
        let endpoint = base_url.join("gas")?;
        Ok(Self {
            endpoint,
            tier,
            http: reqwest::Client::new(),
        })
    }

    pub async fn estimate(&self) -> Result<GasEstimate> {
        let resp = self.http.get(self.endpoint.clone()).send().await?;
        if !resp.status().is_success() {
            return Err(eyre!("gas oracle answered {}", resp.status()));
        }
        Ok(resp.json().await?)
    }

    pub async fn fee_data(&self) -> Result<FeeData> {
        let estimate = self.estimate().await?;
        FeeData::from_estimate(&estimate, self.tier)
    }
}
