//! Tier percentiles and the window averaging that turns them into fees.
use crate::error::OracleError;
use crate::window::FeeWindow;

/// Named fee tier. The discriminant is the tier's column in every
/// record's `priority_fee_per_gas`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeeTier {
    Low = 0,
    Standard = 1,
    Fast = 2,
}

impl FeeTier {
    pub const ALL: [FeeTier; 3] = [FeeTier::Low, FeeTier::Standard, FeeTier::Fast];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl std::str::FromStr for FeeTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(FeeTier::Low),
            "standard" => Ok(FeeTier::Standard),
            "fast" => Ok(FeeTier::Fast),
            other => Err(format!("unknown fee tier `{other}`")),
        }
    }
}

/// Reward percentile requested for each tier, in tier order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentileConfig {
    percentiles: [f64; 3],
}

impl PercentileConfig {
    /// Percentiles must lie in `0..=100` and be non-decreasing from `low`
    /// to `fast`, since `eth_feeHistory` rejects unsorted lists.
    pub fn new(low: f64, standard: f64, fast: f64) -> Result<Self, OracleError> {
        let percentiles = [low, standard, fast];
        if let Some(bad) = percentiles
            .iter()
            .find(|p| !p.is_finite() || **p < 0.0 || **p > 100.0)
        {
            return Err(OracleError::Config(format!(
                "percentile {bad} is outside 0..=100"
            )));
        }
        if percentiles.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(OracleError::Config(format!(
                "percentiles must be non-decreasing, got {low}/{standard}/{fast}"
            )));
        }
        Ok(Self { percentiles })
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.percentiles
    }

    pub fn get(&self, tier: FeeTier) -> f64 {
        self.percentiles[tier.index()]
    }
}

impl Default for PercentileConfig {
    fn default() -> Self {
        let [low, standard, fast] = crate::config::DEFAULT_PERCENTILES;
        Self {
            percentiles: [low, standard, fast],
        }
    }
}

/// Averaged priority fee per tier, in wei.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierFees {
    pub low: u128,
    pub standard: u128,
    pub fast: u128,
}

/// Averages each tier's priority fee over the window.
///
/// Each average is rounded to the nearest integer with ties rounding away
/// from zero, i.e. `(sum + len / 2) / len` without the overflow.
pub fn tier_averages(window: &FeeWindow) -> Result<TierFees, OracleError> {
    let len = window.len() as u128;
    if len == 0 {
        return Err(OracleError::EmptyHistory);
    }

    let mut sums = [0u128; 3];
    for record in window.iter() {
        for (sum, fee) in sums.iter_mut().zip(&record.priority_fee_per_gas) {
            *sum = sum.saturating_add(*fee);
        }
    }

    let [low, standard, fast] = sums.map(|sum| rounded_div(sum, len));
    Ok(TierFees {
        low,
        standard,
        fast,
    })
}

fn rounded_div(sum: u128, len: u128) -> u128 {
    sum / len + u128::from(sum % len >= len - len / 2)
}
