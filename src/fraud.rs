//! Advisory threshold checks over a drafted transaction and live chain state.

use std::str::FromStr;

use ethers_core::types::{Address, U256};
use serde::Serialize;

use crate::chain::{ChainClient, ChainError};

/// What the gate does with raised indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FraudPolicy {
    /// Write flagged transactions to the security log and let them through.
    #[default]
    LogOnly,
    /// Reject any transaction with at least one raised indicator.
    Enforce,
}

impl FromStr for FraudPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log-only" | "log_only" | "log" => Ok(FraudPolicy::LogOnly),
            "enforce" => Ok(FraudPolicy::Enforce),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FraudThresholds {
    pub gas_price_multiplier: u64,
    pub max_value_wei: U256,
    pub rapid_tx_limit: usize,
    pub window_blocks: u64,
}

impl Default for FraudThresholds {
    fn default() -> Self {
        Self {
            gas_price_multiplier: 2,
            max_value_wei: U256::from(100u64) * U256::exp10(18),
            rapid_tx_limit: 10,
            window_blocks: 5,
        }
    }
}

/// Transaction-like record the heuristic looks at.
#[derive(Debug, Clone, Default)]
pub struct TransactionProbe {
    pub from: Option<Address>,
    pub gas: U256,
    pub gas_price: U256,
    pub value: U256,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FraudIndicators {
    pub high_gas_price: bool,
    pub suspicious_value: bool,
    pub rapid_transactions: bool,
}

impl FraudIndicators {
    pub fn any(&self) -> bool {
        self.high_gas_price || self.suspicious_value || self.rapid_transactions
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FraudFeatures {
    pub gas_price_ratio: f64,
    pub value_in_eth: f64,
    pub recent_transactions: usize,
    pub gas_limit_ratio: f64,
    pub balance_ratio: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FraudReport {
    pub indicators: FraudIndicators,
    pub features: FraudFeatures,
}

/// Chain readings taken for one assessment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainSnapshot {
    pub network_gas_price: U256,
    pub block_gas_limit: U256,
    pub sender_recent_txs: usize,
    pub sender_balance: Option<U256>,
}

pub fn evaluate(
    probe: &TransactionProbe,
    snapshot: &ChainSnapshot,
    thresholds: &FraudThresholds,
) -> FraudReport {
    let gas_ceiling = snapshot
        .network_gas_price
        .saturating_mul(U256::from(thresholds.gas_price_multiplier));

    let indicators = FraudIndicators {
        high_gas_price: probe.gas_price > gas_ceiling,
        suspicious_value: probe.value > thresholds.max_value_wei,
        rapid_transactions: snapshot.sender_recent_txs > thresholds.rapid_tx_limit,
    };

    let balance_ratio = match (probe.from, snapshot.sender_balance) {
        (None, _) | (Some(_), None) => 0.0,
        (Some(_), Some(balance)) if balance.is_zero() => 1.0,
        (Some(_), Some(balance)) => ratio(probe.value, balance),
    };

    let features = FraudFeatures {
        gas_price_ratio: if snapshot.network_gas_price.is_zero() {
            1.0
        } else {
            ratio(probe.gas_price, snapshot.network_gas_price)
        },
        value_in_eth: to_f64(probe.value) / 1e18,
        recent_transactions: snapshot.sender_recent_txs,
        gas_limit_ratio: if snapshot.block_gas_limit.is_zero() {
            0.0
        } else {
            ratio(probe.gas, snapshot.block_gas_limit)
        },
        balance_ratio,
    };

    FraudReport {
        indicators,
        features,
    }
}

/// Reads live chain state and evaluates `probe`. Chain failures yield an
/// all-clear report.
pub async fn assess(
    chain: &dyn ChainClient,
    probe: &TransactionProbe,
    thresholds: &FraudThresholds,
) -> FraudReport {
    match snapshot(chain, probe, thresholds).await {
        Ok(snapshot) => evaluate(probe, &snapshot, thresholds),
        Err(err) => {
            tracing::warn!("fraud check skipped, chain read failed: {}", err);
            FraudReport::default()
        }
    }
}

async fn snapshot(
    chain: &dyn ChainClient,
    probe: &TransactionProbe,
    thresholds: &FraudThresholds,
) -> Result<ChainSnapshot, ChainError> {
    let network_gas_price = chain.gas_price().await?;
    let block_gas_limit = chain.block_gas_limit().await?;
    let (sender_recent_txs, sender_balance) = match probe.from {
        Some(sender) => (
            chain
                .recent_sender_tx_count(sender, thresholds.window_blocks)
                .await?,
            Some(chain.balance(sender).await?),
        ),
        None => (0, None),
    };
    Ok(ChainSnapshot {
        network_gas_price,
        block_gas_limit,
        sender_recent_txs,
        sender_balance,
    })
}

fn ratio(numerator: U256, denominator: U256) -> f64 {
    to_f64(numerator) / to_f64(denominator)
}

fn to_f64(value: U256) -> f64 {
    value.to_string().parse().unwrap_or(f64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gwei(n: u64) -> U256 {
        U256::from(n) * U256::exp10(9)
    }

    fn snapshot(recent: usize) -> ChainSnapshot {
        ChainSnapshot {
            network_gas_price: gwei(10),
            block_gas_limit: U256::from(30_000_000u64),
            sender_recent_txs: recent,
            sender_balance: Some(U256::exp10(18)),
        }
    }

    #[test]
    fn quiet_transaction_raises_nothing() {
        let probe = TransactionProbe {
            from: Some(Address::from_low_u64_be(1)),
            gas: U256::from(2_000_000u64),
            gas_price: gwei(20),
            value: U256::zero(),
        };
        let report = evaluate(&probe, &snapshot(10), &FraudThresholds::default());
        assert!(!report.indicators.any());
        assert_eq!(report.features.gas_price_ratio, 2.0);
        assert_eq!(report.features.balance_ratio, 0.0);
    }

    #[test]
    fn each_indicator_trips_on_its_own() {
        let thresholds = FraudThresholds::default();

        let pricey = TransactionProbe {
            gas_price: gwei(21),
            ..Default::default()
        };
        let report = evaluate(&pricey, &snapshot(0), &thresholds);
        assert_eq!(
            report.indicators,
            FraudIndicators {
                high_gas_price: true,
                ..Default::default()
            }
        );

        let whale = TransactionProbe {
            value: U256::from(101u64) * U256::exp10(18),
            ..Default::default()
        };
        let report = evaluate(&whale, &snapshot(0), &thresholds);
        assert!(report.indicators.suspicious_value);
        assert!(!report.indicators.high_gas_price);

        let report = evaluate(&TransactionProbe::default(), &snapshot(11), &thresholds);
        assert!(report.indicators.rapid_transactions);
        assert_eq!(report.features.recent_transactions, 11);
    }

    #[test]
    fn exactly_one_hundred_ether_is_not_suspicious() {
        let probe = TransactionProbe {
            value: U256::from(100u64) * U256::exp10(18),
            ..Default::default()
        };
        let report = evaluate(&probe, &snapshot(0), &FraudThresholds::default());
        assert!(!report.indicators.suspicious_value);
        assert_eq!(report.features.value_in_eth, 100.0);
    }

    #[test]
    fn empty_balance_gives_unit_ratio() {
        let probe = TransactionProbe {
            from: Some(Address::from_low_u64_be(9)),
            value: U256::from(5u64),
            ..Default::default()
        };
        let mut snap = snapshot(0);
        snap.sender_balance = Some(U256::zero());
        let report = evaluate(&probe, &snap, &FraudThresholds::default());
        assert_eq!(report.features.balance_ratio, 1.0);
    }

    #[test]
    fn policy_parses_both_spellings() {
        assert_eq!("log-only".parse::<FraudPolicy>(), Ok(FraudPolicy::LogOnly));
        assert_eq!("ENFORCE".parse::<FraudPolicy>(), Ok(FraudPolicy::Enforce));
        assert!("block".parse::<FraudPolicy>().is_err());
    }
}
