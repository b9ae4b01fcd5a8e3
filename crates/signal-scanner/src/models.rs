use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use market_core::{ErrorInfo, Price};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Buy,
    Sell,
}

/// Outcome classification for a scanned signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    Completed,
    Holding,
    Suspended,
    CannotBuy,
    CannotSell,
}

/// A fully-enriched signal: entry/exit anchored to bar indices, with market
/// -status flags and gross/net round-trip returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub kind: SignalKind,
    pub strategy_id: String,
    pub entry_bar_index: usize,
    pub exit_bar_index: usize,
    pub entry_price: Price,
    pub exit_price: Price,
    pub strength: f64,
    pub status: SignalStatus,
    pub gross_return_pct: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_return_pct: Option<f64>,
    pub is_limit_up: bool,
    pub is_limit_down: bool,
    pub is_suspended: bool,
}

/// What a detector reports at one bar; the scanner turns it into a `Signal`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProtoSignal {
    pub kind: SignalKind,
    pub strength: f64,
}

/// A-share round-trip cost model. Stamp duty applies to the sell side only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionCosts {
    pub commission_rate: Decimal,
    pub stamp_duty_rate: Decimal,
    pub transfer_fee_rate: Decimal,
    pub slippage_rate: Decimal,
}

impl Default for TransactionCosts {
    fn default() -> Self {
        Self {
            commission_rate: dec!(0.0003),
            stamp_duty_rate: dec!(0.0005),
            transfer_fee_rate: dec!(0.00001),
            slippage_rate: dec!(0.001),
        }
    }
}

impl TransactionCosts {
    /// Total round-trip cost as a fraction of notional: commission and
    /// transfer fee on both legs, stamp duty and slippage charged once per
    /// leg with duty on the sell only.
    pub fn round_trip_fraction(&self) -> f64 {
        use rust_decimal::prelude::ToPrimitive;
        let total = self.commission_rate * dec!(2)
            + self.stamp_duty_rate
            + self.transfer_fee_rate * dec!(2)
            + self.slippage_rate * dec!(2);
        total.to_f64().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StrengthBand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl StrengthBand {
    pub fn contains(&self, strength: f64) -> bool {
        self.min.map_or(true, |m| strength >= m) && self.max.map_or(true, |m| strength <= m)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupMode {
    /// Keep the first signal of each cluster.
    MergeConsecutive,
    /// Keep the strongest signal of each cluster.
    KeepStrongest,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deduplication {
    /// Signals closer than this many bars belong to the same cluster.
    pub min_gap_days: usize,
    pub mode: DedupMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanOptions {
    pub holding_days: usize,
    /// Upper bound on warmup; detectors declaring a smaller one win.
    pub warmup_min: usize,
    /// Enter at the bar's open instead of its close.
    pub entry_at_open: bool,
    pub exclude_st: bool,
    pub min_listing_days: Option<i64>,
    pub detect_market_status: bool,
    pub transaction_costs: Option<TransactionCosts>,
    pub strength_threshold: Option<StrengthBand>,
    pub deduplication: Option<Deduplication>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            holding_days: 5,
            warmup_min: 60,
            entry_at_open: false,
            exclude_st: false,
            min_listing_days: None,
            detect_market_status: true,
            transaction_costs: None,
            strength_threshold: None,
            deduplication: None,
        }
    }
}

/// Per-status signal counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub completed: usize,
    pub holding: usize,
    pub suspended: usize,
    pub cannot_buy: usize,
    pub cannot_sell: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: SignalStatus) {
        match status {
            SignalStatus::Completed => self.completed += 1,
            SignalStatus::Holding => self.holding += 1,
            SignalStatus::Suspended => self.suspended += 1,
            SignalStatus::CannotBuy => self.cannot_buy += 1,
            SignalStatus::CannotSell => self.cannot_sell += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    pub total_signals: usize,
    pub win_signals: usize,
    pub win_rate: f64,
    pub avg_return: f64,
    pub max_return: f64,
    pub min_return: f64,
    pub by_status: StatusCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub symbol: String,
    pub strategy_id: String,
    pub signals: Vec<Signal>,
    pub stats: ScanStats,
}

impl ScanResult {
    pub fn empty(symbol: impl Into<String>, strategy_id: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            strategy_id: strategy_id.into(),
            signals: Vec::new(),
            stats: ScanStats::default(),
        }
    }
}

/// One instrument's result inside a batch scan; a failure is carried as an
/// annotation instead of halting the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolScanOutcome {
    pub symbol: String,
    pub result: ScanResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}
