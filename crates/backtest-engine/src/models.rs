use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use market_core::{Amount, Bar};
use risk_engine::{RiskLimits, RiskProfile};
use signal_scanner::{ScanOptions, Signal};
use trading_ledger::TradeEvent;

/// Fill-price slippage model. Values are in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum SlippageModel {
    None,
    FixedBps(f64),
    /// Scaled by the fill's share of the bar volume.
    VolumePct(f64),
}

impl Default for SlippageModel {
    fn default() -> Self {
        SlippageModel::None
    }
}

impl SlippageModel {
    /// Slippage as a signed fraction of the fill price for the given fill
    /// size and bar volume.
    pub fn fraction(&self, size: u64, bar_volume: f64) -> f64 {
        match self {
            SlippageModel::None => 0.0,
            SlippageModel::FixedBps(bps) => bps / 10_000.0,
            SlippageModel::VolumePct(bps) => {
                if bar_volume > 0.0 {
                    bps / 10_000.0 * (size as f64 / bar_volume)
                } else {
                    0.0
                }
            }
        }
    }
}

/// Where the engine takes its signals from.
pub enum SignalSource {
    /// A built-in detector, run over the series before the loop starts.
    Strategy { id: String, options: ScanOptions },
    /// Pre-computed signals, e.g. from a saved scan.
    Prepared(Vec<Signal>),
    /// External strategy code queried bar by bar.
    Provider(Box<dyn SignalProvider>),
}

/// External strategy capability: asked once per bar for signals whose entry
/// is that bar.
pub trait SignalProvider: Send + Sync {
    fn signals_at(&self, bar_index: usize, bar: &Bar) -> Vec<Signal>;
}

/// Cooperative cancellation sentinel returned by the progress observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverSignal {
    Continue,
    Cancel,
}

/// Progress sink, called every `report_every_n_bars` bars and once at
/// completion.
pub trait ProgressObserver {
    fn on_progress(&mut self, completed: usize, total: usize) -> ObserverSignal;
}

impl<F> ProgressObserver for F
where
    F: FnMut(usize, usize) -> ObserverSignal,
{
    fn on_progress(&mut self, completed: usize, total: usize) -> ObserverSignal {
        self(completed, total)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestConfig {
    pub symbol: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub start: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub end: DateTime<Utc>,
    pub initial_capital: Amount,
    pub commission_rate: Decimal,
    pub min_commission: Amount,
    /// Charged on sells only.
    pub stamp_duty_rate: Decimal,
    pub transfer_fee_rate: Decimal,
    pub slippage: SlippageModel,
    pub lot_size: u32,
    /// Overrides the instrument's band when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_limit_pct: Option<Decimal>,
    /// Dormant in cash-equity mode: short orders are rejected regardless.
    pub allow_short_sell: bool,
    /// Fill market orders at the signal bar's close instead of the next
    /// bar's open.
    pub fill_on_signal_bar: bool,
    /// Bars a position is held when a signal carries no forward exit of
    /// its own. The series must outspan this window.
    pub holding_days: usize,
    /// Fraction of free cash committed per entry, in percent.
    pub position_size_pct: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benchmark_symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_profile: Option<RiskProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskLimits>,
    pub report_every_n_bars: usize,
}

impl BacktestConfig {
    pub fn new(
        symbol: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        initial_capital: Amount,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            start,
            end,
            initial_capital,
            commission_rate: dec!(0.0003),
            min_commission: Amount::new(dec!(5)),
            stamp_duty_rate: dec!(0.0005),
            transfer_fee_rate: dec!(0.00001),
            slippage: SlippageModel::None,
            lot_size: 100,
            price_limit_pct: None,
            allow_short_sell: false,
            fill_on_signal_bar: false,
            holding_days: 5,
            position_size_pct: 100.0,
            benchmark_symbol: None,
            risk_profile: None,
            risk: None,
            report_every_n_bars: 100,
        }
    }

    /// Effective risk limit set: profile base with field overrides.
    pub fn risk_limits(&self) -> RiskLimits {
        let base = self
            .risk_profile
            .map(RiskLimits::from_profile)
            .unwrap_or_default();
        match &self.risk {
            Some(overrides) => base.merge(overrides.clone()),
            None => base,
        }
    }
}

/// One equity snapshot per processed bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquityPoint {
    #[serde(with = "chrono::serde::ts_seconds")]
    pub ts: DateTime<Utc>,
    pub value: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyReturn {
    pub year: i32,
    pub month: u32,
    pub return_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnMetrics {
    pub total_return_pct: f64,
    pub annualized_return_pct: f64,
    pub monthly_returns: Vec<MonthlyReturn>,
    /// Stddev of daily returns, annualized by sqrt(252).
    pub return_volatility: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskMetricsReport {
    pub max_drawdown_pct: f64,
    /// Bars from the peak to the trough of the deepest drawdown.
    pub max_drawdown_duration_bars: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharpe_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sortino_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calmar_ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingMetricsReport {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    /// Infinite when there are profits and no losses.
    #[serde(with = "market_core::types::lossless_f64")]
    pub profit_factor: f64,
    pub avg_win: Amount,
    pub avg_loss: Amount,
    pub avg_holding_days: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub max_single_win: Amount,
    pub max_single_loss: Amount,
    /// Round trips per 252 processed bars.
    pub trading_frequency: f64,
    pub exposure_time_pct: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_factor: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQualityReport {
    /// Present bars over expected bars, in [0, 1].
    pub coverage: f64,
    pub missing_bar_dates: Vec<NaiveDate>,
    pub price_anomaly_dates: Vec<NaiveDate>,
}

/// The complete outcome of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestReport {
    pub config: BacktestConfig,
    pub return_metrics: ReturnMetrics,
    pub risk_metrics: RiskMetricsReport,
    pub trading_metrics: TradingMetricsReport,
    pub equity_curve: Vec<EquityPoint>,
    pub events: Vec<TradeEvent>,
    pub data_quality: DataQualityReport,
    pub cancelled: bool,
}

/// A round trip reconstructed from the event journal.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub net_pnl: Amount,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
}
