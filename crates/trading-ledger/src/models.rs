use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use market_core::{Amount, PositionSide, Price, TradeSide};

/// Sequential position identifier, rendered as `pos-N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionId(pub u64);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pos-{}", self.0)
    }
}

/// Sequential order identifier, rendered as `ord-N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ord-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Partial,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    /// Terminal orders accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub symbol: String,
    pub side: TradeSide,
    pub order_type: OrderType,
    /// Limit price for limit orders, reference price otherwise.
    pub price: Price,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_price: Option<Price>,
    pub size: u64,
    pub filled: u64,
    pub remaining: u64,
    /// Volume-weighted price over all fills so far.
    pub average_price: Price,
    pub commission: Amount,
    pub status: OrderStatus,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: PositionId,
    pub symbol: String,
    pub side: PositionSide,
    pub size: u64,
    pub entry_price: Price,
    pub current_price: Price,
    /// Weighted-average cost over all entry fills.
    pub average_cost: Price,
    pub realized_pnl: Amount,
    pub unrealized_pnl: Amount,
    pub unrealized_pnl_pct: f64,
    /// Commission accumulated on entry fills.
    pub commission: Amount,
    /// Cash reserved for this position (cost basis of the open size).
    pub margin_used: Amount,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub opened_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// Current mark value of the open size.
    pub fn market_value(&self) -> Amount {
        self.margin_used + self.unrealized_pnl
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeEventType {
    PositionOpened,
    PositionClosed,
    PositionUpdated,
    OrderPlaced,
    OrderFilled,
    OrderCancelled,
    BalanceUpdated,
    PriceAlert,
    RiskWarning,
}

/// Append-only journal entry. The event history is the source of truth for
/// every derived aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeEvent {
    pub id: u64,
    pub event_type: TradeEventType,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub ts: DateTime<Utc>,
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_id: Option<PositionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

/// Point-in-time account aggregate, memoized until the next mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub balance: Amount,
    pub equity: Amount,
    pub margin_used: Amount,
    pub margin_available: Amount,
    pub unrealized_pnl: Amount,
    pub realized_pnl: Amount,
    pub daily_pnl: Amount,
    pub daily_pnl_pct: f64,
    pub open_positions: usize,
    pub open_orders: usize,
    pub total_commission: Amount,
}

/// Trade statistics derived from POSITION_CLOSED events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRiskMetrics {
    pub closed_trades: usize,
    pub winning_trades: usize,
    /// Percent of closed trades with positive net PnL.
    pub win_rate: f64,
    /// Gross profit over gross loss; infinity when lossless with profits,
    /// zero with no closed trades.
    #[serde(with = "market_core::types::lossless_f64")]
    pub profit_factor: f64,
    pub avg_win: Amount,
    pub avg_loss: Amount,
    pub largest_win: Amount,
    pub largest_loss: Amount,
}

/// Parameters for opening a position directly (paper-trading surface).
#[derive(Debug, Clone, PartialEq)]
pub struct OpenPositionParams {
    pub symbol: String,
    pub side: PositionSide,
    pub size: u64,
    pub entry_price: Price,
    /// Explicit commission; defaults to the ledger's commission model.
    pub commission: Option<Amount>,
}

/// Parameters for placing an order.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceOrderParams {
    pub symbol: String,
    pub side: TradeSide,
    pub order_type: OrderType,
    pub price: Price,
    pub trigger_price: Option<Price>,
    pub size: u64,
}
