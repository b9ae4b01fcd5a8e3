use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use tracing::{debug, warn};

use market_core::{Amount, ErrorCode, ErrorInfo, PositionSide, Price, TradeSide};

use crate::models::*;

const DEFAULT_MAX_HISTORY: usize = 10_000;

#[derive(Default)]
struct DerivedCache {
    token: u64,
    summary: Option<AccountSummary>,
    risk: Option<LedgerRiskMetrics>,
}

/// Event-sourced trading state: the sole owner of positions, orders, the
/// event journal, and the cash balance. Every mutation appends events and
/// bumps a token that invalidates the derived-aggregate cache.
///
/// The ledger never reads the wall clock; callers advance a logical clock
/// from bar timestamps (backtest) or real time (paper trading).
pub struct TradingLedger {
    initial_balance: Amount,
    balance: Amount,
    positions: BTreeMap<PositionId, Position>,
    orders: BTreeMap<OrderId, Order>,
    events: VecDeque<TradeEvent>,
    max_history: usize,
    commission_rate: Decimal,
    min_commission: Amount,
    realized_pnl: Amount,
    total_commission: Amount,
    clock: DateTime<Utc>,
    daily_start_balance: Amount,
    daily_start_date: NaiveDate,
    next_event_id: u64,
    next_position_id: u64,
    next_order_id: u64,
    mutation_token: u64,
    cache: RefCell<DerivedCache>,
}

impl TradingLedger {
    pub fn new(initial_balance: Amount, start: DateTime<Utc>) -> Self {
        Self {
            initial_balance,
            balance: initial_balance,
            positions: BTreeMap::new(),
            orders: BTreeMap::new(),
            events: VecDeque::new(),
            max_history: DEFAULT_MAX_HISTORY,
            commission_rate: dec!(0.0003),
            min_commission: Amount::new(dec!(5)),
            realized_pnl: Amount::zero(),
            total_commission: Amount::zero(),
            clock: start,
            daily_start_balance: initial_balance,
            daily_start_date: start.date_naive(),
            next_event_id: 1,
            next_position_id: 1,
            next_order_id: 1,
            mutation_token: 0,
            cache: RefCell::new(DerivedCache::default()),
        }
    }

    pub fn with_commission(mut self, rate: Decimal, min_commission: Amount) -> Self {
        self.commission_rate = rate;
        self.min_commission = min_commission;
        self
    }

    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history.max(1);
        self
    }

    // --- Clock and daily window ---

    /// Move the logical clock forward. Never moves backwards.
    pub fn advance_clock(&mut self, now: DateTime<Utc>) {
        if now > self.clock {
            self.clock = now;
        }
    }

    pub fn clock(&self) -> DateTime<Utc> {
        self.clock
    }

    /// Snapshot the daily baseline at the current equity.
    pub fn reset_daily_stats(&mut self, today: NaiveDate) {
        self.daily_start_balance = self.equity();
        self.daily_start_date = today;
        self.bump();
    }

    /// Rehydration-safe daily rollover: resets the baseline whenever the
    /// trading date has moved past the stored one.
    pub fn ensure_daily_window(&mut self, today: NaiveDate) {
        if today != self.daily_start_date {
            debug!(%today, "rolling daily PnL window");
            self.reset_daily_stats(today);
        }
    }

    // --- Accessors ---

    pub fn initial_balance(&self) -> Amount {
        self.initial_balance
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    /// Cash plus the marked value of all open positions.
    pub fn equity(&self) -> Amount {
        self.balance + self.positions.values().map(|p| p.market_value()).sum()
    }

    pub fn margin_used(&self) -> Amount {
        self.positions.values().map(|p| p.margin_used).sum()
    }

    pub fn position(&self, id: PositionId) -> Option<&Position> {
        self.positions.get(&id)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn position_by_symbol(&self, symbol: &str) -> Option<&Position> {
        self.positions.values().find(|p| p.symbol == symbol)
    }

    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    pub fn open_orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values().filter(|o| !o.status.is_terminal())
    }

    pub fn events(&self) -> impl Iterator<Item = &TradeEvent> {
        self.events.iter()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    // --- Position lifecycle ---

    /// Open a position outright: reserves the cost basis, deducts the
    /// commission, and journals POSITION_OPENED + BALANCE_UPDATED.
    pub fn open_position(&mut self, params: OpenPositionParams) -> Result<PositionId, ErrorInfo> {
        if params.size == 0 {
            return Err(ErrorInfo::new(ErrorCode::BadLotSize)
                .with_message("position size must be positive"));
        }
        let cost = params.entry_price.notional(params.size);
        let commission = params
            .commission
            .unwrap_or_else(|| self.commission_for(cost));
        let total = cost + commission;
        if total > self.balance {
            return Err(ErrorInfo::new(ErrorCode::InsufficientMargin).with_details(json!({
                "required": total,
                "available": self.balance,
            })));
        }

        let id = PositionId(self.next_position_id);
        self.next_position_id += 1;
        let position = Position {
            id,
            symbol: params.symbol.clone(),
            side: params.side,
            size: params.size,
            entry_price: params.entry_price,
            current_price: params.entry_price,
            average_cost: params.entry_price,
            realized_pnl: Amount::zero(),
            unrealized_pnl: Amount::zero(),
            unrealized_pnl_pct: 0.0,
            commission,
            margin_used: cost,
            opened_at: self.clock,
            updated_at: self.clock,
        };
        self.positions.insert(id, position);
        self.balance = self.balance - total;
        self.total_commission = self.total_commission + commission;

        self.push_event(
            TradeEventType::PositionOpened,
            json!({
                "symbol": params.symbol,
                "side": params.side,
                "size": params.size,
                "entryPrice": params.entry_price,
                "commission": commission,
            }),
            Some(id),
            None,
            Some(params.symbol),
        );
        self.emit_balance_update(-total);
        self.bump();
        Ok(id)
    }

    /// Close a position at `close_price`: releases the reserved cost plus
    /// the realized PnL, net of the closing commission.
    pub fn close_position(
        &mut self,
        id: PositionId,
        close_price: Price,
        commission: Option<Amount>,
    ) -> Result<Amount, ErrorInfo> {
        let position = self
            .positions
            .get(&id)
            .cloned()
            .ok_or_else(|| ErrorInfo::new(ErrorCode::PositionNotFound))?;

        let proceeds_basis = close_price.notional(position.size);
        let close_commission = commission.unwrap_or_else(|| self.commission_for(proceeds_basis));
        let realized = realized_pnl(&position, close_price, position.size);
        let total_realized = position.realized_pnl + realized;
        let net_pnl = total_realized - position.commission - close_commission;
        let credit = position.margin_used + realized - close_commission;

        self.positions.remove(&id);
        self.balance = self.balance + credit;
        self.realized_pnl = self.realized_pnl + realized;
        self.total_commission = self.total_commission + close_commission;

        self.push_event(
            TradeEventType::PositionClosed,
            json!({
                "symbol": position.symbol,
                "side": position.side,
                "size": position.size,
                "entryPrice": position.average_cost,
                "closePrice": close_price,
                "realizedPnl": total_realized,
                "netPnl": net_pnl,
                "commission": position.commission + close_commission,
                "openedAt": position.opened_at.timestamp(),
            }),
            Some(id),
            None,
            Some(position.symbol.clone()),
        );
        self.emit_balance_update(credit);
        self.bump();
        Ok(realized)
    }

    /// Mark one position to a new price.
    pub fn update_position_price(&mut self, id: PositionId, price: Price) -> Result<(), ErrorInfo> {
        let clock = self.clock;
        let position = self
            .positions
            .get_mut(&id)
            .ok_or_else(|| ErrorInfo::new(ErrorCode::PositionNotFound))?;
        mark_position(position, price, clock);
        self.bump();
        Ok(())
    }

    /// Mark every position whose symbol appears in `prices`.
    pub fn update_all_prices(&mut self, prices: &BTreeMap<String, Price>) {
        let clock = self.clock;
        let mut touched = false;
        for position in self.positions.values_mut() {
            if let Some(price) = prices.get(&position.symbol) {
                mark_position(position, *price, clock);
                touched = true;
            }
        }
        if touched {
            self.bump();
        }
    }

    // --- Orders ---

    pub fn place_order(&mut self, params: PlaceOrderParams) -> Result<OrderId, ErrorInfo> {
        if params.size == 0 {
            return Err(
                ErrorInfo::new(ErrorCode::BadLotSize).with_message("order size must be positive")
            );
        }
        let id = OrderId(self.next_order_id);
        self.next_order_id += 1;
        let order = Order {
            id,
            symbol: params.symbol.clone(),
            side: params.side,
            order_type: params.order_type,
            price: params.price,
            trigger_price: params.trigger_price,
            size: params.size,
            filled: 0,
            remaining: params.size,
            average_price: Price::zero(),
            commission: Amount::zero(),
            status: OrderStatus::Pending,
            created_at: self.clock,
            updated_at: self.clock,
        };
        self.orders.insert(id, order);
        self.push_event(
            TradeEventType::OrderPlaced,
            json!({
                "symbol": params.symbol,
                "side": params.side,
                "type": params.order_type,
                "price": params.price,
                "size": params.size,
            }),
            None,
            Some(id),
            Some(params.symbol),
        );
        self.bump();
        Ok(id)
    }

    /// Fill an order (fully by default). Terminal orders are a no-op
    /// returning `false`. The fill drives the position lifecycle: buys open
    /// or extend, sells reduce and close at zero size.
    pub fn fill_order(
        &mut self,
        id: OrderId,
        fill_price: Price,
        fill_size: Option<u64>,
        commission: Option<Amount>,
    ) -> Result<bool, ErrorInfo> {
        let order = self
            .orders
            .get(&id)
            .ok_or_else(|| ErrorInfo::new(ErrorCode::PositionNotFound).with_message("no such order"))?
            .clone();
        if order.status.is_terminal() {
            warn!(order = %id, status = ?order.status, "refusing to fill a terminal order");
            return Ok(false);
        }

        let delta = fill_size.unwrap_or(order.remaining).min(order.remaining);
        if delta == 0 {
            return Ok(false);
        }
        let fill_notional = fill_price.notional(delta);
        let fill_commission = commission.unwrap_or_else(|| self.commission_for(fill_notional));

        // Affordability / position checks first so a rejected fill leaves
        // no partial state behind.
        match order.side {
            TradeSide::Buy => {
                if fill_notional + fill_commission > self.balance {
                    return Err(ErrorInfo::new(ErrorCode::InsufficientMargin).with_details(
                        json!({
                            "required": fill_notional + fill_commission,
                            "available": self.balance,
                        }),
                    ));
                }
            }
            TradeSide::Sell => {
                let held = self
                    .position_by_symbol(&order.symbol)
                    .map(|p| p.size)
                    .unwrap_or(0);
                if held < delta {
                    return Err(ErrorInfo::new(ErrorCode::PositionNotFound)
                        .with_message("sell size exceeds the open position"));
                }
            }
        }

        // Update the order record.
        {
            let order = self.orders.get_mut(&id).expect("order checked above");
            let prev_filled = Decimal::from(order.filled);
            let filled_now = Decimal::from(delta);
            let total = prev_filled + filled_now;
            order.average_price = Price::new(
                (order.average_price.value() * prev_filled + fill_price.value() * filled_now)
                    / total,
            );
            order.filled += delta;
            order.remaining -= delta;
            order.commission = order.commission + fill_commission;
            order.status = if order.remaining == 0 {
                OrderStatus::Filled
            } else {
                OrderStatus::Partial
            };
            order.updated_at = self.clock;
            debug_assert_eq!(order.filled + order.remaining, order.size);
        }

        self.push_event(
            TradeEventType::OrderFilled,
            json!({
                "symbol": order.symbol,
                "side": order.side,
                "price": fill_price,
                "size": delta,
                "commission": fill_commission,
            }),
            None,
            Some(id),
            Some(order.symbol.clone()),
        );

        match order.side {
            TradeSide::Buy => {
                self.apply_buy_fill(&order.symbol, fill_price, delta, fill_commission, id)
            }
            TradeSide::Sell => {
                self.apply_sell_fill(&order.symbol, fill_price, delta, fill_commission, id)
            }
        }
        self.bump();
        Ok(true)
    }

    /// Cancel a pending or partial order. Terminal orders are a no-op
    /// returning `false`.
    pub fn cancel_order(&mut self, id: OrderId) -> Result<bool, ErrorInfo> {
        let order = self
            .orders
            .get_mut(&id)
            .ok_or_else(|| ErrorInfo::new(ErrorCode::PositionNotFound).with_message("no such order"))?;
        if order.status.is_terminal() {
            warn!(order = %id, status = ?order.status, "refusing to cancel a terminal order");
            return Ok(false);
        }
        order.status = OrderStatus::Cancelled;
        order.updated_at = self.clock;
        let symbol = order.symbol.clone();
        self.push_event(
            TradeEventType::OrderCancelled,
            json!({ "symbol": symbol }),
            None,
            Some(id),
            Some(symbol.clone()),
        );
        self.bump();
        Ok(true)
    }

    /// Reject a pending order (microstructure gates). Terminal orders are a
    /// no-op returning `false`.
    pub fn reject_order(&mut self, id: OrderId, reason: &str) -> Result<bool, ErrorInfo> {
        let order = self
            .orders
            .get_mut(&id)
            .ok_or_else(|| ErrorInfo::new(ErrorCode::PositionNotFound).with_message("no such order"))?;
        if order.status.is_terminal() {
            return Ok(false);
        }
        order.status = OrderStatus::Rejected;
        order.updated_at = self.clock;
        let symbol = order.symbol.clone();
        self.push_event(
            TradeEventType::OrderCancelled,
            json!({ "symbol": symbol, "reason": reason, "rejected": true }),
            None,
            Some(id),
            Some(symbol),
        );
        self.bump();
        Ok(true)
    }

    fn apply_buy_fill(
        &mut self,
        symbol: &str,
        price: Price,
        size: u64,
        commission: Amount,
        order_id: OrderId,
    ) {
        let cost = price.notional(size);
        self.balance = self.balance - (cost + commission);
        self.total_commission = self.total_commission + commission;
        let clock = self.clock;

        let existing = self
            .positions
            .values_mut()
            .find(|p| p.symbol == symbol && p.side == PositionSide::Long);
        if let Some(position) = existing {
            let old_size = Decimal::from(position.size);
            let add = Decimal::from(size);
            position.average_cost = Price::new(
                (position.average_cost.value() * old_size + price.value() * add)
                    / (old_size + add),
            );
            position.size += size;
            position.margin_used = position.margin_used + cost;
            position.commission = position.commission + commission;
            mark_position(position, price, clock);
            let (id, data) = (
                position.id,
                json!({
                    "symbol": symbol,
                    "size": position.size,
                    "averageCost": position.average_cost,
                    "fillPrice": price,
                }),
            );
            self.push_event(
                TradeEventType::PositionUpdated,
                data,
                Some(id),
                Some(order_id),
                Some(symbol.to_string()),
            );
        } else {
            let id = PositionId(self.next_position_id);
            self.next_position_id += 1;
            let position = Position {
                id,
                symbol: symbol.to_string(),
                side: PositionSide::Long,
                size,
                entry_price: price,
                current_price: price,
                average_cost: price,
                realized_pnl: Amount::zero(),
                unrealized_pnl: Amount::zero(),
                unrealized_pnl_pct: 0.0,
                commission,
                margin_used: cost,
                opened_at: clock,
                updated_at: clock,
            };
            self.positions.insert(id, position);
            self.push_event(
                TradeEventType::PositionOpened,
                json!({
                    "symbol": symbol,
                    "side": PositionSide::Long,
                    "size": size,
                    "entryPrice": price,
                    "commission": commission,
                }),
                Some(id),
                Some(order_id),
                Some(symbol.to_string()),
            );
        }
        self.emit_balance_update(-(cost + commission));
    }

    fn apply_sell_fill(
        &mut self,
        symbol: &str,
        price: Price,
        size: u64,
        commission: Amount,
        order_id: OrderId,
    ) {
        let clock = self.clock;
        let position = self
            .positions
            .values_mut()
            .find(|p| p.symbol == symbol && p.side == PositionSide::Long)
            .expect("sell fill checked against position size");

        let released = position
            .margin_used
            .mul(Decimal::from(size))
            .and_then(|v| v.div(Decimal::from(position.size)))
            .unwrap_or(position.margin_used);
        let realized = realized_pnl(position, price, size);
        position.size -= size;
        position.margin_used = position.margin_used - released;
        position.realized_pnl = position.realized_pnl + realized;
        position.commission = position.commission + commission;
        mark_position(position, price, clock);

        let closed = position.size == 0;
        let id = position.id;
        let event = if closed {
            let net_pnl = position.realized_pnl - position.commission;
            (
                TradeEventType::PositionClosed,
                json!({
                    "symbol": symbol,
                    "side": position.side,
                    "size": 0,
                    "entryPrice": position.average_cost,
                    "closePrice": price,
                    "realizedPnl": position.realized_pnl,
                    "netPnl": net_pnl,
                    "commission": position.commission,
                    "openedAt": position.opened_at.timestamp(),
                }),
            )
        } else {
            (
                TradeEventType::PositionUpdated,
                json!({
                    "symbol": symbol,
                    "size": position.size,
                    "fillPrice": price,
                    "realizedPnl": position.realized_pnl,
                }),
            )
        };

        let credit = released + realized - commission;
        self.balance = self.balance + credit;
        self.realized_pnl = self.realized_pnl + realized;
        self.total_commission = self.total_commission + commission;
        if closed {
            self.positions.remove(&id);
        }
        self.push_event(event.0, event.1, Some(id), Some(order_id), Some(symbol.to_string()));
        self.emit_balance_update(credit);
    }

    // --- Balance operations ---

    pub fn deposit(&mut self, amount: Amount) {
        self.balance = self.balance + amount;
        self.push_event(
            TradeEventType::BalanceUpdated,
            json!({ "delta": amount, "balance": self.balance, "kind": "deposit" }),
            None,
            None,
            None,
        );
        self.bump();
    }

    /// Withdraw free cash. Reserved margin is already excluded from the
    /// balance, so any amount beyond it is refused.
    pub fn withdraw(&mut self, amount: Amount) -> bool {
        if amount > self.balance {
            return false;
        }
        self.balance = self.balance - amount;
        self.push_event(
            TradeEventType::BalanceUpdated,
            json!({ "delta": -amount, "balance": self.balance, "kind": "withdraw" }),
            None,
            None,
            None,
        );
        self.bump();
        true
    }

    /// Direct balance adjustment (interest, fees levied outside fills).
    pub fn update_balance(&mut self, delta: Amount) -> Amount {
        self.balance = self.balance + delta;
        self.push_event(
            TradeEventType::BalanceUpdated,
            json!({ "delta": delta, "balance": self.balance, "kind": "adjustment" }),
            None,
            None,
            None,
        );
        self.bump();
        self.balance
    }

    // --- Annotations ---

    /// Journal a risk-gate rejection.
    pub fn record_risk_warning(&mut self, symbol: &str, data: serde_json::Value) {
        self.push_event(
            TradeEventType::RiskWarning,
            data,
            None,
            None,
            Some(symbol.to_string()),
        );
        self.bump();
    }

    /// Journal a price alert.
    pub fn record_price_alert(&mut self, symbol: &str, data: serde_json::Value) {
        self.push_event(
            TradeEventType::PriceAlert,
            data,
            None,
            None,
            Some(symbol.to_string()),
        );
        self.bump();
    }

    // --- Derived aggregates ---

    pub fn account_summary(&self) -> AccountSummary {
        {
            let cache = self.cache.borrow();
            if cache.token == self.mutation_token {
                if let Some(summary) = &cache.summary {
                    return summary.clone();
                }
            }
        }
        let summary = self.compute_summary();
        let mut cache = self.cache.borrow_mut();
        if cache.token != self.mutation_token {
            *cache = DerivedCache::default();
            cache.token = self.mutation_token;
        }
        cache.summary = Some(summary.clone());
        summary
    }

    pub fn risk_metrics(&self) -> LedgerRiskMetrics {
        {
            let cache = self.cache.borrow();
            if cache.token == self.mutation_token {
                if let Some(risk) = &cache.risk {
                    return risk.clone();
                }
            }
        }
        let risk = self.compute_risk_metrics();
        let mut cache = self.cache.borrow_mut();
        if cache.token != self.mutation_token {
            *cache = DerivedCache::default();
            cache.token = self.mutation_token;
        }
        cache.risk = Some(risk.clone());
        risk
    }

    fn compute_summary(&self) -> AccountSummary {
        let equity = self.equity();
        let unrealized: Amount = self.positions.values().map(|p| p.unrealized_pnl).sum();
        let daily_pnl = equity - self.daily_start_balance;
        let daily_pnl_pct = if !self.daily_start_balance.is_zero() {
            daily_pnl.to_f64() / self.daily_start_balance.to_f64() * 100.0
        } else {
            0.0
        };
        AccountSummary {
            balance: self.balance,
            equity,
            margin_used: self.margin_used(),
            margin_available: self.balance,
            unrealized_pnl: unrealized,
            realized_pnl: self.realized_pnl,
            daily_pnl,
            daily_pnl_pct,
            open_positions: self.positions.len(),
            open_orders: self.open_orders().count(),
            total_commission: self.total_commission,
        }
    }

    fn compute_risk_metrics(&self) -> LedgerRiskMetrics {
        let mut wins = Vec::new();
        let mut losses = Vec::new();
        for event in &self.events {
            if event.event_type != TradeEventType::PositionClosed {
                continue;
            }
            let net: Amount = event
                .data
                .get("netPnl")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(Amount::zero);
            if net.is_positive() {
                wins.push(net);
            } else if net.is_negative() {
                losses.push(net.abs());
            } else {
                // Flat trades count toward the denominator only.
                losses.push(Amount::zero());
            }
        }

        let closed = wins.len() + losses.len();
        let gross_profit: Amount = wins.iter().copied().sum();
        let gross_loss: Amount = losses.iter().copied().sum();
        let profit_factor = if closed == 0 {
            0.0
        } else if gross_loss.is_zero() {
            if gross_profit.is_positive() {
                f64::INFINITY
            } else {
                0.0
            }
        } else {
            gross_profit.to_f64() / gross_loss.to_f64()
        };

        let real_losses: Vec<Amount> = losses.iter().copied().filter(|l| l.is_positive()).collect();
        LedgerRiskMetrics {
            closed_trades: closed,
            winning_trades: wins.len(),
            win_rate: if closed > 0 {
                wins.len() as f64 / closed as f64 * 100.0
            } else {
                0.0
            },
            profit_factor,
            avg_win: mean(&wins),
            avg_loss: mean(&real_losses),
            largest_win: wins.iter().copied().max().unwrap_or_else(Amount::zero),
            largest_loss: real_losses
                .iter()
                .copied()
                .max()
                .unwrap_or_else(Amount::zero),
        }
    }

    // --- Internals ---

    fn commission_for(&self, notional: Amount) -> Amount {
        notional
            .mul(self.commission_rate)
            .unwrap_or_else(|_| Amount::zero())
            .max(self.min_commission)
    }

    fn push_event(
        &mut self,
        event_type: TradeEventType,
        data: serde_json::Value,
        position_id: Option<PositionId>,
        order_id: Option<OrderId>,
        symbol: Option<String>,
    ) {
        let event = TradeEvent {
            id: self.next_event_id,
            event_type,
            ts: self.clock,
            data,
            position_id,
            order_id,
            symbol,
        };
        self.next_event_id += 1;
        self.events.push_back(event);
        while self.events.len() > self.max_history {
            self.events.pop_front();
        }
    }

    fn emit_balance_update(&mut self, delta: Amount) {
        self.push_event(
            TradeEventType::BalanceUpdated,
            json!({ "delta": delta, "balance": self.balance }),
            None,
            None,
            None,
        );
    }

    fn bump(&mut self) {
        self.mutation_token += 1;
    }
}

/// Signed PnL of closing `size` at `price` against the average cost.
fn realized_pnl(position: &Position, price: Price, size: u64) -> Amount {
    let per_share = price.value() - position.average_cost.value();
    Amount::new(per_share * Decimal::from(size) * Decimal::from(position.side.sign()))
}

fn mark_position(position: &mut Position, price: Price, clock: DateTime<Utc>) {
    position.current_price = price;
    let per_share = price.value() - position.average_cost.value();
    position.unrealized_pnl = Amount::new(
        per_share * Decimal::from(position.size) * Decimal::from(position.side.sign()),
    );
    position.unrealized_pnl_pct = if !position.margin_used.is_zero() {
        position.unrealized_pnl.to_f64() / position.margin_used.to_f64() * 100.0
    } else {
        0.0
    };
    position.updated_at = clock;
}

fn mean(values: &[Amount]) -> Amount {
    if values.is_empty() {
        return Amount::zero();
    }
    let total: Amount = values.iter().copied().sum();
    total
        .div(Decimal::from(values.len() as u64))
        .unwrap_or_else(|_| Amount::zero())
}
