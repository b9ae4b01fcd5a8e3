use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::json;
use tracing::{debug, info, warn};

use market_calendar::regulatory_band;
use market_core::{
    Amount, Bar, ErrorCode, ErrorInfo, Instrument, KLineSeries, Price, Ratio, TradeSide,
};
use risk_engine::{CandidateOrder, ExposureSnapshot, PortfolioState, RiskManager};
use signal_scanner::{Signal, SignalKind, SignalScanner};
use trading_ledger::{
    Order, OrderId, OrderType, PlaceOrderParams, PositionId, TradeEventType, TradingLedger,
};

use crate::data_quality::{assess_series, effective_limit_fraction, MIN_COVERAGE};
use crate::metrics::{compute_return_metrics, compute_risk_metrics, compute_trading_metrics};
use crate::models::*;

/// Microstructure flags for one bar, derived from the previous close.
#[derive(Debug, Clone, Copy, Default)]
struct BarFlags {
    limit_up: bool,
    limit_down: bool,
    suspended: bool,
}

/// Engine-side bookkeeping for an order the ledger holds.
#[derive(Debug, Clone, Copy)]
struct OrderMeta {
    placed_bar: usize,
    triggered_at: Option<usize>,
}

type ResultHook = Box<dyn FnMut(&BacktestReport) + Send>;

/// Deterministic, single-threaded scenario driver. Owns the in-flight run
/// (bar cursor, equity curve, order metadata) and borrows a fresh
/// `TradingLedger` per run for all position accounting.
pub struct BacktestEngine {
    config: BacktestConfig,
    result_hook: Option<ResultHook>,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Self {
        Self {
            config,
            result_hook: None,
        }
    }

    /// Called exactly once with the final report of each successful run.
    pub fn with_result_hook(mut self, hook: impl FnMut(&BacktestReport) + Send + 'static) -> Self {
        self.result_hook = Some(Box::new(hook));
        self
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Run the scenario over `series`. Fails preflight with a single
    /// `ErrorInfo`; recoverable per-bar conditions become journal events.
    pub fn run(
        &mut self,
        series: &KLineSeries,
        instrument: &Instrument,
        source: SignalSource,
        benchmark: Option<&KLineSeries>,
        mut observer: Option<&mut dyn ProgressObserver>,
    ) -> Result<BacktestReport, ErrorInfo> {
        self.preflight(series)?;
        if let Some(expected) = &self.config.benchmark_symbol {
            match benchmark {
                Some(bench) if bench.symbol() != expected => {
                    return Err(ErrorInfo::new(ErrorCode::SymbolNotFound).with_message(format!(
                        "benchmark series is for {}, config wants {expected}",
                        bench.symbol()
                    )));
                }
                None => {
                    warn!(
                        benchmark = %expected,
                        "benchmark symbol configured but no series supplied; alpha skipped"
                    );
                }
                _ => {}
            }
        }

        let instrument = self.effective_instrument(instrument);
        let limit_fraction =
            effective_limit_fraction(&instrument, self.config.price_limit_pct);
        let data_quality = assess_series(series, limit_fraction);
        if data_quality.coverage < MIN_COVERAGE {
            return Err(ErrorInfo::new(ErrorCode::DataQuality)
                .with_message(format!(
                    "bar coverage {:.0}% is below the {:.0}% floor",
                    data_quality.coverage * 100.0,
                    MIN_COVERAGE * 100.0
                ))
                .with_action("re-fetch the series or narrow the date range"));
        }

        let signals_by_entry = self.index_signals(series, &instrument, &source)?;

        let bars = series.bars();
        let total = bars.len();
        let mut ledger = TradingLedger::new(self.config.initial_capital, bars[0].ts)
            .with_commission(self.config.commission_rate, self.config.min_commission);
        let risk = RiskManager::new(self.config.risk_limits());
        let mut order_meta: BTreeMap<OrderId, OrderMeta> = BTreeMap::new();
        let mut scheduled_exits: BTreeMap<usize, u32> = BTreeMap::new();
        let mut equity_curve: Vec<EquityPoint> = Vec::with_capacity(total);
        let mut exposed_bars = 0usize;
        let mut cancelled = false;

        info!(
            symbol = self.config.symbol,
            bars = total,
            capital = %self.config.initial_capital,
            "starting backtest"
        );

        for i in 0..total {
            let bar = &bars[i];
            let flags = self.bar_flags(bars, i, &instrument);
            ledger.advance_clock(bar.ts);
            ledger.ensure_daily_window(bar.ts.date_naive());

            // 1. Mark-to-market. A halted bar has no tradable price, so
            // positions stay marked at the previous close.
            if !flags.suspended {
                let mut prices = BTreeMap::new();
                prices.insert(self.config.symbol.clone(), Price::new(bar.close));
                ledger.update_all_prices(&prices);
            }

            // 2. Match pending orders against this bar.
            self.process_pending_orders(&mut ledger, &mut order_meta, bars, i, flags);

            // 3. Exits scheduled by earlier entries (signal holding window).
            if scheduled_exits.remove(&i).is_some() {
                self.exit_position(
                    &mut ledger,
                    &mut order_meta,
                    &mut scheduled_exits,
                    bars,
                    i,
                    flags,
                );
            }

            // 4. Consume signals whose entry is this bar, behind the risk
            // gate and the microstructure gates.
            if let Some(signals) = signals_at(&signals_by_entry, &source, i, bar) {
                for signal in signals {
                    self.consume_signal(
                        &mut ledger,
                        &mut order_meta,
                        &mut scheduled_exits,
                        &risk,
                        &signal,
                        bars,
                        i,
                        flags,
                    );
                }
            }

            // 5. Equity snapshot.
            if ledger.positions().next().is_some() {
                exposed_bars += 1;
            }
            equity_curve.push(EquityPoint {
                ts: bar.ts,
                value: ledger.equity(),
            });

            let completed = i + 1;
            let report_every = self.config.report_every_n_bars.max(1);
            if completed % report_every == 0 && completed < total {
                if let Some(obs) = observer.as_deref_mut() {
                    if obs.on_progress(completed, total) == ObserverSignal::Cancel {
                        warn!(completed, total, "run cancelled by observer");
                        cancelled = true;
                        break;
                    }
                }
            }
        }

        // Liquidate whatever is still open at the most recent marks.
        self.close_all_positions(&mut ledger);
        if let Some(last) = equity_curve.last_mut() {
            last.value = ledger.equity();
        }

        if let Some(obs) = observer.as_deref_mut() {
            let completed = equity_curve.len();
            obs.on_progress(completed, total);
        }

        let report = self.assemble_report(
            &ledger,
            equity_curve,
            exposed_bars,
            cancelled,
            data_quality,
            benchmark,
        );
        info!(
            symbol = self.config.symbol,
            total_return_pct = report.return_metrics.total_return_pct,
            trades = report.trading_metrics.total_trades,
            cancelled,
            "backtest finished"
        );
        if let Some(hook) = self.result_hook.as_mut() {
            hook(&report);
        }
        Ok(report)
    }

    // --- Preflight ---

    fn preflight(&self, series: &KLineSeries) -> Result<(), ErrorInfo> {
        if !self.config.initial_capital.is_positive() {
            return Err(ErrorInfo::new(ErrorCode::InvalidCapital));
        }
        if self.config.end <= self.config.start {
            return Err(ErrorInfo::new(ErrorCode::InvalidDateRange));
        }
        if series.is_empty() {
            return Err(ErrorInfo::new(ErrorCode::InsufficientData)
                .with_message("the bar series is empty"));
        }
        if series.symbol() != self.config.symbol {
            return Err(ErrorInfo::new(ErrorCode::SymbolNotFound).with_message(format!(
                "series is for {}, config wants {}",
                series.symbol(),
                self.config.symbol
            )));
        }
        if self.config.lot_size == 0 {
            return Err(ErrorInfo::new(ErrorCode::BadLotSize));
        }
        if series.len() <= self.config.holding_days {
            return Err(ErrorInfo::new(ErrorCode::InsufficientData).with_message(format!(
                "{} {:?} bars cannot cover a {}-bar holding window",
                series.len(),
                series.timeframe(),
                self.config.holding_days
            )));
        }
        Ok(())
    }

    fn effective_instrument(&self, instrument: &Instrument) -> Instrument {
        let mut effective = instrument.clone();
        effective.lot_size = self.config.lot_size;
        if let Some(pct) = self.config.price_limit_pct {
            effective.price_limit_pct = Ratio::new(pct);
        }
        effective
    }

    fn index_signals(
        &self,
        series: &KLineSeries,
        instrument: &Instrument,
        source: &SignalSource,
    ) -> Result<BTreeMap<usize, Vec<Signal>>, ErrorInfo> {
        let mut by_entry: BTreeMap<usize, Vec<Signal>> = BTreeMap::new();
        match source {
            SignalSource::Strategy { id, options } => {
                let result = SignalScanner::new().scan(series, instrument, id, options)?;
                for signal in result.signals {
                    by_entry.entry(signal.entry_bar_index).or_default().push(signal);
                }
            }
            SignalSource::Prepared(signals) => {
                for signal in signals {
                    by_entry
                        .entry(signal.entry_bar_index)
                        .or_default()
                        .push(signal.clone());
                }
            }
            SignalSource::Provider(_) => {}
        }
        Ok(by_entry)
    }

    // --- Microstructure ---

    fn bar_flags(&self, bars: &[Bar], i: usize, instrument: &Instrument) -> BarFlags {
        let bar = &bars[i];
        let mut flags = BarFlags {
            suspended: bar.is_suspended(),
            ..BarFlags::default()
        };
        if i == 0 {
            return flags;
        }
        let band = regulatory_band(instrument, Price::new(bars[i - 1].close));
        let two_dp =
            |v: Decimal| v.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        if let Some(upper) = band.upper {
            flags.limit_up =
                two_dp(bar.close) == two_dp(upper.value()) && two_dp(bar.high) == two_dp(bar.close);
        }
        if let Some(lower) = band.lower {
            flags.limit_down =
                two_dp(bar.close) == two_dp(lower.value()) && two_dp(bar.low) == two_dp(bar.close);
        }
        flags
    }

    fn process_pending_orders(
        &self,
        ledger: &mut TradingLedger,
        order_meta: &mut BTreeMap<OrderId, OrderMeta>,
        bars: &[Bar],
        i: usize,
        flags: BarFlags,
    ) {
        if flags.suspended {
            // No trading against a halted bar; orders wait.
            return;
        }
        let bar = &bars[i];
        let open_orders: Vec<Order> = ledger.open_orders().cloned().collect();
        for order in open_orders {
            let Some(meta) = order_meta.get_mut(&order.id) else {
                continue;
            };
            if meta.placed_bar >= i {
                continue;
            }

            let basis = match order.order_type {
                OrderType::Market => Some(bar.open),
                OrderType::Limit => limit_fill_basis(&order, bar),
                OrderType::Stop => {
                    match meta.triggered_at {
                        Some(t) if t < i => Some(bar.open),
                        Some(_) => None,
                        None => {
                            if stop_triggers(&order, bar) {
                                meta.triggered_at = Some(i);
                            }
                            None
                        }
                    }
                }
                OrderType::StopLimit => {
                    match meta.triggered_at {
                        Some(t) if t < i => limit_fill_basis(&order, bar),
                        Some(_) => None,
                        None => {
                            if stop_triggers(&order, bar) {
                                meta.triggered_at = Some(i);
                            }
                            None
                        }
                    }
                }
            };
            let Some(basis) = basis else {
                continue;
            };

            // Limit-locked bars block the aggressing side.
            let blocked = match order.side {
                TradeSide::Buy if flags.limit_up => Some("cannot_buy"),
                TradeSide::Sell if flags.limit_down => Some("cannot_sell"),
                _ => None,
            };
            if let Some(reason) = blocked {
                let symbol = order.symbol.clone();
                let _ = ledger.reject_order(order.id, reason);
                ledger.record_risk_warning(
                    &symbol,
                    json!({ "reason": reason, "orderId": order.id, "barIndex": i }),
                );
                continue;
            }

            self.fill_at(ledger, &order, basis, bar, i);
        }
    }

    fn fill_at(
        &self,
        ledger: &mut TradingLedger,
        order: &Order,
        basis: Decimal,
        bar: &Bar,
        bar_index: usize,
    ) {
        let size = order.remaining;
        let slip = self.config.slippage.fraction(size, bar.volume);
        let slip_factor = match order.side {
            TradeSide::Buy => 1.0 + slip,
            TradeSide::Sell => 1.0 - slip,
        };
        let fill_price = Price::new(
            basis * Decimal::from_f64(slip_factor).unwrap_or(Decimal::ONE),
        );
        let notional = fill_price.notional(size);
        let fees = self.fees_for(order.side, notional);

        match ledger.fill_order(order.id, fill_price, None, Some(fees)) {
            Ok(true) => {
                debug!(order = %order.id, price = %fill_price, size, "order filled");
            }
            Ok(false) => {}
            Err(error) => {
                // Affordability changed since placement (slippage, fees):
                // reject rather than leaving a stuck order.
                let _ = ledger.reject_order(order.id, "unfillable");
                ledger.record_risk_warning(
                    &order.symbol,
                    json!({
                        "reason": "unfillable",
                        "orderId": order.id,
                        "barIndex": bar_index,
                        "error": error.code.code(),
                    }),
                );
            }
        }
    }

    fn fees_for(&self, side: TradeSide, notional: Amount) -> Amount {
        let commission = notional
            .mul(self.config.commission_rate)
            .unwrap_or_else(|_| Amount::zero())
            .max(self.config.min_commission);
        let transfer = notional
            .mul(self.config.transfer_fee_rate)
            .unwrap_or_else(|_| Amount::zero());
        let stamp = if side == TradeSide::Sell {
            notional
                .mul(self.config.stamp_duty_rate)
                .unwrap_or_else(|_| Amount::zero())
        } else {
            Amount::zero()
        };
        commission + transfer + stamp
    }

    // --- Signal consumption ---

    /// Sell out the whole holding when a scheduled exit bar arrives. A
    /// limit-down or halted exit bar pushes the exit to the next bar.
    fn exit_position(
        &self,
        ledger: &mut TradingLedger,
        order_meta: &mut BTreeMap<OrderId, OrderMeta>,
        scheduled_exits: &mut BTreeMap<usize, u32>,
        bars: &[Bar],
        i: usize,
        flags: BarFlags,
    ) {
        let symbol = &self.config.symbol;
        let Some(position) = ledger.position_by_symbol(symbol) else {
            return;
        };
        let retry = if flags.suspended {
            Some("suspended")
        } else if flags.limit_down {
            Some("cannot_sell")
        } else {
            None
        };
        if let Some(reason) = retry {
            ledger.record_risk_warning(
                symbol,
                json!({ "reason": reason, "barIndex": i, "deferredExit": true }),
            );
            if i + 1 < bars.len() {
                *scheduled_exits.entry(i + 1).or_insert(0) += 1;
            }
            return;
        }

        let size = position.size;
        let price = Price::new(bars[i].close);
        match ledger.place_order(PlaceOrderParams {
            symbol: symbol.clone(),
            side: TradeSide::Sell,
            order_type: OrderType::Market,
            price,
            trigger_price: None,
            size,
        }) {
            Ok(id) => {
                order_meta.insert(
                    id,
                    OrderMeta {
                        placed_bar: i,
                        triggered_at: None,
                    },
                );
                if self.config.fill_on_signal_bar {
                    if let Some(order) = ledger.order(id).cloned() {
                        self.fill_at(ledger, &order, bars[i].close, &bars[i], i);
                    }
                }
            }
            Err(error) => {
                warn!(%error, bar = i, "failed to place scheduled exit");
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn consume_signal(
        &self,
        ledger: &mut TradingLedger,
        order_meta: &mut BTreeMap<OrderId, OrderMeta>,
        scheduled_exits: &mut BTreeMap<usize, u32>,
        risk: &RiskManager,
        signal: &Signal,
        bars: &[Bar],
        i: usize,
        flags: BarFlags,
    ) {
        let bar = &bars[i];
        let symbol = &self.config.symbol;

        match signal.kind {
            SignalKind::Buy => {
                // A limit-locked bar outranks the halt flag in the reason
                // we report: the buy is impossible either way.
                if flags.limit_up || flags.suspended {
                    let reason = if flags.limit_up {
                        "cannot_buy"
                    } else {
                        "suspended"
                    };
                    ledger.record_risk_warning(
                        symbol,
                        json!({
                            "reason": reason,
                            "barIndex": i,
                            "strategyId": signal.strategy_id,
                        }),
                    );
                    return;
                }
                let price = Price::new(bar.close);
                let Some(size) = self.entry_size(ledger.balance(), price) else {
                    debug!(bar = i, "free cash below one lot, skipping entry");
                    return;
                };

                let candidate = CandidateOrder {
                    symbol: symbol.clone(),
                    side: TradeSide::Buy,
                    price,
                    size,
                };
                let validation = risk.validate_order(&candidate, &portfolio_state(ledger));
                if !validation.allowed {
                    ledger.record_risk_warning(
                        symbol,
                        json!({
                            "reason": "risk_blocked",
                            "barIndex": i,
                            "blockedBy": validation.blocked_by,
                            "riskScore": validation.risk_score,
                        }),
                    );
                    return;
                }

                match ledger.place_order(PlaceOrderParams {
                    symbol: symbol.clone(),
                    side: TradeSide::Buy,
                    order_type: OrderType::Market,
                    price,
                    trigger_price: None,
                    size,
                }) {
                    Ok(id) => {
                        order_meta.insert(
                            id,
                            OrderMeta {
                                placed_bar: i,
                                triggered_at: None,
                            },
                        );
                        // Signals without a forward exit of their own fall
                        // back to the configured holding window.
                        let exit_bar = if signal.exit_bar_index > i {
                            signal.exit_bar_index
                        } else {
                            i + self.config.holding_days
                        };
                        if exit_bar > i && exit_bar < bars.len() {
                            *scheduled_exits.entry(exit_bar).or_insert(0) += 1;
                        }
                        if self.config.fill_on_signal_bar {
                            if let Some(order) = ledger.order(id).cloned() {
                                self.fill_at(ledger, &order, bar.close, bar, i);
                            }
                        }
                    }
                    Err(error) => {
                        warn!(%error, bar = i, "failed to place entry order");
                    }
                }
            }
            SignalKind::Sell => {
                let Some(position) = ledger.position_by_symbol(symbol) else {
                    // Cash-equity mode never opens shorts, flag on or off.
                    ledger.record_risk_warning(
                        symbol,
                        json!({
                            "reason": "short_sell_rejected",
                            "barIndex": i,
                            "strategyId": signal.strategy_id,
                        }),
                    );
                    return;
                };
                if flags.limit_down || flags.suspended {
                    let reason = if flags.limit_down {
                        "cannot_sell"
                    } else {
                        "suspended"
                    };
                    ledger.record_risk_warning(
                        symbol,
                        json!({
                            "reason": reason,
                            "barIndex": i,
                            "strategyId": signal.strategy_id,
                        }),
                    );
                    return;
                }
                let size = position.size;
                let price = Price::new(bar.close);
                match ledger.place_order(PlaceOrderParams {
                    symbol: symbol.clone(),
                    side: TradeSide::Sell,
                    order_type: OrderType::Market,
                    price,
                    trigger_price: None,
                    size,
                }) {
                    Ok(id) => {
                        order_meta.insert(
                            id,
                            OrderMeta {
                                placed_bar: i,
                                triggered_at: None,
                            },
                        );
                        if self.config.fill_on_signal_bar {
                            if let Some(order) = ledger.order(id).cloned() {
                                self.fill_at(ledger, &order, bar.close, bar, i);
                            }
                        }
                    }
                    Err(error) => {
                        warn!(%error, bar = i, "failed to place exit order");
                    }
                }
            }
        }
    }

    /// Lot-rounded entry size from free cash and the configured commitment,
    /// with headroom for commission, transfer fee, and worst-case slippage
    /// so the eventual fill stays affordable.
    fn entry_size(&self, free_cash: Amount, price: Price) -> Option<u64> {
        if !price.is_positive() {
            return None;
        }
        let pct = Decimal::from_f64(self.config.position_size_pct).unwrap_or(Decimal::ONE_HUNDRED);
        let budget = free_cash.value() * pct / Decimal::ONE_HUNDRED;

        let slippage_bound = match self.config.slippage {
            SlippageModel::None => Decimal::ZERO,
            SlippageModel::FixedBps(bps) | SlippageModel::VolumePct(bps) => {
                Decimal::from_f64(bps / 10_000.0).unwrap_or(Decimal::ZERO)
            }
        };
        let cushion = Decimal::ONE
            + self.config.commission_rate
            + self.config.transfer_fee_rate
            + slippage_bound;
        let usable = (budget - self.config.min_commission.value()).max(Decimal::ZERO) / cushion;

        let shares = (usable / price.value()).floor().to_u64().unwrap_or(0);
        let lot = u64::from(self.config.lot_size);
        let rounded = shares / lot * lot;
        (rounded >= lot).then_some(rounded)
    }

    fn close_all_positions(&self, ledger: &mut TradingLedger) {
        let holdings: Vec<(PositionId, Price, u64)> = ledger
            .positions()
            .map(|p| (p.id, p.current_price, p.size))
            .collect();
        for (id, price, size) in holdings {
            let fees = self.fees_for(TradeSide::Sell, price.notional(size));
            if let Err(error) = ledger.close_position(id, price, Some(fees)) {
                warn!(%error, position = %id, "failed to liquidate at end of run");
            }
        }
    }

    // --- Result assembly ---

    fn assemble_report(
        &self,
        ledger: &TradingLedger,
        equity_curve: Vec<EquityPoint>,
        exposed_bars: usize,
        cancelled: bool,
        data_quality: DataQualityReport,
        benchmark: Option<&KLineSeries>,
    ) -> BacktestReport {
        let trades = closed_trades(ledger);

        let benchmark_returns: Option<Vec<f64>> = benchmark.map(|series| {
            let closes = series.closes_f64();
            closes
                .windows(2)
                .filter_map(|w| (w[0] != 0.0).then(|| w[1] / w[0] - 1.0))
                .collect()
        });

        let return_metrics = compute_return_metrics(
            &equity_curve,
            self.config.initial_capital,
            benchmark_returns.as_deref(),
        );
        let risk_metrics = compute_risk_metrics(
            &equity_curve,
            return_metrics.annualized_return_pct,
            0.0,
        );
        let trading_metrics = compute_trading_metrics(
            &trades,
            equity_curve.len(),
            exposed_bars,
            return_metrics.total_return_pct,
            risk_metrics.max_drawdown_pct,
        );

        BacktestReport {
            config: self.config.clone(),
            return_metrics,
            risk_metrics,
            trading_metrics,
            equity_curve,
            events: ledger.events().cloned().collect(),
            data_quality,
            cancelled,
        }
    }
}

fn limit_fill_basis(order: &Order, bar: &Bar) -> Option<Decimal> {
    let limit = order.price.value();
    match order.side {
        TradeSide::Buy => (bar.low <= limit).then(|| limit.min(bar.high)),
        TradeSide::Sell => (bar.high >= limit).then(|| limit.max(bar.low)),
    }
}

fn stop_triggers(order: &Order, bar: &Bar) -> bool {
    let Some(trigger) = order.trigger_price else {
        return false;
    };
    match order.side {
        TradeSide::Buy => bar.high >= trigger.value(),
        TradeSide::Sell => bar.low <= trigger.value(),
    }
}

fn portfolio_state(ledger: &TradingLedger) -> PortfolioState {
    let summary = ledger.account_summary();
    PortfolioState {
        equity: summary.equity,
        balance: summary.balance,
        margin_available: summary.margin_available,
        daily_pnl: summary.daily_pnl,
        positions: ledger
            .positions()
            .map(|p| ExposureSnapshot {
                symbol: p.symbol.clone(),
                value: p.market_value(),
            })
            .collect(),
    }
}

fn signals_at(
    indexed: &BTreeMap<usize, Vec<Signal>>,
    source: &SignalSource,
    i: usize,
    bar: &Bar,
) -> Option<Vec<Signal>> {
    match source {
        SignalSource::Provider(provider) => {
            let signals = provider.signals_at(i, bar);
            (!signals.is_empty()).then_some(signals)
        }
        _ => indexed.get(&i).cloned(),
    }
}

/// Round trips reconstructed from POSITION_CLOSED journal entries.
fn closed_trades(ledger: &TradingLedger) -> Vec<ClosedTrade> {
    ledger
        .events()
        .filter(|e| e.event_type == TradeEventType::PositionClosed)
        .map(|event| {
            let net_pnl = event
                .data
                .get("netPnl")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(Amount::zero);
            let opened_at = event
                .data
                .get("openedAt")
                .and_then(|v| v.as_i64())
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
                .unwrap_or(event.ts);
            ClosedTrade {
                net_pnl,
                opened_at,
                closed_at: event.ts,
            }
        })
        .collect()
}
