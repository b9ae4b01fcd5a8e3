use chrono::{Duration, NaiveDate, TimeZone, Utc};
use rust_decimal_macros::dec;

use market_core::{Amount, PositionSide, Price, TradeSide};

use crate::ledger::TradingLedger;
use crate::models::*;

fn start() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 1, 30, 0).unwrap()
}

fn ledger(initial: rust_decimal::Decimal) -> TradingLedger {
    TradingLedger::new(Amount::new(initial), start())
}

fn open(
    ledger: &mut TradingLedger,
    symbol: &str,
    size: u64,
    price: rust_decimal::Decimal,
) -> PositionId {
    ledger
        .open_position(OpenPositionParams {
            symbol: symbol.to_string(),
            side: PositionSide::Long,
            size,
            entry_price: Price::new(price),
            commission: Some(Amount::zero()),
        })
        .unwrap()
}

fn market_order(
    ledger: &mut TradingLedger,
    symbol: &str,
    side: TradeSide,
    size: u64,
    price: rust_decimal::Decimal,
) -> OrderId {
    ledger
        .place_order(PlaceOrderParams {
            symbol: symbol.to_string(),
            side,
            order_type: OrderType::Market,
            price: Price::new(price),
            trigger_price: None,
            size,
        })
        .unwrap()
}

/// Sum of BALANCE_UPDATED deltas recorded in the journal.
fn balance_delta_sum(ledger: &TradingLedger) -> Amount {
    ledger
        .events()
        .filter(|e| e.event_type == TradeEventType::BalanceUpdated)
        .map(|e| {
            e.data
                .get("delta")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<Amount>().ok())
                .unwrap_or_else(Amount::zero)
        })
        .sum()
}

#[test]
fn money_precision_survives_deposits() {
    let mut ledger = ledger(dec!(100.10));
    ledger.deposit(Amount::new(dec!(100.20)));
    assert_eq!(ledger.balance().to_string(), "200.30");
}

#[test]
fn open_close_round_trip_is_exact() {
    let mut ledger = ledger(dec!(100000));
    let id = open(&mut ledger, "600000", 100, dec!(10));
    // Cost 1,000 reserved: balance down, equity unchanged.
    assert_eq!(ledger.balance().to_string(), "99000.00");
    assert_eq!(ledger.equity().to_string(), "100000.00");
    assert_eq!(ledger.margin_used().to_string(), "1000.00");

    let realized = ledger
        .close_position(id, Price::new(dec!(12)), Some(Amount::zero()))
        .unwrap();
    assert_eq!(realized.to_string(), "200.00");
    assert_eq!(ledger.balance().to_string(), "100200.00");
    assert_eq!(ledger.equity(), ledger.balance());
    assert!(ledger.position(id).is_none());
}

#[test]
fn balance_updated_deltas_reconcile_with_balance() {
    let mut ledger = ledger(dec!(50000));
    let id = open(&mut ledger, "600000", 200, dec!(25));
    ledger.deposit(Amount::new(dec!(1234.56)));
    ledger
        .close_position(id, Price::new(dec!(24)), Some(Amount::zero()))
        .unwrap();
    assert!(ledger.withdraw(Amount::new(dec!(500))));

    let expected = ledger.balance() - ledger.initial_balance();
    assert_eq!(balance_delta_sum(&ledger), expected);
}

#[test]
fn insufficient_cash_blocks_opening() {
    let mut ledger = ledger(dec!(500));
    let err = ledger
        .open_position(OpenPositionParams {
            symbol: "600000".to_string(),
            side: PositionSide::Long,
            size: 100,
            entry_price: Price::new(dec!(10)),
            commission: None,
        })
        .unwrap_err();
    assert_eq!(err.code.code(), "BT303");
    assert_eq!(ledger.balance().to_string(), "500.00");
    assert_eq!(ledger.event_count(), 0);
}

#[test]
fn default_commission_applies_a_floor() {
    let mut ledger = ledger(dec!(100000));
    // 0.0003 * 1000 = 0.30, floored to the 5.00 minimum.
    ledger
        .open_position(OpenPositionParams {
            symbol: "600000".to_string(),
            side: PositionSide::Long,
            size: 100,
            entry_price: Price::new(dec!(10)),
            commission: None,
        })
        .unwrap();
    assert_eq!(ledger.balance().to_string(), "98995.00");
    assert_eq!(ledger.account_summary().total_commission.to_string(), "5.00");
}

#[test]
fn fill_promotes_partial_then_filled_with_weighted_average() {
    let mut ledger = ledger(dec!(100000));
    let id = market_order(&mut ledger, "600000", TradeSide::Buy, 300, dec!(10));

    assert!(ledger
        .fill_order(id, Price::new(dec!(10)), Some(100), Some(Amount::zero()))
        .unwrap());
    {
        let order = ledger.order(id).unwrap();
        assert_eq!(order.status, OrderStatus::Partial);
        assert_eq!(order.filled + order.remaining, order.size);
        assert_eq!(order.average_price.to_string(), "10.0000");
    }

    // Default fill size is the remaining 200 shares.
    assert!(ledger
        .fill_order(id, Price::new(dec!(11)), None, Some(Amount::zero()))
        .unwrap());
    let order = ledger.order(id).unwrap();
    assert_eq!(order.status, OrderStatus::Filled);
    assert_eq!(order.filled, 300);
    assert_eq!(order.remaining, 0);
    // (100*10 + 200*11) / 300
    assert_eq!(order.average_price.to_string(), "10.6667");

    let position = ledger.position_by_symbol("600000").unwrap();
    assert_eq!(position.size, 300);
}

#[test]
fn terminal_orders_refuse_fills_and_cancels() {
    let mut ledger = ledger(dec!(100000));
    let id = market_order(&mut ledger, "600000", TradeSide::Buy, 100, dec!(10));
    assert!(ledger
        .fill_order(id, Price::new(dec!(10)), None, Some(Amount::zero()))
        .unwrap());

    let balance_before = ledger.balance();
    assert!(!ledger
        .fill_order(id, Price::new(dec!(10)), None, Some(Amount::zero()))
        .unwrap());
    assert!(!ledger.cancel_order(id).unwrap());
    assert_eq!(ledger.balance(), balance_before);
}

#[test]
fn cancelled_orders_are_terminal() {
    let mut ledger = ledger(dec!(100000));
    let id = market_order(&mut ledger, "600000", TradeSide::Buy, 100, dec!(10));
    assert!(ledger.cancel_order(id).unwrap());
    assert_eq!(ledger.order(id).unwrap().status, OrderStatus::Cancelled);
    assert!(!ledger
        .fill_order(id, Price::new(dec!(10)), None, Some(Amount::zero()))
        .unwrap());
}

#[test]
fn buy_fills_extend_with_weighted_cost_and_sells_reduce() {
    let mut ledger = ledger(dec!(100000));
    let buy1 = market_order(&mut ledger, "600000", TradeSide::Buy, 100, dec!(10));
    ledger
        .fill_order(buy1, Price::new(dec!(10)), None, Some(Amount::zero()))
        .unwrap();
    let buy2 = market_order(&mut ledger, "600000", TradeSide::Buy, 100, dec!(12));
    ledger
        .fill_order(buy2, Price::new(dec!(12)), None, Some(Amount::zero()))
        .unwrap();

    let position = ledger.position_by_symbol("600000").unwrap();
    assert_eq!(position.size, 200);
    assert_eq!(position.average_cost.to_string(), "11.0000");
    assert_eq!(position.margin_used.to_string(), "2200.00");

    let sell = market_order(&mut ledger, "600000", TradeSide::Sell, 100, dec!(13));
    ledger
        .fill_order(sell, Price::new(dec!(13)), None, Some(Amount::zero()))
        .unwrap();
    let position = ledger.position_by_symbol("600000").unwrap();
    assert_eq!(position.size, 100);
    assert_eq!(position.realized_pnl.to_string(), "200.00");

    // Selling the rest deletes the position and journals the close.
    let sell = market_order(&mut ledger, "600000", TradeSide::Sell, 100, dec!(13));
    ledger
        .fill_order(sell, Price::new(dec!(13)), None, Some(Amount::zero()))
        .unwrap();
    assert!(ledger.position_by_symbol("600000").is_none());
    assert!(ledger
        .events()
        .any(|e| e.event_type == TradeEventType::PositionClosed));
    // 100,000 + 200 + 200 realized in total.
    assert_eq!(ledger.balance().to_string(), "100400.00");
    assert_eq!(ledger.equity(), ledger.balance());
}

#[test]
fn oversized_sell_is_rejected_before_any_mutation() {
    let mut ledger = ledger(dec!(100000));
    let buy = market_order(&mut ledger, "600000", TradeSide::Buy, 100, dec!(10));
    ledger
        .fill_order(buy, Price::new(dec!(10)), None, Some(Amount::zero()))
        .unwrap();

    let sell = market_order(&mut ledger, "600000", TradeSide::Sell, 200, dec!(10));
    let balance_before = ledger.balance();
    let events_before = ledger.event_count();
    assert!(ledger
        .fill_order(sell, Price::new(dec!(10)), None, Some(Amount::zero()))
        .is_err());
    assert_eq!(ledger.balance(), balance_before);
    assert_eq!(ledger.event_count(), events_before);
    assert_eq!(ledger.order(sell).unwrap().status, OrderStatus::Pending);
}

#[test]
fn fill_event_sequence_matches_the_contract() {
    let mut ledger = ledger(dec!(100000));
    let id = market_order(&mut ledger, "600000", TradeSide::Buy, 100, dec!(10));
    ledger
        .fill_order(id, Price::new(dec!(10)), None, Some(Amount::zero()))
        .unwrap();

    let types: Vec<TradeEventType> = ledger.events().map(|e| e.event_type).collect();
    assert_eq!(
        types,
        vec![
            TradeEventType::OrderPlaced,
            TradeEventType::OrderFilled,
            TradeEventType::PositionOpened,
            TradeEventType::BalanceUpdated,
        ]
    );
}

#[test]
fn mark_to_market_moves_equity_not_balance() {
    let mut ledger = ledger(dec!(100000));
    let id = open(&mut ledger, "600000", 100, dec!(10));
    ledger.update_position_price(id, Price::new(dec!(11))).unwrap();

    assert_eq!(ledger.balance().to_string(), "99000.00");
    assert_eq!(ledger.equity().to_string(), "100100.00");
    let position = ledger.position(id).unwrap();
    assert_eq!(position.unrealized_pnl.to_string(), "100.00");
    assert!((position.unrealized_pnl_pct - 10.0).abs() < 1e-9);
}

#[test]
fn update_all_prices_touches_matching_symbols_only() {
    let mut ledger = ledger(dec!(100000));
    let a = open(&mut ledger, "600000", 100, dec!(10));
    let b = open(&mut ledger, "000001", 100, dec!(20));

    let mut prices = std::collections::BTreeMap::new();
    prices.insert("600000".to_string(), Price::new(dec!(12)));
    ledger.update_all_prices(&prices);

    assert_eq!(ledger.position(a).unwrap().current_price.to_string(), "12.0000");
    assert_eq!(ledger.position(b).unwrap().current_price.to_string(), "20.0000");
}

#[test]
fn withdraw_is_limited_to_free_cash() {
    let mut ledger = ledger(dec!(10000));
    open(&mut ledger, "600000", 100, dec!(50));
    // 5,000 reserved; only 5,000 free.
    assert!(!ledger.withdraw(Amount::new(dec!(6000))));
    assert!(ledger.withdraw(Amount::new(dec!(5000))));
    assert_eq!(ledger.balance().to_string(), "0.00");
}

#[test]
fn daily_window_resets_on_date_change() {
    let mut ledger = ledger(dec!(100000));
    let id = open(&mut ledger, "600000", 100, dec!(10));
    ledger.update_position_price(id, Price::new(dec!(15))).unwrap();
    assert_eq!(ledger.account_summary().daily_pnl.to_string(), "500.00");

    // Same date: no reset.
    ledger.ensure_daily_window(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    assert_eq!(ledger.account_summary().daily_pnl.to_string(), "500.00");

    // New trading date: baseline snaps to current equity.
    ledger.advance_clock(start() + Duration::days(1));
    ledger.ensure_daily_window(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
    assert_eq!(ledger.account_summary().daily_pnl.to_string(), "0.00");
}

#[test]
fn win_rate_and_profit_factor_from_closed_trades() {
    let mut ledger = ledger(dec!(100000));
    for (entry, exit) in [(dec!(10), dec!(15)), (dec!(10), dec!(7)), (dec!(10), dec!(12))] {
        let id = open(&mut ledger, "600000", 1, entry);
        ledger
            .close_position(id, Price::new(exit), Some(Amount::zero()))
            .unwrap();
    }

    let metrics = ledger.risk_metrics();
    assert_eq!(metrics.closed_trades, 3);
    assert_eq!(metrics.winning_trades, 2);
    assert!((metrics.win_rate - 66.66666666666667).abs() < 1e-9);
    assert!((metrics.profit_factor - 7.0 / 3.0).abs() < 1e-9);
    assert_eq!(metrics.avg_win.to_string(), "3.50");
    assert_eq!(metrics.avg_loss.to_string(), "3.00");
    assert_eq!(metrics.largest_win.to_string(), "5.00");
    assert_eq!(metrics.largest_loss.to_string(), "3.00");
}

#[test]
fn profit_factor_edge_cases() {
    let mut ledger = ledger(dec!(100000));
    assert_eq!(ledger.risk_metrics().profit_factor, 0.0);

    let id = open(&mut ledger, "600000", 1, dec!(10));
    ledger
        .close_position(id, Price::new(dec!(15)), Some(Amount::zero()))
        .unwrap();
    assert!(ledger.risk_metrics().profit_factor.is_infinite());
}

#[test]
fn event_history_is_trimmed_fifo() {
    let mut ledger = TradingLedger::new(Amount::new(dec!(100000)), start()).with_max_history(5);
    for _ in 0..4 {
        ledger.deposit(Amount::new(dec!(1)));
        ledger.withdraw(Amount::new(dec!(1)));
    }
    assert_eq!(ledger.event_count(), 5);
    // Oldest events are gone; ids keep rising.
    let first_id = ledger.events().next().unwrap().id;
    assert_eq!(first_id, 4);
}

#[test]
fn summary_is_memoized_until_mutation() {
    let mut ledger = ledger(dec!(100000));
    open(&mut ledger, "600000", 100, dec!(10));
    let first = ledger.account_summary();
    let second = ledger.account_summary();
    assert_eq!(first, second);

    ledger.deposit(Amount::new(dec!(100)));
    let third = ledger.account_summary();
    assert_eq!(third.balance, first.balance + Amount::new(dec!(100)));
}

#[test]
fn events_serialize_with_canonical_type_strings() {
    let mut ledger = ledger(dec!(100000));
    ledger.deposit(Amount::new(dec!(1)));
    let event = ledger.events().next().unwrap();
    let json = serde_json::to_value(event).unwrap();
    assert_eq!(json["eventType"], "BALANCE_UPDATED");
    assert!(json["ts"].is_i64());
    let back: TradeEvent = serde_json::from_value(json).unwrap();
    assert_eq!(&back, event);
}
