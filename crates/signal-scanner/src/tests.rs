use chrono::{Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;

use market_core::{Bar, Instrument, KLineSeries, Timeframe};

use crate::models::*;
use crate::scanner::SignalScanner;

fn bar(i: usize, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Bar {
    Bar {
        ts: Utc.with_ymd_and_hms(2024, 1, 1, 7, 0, 0).unwrap() + Duration::days(i as i64),
        open: Decimal::try_from(open).unwrap(),
        high: Decimal::try_from(high).unwrap(),
        low: Decimal::try_from(low).unwrap(),
        close: Decimal::try_from(close).unwrap(),
        volume,
        amount: None,
    }
}

fn series(bars: Vec<Bar>) -> KLineSeries {
    KLineSeries::new("600000", Timeframe::Day1, bars).unwrap()
}

fn instrument() -> Instrument {
    Instrument::main_board(
        "600000",
        "浦发银行",
        NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
    )
}

/// 100-bar V shape: close falls 50 -> 25.5 over bars 0..=49, then rises
/// 25 -> 49.5 over bars 50..=99.
fn v_shape() -> KLineSeries {
    let close_at = |i: usize| {
        if i < 50 {
            50.0 - 0.5 * i as f64
        } else {
            25.0 + 0.5 * (i - 50) as f64
        }
    };
    let bars = (0..100)
        .map(|i| {
            let close = close_at(i);
            let open = if i == 0 { close } else { close_at(i - 1) };
            let high = open.max(close) + 0.1;
            let low = open.min(close) - 0.1;
            bar(i, open, high, low, close, 10_000.0)
        })
        .collect();
    series(bars)
}

/// Thirty flat bars at 10.00 followed by caller-provided bars.
fn flat_then(extra: Vec<Bar>) -> KLineSeries {
    let mut bars: Vec<Bar> = (0..30).map(|i| bar(i, 10.0, 10.05, 9.95, 10.0, 10_000.0)).collect();
    bars.extend(extra);
    series(bars)
}

#[test]
fn golden_cross_on_v_shape_yields_one_completed_signal() {
    let scanner = SignalScanner::new();
    let result = scanner
        .scan(&v_shape(), &instrument(), "ma_golden_cross", &ScanOptions::default())
        .unwrap();

    assert_eq!(result.signals.len(), 1, "expected exactly one golden cross");
    let signal = &result.signals[0];
    assert_eq!(signal.kind, SignalKind::Buy);
    assert!(
        (50..=55).contains(&signal.entry_bar_index),
        "entry at {}",
        signal.entry_bar_index
    );
    assert_eq!(signal.exit_bar_index, signal.entry_bar_index + 5);
    assert!(signal.gross_return_pct > 0.0);
    assert_eq!(signal.status, SignalStatus::Completed);
    assert_eq!(result.stats.total_signals, 1);
    assert_eq!(result.stats.win_signals, 1);
    assert_eq!(result.stats.win_rate, 100.0);
}

#[test]
fn death_cross_fires_on_inverted_shape() {
    // Mirror of the V: rise then fall.
    let close_at = |i: usize| {
        if i < 50 {
            25.0 + 0.5 * i as f64
        } else {
            50.0 - 0.5 * (i - 50) as f64
        }
    };
    let bars = (0..100)
        .map(|i| {
            let close = close_at(i);
            let open = if i == 0 { close } else { close_at(i - 1) };
            bar(i, open, open.max(close) + 0.1, open.min(close) - 0.1, close, 10_000.0)
        })
        .collect();
    let scanner = SignalScanner::new();
    let result = scanner
        .scan(&series(bars), &instrument(), "ma_death_cross", &ScanOptions::default())
        .unwrap();

    assert_eq!(result.signals.len(), 1);
    assert_eq!(result.signals[0].kind, SignalKind::Sell);
    assert!(result.signals[0].gross_return_pct > 0.0);
}

#[test]
fn sub_warmup_series_yields_empty_result() {
    let bars = (0..8).map(|i| bar(i, 10.0, 10.05, 9.95, 10.0, 10_000.0)).collect();
    let scanner = SignalScanner::new();
    let result = scanner
        .scan(&series(bars), &instrument(), "ma_golden_cross", &ScanOptions::default())
        .unwrap();
    assert!(result.signals.is_empty());
    assert_eq!(result.stats.total_signals, 0);
}

#[test]
fn oversized_holding_window_yields_empty_result() {
    let scanner = SignalScanner::new();
    let options = ScanOptions {
        holding_days: 95,
        ..ScanOptions::default()
    };
    let result = scanner
        .scan(&v_shape(), &instrument(), "ma_golden_cross", &options)
        .unwrap();
    assert!(result.signals.is_empty());
}

#[test]
fn unknown_strategy_is_an_input_error() {
    let scanner = SignalScanner::new();
    let err = scanner
        .scan(&v_shape(), &instrument(), "no_such_strategy", &ScanOptions::default())
        .unwrap_err();
    assert_eq!(err.code.code(), "BT103");
}

#[test]
fn limit_up_entry_is_excluded_as_cannot_buy() {
    // Volume spike lands exactly on the +10% limit from a 10.00 prev close.
    let mut extra = vec![bar(30, 10.0, 11.0, 10.0, 11.0, 50_000.0)];
    for i in 31..37 {
        extra.push(bar(i, 11.0, 11.05, 10.95, 11.0, 10_000.0));
    }
    let scanner = SignalScanner::new();
    let result = scanner
        .scan(&flat_then(extra), &instrument(), "volume_breakout", &ScanOptions::default())
        .unwrap();

    assert!(result.signals.is_empty());
    assert_eq!(result.stats.by_status.cannot_buy, 1);
}

#[test]
fn limit_up_entry_kept_when_market_status_detection_off() {
    let mut extra = vec![bar(30, 10.0, 11.0, 10.0, 11.0, 50_000.0)];
    for i in 31..37 {
        extra.push(bar(i, 11.0, 11.05, 10.95, 11.0, 10_000.0));
    }
    let options = ScanOptions {
        detect_market_status: false,
        ..ScanOptions::default()
    };
    let scanner = SignalScanner::new();
    let result = scanner
        .scan(&flat_then(extra), &instrument(), "volume_breakout", &options)
        .unwrap();

    assert_eq!(result.signals.len(), 1);
    assert!(result.signals[0].is_limit_up);
}

#[test]
fn suspended_exit_walks_back_to_last_tradable_close() {
    let mut extra = vec![bar(30, 10.0, 10.5, 10.0, 10.5, 50_000.0)];
    for i in 31..35 {
        extra.push(bar(i, 10.6, 10.65, 10.55, 10.6, 10_000.0));
    }
    // Exit bar 35 is halted.
    extra.push(bar(35, 10.6, 10.6, 10.6, 10.6, 0.0));
    extra.push(bar(36, 10.6, 10.65, 10.55, 10.6, 10_000.0));

    let scanner = SignalScanner::new();
    let result = scanner
        .scan(&flat_then(extra), &instrument(), "volume_breakout", &ScanOptions::default())
        .unwrap();

    assert_eq!(result.signals.len(), 1);
    let signal = &result.signals[0];
    assert_eq!(signal.status, SignalStatus::Suspended);
    assert!(signal.is_suspended);
    // Exit price comes from bar 34, the last non-suspended bar.
    assert_eq!(signal.exit_price.to_string(), "10.6000");
}

/// Two volume spikes two bars apart with different strengths.
fn double_spike() -> KLineSeries {
    let mut extra = vec![
        bar(30, 10.0, 10.5, 10.0, 10.5, 50_000.0),
        bar(31, 10.5, 10.65, 10.45, 10.6, 10_000.0),
        bar(32, 10.6, 10.7, 10.6, 10.7, 80_000.0),
    ];
    for i in 33..40 {
        extra.push(bar(i, 10.7, 10.75, 10.65, 10.7, 10_000.0));
    }
    flat_then(extra)
}

#[test]
fn dedup_merge_consecutive_keeps_the_first() {
    let scanner = SignalScanner::new();
    let base = scanner
        .scan(&double_spike(), &instrument(), "volume_breakout", &ScanOptions::default())
        .unwrap();
    assert_eq!(base.signals.len(), 2);

    let options = ScanOptions {
        deduplication: Some(Deduplication {
            min_gap_days: 5,
            mode: DedupMode::MergeConsecutive,
        }),
        ..ScanOptions::default()
    };
    let result = scanner
        .scan(&double_spike(), &instrument(), "volume_breakout", &options)
        .unwrap();
    assert_eq!(result.signals.len(), 1);
    assert_eq!(result.signals[0].entry_bar_index, 30);
}

#[test]
fn dedup_keep_strongest_keeps_the_larger_spike() {
    let scanner = SignalScanner::new();
    let options = ScanOptions {
        deduplication: Some(Deduplication {
            min_gap_days: 5,
            mode: DedupMode::KeepStrongest,
        }),
        ..ScanOptions::default()
    };
    let result = scanner
        .scan(&double_spike(), &instrument(), "volume_breakout", &options)
        .unwrap();
    assert_eq!(result.signals.len(), 1);
    assert_eq!(result.signals[0].entry_bar_index, 32);
}

#[test]
fn dedup_respects_group_gaps() {
    let scanner = SignalScanner::new();
    let options = ScanOptions {
        deduplication: Some(Deduplication {
            min_gap_days: 2,
            mode: DedupMode::MergeConsecutive,
        }),
        ..ScanOptions::default()
    };
    // The spikes are exactly 2 bars apart, so they are separate groups.
    let result = scanner
        .scan(&double_spike(), &instrument(), "volume_breakout", &options)
        .unwrap();
    assert_eq!(result.signals.len(), 2);
}

#[test]
fn net_return_deducts_round_trip_costs() {
    let costs = TransactionCosts::default();
    let expected_drag = costs.round_trip_fraction() * 100.0;
    let options = ScanOptions {
        transaction_costs: Some(costs),
        ..ScanOptions::default()
    };
    let scanner = SignalScanner::new();
    let result = scanner
        .scan(&double_spike(), &instrument(), "volume_breakout", &options)
        .unwrap();
    for signal in &result.signals {
        let net = signal.net_return_pct.unwrap();
        assert!((signal.gross_return_pct - net - expected_drag).abs() < 1e-9);
    }
}

#[test]
fn strength_threshold_filters_signals() {
    let scanner = SignalScanner::new();
    // Spike strengths are the volume ratios (~4.2 and ~5.2).
    let options = ScanOptions {
        strength_threshold: Some(StrengthBand {
            min: Some(5.0),
            max: None,
        }),
        ..ScanOptions::default()
    };
    let result = scanner
        .scan(&double_spike(), &instrument(), "volume_breakout", &options)
        .unwrap();
    assert_eq!(result.signals.len(), 1);
    assert_eq!(result.signals[0].entry_bar_index, 32);
}

#[test]
fn st_names_are_excluded_on_request() {
    let scanner = SignalScanner::new();
    let options = ScanOptions {
        exclude_st: true,
        ..ScanOptions::default()
    };
    let st = Instrument::main_board(
        "600000",
        "*ST海润",
        NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
    );
    let result = scanner
        .scan(&v_shape(), &st, "ma_golden_cross", &options)
        .unwrap();
    assert!(result.signals.is_empty());
}

#[test]
fn recently_listed_names_are_excluded_on_request() {
    let scanner = SignalScanner::new();
    let options = ScanOptions {
        min_listing_days: Some(365),
        ..ScanOptions::default()
    };
    let fresh = Instrument::main_board(
        "600000",
        "新股",
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
    );
    let result = scanner
        .scan(&v_shape(), &fresh, "ma_golden_cross", &options)
        .unwrap();
    assert!(result.signals.is_empty());
}

#[test]
fn rescanning_is_deterministic() {
    let scanner = SignalScanner::new();
    let a = scanner
        .scan(&v_shape(), &instrument(), "ma_golden_cross", &ScanOptions::default())
        .unwrap();
    let b = scanner
        .scan(&v_shape(), &instrument(), "ma_golden_cross", &ScanOptions::default())
        .unwrap();
    assert_eq!(a, b);
}

#[test]
fn universe_scan_reports_progress_and_isolates_failures() {
    let scanner = SignalScanner::new();
    let universe = vec![
        (v_shape(), instrument()),
        (double_spike(), instrument()),
    ];

    let mut progress = Vec::new();
    let outcomes = scanner.scan_universe(
        &universe,
        "ma_golden_cross",
        &ScanOptions::default(),
        |completed, total| progress.push((completed, total)),
    );
    assert_eq!(progress, vec![(1, 2), (2, 2)]);
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.error.is_none()));

    // An unknown strategy fails every instrument without halting the batch.
    let outcomes = scanner.scan_universe(
        &universe,
        "no_such_strategy",
        &ScanOptions::default(),
        |_, _| {},
    );
    assert_eq!(outcomes.len(), 2);
    for outcome in &outcomes {
        assert!(outcome.error.is_some());
        assert!(outcome.result.signals.is_empty());
    }
}

#[test]
fn signals_serialize_with_canonical_enum_strings() {
    let scanner = SignalScanner::new();
    let result = scanner
        .scan(&v_shape(), &instrument(), "ma_golden_cross", &ScanOptions::default())
        .unwrap();
    let json = serde_json::to_value(&result.signals[0]).unwrap();
    assert_eq!(json["kind"], "buy");
    assert_eq!(json["status"], "completed");
    // Money fields serialize as decimal strings.
    assert!(json["entryPrice"].is_string());

    let back: Signal = serde_json::from_value(json).unwrap();
    assert_eq!(back, result.signals[0]);
}
