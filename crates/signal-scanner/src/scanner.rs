use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, warn};

use market_calendar::regulatory_band;
use market_core::{ErrorCode, ErrorInfo, Instrument, KLineSeries, Price};

use crate::detectors::{registry, IndicatorSet};
use crate::models::*;

/// Per-bar market status derived from the previous close and the
/// instrument's price-limit band.
#[derive(Debug, Clone, Copy, Default)]
struct BarStatus {
    limit_up: bool,
    limit_down: bool,
    suspended: bool,
}

/// Runs strategy detectors over a series and enriches hits into signals.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalScanner;

impl SignalScanner {
    pub fn new() -> Self {
        Self
    }

    /// Scan one instrument. A series too short for the warmup plus the
    /// holding window yields an empty result, not an error.
    pub fn scan(
        &self,
        series: &KLineSeries,
        instrument: &Instrument,
        strategy_id: &str,
        options: &ScanOptions,
    ) -> Result<ScanResult, ErrorInfo> {
        let detector = registry().get(strategy_id).ok_or_else(|| {
            ErrorInfo::new(ErrorCode::UnknownEnum)
                .with_message(format!("unknown strategy id: {strategy_id}"))
        })?;

        let warmup = detector.warmup().min(options.warmup_min);
        let len = series.len();
        if len < warmup + options.holding_days + 1 {
            return Ok(ScanResult::empty(series.symbol(), strategy_id));
        }

        if options.exclude_st && (instrument.is_st || instrument.display_name.contains("ST")) {
            debug!(symbol = series.symbol(), "skipping ST instrument");
            return Ok(ScanResult::empty(series.symbol(), strategy_id));
        }
        if let (Some(min_days), Some(last)) = (options.min_listing_days, series.last()) {
            if instrument.listed_days_at(last.ts.date_naive()) < min_days {
                debug!(symbol = series.symbol(), "skipping recently listed instrument");
                return Ok(ScanResult::empty(series.symbol(), strategy_id));
            }
        }

        let indicators = IndicatorSet::compute(series);
        let statuses = bar_statuses(series, instrument);

        let mut signals = Vec::new();
        let mut excluded = StatusCounts::default();
        let last_entry = len - 1 - options.holding_days;

        for i in warmup..=last_entry {
            let Some(proto) = detector.detect(series, i, &indicators) else {
                continue;
            };
            match self.synthesize(series, options, strategy_id, &statuses, i, proto) {
                Synthesis::Signal(signal) => {
                    if options
                        .strength_threshold
                        .map_or(true, |band| band.contains(signal.strength))
                    {
                        signals.push(signal);
                    }
                }
                Synthesis::Excluded(status) => excluded.record(status),
            }
        }

        if let Some(dedup) = options.deduplication {
            signals = deduplicate(signals, dedup);
        }

        let mut stats = compute_stats(&signals);
        stats.by_status.cannot_buy += excluded.cannot_buy;
        stats.by_status.cannot_sell += excluded.cannot_sell;

        Ok(ScanResult {
            symbol: series.symbol().to_string(),
            strategy_id: strategy_id.to_string(),
            signals,
            stats,
        })
    }

    fn synthesize(
        &self,
        series: &KLineSeries,
        options: &ScanOptions,
        strategy_id: &str,
        statuses: &[BarStatus],
        entry_idx: usize,
        proto: ProtoSignal,
    ) -> Synthesis {
        let exit_idx = entry_idx + options.holding_days;
        let entry_bar = &series.bars()[entry_idx];
        let entry_status = statuses[entry_idx];
        let exit_status = statuses[exit_idx];

        if options.detect_market_status {
            // A limit-locked or halted entry bar cannot be transacted.
            let entry_blocked = entry_status.suspended
                || match proto.kind {
                    SignalKind::Buy => entry_status.limit_up,
                    SignalKind::Sell => entry_status.limit_down,
                };
            if entry_blocked {
                return Synthesis::Excluded(match proto.kind {
                    SignalKind::Buy => SignalStatus::CannotBuy,
                    SignalKind::Sell => SignalStatus::CannotSell,
                });
            }
            let exit_blocked = match proto.kind {
                SignalKind::Buy => exit_status.limit_down,
                SignalKind::Sell => exit_status.limit_up,
            };
            if exit_blocked {
                return Synthesis::Excluded(match proto.kind {
                    SignalKind::Buy => SignalStatus::CannotSell,
                    SignalKind::Sell => SignalStatus::CannotBuy,
                });
            }
        }

        let entry_price = if options.entry_at_open {
            Price::new(entry_bar.open)
        } else {
            Price::new(entry_bar.close)
        };

        // A suspended exit walks back to the last tradable close.
        let (exit_price, status) = if exit_status.suspended {
            let mut j = exit_idx;
            while j > entry_idx && statuses[j].suspended {
                j -= 1;
            }
            (Price::new(series.bars()[j].close), SignalStatus::Suspended)
        } else {
            (
                Price::new(series.bars()[exit_idx].close),
                SignalStatus::Completed,
            )
        };

        let entry = entry_price.to_f64();
        let exit = exit_price.to_f64();
        let gross_return_pct = if entry != 0.0 {
            match proto.kind {
                SignalKind::Buy => (exit - entry) / entry * 100.0,
                SignalKind::Sell => (entry - exit) / entry * 100.0,
            }
        } else {
            0.0
        };
        let net_return_pct = options
            .transaction_costs
            .as_ref()
            .map(|costs| gross_return_pct - costs.round_trip_fraction() * 100.0);

        Synthesis::Signal(Signal {
            kind: proto.kind,
            strategy_id: strategy_id.to_string(),
            entry_bar_index: entry_idx,
            exit_bar_index: exit_idx,
            entry_price,
            exit_price,
            strength: proto.strength,
            status,
            gross_return_pct,
            net_return_pct,
            is_limit_up: entry_status.limit_up,
            is_limit_down: exit_status.limit_down,
            is_suspended: exit_status.suspended,
        })
    }

    /// Scan a universe sequentially. A failing instrument yields an empty
    /// result with an error annotation; the batch continues. Progress is
    /// reported after every instrument.
    pub fn scan_universe(
        &self,
        universe: &[(KLineSeries, Instrument)],
        strategy_id: &str,
        options: &ScanOptions,
        mut on_progress: impl FnMut(usize, usize),
    ) -> Vec<SymbolScanOutcome> {
        let total = universe.len();
        let mut outcomes = Vec::with_capacity(total);
        for (completed, (series, instrument)) in universe.iter().enumerate() {
            let outcome = match self.scan(series, instrument, strategy_id, options) {
                Ok(result) => SymbolScanOutcome {
                    symbol: series.symbol().to_string(),
                    result,
                    error: None,
                },
                Err(error) => {
                    warn!(symbol = series.symbol(), %error, "instrument scan failed");
                    SymbolScanOutcome {
                        symbol: series.symbol().to_string(),
                        result: ScanResult::empty(series.symbol(), strategy_id),
                        error: Some(error),
                    }
                }
            };
            outcomes.push(outcome);
            on_progress(completed + 1, total);
        }
        outcomes
    }
}

enum Synthesis {
    Signal(Signal),
    Excluded(SignalStatus),
}

fn bar_statuses(series: &KLineSeries, instrument: &Instrument) -> Vec<BarStatus> {
    let bars = series.bars();
    let mut statuses = vec![BarStatus::default(); bars.len()];
    let two_dp =
        |v: Decimal| v.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    for i in 0..bars.len() {
        statuses[i].suspended = bars[i].is_suspended();
        if i == 0 {
            continue;
        }
        let band = regulatory_band(instrument, Price::new(bars[i - 1].close));
        let close = two_dp(bars[i].close);
        if let Some(upper) = band.upper {
            statuses[i].limit_up = close == two_dp(upper.value());
        }
        if let Some(lower) = band.lower {
            statuses[i].limit_down = close == two_dp(lower.value());
        }
    }
    statuses
}

/// Cluster signals whose entries are closer than `min_gap_days`, then keep
/// one representative per cluster.
fn deduplicate(signals: Vec<Signal>, dedup: Deduplication) -> Vec<Signal> {
    if signals.is_empty() {
        return signals;
    }
    let mut kept = Vec::new();
    let mut group: Vec<Signal> = Vec::new();
    for signal in signals {
        let starts_new_group = group
            .last()
            .map(|prev: &Signal| {
                signal.entry_bar_index - prev.entry_bar_index >= dedup.min_gap_days
            })
            .unwrap_or(true);
        if starts_new_group && !group.is_empty() {
            kept.push(pick_representative(std::mem::take(&mut group), dedup.mode));
        }
        group.push(signal);
    }
    kept.push(pick_representative(group, dedup.mode));
    kept
}

fn pick_representative(group: Vec<Signal>, mode: DedupMode) -> Signal {
    match mode {
        DedupMode::MergeConsecutive => group.into_iter().next().expect("non-empty group"),
        DedupMode::KeepStrongest => group
            .into_iter()
            .reduce(|best, s| if s.strength > best.strength { s } else { best })
            .expect("non-empty group"),
    }
}

fn compute_stats(signals: &[Signal]) -> ScanStats {
    let mut stats = ScanStats {
        total_signals: signals.len(),
        ..ScanStats::default()
    };
    if signals.is_empty() {
        return stats;
    }
    let mut sum = 0.0;
    let mut max = f64::NEG_INFINITY;
    let mut min = f64::INFINITY;
    for signal in signals {
        stats.by_status.record(signal.status);
        let r = signal.gross_return_pct;
        if r > 0.0 {
            stats.win_signals += 1;
        }
        sum += r;
        max = max.max(r);
        min = min.min(r);
    }
    stats.win_rate = stats.win_signals as f64 / signals.len() as f64 * 100.0;
    stats.avg_return = sum / signals.len() as f64;
    stats.max_return = max;
    stats.min_return = min;
    stats
}
