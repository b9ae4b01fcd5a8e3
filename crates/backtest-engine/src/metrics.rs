//! Metric computation over equity curves and closed trades. Everything here
//! is pure; the engine assembles the inputs.

use chrono::Datelike;
use statrs::statistics::Statistics;

use market_core::Amount;

use crate::models::{
    ClosedTrade, EquityPoint, MonthlyReturn, ReturnMetrics, RiskMetricsReport,
    TradingMetricsReport,
};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Bar-to-bar fractional returns of the equity curve.
pub fn daily_returns(curve: &[EquityPoint]) -> Vec<f64> {
    curve
        .windows(2)
        .filter_map(|w| {
            let prev = w[0].value.to_f64();
            let curr = w[1].value.to_f64();
            (prev != 0.0).then(|| curr / prev - 1.0)
        })
        .collect()
}

pub fn compute_return_metrics(
    curve: &[EquityPoint],
    initial_capital: Amount,
    benchmark_returns: Option<&[f64]>,
) -> ReturnMetrics {
    let initial = initial_capital.to_f64();
    let final_equity = curve.last().map(|p| p.value.to_f64()).unwrap_or(initial);
    let total_return = if initial > 0.0 {
        final_equity / initial - 1.0
    } else {
        0.0
    };

    let elapsed_days = match (curve.first(), curve.last()) {
        (Some(first), Some(last)) => (last.ts - first.ts).num_days().max(1) as f64,
        _ => 1.0,
    };
    let annualized = if total_return > -1.0 {
        (1.0 + total_return).powf(365.0 / elapsed_days) - 1.0
    } else {
        -1.0
    };

    let returns = daily_returns(curve);
    let volatility = if returns.len() > 1 {
        returns.iter().copied().std_dev() * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    let alpha = benchmark_returns.and_then(|bench| regression_alpha(&returns, bench));

    ReturnMetrics {
        total_return_pct: total_return * 100.0,
        annualized_return_pct: annualized * 100.0,
        monthly_returns: monthly_returns(curve, initial),
        return_volatility: volatility,
        alpha,
    }
}

/// Calendar-month buckets over the equity curve, each measured against the
/// previous month's closing equity.
pub fn monthly_returns(curve: &[EquityPoint], initial: f64) -> Vec<MonthlyReturn> {
    let mut out: Vec<MonthlyReturn> = Vec::new();
    let mut anchor = initial;
    let mut current: Option<(i32, u32, f64)> = None;

    for point in curve {
        let key = (point.ts.year(), point.ts.month());
        match current {
            Some((year, month, last)) if (year, month) != key => {
                out.push(month_entry(year, month, anchor, last));
                anchor = last;
                current = Some((key.0, key.1, point.value.to_f64()));
            }
            _ => current = Some((key.0, key.1, point.value.to_f64())),
        }
    }
    if let Some((year, month, last)) = current {
        out.push(month_entry(year, month, anchor, last));
    }
    out
}

fn month_entry(year: i32, month: u32, anchor: f64, last: f64) -> MonthlyReturn {
    MonthlyReturn {
        year,
        month,
        return_pct: if anchor > 0.0 {
            (last / anchor - 1.0) * 100.0
        } else {
            0.0
        },
    }
}

pub fn compute_risk_metrics(
    curve: &[EquityPoint],
    annualized_return_pct: f64,
    daily_risk_free: f64,
) -> RiskMetricsReport {
    let (max_drawdown_pct, max_drawdown_duration_bars) = max_drawdown(curve);
    let returns = daily_returns(curve);

    let sharpe_ratio = if returns.len() > 1 {
        let mean = returns.iter().copied().mean();
        let std = returns.iter().copied().std_dev();
        (std > 0.0)
            .then(|| (mean - daily_risk_free) / std * TRADING_DAYS_PER_YEAR.sqrt())
    } else {
        None
    };

    let sortino_ratio = if returns.len() > 1 {
        let mean = returns.iter().copied().mean();
        let downside: Vec<f64> = returns
            .iter()
            .filter(|r| **r < daily_risk_free)
            .map(|r| (r - daily_risk_free) * (r - daily_risk_free))
            .collect();
        if downside.is_empty() {
            sharpe_ratio
        } else {
            let downside_dev = (downside.iter().sum::<f64>() / downside.len() as f64).sqrt();
            (downside_dev > 0.0)
                .then(|| (mean - daily_risk_free) / downside_dev * TRADING_DAYS_PER_YEAR.sqrt())
        }
    } else {
        None
    };

    let calmar_ratio =
        (max_drawdown_pct > 0.0).then(|| annualized_return_pct / max_drawdown_pct);

    RiskMetricsReport {
        max_drawdown_pct,
        max_drawdown_duration_bars,
        sharpe_ratio,
        sortino_ratio,
        calmar_ratio,
    }
}

/// Deepest peak-to-trough decline as a percent, plus its length in bars
/// from the peak to the trough.
pub fn max_drawdown(curve: &[EquityPoint]) -> (f64, usize) {
    let mut peak = f64::NEG_INFINITY;
    let mut peak_idx = 0usize;
    let mut max_dd = 0.0f64;
    let mut duration = 0usize;

    for (i, point) in curve.iter().enumerate() {
        let value = point.value.to_f64();
        if value > peak {
            peak = value;
            peak_idx = i;
        } else if peak > 0.0 {
            let dd = (peak - value) / peak * 100.0;
            if dd > max_dd {
                max_dd = dd;
                duration = i - peak_idx;
            }
        }
    }
    (max_dd, duration)
}

pub fn compute_trading_metrics(
    trades: &[ClosedTrade],
    bars_processed: usize,
    exposed_bars: usize,
    total_return_pct: f64,
    max_drawdown_pct: f64,
) -> TradingMetricsReport {
    let wins: Vec<Amount> = trades
        .iter()
        .map(|t| t.net_pnl)
        .filter(|p| p.is_positive())
        .collect();
    let losses: Vec<Amount> = trades
        .iter()
        .map(|t| t.net_pnl)
        .filter(|p| p.is_negative())
        .map(|p| p.abs())
        .collect();

    let gross_profit: Amount = wins.iter().copied().sum();
    let gross_loss: Amount = losses.iter().copied().sum();
    let profit_factor = if trades.is_empty() {
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

    let (max_consecutive_wins, max_consecutive_losses) = consecutive_streaks(trades);

    let avg_holding_days = if trades.is_empty() {
        0.0
    } else {
        trades
            .iter()
            .map(|t| (t.closed_at - t.opened_at).num_seconds() as f64 / 86_400.0)
            .sum::<f64>()
            / trades.len() as f64
    };

    TradingMetricsReport {
        total_trades: trades.len(),
        winning_trades: wins.len(),
        losing_trades: losses.len(),
        win_rate: if trades.is_empty() {
            0.0
        } else {
            wins.len() as f64 / trades.len() as f64 * 100.0
        },
        profit_factor,
        avg_win: mean_amount(&wins),
        avg_loss: mean_amount(&losses),
        avg_holding_days,
        max_consecutive_wins,
        max_consecutive_losses,
        max_single_win: wins.iter().copied().max().unwrap_or_else(Amount::zero),
        max_single_loss: losses.iter().copied().max().unwrap_or_else(Amount::zero),
        trading_frequency: if bars_processed > 0 {
            trades.len() as f64 / bars_processed as f64 * TRADING_DAYS_PER_YEAR
        } else {
            0.0
        },
        exposure_time_pct: if bars_processed > 0 {
            exposed_bars as f64 / bars_processed as f64 * 100.0
        } else {
            0.0
        },
        recovery_factor: (max_drawdown_pct > 0.0).then(|| total_return_pct / max_drawdown_pct),
    }
}

fn consecutive_streaks(trades: &[ClosedTrade]) -> (usize, usize) {
    let mut max_wins = 0;
    let mut max_losses = 0;
    let mut wins = 0;
    let mut losses = 0;
    for trade in trades {
        if trade.net_pnl.is_positive() {
            wins += 1;
            losses = 0;
            max_wins = max_wins.max(wins);
        } else if trade.net_pnl.is_negative() {
            losses += 1;
            wins = 0;
            max_losses = max_losses.max(losses);
        } else {
            wins = 0;
            losses = 0;
        }
    }
    (max_wins, max_losses)
}

fn mean_amount(values: &[Amount]) -> Amount {
    if values.is_empty() {
        return Amount::zero();
    }
    let total: Amount = values.iter().copied().sum();
    total
        .div(rust_decimal::Decimal::from(values.len() as u64))
        .unwrap_or_else(|_| Amount::zero())
}

/// Annualized intercept of a least-squares regression of strategy returns
/// on benchmark returns. `None` when the series are too short or the
/// benchmark has no variance.
pub fn regression_alpha(strategy: &[f64], benchmark: &[f64]) -> Option<f64> {
    let n = strategy.len().min(benchmark.len());
    if n < 2 {
        return None;
    }
    let s = &strategy[..n];
    let b = &benchmark[..n];
    let mean_s = s.iter().copied().mean();
    let mean_b = b.iter().copied().mean();
    let mut cov = 0.0;
    let mut var_b = 0.0;
    for i in 0..n {
        cov += (s[i] - mean_s) * (b[i] - mean_b);
        var_b += (b[i] - mean_b) * (b[i] - mean_b);
    }
    if var_b == 0.0 {
        return None;
    }
    let beta = cov / var_b;
    let alpha_daily = mean_s - beta * mean_b;
    Some(alpha_daily * TRADING_DAYS_PER_YEAR)
}
