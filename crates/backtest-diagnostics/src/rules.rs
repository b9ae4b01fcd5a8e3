use backtest_engine::BacktestReport;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleCategory {
    Return,
    Risk,
    Trading,
    General,
}

/// Issue severities, ordered for display: errors first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Error,
    Warning,
    Info,
}

/// A declarative issue rule evaluated against a finished report. Conditions
/// are total: a missing metric simply fails to trigger.
pub struct IssueRule {
    pub id: &'static str,
    pub category: RuleCategory,
    pub severity: IssueSeverity,
    pub condition: fn(&BacktestReport) -> bool,
    pub value: fn(&BacktestReport) -> String,
    pub message: &'static str,
    pub suggestion: &'static str,
    pub related_params: &'static [&'static str],
}

pub struct HighlightRule {
    pub id: &'static str,
    pub category: RuleCategory,
    pub condition: fn(&BacktestReport) -> bool,
    pub value: fn(&BacktestReport) -> String,
    pub message: &'static str,
}

fn sharpe(report: &BacktestReport) -> Option<f64> {
    report.risk_metrics.sharpe_ratio
}

fn trades(report: &BacktestReport) -> usize {
    report.trading_metrics.total_trades
}

fn fmt_pct(v: f64) -> String {
    format!("{v:.2}%")
}

pub fn issue_rules() -> &'static [IssueRule] {
    ISSUE_RULES
}

pub fn highlight_rules() -> &'static [HighlightRule] {
    HIGHLIGHT_RULES
}

static ISSUE_RULES: &[IssueRule] = &[
    IssueRule {
        id: "negative_return",
        category: RuleCategory::Return,
        severity: IssueSeverity::Error,
        condition: |r| r.return_metrics.total_return_pct < 0.0,
        value: |r| fmt_pct(r.return_metrics.total_return_pct),
        message: "the strategy lost money over the test period",
        suggestion: "revisit entry conditions or widen the holding window",
        related_params: &["holdingDays", "strengthThreshold"],
    },
    IssueRule {
        id: "very_high_drawdown",
        category: RuleCategory::Risk,
        severity: IssueSeverity::Error,
        condition: |r| r.risk_metrics.max_drawdown_pct > 40.0,
        value: |r| fmt_pct(r.risk_metrics.max_drawdown_pct),
        message: "maximum drawdown above 40% would be hard to sit through",
        suggestion: "reduce position sizing or add a stop rule",
        related_params: &["positionSizePct", "maxDrawdown"],
    },
    IssueRule {
        id: "high_drawdown",
        category: RuleCategory::Risk,
        severity: IssueSeverity::Warning,
        condition: |r| {
            r.risk_metrics.max_drawdown_pct > 25.0 && r.risk_metrics.max_drawdown_pct <= 40.0
        },
        value: |r| fmt_pct(r.risk_metrics.max_drawdown_pct),
        message: "maximum drawdown above 25%",
        suggestion: "consider tighter exits or smaller positions",
        related_params: &["positionSizePct"],
    },
    IssueRule {
        id: "negative_sharpe",
        category: RuleCategory::Risk,
        severity: IssueSeverity::Warning,
        condition: |r| sharpe(r).is_some_and(|s| s < 0.0),
        value: |r| format!("{:.2}", sharpe(r).unwrap_or(0.0)),
        message: "risk-adjusted return is negative",
        suggestion: "the strategy underperforms holding cash at this volatility",
        related_params: &[],
    },
    IssueRule {
        id: "overfit_risk",
        category: RuleCategory::General,
        severity: IssueSeverity::Warning,
        condition: |r| sharpe(r).is_some_and(|s| s > 2.5) && trades(r) < 20,
        value: |r| {
            format!(
                "sharpe {:.2} over {} trades",
                sharpe(r).unwrap_or(0.0),
                trades(r)
            )
        },
        message: "excellent ratios on very few trades suggest curve fitting",
        suggestion: "extend the test window or validate on another period",
        related_params: &["startTime", "endTime"],
    },
    IssueRule {
        id: "few_trades",
        category: RuleCategory::Trading,
        severity: IssueSeverity::Info,
        condition: |r| trades(r) < 20,
        value: |r| trades(r).to_string(),
        message: "fewer than 20 round trips: statistics are unstable",
        suggestion: "widen the date range for a larger sample",
        related_params: &["startTime", "endTime"],
    },
    IssueRule {
        id: "low_profit_factor",
        category: RuleCategory::Trading,
        severity: IssueSeverity::Warning,
        condition: |r| trades(r) > 0 && r.trading_metrics.profit_factor < 1.0,
        value: |r| format!("{:.2}", r.trading_metrics.profit_factor),
        message: "gross losses exceed gross profits",
        suggestion: "filter weak signals with a strength threshold",
        related_params: &["strengthThreshold"],
    },
    IssueRule {
        id: "low_win_rate",
        category: RuleCategory::Trading,
        severity: IssueSeverity::Warning,
        condition: |r| trades(r) > 0 && r.trading_metrics.win_rate < 35.0,
        value: |r| fmt_pct(r.trading_metrics.win_rate),
        message: "fewer than 35% of trades close profitably",
        suggestion: "check whether exits cut winners short",
        related_params: &["holdingDays"],
    },
    IssueRule {
        id: "high_volatility",
        category: RuleCategory::Risk,
        severity: IssueSeverity::Info,
        condition: |r| r.return_metrics.return_volatility > 0.40,
        value: |r| format!("{:.2}", r.return_metrics.return_volatility),
        message: "annualized volatility above 40%",
        suggestion: "smaller positions would smooth the equity curve",
        related_params: &["positionSizePct"],
    },
    IssueRule {
        id: "long_drawdown",
        category: RuleCategory::Risk,
        severity: IssueSeverity::Info,
        condition: |r| r.risk_metrics.max_drawdown_duration_bars > 60,
        value: |r| format!("{} bars", r.risk_metrics.max_drawdown_duration_bars),
        message: "the deepest drawdown took over 60 bars from peak to trough",
        suggestion: "an exit rule could shorten underwater stretches",
        related_params: &[],
    },
];

static HIGHLIGHT_RULES: &[HighlightRule] = &[
    HighlightRule {
        id: "excellent_sharpe",
        category: RuleCategory::Risk,
        condition: |r| sharpe(r).is_some_and(|s| s >= 2.0),
        value: |r| format!("{:.2}", sharpe(r).unwrap_or(0.0)),
        message: "outstanding risk-adjusted return",
    },
    HighlightRule {
        id: "good_sharpe",
        category: RuleCategory::Risk,
        condition: |r| sharpe(r).is_some_and(|s| (1.0..2.0).contains(&s)),
        value: |r| format!("{:.2}", sharpe(r).unwrap_or(0.0)),
        message: "solid risk-adjusted return",
    },
    HighlightRule {
        id: "good_drawdown_control",
        category: RuleCategory::Risk,
        condition: |r| trades(r) > 0 && r.risk_metrics.max_drawdown_pct <= 10.0,
        value: |r| fmt_pct(r.risk_metrics.max_drawdown_pct),
        message: "drawdown stayed within 10%",
    },
    HighlightRule {
        id: "high_win_rate",
        category: RuleCategory::Trading,
        condition: |r| trades(r) >= 10 && r.trading_metrics.win_rate >= 60.0,
        value: |r| fmt_pct(r.trading_metrics.win_rate),
        message: "well over half of all trades closed profitably",
    },
    HighlightRule {
        id: "strong_profit_factor",
        category: RuleCategory::Trading,
        condition: |r| trades(r) > 0 && r.trading_metrics.profit_factor >= 2.0,
        value: |r| format!("{:.2}", r.trading_metrics.profit_factor),
        message: "profits are at least twice the losses",
    },
    HighlightRule {
        id: "positive_alpha",
        category: RuleCategory::Return,
        condition: |r| r.return_metrics.alpha.is_some_and(|a| a > 0.0),
        value: |r| format!("{:.4}", r.return_metrics.alpha.unwrap_or(0.0)),
        message: "the strategy beat its benchmark after adjusting for beta",
    },
];
