use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use backtest_engine::BacktestReport;

use crate::rules::{highlight_rules, issue_rules, IssueSeverity, RuleCategory};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticIssue {
    pub id: String,
    pub category: RuleCategory,
    pub severity: IssueSeverity,
    pub message: String,
    pub value: String,
    pub suggestion: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_params: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticHighlight {
    pub id: String,
    pub category: RuleCategory,
    pub message: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticReport {
    pub issues: Vec<DiagnosticIssue>,
    pub highlights: Vec<DiagnosticHighlight>,
    pub overall_score: u32,
    pub risk_level: RiskLevel,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub generated_at: DateTime<Utc>,
}

/// Evaluate the rule tables over a finished report. Never fails: metrics a
/// run could not produce simply trigger fewer rules. `generated_at` is
/// caller-supplied so diagnosis stays clock-free.
pub fn diagnose(report: &BacktestReport, generated_at: DateTime<Utc>) -> DiagnosticReport {
    let mut issues: Vec<DiagnosticIssue> = issue_rules()
        .iter()
        .filter(|rule| (rule.condition)(report))
        .map(|rule| DiagnosticIssue {
            id: rule.id.to_string(),
            category: rule.category,
            severity: rule.severity,
            message: rule.message.to_string(),
            value: (rule.value)(report),
            suggestion: rule.suggestion.to_string(),
            related_params: rule.related_params.iter().map(|p| p.to_string()).collect(),
        })
        .collect();
    issues.sort_by_key(|issue| issue.severity);

    let highlights: Vec<DiagnosticHighlight> = highlight_rules()
        .iter()
        .filter(|rule| (rule.condition)(report))
        .map(|rule| DiagnosticHighlight {
            id: rule.id.to_string(),
            category: rule.category,
            message: rule.message.to_string(),
            value: (rule.value)(report),
        })
        .collect();

    let overall_score = score(report);
    let risk_level = risk_level(report);
    debug!(
        issues = issues.len(),
        highlights = highlights.len(),
        overall_score,
        "diagnosis complete"
    );

    DiagnosticReport {
        issues,
        highlights,
        overall_score,
        risk_level,
        generated_at,
    }
}

/// Banded additive score starting from a neutral 70.
fn score(report: &BacktestReport) -> u32 {
    let mut score: i32 = 70;
    let ret = report.return_metrics.total_return_pct;
    let dd = report.risk_metrics.max_drawdown_pct;
    let trades = report.trading_metrics.total_trades;

    score += if ret > 20.0 {
        10
    } else if ret > 0.0 {
        5
    } else if ret < -20.0 {
        -20
    } else {
        -10
    };

    score += if dd > 40.0 {
        -20
    } else if dd > 25.0 {
        -10
    } else if dd < 10.0 {
        10
    } else {
        0
    };

    if let Some(sharpe) = report.risk_metrics.sharpe_ratio {
        score += if sharpe > 2.0 {
            10
        } else if sharpe > 1.0 {
            5
        } else if sharpe < 0.0 {
            -10
        } else {
            0
        };
    }

    if trades > 0 {
        let win_rate = report.trading_metrics.win_rate;
        score += if win_rate > 60.0 {
            5
        } else if win_rate < 35.0 {
            -5
        } else {
            0
        };

        let pf = report.trading_metrics.profit_factor;
        score += if pf >= 2.0 {
            5
        } else if pf < 1.0 {
            -10
        } else {
            0
        };
    }

    score += if trades >= 50 {
        5
    } else if trades < 20 {
        -5
    } else {
        0
    };

    score.clamp(0, 100) as u32
}

/// High when at least three red flags coincide, low when none do.
fn risk_level(report: &BacktestReport) -> RiskLevel {
    let trades = report.trading_metrics.total_trades;
    let flags = [
        report.risk_metrics.max_drawdown_pct > 25.0,
        report.risk_metrics.sharpe_ratio.is_some_and(|s| s < 0.0),
        trades > 0 && report.trading_metrics.win_rate < 35.0,
        report.return_metrics.total_return_pct < 0.0,
        trades > 0 && report.trading_metrics.profit_factor < 1.0,
    ];
    match flags.iter().filter(|f| **f).count() {
        0 => RiskLevel::Low,
        1 | 2 => RiskLevel::Medium,
        _ => RiskLevel::High,
    }
}
