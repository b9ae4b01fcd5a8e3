use tracing::debug;

use market_core::TradeSide;

use crate::models::*;

type AlertCallback = Box<dyn Fn(&RiskCheck) + Send + Sync>;

/// Pre-trade and portfolio-level rule evaluator. `validate_order` is
/// side-effect-free: the same order and state always produce the same
/// checks.
pub struct RiskManager {
    limits: RiskLimits,
    on_risk_alert: Option<AlertCallback>,
}

impl RiskManager {
    pub fn new(limits: RiskLimits) -> Self {
        Self {
            limits,
            on_risk_alert: None,
        }
    }

    pub fn from_profile(profile: RiskProfile) -> Self {
        Self::new(RiskLimits::from_profile(profile))
    }

    /// Fires for every critical failure produced by `validate_order`.
    pub fn with_alert_callback(
        mut self,
        callback: impl Fn(&RiskCheck) + Send + Sync + 'static,
    ) -> Self {
        self.on_risk_alert = Some(Box::new(callback));
        self
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Evaluate the full rule set for a candidate order.
    pub fn validate_order(
        &self,
        order: &CandidateOrder,
        state: &PortfolioState,
    ) -> RiskValidation {
        let mut checks = Vec::new();

        let order_value = order.order_value().to_f64();
        let equity = state.equity.to_f64();
        let existing_value = state.position_value(&order.symbol).to_f64();
        let exposure = state.total_exposure().to_f64();

        if let Some(min) = self.limits.min_order_size {
            let passed = order.size >= min;
            checks.push(RiskCheck {
                rule: RiskRule::MinOrderSize,
                passed,
                severity: if passed {
                    RiskSeverity::Info
                } else {
                    RiskSeverity::Critical
                },
                message: format!("order size {} vs minimum {}", order.size, min),
                current_value: order.size as f64,
                limit_value: min as f64,
            });
        }

        if let Some(max) = self.limits.max_order_size {
            checks.push(upper_bound_check(
                RiskRule::MaxOrderSize,
                order.size as f64,
                max as f64,
                format!("order size {} vs maximum {}", order.size, max),
            ));
        }

        if let Some(limit) = self.limits.max_position_value {
            let projected = existing_value + order_value;
            checks.push(upper_bound_check(
                RiskRule::MaxPositionValue,
                projected,
                limit.to_f64(),
                format!(
                    "projected position value {:.2} vs limit {}",
                    projected, limit
                ),
            ));
        }

        if let Some(limit_pct) = self.limits.max_position_percent {
            let projected = existing_value + order_value;
            checks.push(percent_of_equity_check(
                RiskRule::MaxPositionPercent,
                projected,
                equity,
                limit_pct,
                "position",
            ));
        }

        if let Some(limit) = self.limits.max_total_exposure {
            let projected = exposure + order_value;
            checks.push(upper_bound_check(
                RiskRule::MaxTotalExposure,
                projected,
                limit.to_f64(),
                format!("projected exposure {:.2} vs limit {}", projected, limit),
            ));
        }

        if let Some(limit_pct) = self.limits.max_exposure_percent {
            let projected = exposure + order_value;
            checks.push(percent_of_equity_check(
                RiskRule::MaxExposurePercent,
                projected,
                equity,
                limit_pct,
                "exposure",
            ));
        }

        if let Some(limit) = self.limits.max_concentration {
            // Concentration needs a diversification baseline; the first
            // position in an empty book is trivially 100%.
            let has_other_positions = state.positions.iter().any(|p| p.symbol != order.symbol);
            if has_other_positions {
                let new_position = existing_value + order_value;
                let new_total = exposure + order_value;
                let ratio = if new_total > 0.0 {
                    new_position / new_total
                } else {
                    0.0
                };
                checks.push(upper_bound_check(
                    RiskRule::MaxConcentration,
                    ratio,
                    limit,
                    format!(
                        "{} would be {:.1}% of total exposure (limit {:.1}%)",
                        order.symbol,
                        ratio * 100.0,
                        limit * 100.0
                    ),
                ));
            }
        }

        if let Some(limit) = self.limits.max_open_positions {
            let adds_position =
                order.side == TradeSide::Buy && !state.has_position(&order.symbol);
            let projected = state.positions.len() + usize::from(adds_position);
            checks.push(upper_bound_check(
                RiskRule::MaxOpenPositions,
                projected as f64,
                limit as f64,
                format!("{projected} open positions after fill (limit {limit})"),
            ));
        }

        // Margin is consumed by buys only; sells release it.
        {
            let available = state.margin_available.to_f64();
            let (current, passed) = match order.side {
                TradeSide::Buy => (order_value, order_value <= available),
                TradeSide::Sell => (0.0, true),
            };
            checks.push(RiskCheck {
                rule: RiskRule::MarginAvailable,
                passed,
                severity: grade(passed, current, available),
                message: format!(
                    "order value {:.2} vs available funds {:.2}",
                    order_value, available
                ),
                current_value: current,
                limit_value: available,
            });
        }

        if self.limits.max_daily_loss.is_some() || self.limits.max_daily_loss_percent.is_some() {
            let loss = (-state.daily_pnl.to_f64()).max(0.0);
            let abs_limit = self.limits.max_daily_loss.map(|l| l.to_f64());
            let pct_limit = self
                .limits
                .max_daily_loss_percent
                .map(|pct| equity.max(0.0) * pct / 100.0);
            let effective = match (abs_limit, pct_limit) {
                (Some(a), Some(p)) => a.min(p),
                (Some(a), None) => a,
                (None, Some(p)) => p,
                (None, None) => unreachable!("guarded above"),
            };
            checks.push(upper_bound_check(
                RiskRule::MaxDailyLoss,
                loss,
                effective,
                format!("daily loss {:.2} vs limit {:.2}", loss, effective),
            ));
        }

        // Informational only: never blocks, warns when stacking onto an
        // existing position.
        {
            let duplicate = state.has_position(&order.symbol);
            checks.push(RiskCheck {
                rule: RiskRule::DuplicatePosition,
                passed: true,
                severity: if duplicate {
                    RiskSeverity::Warning
                } else {
                    RiskSeverity::Info
                },
                message: if duplicate {
                    format!("a position in {} is already open", order.symbol)
                } else {
                    format!("no existing position in {}", order.symbol)
                },
                current_value: f64::from(u8::from(duplicate)),
                limit_value: 0.0,
            });
        }

        let blocked_by: Vec<RiskRule> = checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.rule)
            .collect();
        let allowed = !checks
            .iter()
            .any(|c| !c.passed && c.severity == RiskSeverity::Critical);

        if let Some(callback) = &self.on_risk_alert {
            for check in checks
                .iter()
                .filter(|c| !c.passed && c.severity == RiskSeverity::Critical)
            {
                callback(check);
            }
        }

        let position_ratio = if equity > 0.0 {
            (existing_value + order_value) / equity
        } else {
            1.0
        };
        let risk_score = score_checks(&checks, position_ratio);

        debug!(
            symbol = order.symbol,
            allowed,
            risk_score,
            blocked = blocked_by.len(),
            "order validated"
        );

        RiskValidation {
            allowed,
            checks,
            blocked_by,
            risk_score,
        }
    }

    /// Aggregate portfolio risk on the same 0-100 scale, from leverage,
    /// daily loss, concentration, position count, and margin utilization.
    pub fn portfolio_risk_score(&self, state: &PortfolioState) -> u32 {
        let equity = state.equity.to_f64();
        if equity <= 0.0 {
            return 100;
        }
        let exposure = state.total_exposure().to_f64();
        let mut score = 0u32;

        let leverage = exposure / equity;
        let leverage_limit = self.limits.max_leverage.unwrap_or(1.0);
        score += ramp(leverage, leverage_limit, [30, 15, 5]);

        let loss_pct = (-state.daily_pnl.to_f64()).max(0.0) / equity * 100.0;
        let loss_limit = self.limits.max_daily_loss_percent.unwrap_or(5.0);
        score += ramp(loss_pct, loss_limit, [30, 15, 5]);

        let top_position = state
            .positions
            .iter()
            .map(|p| p.value.to_f64())
            .fold(0.0, f64::max);
        if exposure > 0.0 {
            let concentration = top_position / exposure;
            let limit = self.limits.max_concentration.unwrap_or(0.35);
            score += ramp(concentration, limit, [20, 10, 5]);
        }

        let count_limit = self.limits.max_open_positions.unwrap_or(10) as f64;
        score += ramp(state.positions.len() as f64, count_limit, [10, 5, 0]);

        let utilization = 1.0 - (state.margin_available.to_f64() / equity).clamp(0.0, 1.0);
        score += ramp(utilization, 0.9, [20, 10, 5]);

        score.min(100)
    }
}

/// Severity for a passing/failing check given usage vs limit: failures are
/// critical, passes within 80% of the limit are warnings.
fn grade(passed: bool, current: f64, limit: f64) -> RiskSeverity {
    if !passed {
        RiskSeverity::Critical
    } else if limit > 0.0 && current / limit > 0.8 {
        RiskSeverity::Warning
    } else {
        RiskSeverity::Info
    }
}

fn upper_bound_check(rule: RiskRule, current: f64, limit: f64, message: String) -> RiskCheck {
    let passed = current <= limit;
    RiskCheck {
        rule,
        passed,
        severity: grade(passed, current, limit),
        message,
        current_value: current,
        limit_value: limit,
    }
}

/// Percent-of-equity rule. A non-positive equity is a critical failure on
/// its own.
fn percent_of_equity_check(
    rule: RiskRule,
    projected_value: f64,
    equity: f64,
    limit_pct: f64,
    label: &str,
) -> RiskCheck {
    if equity <= 0.0 {
        return RiskCheck {
            rule,
            passed: false,
            severity: RiskSeverity::Critical,
            message: format!("cannot size {label} against non-positive equity"),
            current_value: 0.0,
            limit_value: limit_pct,
        };
    }
    let pct = projected_value / equity * 100.0;
    let passed = pct <= limit_pct;
    RiskCheck {
        rule,
        passed,
        severity: grade(passed, pct, limit_pct),
        message: format!(
            "projected {label} {:.1}% of equity vs limit {:.1}%",
            pct, limit_pct
        ),
        current_value: pct,
        limit_value: limit_pct,
    }
}

/// Banded bonus: at or above the limit, at 80%, at 50%.
fn ramp(value: f64, limit: f64, bands: [u32; 3]) -> u32 {
    if limit <= 0.0 {
        return 0;
    }
    if value >= limit {
        bands[0]
    } else if value >= limit * 0.8 {
        bands[1]
    } else if value >= limit * 0.5 {
        bands[2]
    } else {
        0
    }
}

fn score_checks(checks: &[RiskCheck], position_ratio: f64) -> u32 {
    let mut score = 0u32;
    for check in checks {
        score += match (check.passed, check.severity) {
            (false, RiskSeverity::Critical) => 30,
            (false, RiskSeverity::Warning) => 15,
            (true, RiskSeverity::Warning) => 5,
            _ => 0,
        };
    }
    score += if position_ratio >= 0.30 {
        20
    } else if position_ratio >= 0.20 {
        10
    } else if position_ratio >= 0.10 {
        5
    } else {
        0
    };
    score.min(100)
}
