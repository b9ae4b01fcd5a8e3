use serde::{Deserialize, Serialize};

use market_core::{Amount, Price, TradeSide};

/// Identity of a pre-trade rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskRule {
    MinOrderSize,
    MaxOrderSize,
    MaxPositionValue,
    MaxPositionPercent,
    MaxTotalExposure,
    MaxExposurePercent,
    MaxConcentration,
    MaxOpenPositions,
    MarginAvailable,
    MaxDailyLoss,
    DuplicatePosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskSeverity {
    Info,
    Warning,
    Critical,
}

/// One rule's verdict for a candidate order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskCheck {
    pub rule: RiskRule,
    pub passed: bool,
    pub severity: RiskSeverity,
    pub message: String,
    pub current_value: f64,
    pub limit_value: f64,
}

/// Result of `validate_order`: allowed iff no critical failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskValidation {
    pub allowed: bool,
    pub checks: Vec<RiskCheck>,
    pub blocked_by: Vec<RiskRule>,
    pub risk_score: u32,
}

/// The enumerated limit set. Every field is optional so a profile or a
/// caller override can set any subset.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RiskLimits {
    pub max_position_value: Option<Amount>,
    pub max_position_percent: Option<f64>,
    pub max_total_exposure: Option<Amount>,
    pub max_exposure_percent: Option<f64>,
    pub max_daily_loss: Option<Amount>,
    pub max_daily_loss_percent: Option<f64>,
    pub max_drawdown: Option<f64>,
    pub max_leverage: Option<f64>,
    pub max_concentration: Option<f64>,
    pub min_order_size: Option<u64>,
    pub max_order_size: Option<u64>,
    pub max_open_positions: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskProfile {
    Conservative,
    Moderate,
    Aggressive,
}

impl RiskLimits {
    pub fn from_profile(profile: RiskProfile) -> Self {
        match profile {
            RiskProfile::Conservative => Self {
                max_position_percent: Some(10.0),
                max_exposure_percent: Some(50.0),
                max_daily_loss_percent: Some(2.0),
                max_drawdown: Some(10.0),
                max_leverage: Some(1.0),
                max_concentration: Some(0.20),
                min_order_size: Some(100),
                max_order_size: Some(100_000),
                max_open_positions: Some(5),
                ..Self::default()
            },
            RiskProfile::Moderate => Self {
                max_position_percent: Some(20.0),
                max_exposure_percent: Some(80.0),
                max_daily_loss_percent: Some(5.0),
                max_drawdown: Some(20.0),
                max_leverage: Some(1.0),
                max_concentration: Some(0.35),
                min_order_size: Some(100),
                max_order_size: Some(1_000_000),
                max_open_positions: Some(10),
                ..Self::default()
            },
            RiskProfile::Aggressive => Self {
                max_position_percent: Some(40.0),
                max_exposure_percent: Some(100.0),
                max_daily_loss_percent: Some(10.0),
                max_drawdown: Some(30.0),
                max_leverage: Some(1.5),
                max_concentration: Some(0.50),
                min_order_size: Some(100),
                max_order_size: Some(10_000_000),
                max_open_positions: Some(20),
                ..Self::default()
            },
        }
    }

    /// Overlay caller-supplied fields onto this limit set.
    pub fn merge(mut self, overrides: RiskLimits) -> Self {
        macro_rules! take {
            ($field:ident) => {
                if overrides.$field.is_some() {
                    self.$field = overrides.$field;
                }
            };
        }
        take!(max_position_value);
        take!(max_position_percent);
        take!(max_total_exposure);
        take!(max_exposure_percent);
        take!(max_daily_loss);
        take!(max_daily_loss_percent);
        take!(max_drawdown);
        take!(max_leverage);
        take!(max_concentration);
        take!(min_order_size);
        take!(max_order_size);
        take!(max_open_positions);
        self
    }
}

/// An open position's exposure as seen by the risk gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposureSnapshot {
    pub symbol: String,
    pub value: Amount,
}

/// Portfolio-level inputs to the rule set. A pure value: validation never
/// mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioState {
    pub equity: Amount,
    pub balance: Amount,
    pub margin_available: Amount,
    pub daily_pnl: Amount,
    pub positions: Vec<ExposureSnapshot>,
}

impl PortfolioState {
    pub fn total_exposure(&self) -> Amount {
        self.positions.iter().map(|p| p.value).sum()
    }

    pub fn position_value(&self, symbol: &str) -> Amount {
        self.positions
            .iter()
            .filter(|p| p.symbol == symbol)
            .map(|p| p.value)
            .sum()
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.iter().any(|p| p.symbol == symbol)
    }
}

/// The order under validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateOrder {
    pub symbol: String,
    pub side: TradeSide,
    pub price: Price,
    pub size: u64,
}

impl CandidateOrder {
    /// Notional value at the candidate price.
    pub fn order_value(&self) -> Amount {
        self.price.notional(self.size)
    }
}
