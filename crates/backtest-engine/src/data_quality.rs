use rust_decimal::prelude::ToPrimitive;
use tracing::warn;

use market_core::KLineSeries;

use crate::models::DataQualityReport;

/// Coverage below this fraction fails the run outright.
pub const MIN_COVERAGE: f64 = 0.5;

/// Assess the input series: coverage against the expected bar grid, plus
/// gap and anomaly dates for the report.
pub fn assess_series(series: &KLineSeries, price_limit_pct: f64) -> DataQualityReport {
    let missing = series.missing_bars();
    let present = series.len();
    let expected = present + missing.len();
    let coverage = if expected > 0 {
        present as f64 / expected as f64
    } else {
        0.0
    };
    if coverage < 1.0 {
        warn!(
            symbol = series.symbol(),
            coverage, "series has missing bars"
        );
    }

    DataQualityReport {
        coverage,
        missing_bar_dates: missing.iter().map(|ts| ts.date_naive()).collect(),
        price_anomaly_dates: series
            .price_anomalies(price_limit_pct)
            .iter()
            .map(|a| a.ts.date_naive())
            .collect(),
    }
}

/// Effective band fraction for anomaly detection.
pub fn effective_limit_fraction(
    instrument: &market_core::Instrument,
    override_pct: Option<rust_decimal::Decimal>,
) -> f64 {
    override_pct
        .map(|d| d.to_f64().unwrap_or(0.0))
        .unwrap_or_else(|| instrument.price_limit_pct.to_f64())
}
