use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::SeriesError;

/// OHLCV bar. Timestamps are UTC and serialize as integer epoch seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    #[serde(with = "chrono::serde::ts_seconds")]
    pub ts: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
}

impl Bar {
    /// A zero-volume bar represents a trading halt for the interval.
    pub fn is_suspended(&self) -> bool {
        self.volume == 0.0
    }
}

/// Bar interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    Min1,
    #[serde(rename = "5m")]
    Min5,
    #[serde(rename = "15m")]
    Min15,
    #[serde(rename = "30m")]
    Min30,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "1w")]
    Week1,
}

impl Timeframe {
    pub fn minutes(&self) -> i64 {
        match self {
            Timeframe::Min1 => 1,
            Timeframe::Min5 => 5,
            Timeframe::Min15 => 15,
            Timeframe::Min30 => 30,
            Timeframe::Hour1 => 60,
            Timeframe::Day1 => 1440,
            Timeframe::Week1 => 10080,
        }
    }

    pub fn seconds(&self) -> i64 {
        self.minutes() * 60
    }

    pub fn interval(&self) -> Duration {
        Duration::seconds(self.seconds())
    }

    pub fn is_intraday(&self) -> bool {
        self.minutes() < 1440
    }
}

/// A detected pricing irregularity in a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceAnomaly {
    #[serde(with = "chrono::serde::ts_seconds")]
    pub ts: DateTime<Utc>,
    pub change_pct: f64,
    pub kind: AnomalyKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// Absolute single-bar return above 25%, usually an unadjusted
    /// corporate action.
    SuspectedAdjustment,
    /// Close-to-close move beyond the instrument's price-limit band plus
    /// a 5-point tolerance.
    LimitGap,
}

/// Immutable, integrity-checked bar container. Shared by value; there are
/// no mutating accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KLineSeries {
    symbol: String,
    timeframe: Timeframe,
    bars: Vec<Bar>,
}

impl KLineSeries {
    /// Validate and wrap a bar vector. Rejects OHLC violations, negative or
    /// non-finite volume, and non-increasing timestamps.
    pub fn new(
        symbol: impl Into<String>,
        timeframe: Timeframe,
        bars: Vec<Bar>,
    ) -> Result<Self, SeriesError> {
        for (i, bar) in bars.iter().enumerate() {
            if bar.low > bar.high {
                return Err(SeriesError::BarIntegrity {
                    index: i,
                    reason: format!("low {} above high {}", bar.low, bar.high),
                });
            }
            if bar.open < bar.low || bar.open > bar.high {
                return Err(SeriesError::BarIntegrity {
                    index: i,
                    reason: format!("open {} outside [{}, {}]", bar.open, bar.low, bar.high),
                });
            }
            if bar.close < bar.low || bar.close > bar.high {
                return Err(SeriesError::BarIntegrity {
                    index: i,
                    reason: format!("close {} outside [{}, {}]", bar.close, bar.low, bar.high),
                });
            }
            if !bar.volume.is_finite() || bar.volume < 0.0 {
                return Err(SeriesError::BarIntegrity {
                    index: i,
                    reason: format!("invalid volume {}", bar.volume),
                });
            }
            if i > 0 {
                if bar.ts <= bars[i - 1].ts {
                    return Err(SeriesError::NonMonotonicTime { index: i });
                }
                if bar.ts - bars[i - 1].ts < timeframe.interval() {
                    return Err(SeriesError::TimeframeMismatch { index: i });
                }
            }
        }
        Ok(Self {
            symbol: symbol.into(),
            timeframe,
            bars,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn at(&self, i: usize) -> Option<&Bar> {
        self.bars.get(i)
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// Sub-series over `lo..hi`. Bars are already validated, so this only
    /// checks bounds.
    pub fn slice(&self, lo: usize, hi: usize) -> Result<Self, SeriesError> {
        if lo > hi || hi > self.bars.len() {
            return Err(SeriesError::SliceOutOfRange {
                lo,
                hi,
                len: self.bars.len(),
            });
        }
        Ok(Self {
            symbol: self.symbol.clone(),
            timeframe: self.timeframe,
            bars: self.bars[lo..hi].to_vec(),
        })
    }

    pub fn closes(&self) -> impl Iterator<Item = f64> + '_ {
        self.bars.iter().map(|b| b.close.to_f64().unwrap_or(f64::NAN))
    }

    pub fn opens(&self) -> impl Iterator<Item = f64> + '_ {
        self.bars.iter().map(|b| b.open.to_f64().unwrap_or(f64::NAN))
    }

    pub fn highs(&self) -> impl Iterator<Item = f64> + '_ {
        self.bars.iter().map(|b| b.high.to_f64().unwrap_or(f64::NAN))
    }

    pub fn lows(&self) -> impl Iterator<Item = f64> + '_ {
        self.bars.iter().map(|b| b.low.to_f64().unwrap_or(f64::NAN))
    }

    pub fn volumes(&self) -> impl Iterator<Item = f64> + '_ {
        self.bars.iter().map(|b| b.volume)
    }

    pub fn closes_f64(&self) -> Vec<f64> {
        self.closes().collect()
    }

    /// Timestamps where a bar was expected but none is present. For daily
    /// series weekends are not expected; holidays are indistinguishable from
    /// genuine gaps here and are resolved by the caller's calendar.
    pub fn missing_bars(&self) -> Vec<DateTime<Utc>> {
        let mut missing = Vec::new();
        match self.timeframe {
            Timeframe::Day1 => {
                for pair in self.bars.windows(2) {
                    let mut day = pair[0].ts + Duration::days(1);
                    while day.date_naive() < pair[1].ts.date_naive() {
                        let wd = day.weekday();
                        if wd != Weekday::Sat && wd != Weekday::Sun {
                            missing.push(day);
                        }
                        day += Duration::days(1);
                    }
                }
            }
            Timeframe::Week1 => {}
            _ => {
                let step = self.timeframe.interval();
                for pair in self.bars.windows(2) {
                    let mut t = pair[0].ts + step;
                    while t < pair[1].ts {
                        missing.push(t);
                        t += step;
                    }
                }
            }
        }
        missing
    }

    /// Close-to-close irregularities: returns above 25% absolute are flagged
    /// as suspected adjustments; moves beyond `limit_pct + 5%` as limit gaps.
    pub fn price_anomalies(&self, limit_pct: f64) -> Vec<PriceAnomaly> {
        let mut anomalies = Vec::new();
        for (i, pair) in self.bars.windows(2).enumerate() {
            let prev = pair[0].close.to_f64().unwrap_or(0.0);
            let curr = pair[1].close.to_f64().unwrap_or(0.0);
            if prev <= 0.0 {
                continue;
            }
            let change = (curr - prev) / prev;
            let kind = if change.abs() > 0.25 {
                Some(AnomalyKind::SuspectedAdjustment)
            } else if limit_pct > 0.0 && change.abs() > limit_pct + 0.05 {
                Some(AnomalyKind::LimitGap)
            } else {
                None
            };
            if let Some(kind) = kind {
                anomalies.push(PriceAnomaly {
                    ts: self.bars[i + 1].ts,
                    change_pct: change * 100.0,
                    kind,
                });
            }
        }
        anomalies
    }
}
