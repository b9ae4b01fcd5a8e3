use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bar::{KLineSeries, Timeframe};
use crate::error::DataError;
use crate::instrument::Instrument;

/// Phase of the exchange trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    PreOpen,
    OpenAuction,
    Morning,
    Lunch,
    Afternoon,
    CloseAuction,
    AfterHours,
    Weekend,
    Holiday,
}

/// One contiguous session window within a trading day (exchange-local times).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub phase: SessionPhase,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Source of historical bars. The only suspending capability in the core.
#[async_trait]
pub trait DataProvider: Send + Sync {
    async fn get_bars(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timeframe: Timeframe,
    ) -> Result<KLineSeries, DataError>;
}

/// Trading-day schedule. Injected; the core ships no holiday table.
pub trait HolidayProvider: Send + Sync {
    fn is_trading_day(&self, date: NaiveDate) -> bool;
    fn sessions(&self, date: NaiveDate) -> Vec<Session>;
}

/// Instrument metadata lookup.
pub trait InstrumentProvider: Send + Sync {
    fn lookup(&self, symbol: &str) -> Option<Instrument>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bar::Bar;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    struct CannedProvider {
        bars: Vec<Bar>,
    }

    #[async_trait]
    impl DataProvider for CannedProvider {
        async fn get_bars(
            &self,
            symbol: &str,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
            timeframe: Timeframe,
        ) -> Result<KLineSeries, DataError> {
            if symbol != "600000" {
                return Err(DataError::NotFound(symbol.to_string()));
            }
            let bars = self
                .bars
                .iter()
                .filter(|b| b.ts >= start && b.ts <= end)
                .cloned()
                .collect();
            KLineSeries::new(symbol, timeframe, bars)
                .map_err(|e| DataError::Integrity(e.to_string()))
        }
    }

    fn canned() -> CannedProvider {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 7, 0, 0).unwrap();
        let bars = (0..5)
            .map(|i| Bar {
                ts: base + Duration::days(i),
                open: dec!(10.0),
                high: dec!(10.5),
                low: dec!(9.5),
                close: dec!(10.2),
                volume: 1000.0,
                amount: None,
            })
            .collect();
        CannedProvider { bars }
    }

    #[tokio::test]
    async fn provider_returns_a_validated_series() {
        let provider = canned();
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let series = provider
            .get_bars("600000", base, base + Duration::days(10), Timeframe::Day1)
            .await
            .unwrap();
        assert_eq!(series.symbol(), "600000");
        assert_eq!(series.len(), 5);
    }

    #[tokio::test]
    async fn provider_reports_unknown_symbols() {
        let provider = canned();
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let err = provider
            .get_bars("999999", base, base + Duration::days(1), Timeframe::Day1)
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::NotFound(_)));
    }
}
