use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};

use market_core::{HolidayProvider, Session, SessionPhase};

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).expect("valid session boundary")
}

/// The standard SSE/SZSE session windows, exchange-local.
pub fn default_sessions() -> Vec<Session> {
    vec![
        Session {
            phase: SessionPhase::OpenAuction,
            start: t(9, 15),
            end: t(9, 25),
        },
        Session {
            phase: SessionPhase::Morning,
            start: t(9, 30),
            end: t(11, 30),
        },
        Session {
            phase: SessionPhase::Afternoon,
            start: t(13, 0),
            end: t(14, 57),
        },
        Session {
            phase: SessionPhase::CloseAuction,
            start: t(14, 57),
            end: t(15, 0),
        },
    ]
}

/// Weekday-only schedule: every Monday-Friday is a trading day with the
/// standard session windows. Used for backtests over pre-filtered bars and
/// in tests; production callers inject a real holiday table.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeekdayProvider;

impl HolidayProvider for WeekdayProvider {
    fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    fn sessions(&self, date: NaiveDate) -> Vec<Session> {
        if self.is_trading_day(date) {
            default_sessions()
        } else {
            Vec::new()
        }
    }
}
