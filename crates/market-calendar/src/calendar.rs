use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveTime, TimeZone, Utc, Weekday};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::debug;

use market_core::{HolidayProvider, Instrument, Price, Session, SessionPhase};

/// Exchange-local offset for SSE/SZSE (no DST).
const EXCHANGE_UTC_OFFSET_SECS: i32 = 8 * 3600;

/// The next session-phase transition after a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseChange {
    pub phase: SessionPhase,
    pub at: DateTime<Utc>,
}

/// Daily price-limit band. `None` bounds mean the instrument trades free of
/// a band (indices).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBand {
    pub upper: Option<Price>,
    pub lower: Option<Price>,
}

/// Trading-session clock for the A-share market. Holiday knowledge is
/// injected; the calendar only knows how to interpret a schedule.
pub struct MarketCalendar {
    schedule: Arc<dyn HolidayProvider>,
    include_auctions: bool,
}

impl MarketCalendar {
    pub fn new(schedule: Arc<dyn HolidayProvider>) -> Self {
        Self {
            schedule,
            include_auctions: false,
        }
    }

    /// Treat the open/close auctions as tradable windows.
    pub fn with_auction_trading(mut self, include: bool) -> Self {
        self.include_auctions = include;
        self
    }

    fn offset() -> FixedOffset {
        FixedOffset::east_opt(EXCHANGE_UTC_OFFSET_SECS).expect("fixed exchange offset")
    }

    /// Session phase at `now`.
    pub fn phase_at(&self, now: DateTime<Utc>) -> SessionPhase {
        let local = now.with_timezone(&Self::offset());
        let date = local.date_naive();
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            return SessionPhase::Weekend;
        }
        if !self.schedule.is_trading_day(date) {
            return SessionPhase::Holiday;
        }
        let sessions = self.sessions_for(date);
        Self::phase_in_sessions(&sessions, local.time())
    }

    fn sessions_for(&self, date: chrono::NaiveDate) -> Vec<Session> {
        let sessions = self.schedule.sessions(date);
        if sessions.is_empty() {
            crate::schedule::default_sessions()
        } else {
            sessions
        }
    }

    fn phase_in_sessions(sessions: &[Session], time: NaiveTime) -> SessionPhase {
        for session in sessions {
            if time >= session.start && time < session.end {
                return session.phase;
            }
        }
        // In a gap: before the first session is pre-open, after the last is
        // after-hours, and the midday gap is lunch.
        if let Some(first) = sessions.first() {
            if time < first.start {
                return SessionPhase::PreOpen;
            }
        }
        if let Some(last) = sessions.last() {
            if time >= last.end {
                return SessionPhase::AfterHours;
            }
        }
        match sessions.iter().find(|s| s.start > time).map(|s| s.phase) {
            Some(SessionPhase::Afternoon) | Some(SessionPhase::CloseAuction) => SessionPhase::Lunch,
            _ => SessionPhase::PreOpen,
        }
    }

    /// The next phase transition strictly after `now`. Searches forward up
    /// to one year of calendar days before giving up.
    pub fn next_event_after(&self, now: DateTime<Utc>) -> Option<PhaseChange> {
        let offset = Self::offset();
        let local = now.with_timezone(&offset);
        let mut date = local.date_naive();

        for day in 0..366 {
            let is_trading = !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
                && self.schedule.is_trading_day(date);
            if is_trading {
                let sessions = self.sessions_for(date);
                for (idx, session) in sessions.iter().enumerate() {
                    let start = Self::at_local(date, session.start);
                    if start > now {
                        return Some(PhaseChange {
                            phase: session.phase,
                            at: start,
                        });
                    }
                    let end = Self::at_local(date, session.end);
                    if end > now {
                        let next_phase = if idx + 1 < sessions.len() {
                            let next = &sessions[idx + 1];
                            if next.start > session.end {
                                match next.phase {
                                    SessionPhase::Afternoon | SessionPhase::CloseAuction => {
                                        SessionPhase::Lunch
                                    }
                                    _ => SessionPhase::PreOpen,
                                }
                            } else {
                                next.phase
                            }
                        } else {
                            SessionPhase::AfterHours
                        };
                        return Some(PhaseChange {
                            phase: next_phase,
                            at: end,
                        });
                    }
                }
            }
            date += Duration::days(1);
            if day == 0 {
                debug!(%date, "rolling next-event search to the following day");
            }
        }
        None
    }

    fn at_local(date: chrono::NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        Self::offset()
            .from_local_datetime(&date.and_time(time))
            .single()
            .expect("fixed offset has no ambiguous times")
            .with_timezone(&Utc)
    }

    /// Whether continuous trading (or, optionally, auction trading) is open.
    pub fn can_trade_at(&self, now: DateTime<Utc>) -> bool {
        match self.phase_at(now) {
            SessionPhase::Morning | SessionPhase::Afternoon => true,
            SessionPhase::OpenAuction | SessionPhase::CloseAuction => self.include_auctions,
            _ => false,
        }
    }

    /// Minimum tradable unit for the instrument.
    pub fn lot_size(&self, instrument: &Instrument) -> u32 {
        instrument.lot_size
    }

    /// Regulatory price-limit band from the previous close.
    pub fn price_limits(&self, instrument: &Instrument, prev_close: Price) -> PriceBand {
        regulatory_band(instrument, prev_close)
    }
}

/// Price-limit band from the previous close:
/// `round(prev_close × (1 ± pct), 2)`, half away from zero, which is the
/// exchange's published rounding for limit prices.
pub fn regulatory_band(instrument: &Instrument, prev_close: Price) -> PriceBand {
    let pct = instrument.price_limit_pct.value();
    if pct.is_zero() {
        return PriceBand {
            upper: None,
            lower: None,
        };
    }
    let limit = |factor: Decimal| {
        let raw = prev_close.value() * factor;
        Price::new(raw.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    };
    PriceBand {
        upper: Some(limit(Decimal::ONE + pct)),
        lower: Some(limit(Decimal::ONE - pct)),
    }
}
