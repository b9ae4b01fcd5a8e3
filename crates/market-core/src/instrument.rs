use chrono::NaiveDate;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::money::Ratio;

/// Listing venue segment. The effective price-limit band is carried on the
/// instrument itself; nothing downstream infers it from symbol prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Board {
    Main,
    Star,
    ChiNext,
    Beijing,
    EtfOrIndex,
}

/// Static metadata for one tradable instrument, immutable per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    pub symbol: String,
    pub display_name: String,
    pub listing_date: NaiveDate,
    pub lot_size: u32,
    /// Daily price-limit band as a fraction (0.10 = ±10%). Zero disables
    /// the band (indices).
    pub price_limit_pct: Ratio,
    pub is_st: bool,
    pub board: Board,
}

impl Instrument {
    fn base(
        symbol: impl Into<String>,
        display_name: impl Into<String>,
        listing_date: NaiveDate,
        board: Board,
        limit: Ratio,
        lot_size: u32,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            display_name: display_name.into(),
            listing_date,
            lot_size,
            price_limit_pct: limit,
            is_st: false,
            board,
        }
    }

    /// Main-board A-share: ±10% band, 100-share lots.
    pub fn main_board(
        symbol: impl Into<String>,
        display_name: impl Into<String>,
        listing_date: NaiveDate,
    ) -> Self {
        Self::base(
            symbol,
            display_name,
            listing_date,
            Board::Main,
            Ratio::new(dec!(0.10)),
            100,
        )
    }

    /// STAR market: ±20% band.
    pub fn star(
        symbol: impl Into<String>,
        display_name: impl Into<String>,
        listing_date: NaiveDate,
    ) -> Self {
        Self::base(
            symbol,
            display_name,
            listing_date,
            Board::Star,
            Ratio::new(dec!(0.20)),
            100,
        )
    }

    /// ChiNext: ±20% band.
    pub fn chinext(
        symbol: impl Into<String>,
        display_name: impl Into<String>,
        listing_date: NaiveDate,
    ) -> Self {
        Self::base(
            symbol,
            display_name,
            listing_date,
            Board::ChiNext,
            Ratio::new(dec!(0.20)),
            100,
        )
    }

    /// Beijing Stock Exchange: ±30% band.
    pub fn beijing(
        symbol: impl Into<String>,
        display_name: impl Into<String>,
        listing_date: NaiveDate,
    ) -> Self {
        Self::base(
            symbol,
            display_name,
            listing_date,
            Board::Beijing,
            Ratio::new(dec!(0.30)),
            100,
        )
    }

    /// ETF or index: no band, unit lots.
    pub fn etf_or_index(
        symbol: impl Into<String>,
        display_name: impl Into<String>,
        listing_date: NaiveDate,
    ) -> Self {
        Self::base(
            symbol,
            display_name,
            listing_date,
            Board::EtfOrIndex,
            Ratio::zero(),
            1,
        )
    }

    /// Mark as Special Treatment: band tightens to ±5%.
    pub fn with_st(mut self) -> Self {
        self.is_st = true;
        self.price_limit_pct = Ratio::new(dec!(0.05));
        self
    }

    /// Trading days listed as of `date`, by calendar-day approximation.
    pub fn listed_days_at(&self, date: NaiveDate) -> i64 {
        (date - self.listing_date).num_days()
    }
}
