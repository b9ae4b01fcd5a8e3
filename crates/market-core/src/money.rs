use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::MoneyError;

/// Marker for a monetary class with a fixed canonical scale.
pub trait MoneyClass: Copy + Clone + fmt::Debug + PartialEq + Eq + 'static {
    const SCALE: u32;
    const NAME: &'static str;
}

/// Per-share prices, quoted to 4 decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceTag;

/// Cash amounts (balances, PnL, commission), 2 decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountTag;

/// Dimensionless ratios (rates, percentages as fractions), 6 decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatioTag;

impl MoneyClass for PriceTag {
    const SCALE: u32 = 4;
    const NAME: &'static str = "price";
}

impl MoneyClass for AmountTag {
    const SCALE: u32 = 2;
    const NAME: &'static str = "amount";
}

impl MoneyClass for RatioTag {
    const SCALE: u32 = 6;
    const NAME: &'static str = "ratio";
}

pub type Price = Money<PriceTag>;
pub type Amount = Money<AmountTag>;
pub type Ratio = Money<RatioTag>;

/// Fixed-point monetary value. The inner decimal always carries the class's
/// canonical scale, so `100.1 + 100.2` is exactly `200.30` and string
/// round-trips are lossless. All rounding is banker's (half-to-even).
pub struct Money<C: MoneyClass> {
    value: Decimal,
    _class: PhantomData<C>,
}

impl<C: MoneyClass> Money<C> {
    /// Wrap a decimal, normalizing to the canonical scale.
    pub fn new(value: Decimal) -> Self {
        Self {
            value: Self::canonical(value),
            _class: PhantomData,
        }
    }

    pub fn zero() -> Self {
        Self::new(Decimal::ZERO)
    }

    fn canonical(raw: Decimal) -> Decimal {
        let mut v = raw.round_dp_with_strategy(C::SCALE, RoundingStrategy::MidpointNearestEven);
        v.rescale(C::SCALE);
        v
    }

    /// The only way a binary float enters money arithmetic.
    pub fn from_f64_rounded(value: f64) -> Result<Self, MoneyError> {
        if !value.is_finite() {
            return Err(MoneyError::NotFinite(value));
        }
        Decimal::from_f64(value)
            .map(Self::new)
            .ok_or(MoneyError::Overflow)
    }

    /// Multiply by a dimensionless scalar, preserving the receiver's scale.
    pub fn mul(self, factor: Decimal) -> Result<Self, MoneyError> {
        self.value
            .checked_mul(factor)
            .map(Self::new)
            .ok_or(MoneyError::Overflow)
    }

    /// Divide by a dimensionless scalar, preserving the receiver's scale.
    pub fn div(self, divisor: Decimal) -> Result<Self, MoneyError> {
        if divisor.is_zero() {
            return Err(MoneyError::DivisionByZero);
        }
        self.value
            .checked_div(divisor)
            .map(Self::new)
            .ok_or(MoneyError::Overflow)
    }

    /// Three-way comparison.
    pub fn compare(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }

    /// Round to `dp` places (banker's), then restore the canonical scale.
    pub fn round(self, dp: u32) -> Self {
        Self::new(
            self.value
                .round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven),
        )
    }

    /// Project into another monetary class. Always explicit at call sites.
    pub fn project<T: MoneyClass>(self) -> Money<T> {
        Money::<T>::new(self.value)
    }

    pub fn abs(self) -> Self {
        Self::new(self.value.abs())
    }

    pub fn min(self, other: Self) -> Self {
        if self.value <= other.value {
            self
        } else {
            other
        }
    }

    pub fn max(self, other: Self) -> Self {
        if self.value >= other.value {
            self
        } else {
            other
        }
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.value.is_sign_negative() && !self.value.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.value.is_sign_positive() && !self.value.is_zero()
    }

    /// The raw decimal at canonical scale.
    pub fn value(&self) -> Decimal {
        self.value
    }

    /// Lossy float view for statistics; never feeds back into money math.
    pub fn to_f64(&self) -> f64 {
        self.value.to_f64().unwrap_or(f64::NAN)
    }

    /// Render with an explicit number of decimal places.
    pub fn format(&self, digits: u32) -> String {
        let mut v = self
            .value
            .round_dp_with_strategy(digits, RoundingStrategy::MidpointNearestEven);
        v.rescale(digits);
        v.to_string()
    }
}

impl Price {
    /// Reclassify to a cash amount at the amount scale.
    pub fn as_amount(self) -> Amount {
        self.project()
    }

    /// Cash value of `quantity` shares at this price. The one sanctioned
    /// way to turn a price and a size into an amount.
    pub fn notional(&self, quantity: u64) -> Amount {
        Money::<AmountTag>::new(self.value * Decimal::from(quantity))
    }
}

impl Amount {
    /// Reclassify to a ratio at the ratio scale.
    pub fn as_ratio(self) -> Ratio {
        self.project()
    }

    /// Reclassify to a per-share price at the price scale.
    pub fn as_price(self) -> Price {
        self.project()
    }
}

impl<C: MoneyClass> Clone for Money<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: MoneyClass> Copy for Money<C> {}

impl<C: MoneyClass> Default for Money<C> {
    fn default() -> Self {
        Self::zero()
    }
}

impl<C: MoneyClass> PartialEq for Money<C> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<C: MoneyClass> Eq for Money<C> {}

impl<C: MoneyClass> PartialOrd for Money<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<C: MoneyClass> Ord for Money<C> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl<C: MoneyClass> fmt::Debug for Money<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", C::NAME, self.value)
    }
}

impl<C: MoneyClass> fmt::Display for Money<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<C: MoneyClass> Add for Money<C> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.value + rhs.value)
    }
}

impl<C: MoneyClass> Sub for Money<C> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.value - rhs.value)
    }
}

impl<C: MoneyClass> Neg for Money<C> {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.value)
    }
}

impl<C: MoneyClass> std::iter::Sum for Money<C> {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, v| acc + v)
    }
}

impl<C: MoneyClass> FromStr for Money<C> {
    type Err = MoneyError;

    /// Parses plain decimal notation. NaN, infinities, and scientific
    /// notation are rejected outright.
    fn from_str(s: &str) -> Result<Self, MoneyError> {
        Decimal::from_str(s.trim())
            .map(Self::new)
            .map_err(|_| MoneyError::Format(s.to_string()))
    }
}

impl<C: MoneyClass> Serialize for Money<C> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Serialize::serialize(&self.value, serializer)
    }
}

impl<'de, C: MoneyClass> Deserialize<'de> for Money<C> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        <Decimal as Deserialize<'de>>::deserialize(deserializer).map(Self::new)
    }
}
