use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign},
    str::FromStr,
};

use crate::EngineError;

/// Largest magnitude an amount may take, in cents (ten trillion in major
/// units). Keeps every conversion to and from `f64` exact.
pub const MAX_CENTS: i64 = 1_000_000_000_000_000;

/// Signed expense amount represented as **integer cents**.
///
/// The wire format carries amounts as JSON numbers. Only numbers holding a
/// whole number of cents are accepted, so what is read is always written
/// back unchanged.
///
/// The value is signed:
/// - positive = income
/// - negative = expense
///
/// Arithmetic saturates at the `i64` bounds.
///
/// # Examples
///
/// ```rust
/// use engine::Amount;
///
/// let amount = Amount::new(-12_34);
/// assert_eq!(amount.cents(), -1234);
/// assert_eq!(amount.to_string(), "-12.34");
/// assert_eq!("-10,5".parse::<Amount>().unwrap().cents(), -1050);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Creates a new amount from integer cents.
    #[must_use]
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns the raw value in cents.
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    fn bounded(cents: i64) -> Option<Self> {
        (cents.unsigned_abs() <= MAX_CENTS.unsigned_abs()).then_some(Self(cents))
    }

    /// Converts a JSON number (major units) into cents.
    ///
    /// `None` unless the number holds a whole number of cents within
    /// [`MAX_CENTS`]: `12.34` is accepted, `12.345`, NaN and infinities are
    /// not.
    #[must_use]
    pub fn from_major(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let scaled = value * 100.0;
        let cents = scaled.round();
        if cents.abs() > MAX_CENTS as f64 {
            return None;
        }
        // `x * 100.0` is off by a few ulps for most decimals (0.1, 1.15...).
        let tolerance = f64::EPSILON * scaled.abs().max(1.0) * 4.0;
        if (scaled - cents).abs() > tolerance {
            return None;
        }
        Self::bounded(cents as i64)
    }

    /// Value in major units, as written to the wire.
    #[must_use]
    pub fn to_major(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// `+` when strictly positive, `-` otherwise (zero included).
    #[must_use]
    pub fn sign(self) -> char {
        if self.0 > 0 { '+' } else { '-' }
    }

    /// Absolute value with two decimals and no sign.
    #[must_use]
    pub fn format_unsigned(self) -> String {
        let abs = self.0.unsigned_abs();
        format!("{}.{:02}", abs / 100, abs % 100)
    }
}

/// Formats as the application shows amounts: a mandatory sign followed by
/// the absolute value with two decimals (`+12.00`, `-0.50`, `-0.00`).
impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.sign(), self.format_unsigned())
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Self::Output {
        Amount(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        *self = *self + rhs;
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// Parses what a user types for an amount: an optional sign, then major
/// units with `.` or `,` before at most two decimals (`-12,5`, `+3.20`, `40`).
impl FromStr for Amount {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        let invalid = || EngineError::InvalidAmount(input.to_string());

        let (negative, digits) = match input.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, input.strip_prefix('+').unwrap_or(input)),
        };
        let (units, decimals) = digits.split_once(['.', ',']).unwrap_or((digits, ""));
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if units.is_empty() || decimals.len() > 2 || !all_digits(units) || !all_digits(decimals) {
            return Err(invalid());
        }

        let cents: i64 = format!("{units}{decimals:0<2}")
            .parse()
            .map_err(|_| invalid())?;
        Self::bounded(if negative { -cents } else { cents }).ok_or_else(invalid)
    }
}
