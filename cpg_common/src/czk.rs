use std::{
    fmt::{self, Display},
    iter::Sum,
    ops::{Add, Mul},
    str::FromStr,
};

use serde::{de::Visitor, Deserialize, Deserializer, Serialize, Serializer};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const CZK_CURRENCY_CODE: &str = "CZK";

//----------------------------------------------      Czk       -------------------------------------------------------
/// An amount of Czech crowns, stored as a whole number of hundredths (haléře).
///
/// All money in the system is fixed-point with two fraction digits, so `Czk::from_halere(33_900)` is 339.00 Kč.
/// Amounts serialize to JSON as decimal strings (`"339.00"`) and deserialize from either strings or numbers.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash)]
#[sqlx(transparent)]
pub struct Czk(i64);

op!(binary Czk, Add, add);
op!(binary Czk, Sub, sub);
op!(inplace Czk, AddAssign, add_assign);
op!(inplace Czk, SubAssign, sub_assign);
op!(unary Czk, Neg, neg);

impl Mul<i64> for Czk {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Sum for Czk {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl Czk {
    pub const fn from_halere(halere: i64) -> Self {
        Self(halere)
    }

    pub const fn from_crowns(crowns: i64) -> Self {
        Self(crowns * 100)
    }

    /// The amount in haléře
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn abs(&self) -> Self {
        Self(self.0.saturating_abs())
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// The absolute difference between two amounts, saturating at the largest representable amount.
    pub fn abs_diff(&self, other: Czk) -> Czk {
        Self(i64::try_from(self.0.abs_diff(other.0)).unwrap_or(i64::MAX))
    }

    /// Checked multiplication, for line totals computed from untrusted quantities.
    pub fn checked_mul(&self, rhs: i64) -> Option<Czk> {
        self.0.checked_mul(rhs).map(Self)
    }

    pub fn checked_add(&self, rhs: Czk) -> Option<Czk> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// Formats the amount with exactly two fraction digits and no currency suffix, e.g. `-1.50`.
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        format!("{sign}{}.{:02}", abs / 100, abs % 100)
    }

    /// Converts a float to the nearest haléř. Only used at the JSON boundary, where clients may send numbers.
    pub fn from_f64(value: f64) -> Result<Self, CzkParseError> {
        if !value.is_finite() {
            return Err(CzkParseError(value.to_string()));
        }
        let halere = (value * 100.0).round();
        if halere.abs() > i64::MAX as f64 {
            return Err(CzkParseError(value.to_string()));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self(halere as i64))
    }
}

impl From<i64> for Czk {
    fn from(halere: i64) -> Self {
        Self(halere)
    }
}

impl Display for Czk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Kč", self.to_decimal_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Not a valid CZK amount: {0}")]
pub struct CzkParseError(pub String);

impl FromStr for Czk {
    type Err = CzkParseError;

    /// Parses the amount formats seen on Czech bank statements and web forms:
    /// `339`, `339.3`, `339,30`, `+1 234,50`, `-1.234,50`, `1,234.50 Kč`, `12 500.00 CZK`.
    ///
    /// The right-most `.` or `,` is the decimal separator when it is followed by one or two digits. All other
    /// separators (spaces, non-breaking spaces, `.`, `,`, `'`) are treated as thousands separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || CzkParseError(s.to_string());
        let trimmed = s.trim();
        let trimmed = trimmed
            .strip_suffix("Kč")
            .or_else(|| trimmed.strip_suffix("CZK"))
            .unwrap_or(trimmed)
            .trim_end();
        let (negative, body) = match trimmed.chars().next() {
            Some('-') => (true, &trimmed[1..]),
            Some('+') => (false, &trimmed[1..]),
            Some(_) => (false, trimmed),
            None => return Err(err()),
        };
        let compact = body.chars().filter(|c| !c.is_whitespace() && *c != '\'').collect::<String>();
        if compact.is_empty() || !compact.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',') {
            return Err(err());
        }
        let (int_part, frac_part) = match compact.rfind(['.', ',']) {
            Some(pos) if (1..=2).contains(&(compact.len() - pos - 1)) => (&compact[..pos], &compact[pos + 1..]),
            Some(pos) if compact.len() - pos - 1 == 3 => (compact.as_str(), ""),
            Some(_) => return Err(err()),
            None => (compact.as_str(), ""),
        };
        let digits = int_part.chars().filter(char::is_ascii_digit).collect::<String>();
        if digits.is_empty() {
            return Err(err());
        }
        let crowns = digits.parse::<i64>().map_err(|_| err())?;
        let halere = match frac_part.len() {
            0 => 0,
            1 => frac_part.parse::<i64>().map_err(|_| err())? * 10,
            _ => frac_part.parse::<i64>().map_err(|_| err())?,
        };
        let value = crowns.checked_mul(100).and_then(|v| v.checked_add(halere)).ok_or_else(err)?;
        Ok(Self(if negative { -value } else { value }))
    }
}

impl Serialize for Czk {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_decimal_string())
    }
}

struct CzkVisitor;

impl<'de> Visitor<'de> for CzkVisitor {
    type Value = Czk;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a CZK amount as a decimal string or number")
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse::<Czk>().map_err(E::custom)
    }

    fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Self::Value, E> {
        v.checked_mul(100).map(Czk).ok_or_else(|| E::custom(CzkParseError(v.to_string())))
    }

    fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Self::Value, E> {
        i64::try_from(v)
            .ok()
            .and_then(|v| v.checked_mul(100))
            .map(Czk)
            .ok_or_else(|| E::custom(CzkParseError(v.to_string())))
    }

    fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Czk::from_f64(v).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Czk {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(CzkVisitor)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn arithmetic() {
        let a = Czk::from_crowns(100);
        let b = Czk::from_halere(50_00);
        assert_eq!(a * 2 + b, Czk::from_crowns(250));
        assert_eq!(a - b, Czk::from_crowns(50));
        assert_eq!(-a, Czk::from_halere(-10_000));
        let total: Czk = vec![a, b, Czk::from_crowns(89)].into_iter().sum();
        assert_eq!(total, Czk::from_crowns(239));
        assert_eq!(Czk::from_halere(33_930).abs_diff(Czk::from_crowns(339)), Czk::from_halere(30));
    }

    #[test]
    fn extreme_amounts_saturate() {
        let low = "-92233720368547758,07".parse::<Czk>().unwrap();
        let high = Czk::from_halere(i64::MAX);
        assert_eq!(low.abs_diff(Czk::from_crowns(339)), Czk::from_halere(i64::MAX));
        assert_eq!(low.abs_diff(high), Czk::from_halere(i64::MAX));
        assert_eq!(high.abs_diff(low), Czk::from_halere(i64::MAX));
        assert_eq!(Czk::from_halere(i64::MIN).abs(), Czk::from_halere(i64::MAX));
        assert_eq!(low.abs_diff(low), Czk::default());
    }

    #[test]
    fn display() {
        assert_eq!(Czk::from_halere(33_900).to_string(), "339.00 Kč");
        assert_eq!(Czk::from_halere(-150).to_decimal_string(), "-1.50");
        assert_eq!(Czk::from_halere(7).to_decimal_string(), "0.07");
    }

    #[test]
    fn parse_bank_formats() {
        let cases = [
            ("339", 33_900),
            ("339.3", 33_930),
            ("339,30", 33_930),
            ("+1,00", 100),
            ("-1 234,50", -123_450),
            ("1\u{a0}234,50", 123_450),
            ("1.234,50", 123_450),
            ("1,234.50 Kč", 123_450),
            ("12 500.00 CZK", 1_250_000),
            ("1.234", 123_400),
        ];
        for (input, expected) in cases {
            assert_eq!(input.parse::<Czk>(), Ok(Czk::from_halere(expected)), "parsing {input}");
        }
    }

    #[test]
    fn parse_rejects_garbage() {
        for input in ["", "-", "abc", "12.3456", "1,2,3a", ".50"] {
            assert!(input.parse::<Czk>().is_err(), "{input} should not parse");
        }
    }

    #[test]
    fn serde_round_trip() {
        let v: Czk = serde_json::from_str("\"339,30\"").unwrap();
        assert_eq!(v, Czk::from_halere(33_930));
        let v: Czk = serde_json::from_str("100.5").unwrap();
        assert_eq!(v, Czk::from_halere(10_050));
        let v: Czk = serde_json::from_str("89").unwrap();
        assert_eq!(v, Czk::from_crowns(89));
        assert_eq!(serde_json::to_string(&Czk::from_crowns(89)).unwrap(), "\"89.00\"");
    }
}
