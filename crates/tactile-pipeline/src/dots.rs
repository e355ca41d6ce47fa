//! The six-dot Braille cell.
//!
//! Dots are numbered in the usual way: 1-2-3 down the left column,
//! 4-5-6 down the right column.
//!
//! ```text
//!   1 o o 4
//!   2 o o 5
//!   3 o o 6
//! ```
//!
//! A pattern serializes as six flags in dot order, `F` for a raised
//! (filled) dot and `E` for an empty one, e.g. `FEEFFE` for dots 1, 4, 5.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One of the six dot positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dot {
    /// Left column, top.
    D1,
    /// Left column, middle.
    D2,
    /// Left column, bottom.
    D3,
    /// Right column, top.
    D4,
    /// Right column, middle.
    D5,
    /// Right column, bottom.
    D6,
}

impl Dot {
    /// All positions in dot-number order.
    pub const ALL: [Self; 6] = [Self::D1, Self::D2, Self::D3, Self::D4, Self::D5, Self::D6];

    /// Zero-based position (dot number minus one).
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The dot with the given conventional number (1..=6).
    #[must_use]
    pub const fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::D1),
            2 => Some(Self::D2),
            3 => Some(Self::D3),
            4 => Some(Self::D4),
            5 => Some(Self::D5),
            6 => Some(Self::D6),
            _ => None,
        }
    }

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// The set of raised dots on one tile.
///
/// Starts empty and only ever gains dots: there is no way to clear one.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BrailleDots(u8);

impl BrailleDots {
    /// No dots raised.
    pub const EMPTY: Self = Self(0);

    /// Number of distinct patterns, including the empty one.
    pub const PATTERN_COUNT: u8 = 64;

    /// Pattern with exactly the given dots raised.
    #[must_use]
    pub fn from_dots(dots: &[Dot]) -> Self {
        dots.iter().fold(Self::EMPTY, |acc, &d| acc.with(d))
    }

    /// Pattern from a bit mask where bit `i` is dot `i + 1`. Masks with
    /// bits above the sixth are rejected.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        if bits < Self::PATTERN_COUNT {
            Some(Self(bits))
        } else {
            None
        }
    }

    /// Parse conventional dot numbers, e.g. `"1245"`.
    ///
    /// # Errors
    ///
    /// Returns [`ParseDotsError::DotNumber`] for any character that is not
    /// a digit from 1 to 6.
    pub fn from_numbers(numbers: &str) -> Result<Self, ParseDotsError> {
        numbers.chars().try_fold(Self::EMPTY, |acc, c| {
            c.to_digit(10)
                .and_then(|n| u8::try_from(n).ok())
                .and_then(Dot::from_number)
                .map(|d| acc.with(d))
                .ok_or(ParseDotsError::DotNumber(c))
        })
    }

    /// Raise `dot`.
    pub const fn set(&mut self, dot: Dot) {
        self.0 |= dot.bit();
    }

    /// Copy of `self` with `dot` raised.
    #[must_use]
    pub const fn with(mut self, dot: Dot) -> Self {
        self.set(dot);
        self
    }

    /// Dots raised in either pattern.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Whether `dot` is raised.
    #[must_use]
    pub const fn contains(self, dot: Dot) -> bool {
        self.0 & dot.bit() != 0
    }

    /// Whether no dot is raised.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of raised dots.
    #[must_use]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Bit mask where bit `i` is dot `i + 1`.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Raised dots in dot-number order.
    pub fn dots(self) -> impl Iterator<Item = Dot> {
        Dot::ALL.into_iter().filter(move |&d| self.contains(d))
    }
}

impl fmt::Display for BrailleDots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for dot in Dot::ALL {
            f.write_str(if self.contains(dot) { "F" } else { "E" })?;
        }
        Ok(())
    }
}

impl fmt::Debug for BrailleDots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BrailleDots({self})")
    }
}

/// Errors from parsing a dot pattern.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseDotsError {
    /// The pattern did not have exactly six flags.
    #[error("expected 6 dot flags, found {0}")]
    Length(usize),
    /// A flag was neither `F` nor `E`.
    #[error("invalid dot flag {0:?}, expected \"F\" or \"E\"")]
    Flag(String),
    /// A dot number was not a digit from 1 to 6.
    #[error("invalid dot number {0:?}")]
    DotNumber(char),
}

impl FromStr for BrailleDots {
    type Err = ParseDotsError;

    /// Accepts the compact form `FEEFFE` and the comma-separated form
    /// `F, E, E, F, F, E`. Flags are case-sensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let flags: Vec<String> = if s.contains(',') {
            s.split(',').map(|t| t.trim().to_owned()).collect()
        } else {
            s.trim().chars().map(String::from).collect()
        };
        if flags.len() != Dot::ALL.len() {
            return Err(ParseDotsError::Length(flags.len()));
        }

        let mut dots = Self::EMPTY;
        for (dot, flag) in Dot::ALL.into_iter().zip(flags) {
            match flag.as_str() {
                "F" => dots.set(dot),
                "E" => {}
                _ => return Err(ParseDotsError::Flag(flag)),
            }
        }
        Ok(dots)
    }
}

impl Serialize for BrailleDots {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BrailleDots {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn display_lists_flags_in_dot_order() {
        let d = BrailleDots::from_dots(&[Dot::D1, Dot::D4, Dot::D5]);
        assert_eq!(d.to_string(), "FEEFFE");
        assert_eq!(BrailleDots::EMPTY.to_string(), "EEEEEE");
    }

    #[test]
    fn parses_both_forms() {
        let compact: BrailleDots = "FEEFFE".parse().unwrap();
        let listed: BrailleDots = "F, E, E, F, F, E".parse().unwrap();
        assert_eq!(compact, listed);
        assert_eq!(compact, BrailleDots::from_numbers("145").unwrap());
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert_eq!("FEEF".parse::<BrailleDots>(), Err(ParseDotsError::Length(4)));
        assert_eq!(
            "FEEFFx".parse::<BrailleDots>(),
            Err(ParseDotsError::Flag("x".into()))
        );
        assert!("feeffe".parse::<BrailleDots>().is_err());
        assert!("F, E, E, F, F".parse::<BrailleDots>().is_err());
        assert_eq!(
            BrailleDots::from_numbers("127"),
            Err(ParseDotsError::DotNumber('7'))
        );
    }

    #[test]
    fn setting_is_monotonic_and_idempotent() {
        let mut d = BrailleDots::EMPTY;
        d.set(Dot::D2);
        d.set(Dot::D2);
        d.set(Dot::D6);
        assert_eq!(d.count(), 2);
        assert!(d.contains(Dot::D2) && d.contains(Dot::D6));
        assert_eq!(d.union(BrailleDots::from_dots(&[Dot::D2])), d);
    }

    #[test]
    fn from_bits_bounds() {
        assert_eq!(BrailleDots::from_bits(0b11_1111).unwrap().count(), 6);
        assert!(BrailleDots::from_bits(64).is_none());
    }

    #[test]
    fn serde_uses_flag_string() {
        let d = BrailleDots::from_numbers("1245").unwrap();
        assert_eq!(serde_json::to_string(&d).unwrap(), "\"FFEFFE\"");
        let back: BrailleDots = serde_json::from_str("\"FFEFFE\"").unwrap();
        assert_eq!(back, d);
    }
}
