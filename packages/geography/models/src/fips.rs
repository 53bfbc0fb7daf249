//! County FIPS code newtype.
//!
//! County FIPS codes are five-digit numbers (state prefix + county
//! suffix). They travel as zero-padded strings on the wire ("06001")
//! but are stored numerically so they order and compare cheaply.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A five-digit county FIPS code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CountyFips(u32);

impl CountyFips {
    /// Creates a FIPS code from its numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Parses a FIPS code from a string, accepting both zero-padded
    /// ("06001") and bare ("6001") forms.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidFipsError`] if the string is not a number of at
    /// most five digits.
    pub fn parse(s: &str) -> Result<Self, InvalidFipsError> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.len() > 5 {
            return Err(InvalidFipsError {
                value: s.to_string(),
            });
        }
        trimmed
            .parse::<u32>()
            .map(Self)
            .map_err(|_| InvalidFipsError {
                value: s.to_string(),
            })
    }
}

impl std::fmt::Display for CountyFips {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:05}", self.0)
    }
}

impl Serialize for CountyFips {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct FipsVisitor;

impl Visitor<'_> for FipsVisitor {
    type Value = CountyFips;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("a county FIPS code as a string or integer")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        CountyFips::parse(v).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        u32::try_from(v)
            .map(CountyFips::new)
            .map_err(|_| E::custom(format!("FIPS code out of range: {v}")))
    }
}

impl<'de> Deserialize<'de> for CountyFips {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FipsVisitor)
    }
}

/// Error returned when a string cannot be parsed as a county FIPS code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidFipsError {
    /// The rejected input.
    pub value: String,
}

impl std::fmt::Display for InvalidFipsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid county FIPS code '{}'", self.value)
    }
}

impl std::error::Error for InvalidFipsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_padded_and_bare() {
        assert_eq!(CountyFips::parse("06001").unwrap().value(), 6001);
        assert_eq!(CountyFips::parse("6001").unwrap().value(), 6001);
    }

    #[test]
    fn formats_zero_padded() {
        assert_eq!(CountyFips::new(6001).to_string(), "06001");
    }

    #[test]
    fn rejects_garbage() {
        assert!(CountyFips::parse("").is_err());
        assert!(CountyFips::parse("sixty").is_err());
        assert!(CountyFips::parse("060011").is_err());
    }

    #[test]
    fn serde_roundtrip_as_string() {
        let fips = CountyFips::new(6037);
        let json = serde_json::to_string(&fips).unwrap();
        assert_eq!(json, "\"06037\"");
        let back: CountyFips = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fips);
    }

    #[test]
    fn deserializes_from_integer() {
        let back: CountyFips = serde_json::from_str("6037").unwrap();
        assert_eq!(back.value(), 6037);
    }
}
