use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_AGE: u8 = 64;

/// States whose calculator variant only offers an "individual enrollee"
/// household selector instead of per-person age fields.
pub const ALTERNATE_HOUSEHOLD_STATES: [&str; 2] = ["NY", "VT"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidRequest {
    #[error("invalid ZIP code: {0:?}")]
    Zip(String),
    #[error("invalid state code: {0:?}")]
    State(String),
    #[error("age {0} is outside 0-64")]
    Age(u32),
}

/// Normalize a ZIP code to exactly five digits, restoring leading zeros that
/// spreadsheets and integer columns drop.
///
/// Accepts `"501"`, `"00501"`, `"501.0"` (float-typed columns) and ZIP+4
/// (`"00501-1234"`).
pub fn normalize_zip(raw: &str) -> Result<String, InvalidRequest> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_suffix(".0")
        .or_else(|| {
            trimmed
                .split_once('-')
                .filter(|(_, plus4)| plus4.len() == 4 && plus4.chars().all(|c| c.is_ascii_digit()))
                .map(|(zip, _)| zip)
        })
        .unwrap_or(trimmed);

    if digits.is_empty() || digits.len() > 5 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(InvalidRequest::Zip(raw.to_string()));
    }
    Ok(format!("{:0>5}", digits))
}

pub fn zip_from_int(zip: u32) -> Result<String, InvalidRequest> {
    if zip > 99_999 {
        return Err(InvalidRequest::Zip(zip.to_string()));
    }
    Ok(format!("{:05}", zip))
}

pub fn normalize_state(raw: &str) -> Result<String, InvalidRequest> {
    let state = raw.trim().to_ascii_uppercase();
    if state.len() != 2 || !state.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(InvalidRequest::State(raw.to_string()));
    }
    Ok(state)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuoteRequest {
    state: String,
    zip: String,
    age: u8,
}

impl QuoteRequest {
    pub fn new(state: &str, zip: &str, age: u32) -> Result<Self, InvalidRequest> {
        if age > MAX_AGE as u32 {
            return Err(InvalidRequest::Age(age));
        }
        Ok(QuoteRequest {
            state: normalize_state(state)?,
            zip: normalize_zip(zip)?,
            age: age as u8,
        })
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn zip(&self) -> &str {
        &self.zip
    }

    pub fn age(&self) -> u8 {
        self.age
    }

    pub fn key(&self) -> QuoteKey {
        QuoteKey {
            state: self.state.clone(),
            zip: self.zip.clone(),
        }
    }

    pub fn uses_alternate_household(&self) -> bool {
        ALTERNATE_HOUSEHOLD_STATES.contains(&self.state.as_str())
    }

    pub fn is_adult(&self) -> bool {
        self.age >= 21
    }
}

impl fmt::Display for QuoteRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} (age {})", self.state, self.zip, self.age)
    }
}

/// Identity of a request for resume purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuoteKey {
    pub state: String,
    pub zip: String,
}

pub const NOT_FOUND: &str = "N/A";
pub const ERROR: &str = "ERROR";

/// Unsubsidized monthly premium as read off the results page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cost {
    Amount(f64),
    /// The results rendered but carried no dollar figure.
    NotFound,
    /// The page interaction itself failed.
    Error,
}

impl Cost {
    /// A zero premium means the calculator could not price the area, so it is
    /// treated like a sentinel when deciding whether to retry.
    pub fn is_usable(&self) -> bool {
        matches!(self, Cost::Amount(v) if *v > 0.0)
    }

    pub fn amount(&self) -> Option<f64> {
        match self {
            Cost::Amount(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cost::Amount(v) if v.fract() == 0.0 => write!(f, "{:.0}", v),
            Cost::Amount(v) => write!(f, "{:.2}", v),
            Cost::NotFound => f.write_str(NOT_FOUND),
            Cost::Error => f.write_str(ERROR),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized cost value: {0:?}")]
pub struct InvalidCost(pub String);

impl FromStr for Cost {
    type Err = InvalidCost;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().trim_matches('"');
        match value {
            NOT_FOUND | "" => Ok(Cost::NotFound),
            ERROR => Ok(Cost::Error),
            _ => {
                let cleaned = value.trim_start_matches('$').replace(',', "");
                match cleaned.parse::<f64>() {
                    Ok(v) if v >= 0.0 && v.is_finite() => Ok(Cost::Amount(v)),
                    _ => Err(InvalidCost(s.to_string())),
                }
            }
        }
    }
}

impl Serialize for Cost {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Cost {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Outcome of one calculator run. Never mutated; a retry yields a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteResult {
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "Zip")]
    pub zip: String,
    #[serde(rename = "Age")]
    pub age: u8,
    #[serde(rename = "Unsubsidized Cost")]
    pub cost: Cost,
    #[serde(rename = "County", default)]
    pub county: Option<String>,
}

impl QuoteResult {
    pub fn new(request: &QuoteRequest, county: Option<String>, cost: Cost) -> Self {
        QuoteResult {
            state: request.state.clone(),
            zip: request.zip.clone(),
            age: request.age,
            cost,
            county,
        }
    }

    pub fn error(request: &QuoteRequest) -> Self {
        QuoteResult::new(request, None, Cost::Error)
    }

    pub fn key(&self) -> QuoteKey {
        QuoteKey {
            state: self.state.clone(),
            zip: self.zip.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zip_padding_for_small_integers() {
        for z in (0..10_000u32).step_by(7).chain([1, 501, 9999]) {
            let from_int = zip_from_int(z).unwrap();
            let from_str = normalize_zip(&z.to_string()).unwrap();
            assert_eq!(from_int.len(), 5);
            assert_eq!(from_int, from_str);
            assert_eq!(from_int.parse::<u32>().unwrap(), z);
        }
    }

    #[test]
    fn test_zip_variants() {
        assert_eq!(normalize_zip(" 2134 ").unwrap(), "02134");
        assert_eq!(normalize_zip("2134.0").unwrap(), "02134");
        assert_eq!(normalize_zip("02134-1234").unwrap(), "02134");
        assert!(normalize_zip("123456").is_err());
        assert!(normalize_zip("12a45").is_err());
        assert!(normalize_zip("").is_err());
        assert!(zip_from_int(100_000).is_err());
    }

    #[test]
    fn test_request_validation() {
        let request = QuoteRequest::new("ca", "90001", 30).unwrap();
        assert_eq!(request.state(), "CA");
        assert!(request.is_adult());
        assert!(!request.uses_alternate_household());

        assert!(QuoteRequest::new("vt", "5401", 0).unwrap().uses_alternate_household());
        assert_eq!(
            QuoteRequest::new("CA", "90001", 65),
            Err(InvalidRequest::Age(65))
        );
        assert!(matches!(
            QuoteRequest::new("California", "90001", 30),
            Err(InvalidRequest::State(_))
        ));
    }

    #[test]
    fn test_child_age_boundary() {
        assert!(!QuoteRequest::new("TX", "75001", 20).unwrap().is_adult());
        assert!(QuoteRequest::new("TX", "75001", 21).unwrap().is_adult());
    }

    #[test]
    fn test_cost_parsing_and_display() {
        assert_eq!("1,234".parse::<Cost>().unwrap(), Cost::Amount(1234.0));
        assert_eq!("$512.35".parse::<Cost>().unwrap(), Cost::Amount(512.35));
        assert_eq!("N/A".parse::<Cost>().unwrap(), Cost::NotFound);
        assert_eq!("ERROR".parse::<Cost>().unwrap(), Cost::Error);
        assert!("n/a please".parse::<Cost>().is_err());

        assert_eq!(Cost::Amount(1234.0).to_string(), "1234");
        assert_eq!(Cost::Amount(512.35).to_string(), "512.35");
        assert_eq!(Cost::NotFound.to_string(), "N/A");
    }

    #[test]
    fn test_zero_cost_is_not_usable() {
        assert!(!Cost::Amount(0.0).is_usable());
        assert!(!Cost::Error.is_usable());
        assert!(Cost::Amount(401.0).is_usable());
    }
}
